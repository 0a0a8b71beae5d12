//! Cluster description: which nodes exist and where they listen.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Public REST port of a sync gateway.
pub const GATEWAY_PUBLIC_PORT: u16 = 4984;
/// Admin REST port of a sync gateway or accel.
pub const GATEWAY_ADMIN_PORT: u16 = 4985;

/// A single addressable node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub ip: String,
}

/// Cluster-wide switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub cbs_ssl_enabled: bool,
    #[serde(default)]
    pub xattrs_enabled: bool,
}

/// The cluster description file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    pub sync_gateways: Vec<NodeSpec>,
    #[serde(default)]
    pub sg_accels: Vec<NodeSpec>,
    #[serde(default)]
    pub couchbase_servers: Vec<NodeSpec>,
    /// When present, every gateway is addressed through the first balancer.
    #[serde(default)]
    pub load_balancers: Vec<NodeSpec>,
    #[serde(default)]
    pub environment: Environment,
}

impl ClusterTopology {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let topology: Self = serde_json::from_str(&data)?;
        topology.validate()?;
        Ok(topology)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let nodes = self
            .sync_gateways
            .iter()
            .chain(&self.sg_accels)
            .chain(&self.couchbase_servers)
            .chain(&self.load_balancers);
        for node in nodes {
            if node.ip.trim().is_empty() {
                return Err(ConfigError::InvalidField {
                    field: format!("node '{}'", node.name),
                    reason: "empty ip".to_string(),
                });
            }
        }
        Ok(())
    }

    fn gateway_host<'a>(&'a self, node: &'a NodeSpec) -> &'a str {
        self.load_balancers
            .first()
            .map(|lb| lb.ip.as_str())
            .unwrap_or(node.ip.as_str())
    }

    /// Public URL of a sync gateway node.
    pub fn gateway_public_url(&self, node: &NodeSpec) -> String {
        format!("http://{}:{GATEWAY_PUBLIC_PORT}", self.gateway_host(node))
    }

    /// Admin URL of a sync gateway node. Admin traffic never goes through a balancer.
    pub fn gateway_admin_url(&self, node: &NodeSpec) -> String {
        format!("http://{}:{GATEWAY_ADMIN_PORT}", node.ip)
    }

    pub fn accel_url(&self, node: &NodeSpec) -> String {
        format!("http://{}:{GATEWAY_ADMIN_PORT}", node.ip)
    }

    pub fn server_url(&self, node: &NodeSpec) -> String {
        if self.environment.cbs_ssl_enabled {
            format!("https://{}:18091", node.ip)
        } else {
            format!("http://{}:8091", node.ip)
        }
    }
}
