//! Addressable cluster nodes and their lifecycle.

use crate::error::ClusterError;
use crate::provision::{PlaybookVars, Provisioner};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use testkit_client::GatewayClient;
use testkit_config::{ClusterTopology, SessionSettings};
use tracing::info;

/// What a node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    SyncGateway,
    SgAccel,
    Server,
}

impl NodeRole {
    fn service(&self) -> &'static str {
        match self {
            Self::SyncGateway => "sync-gateway",
            Self::SgAccel => "sg-accel",
            Self::Server => "couchbase-server",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service())
    }
}

/// Scheme, port and switches every service start needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchVars {
    pub server_scheme: &'static str,
    pub server_port: u16,
    pub xattrs: bool,
}

impl LaunchVars {
    pub fn from_topology(topology: &ClusterTopology) -> Self {
        let (server_scheme, server_port) = if topology.environment.cbs_ssl_enabled {
            ("https", 18091)
        } else {
            ("http", 8091)
        };
        Self {
            server_scheme,
            server_port,
            xattrs: topology.environment.xattrs_enabled,
        }
    }

    pub(crate) fn playbook_vars(&self, config: &Path) -> PlaybookVars {
        let mut vars = PlaybookVars::new();
        vars.insert(
            "sync_gateway_config_filepath".to_string(),
            config.display().to_string(),
        );
        vars.insert("server_scheme".to_string(), self.server_scheme.to_string());
        vars.insert("server_port".to_string(), self.server_port.to_string());
        let (autoimport, xattrs) = if self.xattrs {
            (
                r#""import_docs": "continuous","#,
                r#""enable_shared_bucket_access": true,"#,
            )
        } else {
            ("", "")
        };
        vars.insert("autoimport".to_string(), autoimport.to_string());
        vars.insert("xattrs".to_string(), xattrs.to_string());
        vars
    }
}

/// One node of the cluster.
#[derive(Clone)]
pub struct ClusterNode {
    name: String,
    role: NodeRole,
    url: String,
    admin_url: String,
    launch: LaunchVars,
    provisioner: Arc<dyn Provisioner>,
}

impl ClusterNode {
    pub fn new(
        name: impl Into<String>,
        role: NodeRole,
        url: impl Into<String>,
        admin_url: impl Into<String>,
        launch: LaunchVars,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            url: url.into(),
            admin_url: admin_url.into(),
            launch,
            provisioner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// URL checked for liveness (the public port for a gateway).
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn admin_url(&self) -> &str {
        &self.admin_url
    }

    /// Start the service with `config` and return the provisioner's exit status.
    pub async fn start(&self, config: &Path) -> Result<i32, ClusterError> {
        info!("Starting {} on '{}' with {}", self.role, self.name, config.display());
        let playbook = format!("start-{}", self.role.service());
        self.provisioner
            .run(&playbook, &self.launch.playbook_vars(config), Some(&self.name))
            .await
    }

    pub async fn stop(&self) -> Result<i32, ClusterError> {
        info!("Stopping {} on '{}'", self.role, self.name);
        let playbook = format!("stop-{}", self.role.service());
        self.provisioner
            .run(&playbook, &PlaybookVars::new(), Some(&self.name))
            .await
    }

    /// Reset the service in place with `config`.
    pub async fn restart(&self, config: &Path) -> Result<i32, ClusterError> {
        info!("Restarting {} on '{}' with {}", self.role, self.name, config.display());
        let playbook = format!("reset-{}", self.role.service());
        self.provisioner
            .run(&playbook, &self.launch.playbook_vars(config), Some(&self.name))
            .await
    }

    /// Fetch the server banner, `GET /`.
    pub async fn info(&self, settings: &SessionSettings) -> Result<String, ClusterError> {
        let client = GatewayClient::new(self.admin_url.as_str(), self.url.as_str(), settings)?;
        client
            .server_info()
            .await
            .map_err(|source| ClusterError::Unreachable {
                node: self.name.clone(),
                source,
            })
    }
}

impl fmt::Debug for ClusterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterNode")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("url", &self.url)
            .finish()
    }
}
