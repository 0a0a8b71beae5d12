//! The cluster facade: reset between scenarios and liveness checks.

use crate::error::ClusterError;
use crate::node::{ClusterNode, LaunchVars, NodeRole};
use crate::provision::{ensure_success, PlaybookVars, Provisioner};
use async_trait::async_trait;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use testkit_config::{ClusterTopology, GatewayConfig, SessionSettings};
use testkit_types::ClusterMode;
use tracing::{info, warn};

/// What scenarios need from a cluster.
#[async_trait]
pub trait ClusterFacade: Send + Sync {
    /// Tear down and bring the cluster back up running `config_path`.
    ///
    /// Returns the mode the configuration selects.
    async fn reset(&mut self, config_path: &Path) -> Result<ClusterMode, ClusterError>;

    /// Check every node that should be running in `mode`.
    ///
    /// Returns one `(node name, error)` pair per node that did not answer.
    async fn verify_alive(&self, mode: ClusterMode) -> Vec<(String, ClusterError)>;

    fn sync_gateways(&self) -> &[ClusterNode];

    fn sg_accels(&self) -> &[ClusterNode];

    fn servers(&self) -> &[ClusterNode];
}

/// Check that the topology can run a configuration in `mode`.
pub fn validate_topology(
    sync_gateways: &[ClusterNode],
    sg_accels: &[ClusterNode],
    mode: ClusterMode,
) -> Result<(), ClusterError> {
    if sync_gateways.is_empty() {
        return Err(ClusterError::InvalidTopology(
            "at least one sync gateway is required".to_string(),
        ));
    }
    if mode.is_distributed_index() && sg_accels.is_empty() {
        return Err(ClusterError::InvalidTopology(
            "distributed index mode requires at least one sg_accel".to_string(),
        ));
    }
    Ok(())
}

/// A cluster driven by a [`Provisioner`] and checked over HTTP.
pub struct Cluster {
    sync_gateways: Vec<ClusterNode>,
    sg_accels: Vec<ClusterNode>,
    servers: Vec<ClusterNode>,
    launch: LaunchVars,
    settings: SessionSettings,
    provisioner: Arc<dyn Provisioner>,
    config: Option<GatewayConfig>,
}

impl Cluster {
    pub fn new(
        topology: &ClusterTopology,
        settings: SessionSettings,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        let launch = LaunchVars::from_topology(topology);
        let node = |spec: &testkit_config::NodeSpec, role: NodeRole, url: String, admin_url: String| {
            ClusterNode::new(
                spec.name.clone(),
                role,
                url,
                admin_url,
                launch.clone(),
                provisioner.clone(),
            )
        };

        let sync_gateways = topology
            .sync_gateways
            .iter()
            .map(|sg| {
                node(
                    sg,
                    NodeRole::SyncGateway,
                    topology.gateway_public_url(sg),
                    topology.gateway_admin_url(sg),
                )
            })
            .collect();
        let sg_accels = topology
            .sg_accels
            .iter()
            .map(|ac| {
                let url = topology.accel_url(ac);
                node(ac, NodeRole::SgAccel, url.clone(), url)
            })
            .collect();
        let servers = topology
            .couchbase_servers
            .iter()
            .map(|cbs| {
                let url = topology.server_url(cbs);
                node(cbs, NodeRole::Server, url.clone(), url)
            })
            .collect();

        Self {
            sync_gateways,
            sg_accels,
            servers,
            launch,
            settings,
            provisioner,
            config: None,
        }
    }

    /// Configuration applied by the last successful [`reset`](ClusterFacade::reset).
    pub fn gateway_config(&self) -> Option<&GatewayConfig> {
        self.config.as_ref()
    }

    async fn run_step(&self, playbook: &str, vars: &PlaybookVars) -> Result<(), ClusterError> {
        let status = self.provisioner.run(playbook, vars, None).await?;
        ensure_success(playbook, status)
    }

    async fn check_nodes(&self, nodes: &[ClusterNode]) -> Vec<(String, ClusterError)> {
        let checks = nodes.iter().map(|node| async move {
            match node.info(&self.settings).await {
                Ok(banner) => {
                    info!("{} '{}' ({}) is up: {}", node.role(), node.name(), node.url(), banner.trim());
                    None
                }
                Err(e) => {
                    warn!("{} '{}' is down: {e}", node.role(), node.name());
                    Some((node.name().to_string(), e))
                }
            }
        });
        join_all(checks).await.into_iter().flatten().collect()
    }
}

#[async_trait]
impl ClusterFacade for Cluster {
    async fn reset(&mut self, config_path: &Path) -> Result<ClusterMode, ClusterError> {
        info!("Resetting cluster (TLS: {}, xattrs: {})", self.launch.server_scheme == "https", self.launch.xattrs);
        let config_path: PathBuf = std::path::absolute(config_path).map_err(|source| {
            ClusterError::Config(testkit_config::ConfigError::Io {
                path: config_path.to_path_buf(),
                source,
            })
        })?;
        let no_vars = PlaybookVars::new();

        self.run_step("stop-sync-gateway", &no_vars).await?;
        self.run_step("stop-sg-accel", &no_vars).await?;
        self.run_step("delete-sync-gateway-artifacts", &no_vars).await?;
        self.run_step("delete-sg-accel-artifacts", &no_vars).await?;

        let server = self.servers.first().ok_or_else(|| {
            ClusterError::InvalidTopology("at least one backing-store server is required".to_string())
        })?;
        let mut server_vars = PlaybookVars::new();
        server_vars.insert("server_url".to_string(), server.url().to_string());
        info!("Deleting buckets on {}", server.url());
        self.run_step("delete-buckets", &server_vars).await?;

        let config = GatewayConfig::from_file(&config_path)?;
        let mode = config.mode();
        validate_topology(&self.sync_gateways, &self.sg_accels, mode)?;

        info!("Creating buckets {:?} on {}", config.bucket_names(), server_vars["server_url"]);
        server_vars.insert("bucket_names".to_string(), config.bucket_names().join(","));
        self.run_step("create-buckets", &server_vars).await?;

        info!("Starting sync_gateway with {}", config_path.display());
        let launch_vars = self.launch.playbook_vars(&config_path);
        self.run_step("start-sync-gateway", &launch_vars).await?;

        if mode.is_distributed_index() {
            self.run_step("start-sg-accel", &launch_vars).await?;
        } else {
            info!("Running in channel cache mode, sg_accels stay down");
        }

        self.config = Some(config);
        Ok(mode)
    }

    async fn verify_alive(&self, mode: ClusterMode) -> Vec<(String, ClusterError)> {
        let mut errors = self.check_nodes(&self.sync_gateways).await;
        if mode.is_distributed_index() {
            errors.extend(self.check_nodes(&self.sg_accels).await);
        }
        errors
    }

    fn sync_gateways(&self) -> &[ClusterNode] {
        &self.sync_gateways
    }

    fn sg_accels(&self) -> &[ClusterNode] {
        &self.sg_accels
    }

    fn servers(&self) -> &[ClusterNode] {
        &self.servers
    }
}
