//! Sync Testkit Library
//!
//! A client-side testkit for a multi-user document sync gateway: it registers
//! principals, drives document writes, observes the changes feed and checks
//! that every user converges on the documents its channels grant.
//!
//! # Crates
//!
//! - [`types`] - Cluster mode, sequence tokens, feed entries, document cache
//! - [`config`] - Gateway configuration, cluster topology, session settings
//! - [`client`] - Typed HTTP session over the admin and public REST surfaces
//! - [`principal`] - Admin, users, mutation engine, changes-feed tracking
//! - [`verify`] - Convergence verification and reports
//! - [`cluster`] - Cluster facade: reset between scenarios, liveness checks
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the mode and buckets a gateway configuration selects
//! sync-testkit config inspect resources/sync_gateway_configs/sync_gateway_default_di.json
//!
//! # Check every node of a cluster
//! sync-testkit cluster check --topology cluster.json --config sync_gateway_default_cc.json
//!
//! # Run the three-user convergence scenario against a live gateway
//! sync-testkit scenario convergence --admin-url http://127.0.0.1:4985 --public-url http://127.0.0.1:4984
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use testkit_config::{GatewayConfig, SessionSettings};
use testkit_principal::GatewaySession;
use testkit_types::ClusterMode;

pub mod scenarios;

pub use testkit_client as client;
pub use testkit_cluster as cluster;
pub use testkit_config as config;
pub use testkit_principal as principal;
pub use testkit_types as types;
pub use testkit_verify as verify;

/// Where the gateway under test listens and how to talk to it.
#[derive(Parser, Clone, Debug)]
pub struct GatewayOpts {
    /// Admin REST endpoint
    #[arg(long, default_value = "http://127.0.0.1:4985", env = "SG_ADMIN_URL")]
    pub admin_url: String,

    /// Public REST endpoint
    #[arg(long, default_value = "http://127.0.0.1:4984", env = "SG_PUBLIC_URL")]
    pub public_url: String,

    /// Database to run against
    #[arg(long, default_value = "db", env = "SG_DB")]
    pub db: String,

    /// Gateway configuration the server was started with; selects the mode
    #[arg(long, env = "SG_CONFIG", conflicts_with = "mode")]
    pub config: Option<PathBuf>,

    /// Cluster mode when no configuration file is given (cc or di)
    #[arg(long, default_value = "cc")]
    pub mode: ClusterMode,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    pub request_timeout: u64,

    /// Maximum concurrent operations
    #[arg(long, default_value = "100", env = "SG_MAX_WORKERS")]
    pub max_workers: usize,
}

impl GatewayOpts {
    pub fn settings(&self) -> SessionSettings {
        SessionSettings::default()
            .with_request_timeout(Duration::from_secs(self.request_timeout))
            .with_max_workers(self.max_workers)
    }

    /// Mode from the configuration file if one is given.
    pub fn cluster_mode(&self) -> anyhow::Result<ClusterMode> {
        match &self.config {
            Some(path) => Ok(GatewayConfig::from_file(path)?.mode()),
            None => Ok(self.mode),
        }
    }

    pub fn session(&self) -> anyhow::Result<GatewaySession> {
        let mode = self.cluster_mode()?;
        let session = GatewaySession::connect(&self.admin_url, &self.public_url, mode, self.settings())?;
        Ok(session)
    }
}
