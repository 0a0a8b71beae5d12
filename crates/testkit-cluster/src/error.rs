//! Error types for cluster operations.

use testkit_client::ClientError;
use testkit_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The topology cannot run the requested configuration.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// A provisioning step ran and exited non-zero.
    #[error("Provisioning step '{playbook}' failed with status {status}")]
    Provision { playbook: String, status: i32 },

    #[error("Failed to launch provisioner '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A liveness check got no usable answer.
    #[error("Node '{node}' is unreachable: {source}")]
    Unreachable {
        node: String,
        #[source]
        source: ClientError,
    },

    #[error("Client setup failed: {0}")]
    Client(#[from] ClientError),
}
