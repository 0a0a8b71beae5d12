//! Cluster facade for sync-testkit scenarios.
//!
//! A [`Cluster`] is built from a [`ClusterTopology`](testkit_config::ClusterTopology)
//! and a [`Provisioner`] that runs the actual service-management steps
//! (`ansible-playbook` through [`CommandProvisioner`] by default). Scenarios
//! depend on the [`ClusterFacade`] trait:
//!
//! - `reset(config)` stops gateways and accels, recreates the buckets the
//!   configuration references, starts gateways, and starts accels only in
//!   distributed index mode
//! - `verify_alive(mode)` checks gateways always and accels only in
//!   distributed index mode, naming each node that did not answer

mod cluster;
mod error;
mod node;
mod provision;

pub use cluster::{validate_topology, Cluster, ClusterFacade};
pub use error::ClusterError;
pub use node::{ClusterNode, LaunchVars, NodeRole};
pub use provision::{CommandProvisioner, PlaybookVars, Provisioner};
