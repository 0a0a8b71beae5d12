//! Configuration for sync-testkit.
//!
//! - [`GatewayConfig`] reads a sync gateway configuration file, discovers the
//!   [`ClusterMode`](testkit_types::ClusterMode) and the set of backing buckets.
//! - [`ClusterTopology`] reads the cluster description (which nodes exist and
//!   where they listen).
//! - [`SessionSettings`] carries the client-side knobs for one scenario.
//!
//! # Example
//!
//! ```rust
//! use testkit_config::GatewayConfig;
//! use testkit_types::ClusterMode;
//!
//! let config = GatewayConfig::from_str(r#"{
//!     "interface": ":4984",
//!     "databases": {
//!         "db": {
//!             "server": "http://{{ couchbase_server_primary_node }}:8091",
//!             "bucket": "data-bucket",
//!             "sync": `function(doc) { channel(doc.channels); }`
//!         }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(config.mode(), ClusterMode::ChannelCache);
//! assert_eq!(config.bucket_names(), ["data-bucket"]);
//! ```

mod duration;
mod error;
mod gateway;
mod settings;
mod template;
mod topology;

pub use duration::parse_duration;
pub use error::ConfigError;
pub use gateway::{DatabaseConfig, GatewayConfig};
pub use settings::SessionSettings;
pub use template::neutralize_placeholders;
pub use topology::{ClusterTopology, Environment, NodeSpec};
