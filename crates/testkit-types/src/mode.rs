//! Server indexing strategy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Indexing strategy of the server under test.
///
/// Discovered once from the gateway configuration and threaded through all
/// sequence-token parsing and verification decisions for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMode {
    /// Per-channel visibility computed in-process. Sequence tokens are plain integers.
    ChannelCache,
    /// External distributed index. Sequence tokens are compound `hash::subsequence`.
    DistributedIndex,
}

impl ClusterMode {
    /// Short form used in config file names and logs ("cc" / "di").
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::ChannelCache => "cc",
            Self::DistributedIndex => "di",
        }
    }

    pub fn is_distributed_index(&self) -> bool {
        matches!(self, Self::DistributedIndex)
    }
}

impl fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelCache => write!(f, "channel_cache"),
            Self::DistributedIndex => write!(f, "distributed_index"),
        }
    }
}

impl FromStr for ClusterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cc" | "channel_cache" | "channel-cache" => Ok(Self::ChannelCache),
            "di" | "distributed_index" | "distributed-index" => Ok(Self::DistributedIndex),
            other => Err(format!(
                "Unknown cluster mode '{other}'. Expected 'channel_cache' or 'distributed_index'"
            )),
        }
    }
}
