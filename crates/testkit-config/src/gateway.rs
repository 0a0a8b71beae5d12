//! Sync gateway configuration: mode discovery and bucket enumeration.

use crate::error::ConfigError;
use crate::template::neutralize_placeholders;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use testkit_types::ClusterMode;
use tracing::debug;

/// Backing buckets referenced by a single database entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Primary data bucket.
    pub bucket: Option<String>,
    /// Channel index bucket (distributed index only).
    pub index_bucket: Option<String>,
    /// Shadow bucket.
    pub shadow_bucket: Option<String>,
}

impl DatabaseConfig {
    fn buckets(&self) -> impl Iterator<Item = &String> {
        self.bucket
            .iter()
            .chain(self.index_bucket.iter())
            .chain(self.shadow_bucket.iter())
    }
}

/// A parsed sync gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    path: Option<PathBuf>,
    mode: ClusterMode,
    cluster_bucket: Option<String>,
    databases: BTreeMap<String, DatabaseConfig>,
    bucket_names: Vec<String>,
}

impl GatewayConfig {
    /// Read and parse a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_str(&data)?;
        config.path = Some(path.to_path_buf());
        debug!(
            "Loaded gateway config {} (mode: {}, buckets: {:?})",
            path.display(),
            config.mode,
            config.bucket_names
        );
        Ok(config)
    }

    /// Parse configuration text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(data: &str) -> Result<Self, ConfigError> {
        let neutral = neutralize_placeholders(data)?;
        let value: Value = serde_json::from_str(&neutral)?;
        let root = value.as_object().ok_or_else(|| ConfigError::InvalidField {
            field: "<root>".to_string(),
            reason: "expected a JSON object".to_string(),
        })?;
        Self::from_object(root)
    }

    fn from_object(root: &Map<String, Value>) -> Result<Self, ConfigError> {
        let mode = discover_mode(root);

        let cluster_bucket = match root.get("cluster_config") {
            Some(cluster) => optional_string(cluster, "bucket", "cluster_config.bucket")?,
            None => None,
        };

        let mut databases = BTreeMap::new();
        match root.get("databases") {
            None => debug!("Config has no 'databases' section"),
            Some(Value::Object(dbs)) => {
                for (name, db) in dbs {
                    databases.insert(name.clone(), parse_database(name, db)?);
                }
            }
            Some(_) => {
                return Err(ConfigError::InvalidField {
                    field: "databases".to_string(),
                    reason: "expected an object keyed by database name".to_string(),
                })
            }
        }

        // Buckets may be shared between functions, so the set is de-duplicated.
        let bucket_names: BTreeSet<String> = cluster_bucket
            .iter()
            .chain(databases.values().flat_map(DatabaseConfig::buckets))
            .cloned()
            .collect();

        Ok(Self {
            path: None,
            mode,
            cluster_bucket,
            databases,
            bucket_names: bucket_names.into_iter().collect(),
        })
    }

    pub fn mode(&self) -> ClusterMode {
        self.mode
    }

    /// De-duplicated bucket names, sorted.
    pub fn bucket_names(&self) -> &[String] {
        &self.bucket_names
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Bucket named by `cluster_config.bucket`, if any.
    pub fn cluster_bucket(&self) -> Option<&str> {
        self.cluster_bucket.as_deref()
    }

    pub fn database_names(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseConfig> {
        self.databases.get(name)
    }
}

/// A top-level `cluster_config` key selects the distributed index.
fn discover_mode(root: &Map<String, Value>) -> ClusterMode {
    if root.contains_key("cluster_config") {
        ClusterMode::DistributedIndex
    } else {
        ClusterMode::ChannelCache
    }
}

fn parse_database(name: &str, db: &Value) -> Result<DatabaseConfig, ConfigError> {
    if !db.is_object() {
        return Err(ConfigError::InvalidField {
            field: format!("databases.{name}"),
            reason: "expected an object".to_string(),
        });
    }

    let bucket = optional_string(db, "bucket", &format!("databases.{name}.bucket"))?;
    let index_bucket = match db.get("channel_index") {
        Some(index) => optional_string(
            index,
            "bucket",
            &format!("databases.{name}.channel_index.bucket"),
        )?,
        None => None,
    };
    let shadow_bucket = match db.get("shadow") {
        Some(shadow) => optional_string(shadow, "bucket", &format!("databases.{name}.shadow.bucket"))?,
        None => None,
    };

    Ok(DatabaseConfig {
        bucket,
        index_bucket,
        shadow_bucket,
    })
}

/// A string field that may be absent or null; empty strings count as absent.
fn optional_string(parent: &Value, key: &str, field: &str) -> Result<Option<String>, ConfigError> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConfigError::InvalidField {
            field: field.to_string(),
            reason: format!("expected a string, found {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CHANNEL_CACHE_CONFIG: &str = r#"{
        "interface": ":4984",
        "adminInterface": "0.0.0.0:4985",
        "logging": {"default": {"logLevel": "debug"}},
        "databases": {
            "db": {
                "server": "http://{{ couchbase_server_primary_node }}:8091",
                {{ autoimport }}
                {{ xattrs }}
                "bucket": "data-bucket",
                "users": {"GUEST": {"disabled": true}},
                "sync": `function(doc, oldDoc) {
                    if (doc.type == "reject") { throw({forbidden: "nope"}); }
                    channel(doc.channels);
                }`
            },
            "db2": {
                "bucket": "data-bucket",
                "shadow": {"bucket": "source-bucket"}
            }
        }
    }"#;

    const DISTRIBUTED_INDEX_CONFIG: &str = r#"{
        "cluster_config": {
            "server": "http://{{ couchbase_server_primary_node }}:8091",
            "bucket": "data-bucket",
            "data_dir": "."
        },
        "databases": {
            "db": {
                "bucket": "data-bucket",
                "channel_index": {
                    "server": "http://{{ couchbase_server_primary_node }}:8091",
                    "bucket": "index-bucket",
                    "writer": {{ is_index_writer }}
                }
            }
        }
    }"#;

    #[test]
    fn test_channel_cache_mode() {
        let config = GatewayConfig::from_str(CHANNEL_CACHE_CONFIG).unwrap();
        assert_eq!(config.mode(), ClusterMode::ChannelCache);
        assert_eq!(config.bucket_names(), ["data-bucket", "source-bucket"]);
        assert_eq!(config.database_names().collect::<Vec<_>>(), vec!["db", "db2"]);
        assert_eq!(
            config.database("db2").unwrap().shadow_bucket.as_deref(),
            Some("source-bucket")
        );
    }

    #[test]
    fn test_distributed_index_mode() {
        let config = GatewayConfig::from_str(DISTRIBUTED_INDEX_CONFIG).unwrap();
        assert_eq!(config.mode(), ClusterMode::DistributedIndex);
        assert_eq!(config.cluster_bucket(), Some("data-bucket"));
        assert_eq!(config.bucket_names(), ["data-bucket", "index-bucket"]);
    }

    #[test]
    fn test_empty_shadow_bucket_ignored() {
        let config = GatewayConfig::from_str(
            r#"{"databases": {"db": {"bucket": "b", "shadow": {"bucket": ""}}}}"#,
        )
        .unwrap();
        assert_eq!(config.bucket_names(), ["b"]);
    }

    #[test]
    fn test_malformed_after_substitution() {
        let err = GatewayConfig::from_str(r#"{"databases": {"db": {"bucket": }}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_field_shape() {
        let err = GatewayConfig::from_str(r#"{"databases": {"db": {"bucket": 3}}}"#).unwrap_err();
        assert!(err.to_string().contains("databases.db.bucket"));

        let err = GatewayConfig::from_str(r#"{"databases": []}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DISTRIBUTED_INDEX_CONFIG.as_bytes()).unwrap();

        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.mode(), ClusterMode::DistributedIndex);
        assert_eq!(config.path(), Some(file.path()));
    }

    #[test]
    fn test_missing_file() {
        let err = GatewayConfig::from_file("/nonexistent/sync_gateway.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
