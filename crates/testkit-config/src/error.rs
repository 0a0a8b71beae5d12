//! Error types for configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration resource could not be read.
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remainder after placeholder substitution is not well-formed JSON.
    #[error("Config is not well-formed after placeholder substitution: {0}")]
    Parse(#[from] serde_json::Error),

    /// A placeholder or inline function body was opened but never closed.
    #[error("Unterminated {0} in config")]
    Unterminated(&'static str),

    /// A recognized field has the wrong shape.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}
