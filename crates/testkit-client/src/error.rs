//! Error types for the HTTP session.

use thiserror::Error;

/// Errors returned by [`crate::GatewayClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Setup(#[source] reqwest::Error),

    /// No response arrived: connection refused, reset, or timed out.
    #[error("Transport error on {method} {url}: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered 4xx (or another non-success, non-5xx status).
    #[error("{method} {url} rejected with status {status}: {body}")]
    RequestRejected {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The server answered 5xx.
    #[error("{method} {url} failed with status {status} (server unavailable): {body}")]
    ServerUnavailable {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// A streaming response ended with a read error rather than a clean close.
    #[error("Stream from {url} interrupted: {reason}")]
    StreamInterrupted { url: String, reason: String },

    /// A 2xx response whose body could not be decoded.
    #[error("Failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl ClientError {
    /// HTTP status of the response, if one arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestRejected { status, .. } | Self::ServerUnavailable { status, .. } => {
                Some(*status)
            }
            Self::Setup(_)
            | Self::Transport { .. }
            | Self::StreamInterrupted { .. }
            | Self::Decode { .. } => None,
        }
    }

    /// 5xx or no response at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::StreamInterrupted { .. } | Self::ServerUnavailable { .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// URL of the failed request; empty for setup failures.
    pub fn url(&self) -> &str {
        match self {
            Self::Setup(_) => "",
            Self::Transport { url, .. }
            | Self::RequestRejected { url, .. }
            | Self::ServerUnavailable { url, .. }
            | Self::StreamInterrupted { url, .. }
            | Self::Decode { url, .. } => url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16) -> ClientError {
        ClientError::RequestRejected {
            method: "PUT".to_string(),
            url: "http://sg:4984/db/doc".to_string(),
            status,
            body: "{}".to_string(),
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(rejected(409).is_conflict());
        assert!(rejected(404).is_not_found());
        assert!(!rejected(409).is_unavailable());

        let unavailable = ClientError::ServerUnavailable {
            method: "GET".to_string(),
            url: "http://sg:4984/db/_changes".to_string(),
            status: 503,
            body: String::new(),
        };
        assert!(unavailable.is_unavailable());
        assert_eq!(unavailable.status(), Some(503));
        assert_eq!(unavailable.url(), "http://sg:4984/db/_changes");
    }

    #[test]
    fn test_error_message_names_status() {
        let message = rejected(403).to_string();
        assert!(message.contains("403"));
        assert!(message.contains("http://sg:4984/db/doc"));
    }
}
