//! Request and response bodies of the gateway REST surface.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use testkit_types::SequenceToken;

/// Body of `PUT /{db}/_user/{name}`.
///
/// Without a password the server keeps the existing one, which is how
/// channel grants are extended on a registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub admin_channels: Vec<String>,
    pub admin_roles: Vec<String>,
}

/// Body of `PUT /{db}/_role/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSpec {
    pub name: String,
    pub admin_channels: Vec<String>,
}

/// Response of `GET /{db}/_user/{name}` and `GET /{db}/_role/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrincipalInfo {
    pub name: String,
    #[serde(default)]
    pub admin_channels: Vec<String>,
    /// Effective channels, including those inherited through roles.
    #[serde(default)]
    pub all_channels: Vec<String>,
    #[serde(default)]
    pub admin_roles: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Response of a single-document write.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocWriteResult {
    pub id: String,
    pub rev: String,
    #[serde(default)]
    pub ok: bool,
}

/// One element of a `_bulk_docs` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BulkDocResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}

impl BulkDocResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.rev.is_some()
    }
}

/// `value` of an `_all_docs` row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RowValue {
    pub rev: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub key: Option<String>,
    pub value: RowValue,
}

/// Response of `GET /{db}/_all_docs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
    #[serde(default)]
    pub total_rows: u64,
}

/// The `feed` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedType {
    #[default]
    Normal,
    LongPoll,
    Continuous,
}

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::LongPoll => "longpoll",
            Self::Continuous => "continuous",
        }
    }
}

/// Query parameters of `GET /{db}/_changes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesQuery {
    pub feed: FeedType,
    pub since: Option<SequenceToken>,
    pub limit: Option<u64>,
    pub filter: Option<String>,
    pub channels: Vec<String>,
    pub include_docs: bool,
    /// Server-side long-poll timeout.
    pub timeout: Option<Duration>,
}

impl ChangesQuery {
    pub fn one_shot() -> Self {
        Self::default()
    }

    pub fn longpoll(since: SequenceToken, timeout: Duration) -> Self {
        Self {
            feed: FeedType::LongPoll,
            since: Some(since),
            include_docs: true,
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn continuous(since: SequenceToken) -> Self {
        Self {
            feed: FeedType::Continuous,
            since: Some(since),
            include_docs: true,
            ..Self::default()
        }
    }

    pub fn with_since(mut self, since: SequenceToken) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restrict to `channels` through the `sync_gateway/bychannel` filter.
    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.filter = Some("sync_gateway/bychannel".to_string());
        self.channels = channels;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Query-string pairs in the order the server documents them.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("feed", self.feed.as_str().to_string())];
        if let Some(since) = &self.since {
            params.push(("since", since.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(filter) = &self.filter {
            params.push(("filter", filter.clone()));
        }
        if !self.channels.is_empty() {
            params.push(("channels", self.channels.join(",")));
        }
        if self.include_docs {
            params.push(("include_docs", "true".to_string()));
        }
        if let Some(timeout) = self.timeout {
            params.push(("timeout", timeout.as_millis().to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_params() {
        let params = ChangesQuery::one_shot()
            .with_since(SequenceToken::Plain(5))
            .with_limit(10)
            .with_channels(vec!["ABC".to_string(), "NBC".to_string()])
            .to_params();
        assert_eq!(
            params,
            vec![
                ("feed", "normal".to_string()),
                ("since", "5".to_string()),
                ("limit", "10".to_string()),
                ("filter", "sync_gateway/bychannel".to_string()),
                ("channels", "ABC,NBC".to_string()),
            ]
        );
    }

    #[test]
    fn test_longpoll_params() {
        let since = SequenceToken::Compound {
            hash: "ab".to_string(),
            subsequence: 3,
        };
        let params = ChangesQuery::longpoll(since, Duration::from_millis(10_000)).to_params();
        assert!(params.contains(&("feed", "longpoll".to_string())));
        assert!(params.contains(&("since", "ab::3".to_string())));
        assert!(params.contains(&("include_docs", "true".to_string())));
        assert!(params.contains(&("timeout", "10000".to_string())));
    }

    #[test]
    fn test_user_spec_omits_missing_password() {
        let spec = UserSpec {
            name: "seth".to_string(),
            password: None,
            admin_channels: vec!["ABC".to_string()],
            admin_roles: vec![],
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["admin_channels"][0], "ABC");
    }

    #[test]
    fn test_bulk_doc_result_success() {
        let ok: BulkDocResult = serde_json::from_str(r#"{"id": "a", "rev": "1-x"}"#).unwrap();
        assert!(ok.is_success());
        let failed: BulkDocResult =
            serde_json::from_str(r#"{"id": "b", "error": "conflict", "reason": "Document exists", "status": 409}"#)
                .unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.status, Some(409));
    }
}
