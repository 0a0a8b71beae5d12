//! A registered user bound to its credentials and local document cache.

use crate::error::TestkitError;
use crate::session::GatewaySession;
use serde_json::{json, Map, Value};
use std::fmt;
use testkit_client::{AllDocsResponse, Credentials, GatewayClient};
use testkit_types::{ClusterMode, DocumentCache};
use tracing::debug;

/// A principal that writes documents and reads feeds with its own credentials.
///
/// The cache is owned exclusively by this value and mutated only by its own
/// mutation calls (see `mutation.rs`).
pub struct User {
    session: GatewaySession,
    db: String,
    credentials: Credentials,
    channels: Vec<String>,
    roles: Vec<String>,
    pub(crate) cache: DocumentCache,
}

impl User {
    /// Bind a user that already exists on the server.
    pub fn new(
        session: GatewaySession,
        db: impl Into<String>,
        name: impl Into<String>,
        password: impl Into<String>,
        channels: Vec<String>,
    ) -> Self {
        Self {
            session,
            db: db.into(),
            credentials: Credentials::new(name, password),
            channels,
            roles: Vec::new(),
            cache: DocumentCache::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    pub fn name(&self) -> &str {
        self.credentials.name()
    }

    pub fn password(&self) -> &str {
        self.credentials.password()
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub fn mode(&self) -> ClusterMode {
        self.session.mode()
    }

    pub fn session(&self) -> &GatewaySession {
        &self.session
    }

    pub(crate) fn client(&self) -> &GatewayClient {
        self.session.client()
    }

    /// Fresh body for a new document: update counter plus this user's channels.
    pub(crate) fn new_body(&self, content: Option<Value>) -> Value {
        let mut body = Map::new();
        body.insert("updates".to_string(), json!(0));
        if !self.channels.is_empty() {
            body.insert("channels".to_string(), json!(self.channels));
        }
        if let Some(content) = content {
            body.insert("content".to_string(), content);
        }
        Value::Object(body)
    }

    /// `GET /{db}/{doc_id}`
    pub async fn get_doc(&self, doc_id: &str) -> Result<Value, TestkitError> {
        debug!("{} GET {doc_id}", self.name());
        Ok(self
            .client()
            .get_doc(&self.db, doc_id, Some(&self.credentials))
            .await?)
    }

    /// Fetch several documents in one `_bulk_get` round trip.
    pub async fn get_docs(&self, doc_ids: &[String]) -> Result<Vec<Value>, TestkitError> {
        Ok(self
            .client()
            .bulk_get(&self.db, doc_ids, Some(&self.credentials))
            .await?)
    }

    pub async fn get_all_docs(&self) -> Result<AllDocsResponse, TestkitError> {
        Ok(self
            .client()
            .all_docs(&self.db, Some(&self.credentials))
            .await?)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name())
            .field("db", &self.db)
            .field("channels", &self.channels)
            .field("roles", &self.roles)
            .field("cached_docs", &self.cache.len())
            .finish()
    }
}
