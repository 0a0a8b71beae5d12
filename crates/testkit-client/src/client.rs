//! The gateway HTTP session.

use crate::auth::Credentials;
use crate::error::ClientError;
use crate::stream::ChangesLines;
use crate::types::{
    AllDocsResponse, BulkDocResult, ChangesQuery, DocWriteResult, FeedType, PrincipalInfo,
    RoleSpec, UserSpec,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use testkit_config::SessionSettings;
use testkit_types::RawChangesResponse;
use tracing::debug;

/// A session against one gateway's admin and public REST surfaces.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    admin_url: String,
    public_url: String,
    request_timeout: Duration,
}

impl GatewayClient {
    /// Create a session for the gateway at `admin_url` / `public_url`.
    pub fn new(
        admin_url: impl Into<String>,
        public_url: impl Into<String>,
        settings: &SessionSettings,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().build().map_err(ClientError::Setup)?;
        Ok(Self {
            http,
            admin_url: admin_url.into().trim_end_matches('/').to_string(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            request_timeout: settings.request_timeout,
        })
    }

    pub fn admin_url(&self) -> &str {
        &self.admin_url
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    // ------------------------------------------------------------------
    // Admin surface
    // ------------------------------------------------------------------

    /// `PUT /{db}/_user/{name}`
    pub async fn create_user(&self, db: &str, spec: &UserSpec) -> Result<(), ClientError> {
        let url = format!("{}/{db}/_user/{}", self.admin_url, spec.name);
        let builder = self.request(Method::PUT, &url, None).json(spec);
        self.send(Method::PUT, &url, builder).await?;
        Ok(())
    }

    /// `GET /{db}/_user/{name}`
    pub async fn get_user(&self, db: &str, name: &str) -> Result<PrincipalInfo, ClientError> {
        let url = format!("{}/{db}/_user/{name}", self.admin_url);
        self.get_json(&url, None).await
    }

    /// `PUT /{db}/_role/{name}`
    pub async fn create_role(&self, db: &str, spec: &RoleSpec) -> Result<(), ClientError> {
        let url = format!("{}/{db}/_role/{}", self.admin_url, spec.name);
        let builder = self.request(Method::PUT, &url, None).json(spec);
        self.send(Method::PUT, &url, builder).await?;
        Ok(())
    }

    /// `GET /{db}/_role/{name}`
    pub async fn get_role(&self, db: &str, name: &str) -> Result<PrincipalInfo, ClientError> {
        let url = format!("{}/{db}/_role/{name}", self.admin_url);
        self.get_json(&url, None).await
    }

    /// `GET /{db}/`
    pub async fn get_db_info(&self, db: &str) -> Result<Value, ClientError> {
        let url = format!("{}/{db}/", self.admin_url);
        self.get_json(&url, None).await
    }

    /// `GET /{db}/_user/`; the names of every registered user.
    pub async fn list_users(&self, db: &str) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/{db}/_user/", self.admin_url);
        self.get_json(&url, None).await
    }

    /// `GET /{db}/_role/`
    pub async fn list_roles(&self, db: &str) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/{db}/_role/", self.admin_url);
        self.get_json(&url, None).await
    }

    /// `POST /{db}/_offline`
    pub async fn take_db_offline(&self, db: &str) -> Result<u16, ClientError> {
        let url = format!("{}/{db}/_offline", self.admin_url);
        let builder = self.request(Method::POST, &url, None);
        let response = self.send(Method::POST, &url, builder).await?;
        Ok(response.status().as_u16())
    }

    /// `POST /{db}/_online`, optionally asking the server to wait `delay` first.
    pub async fn bring_db_online(&self, db: &str, delay: Option<Duration>) -> Result<u16, ClientError> {
        let url = format!("{}/{db}/_online", self.admin_url);
        let body = match delay {
            Some(delay) => json!({ "delay": delay.as_secs() }),
            None => json!({}),
        };
        let builder = self.request(Method::POST, &url, None).json(&body);
        let response = self.send(Method::POST, &url, builder).await?;
        Ok(response.status().as_u16())
    }

    /// `POST /{db}/_resync`
    pub async fn db_resync(&self, db: &str) -> Result<Value, ClientError> {
        let url = format!("{}/{db}/_resync", self.admin_url);
        let builder = self.request(Method::POST, &url, None);
        let response = self.send(Method::POST, &url, builder).await?;
        decode(&url, response).await
    }

    /// `GET /{db}/_config`
    pub async fn get_db_config(&self, db: &str) -> Result<Value, ClientError> {
        let url = format!("{}/{db}/_config", self.admin_url);
        self.get_json(&url, None).await
    }

    /// `PUT /{db}/_config`
    pub async fn put_db_config(&self, db: &str, config: &Value) -> Result<u16, ClientError> {
        let url = format!("{}/{db}/_config", self.admin_url);
        let builder = self.request(Method::PUT, &url, None).json(config);
        let response = self.send(Method::PUT, &url, builder).await?;
        Ok(response.status().as_u16())
    }

    // ------------------------------------------------------------------
    // Public surface
    // ------------------------------------------------------------------

    /// `GET /` on the public port; the body is the server banner.
    pub async fn server_info(&self) -> Result<String, ClientError> {
        let url = format!("{}/", self.public_url);
        let builder = self.request(Method::GET, &url, None);
        let response = self.send(Method::GET, &url, builder).await?;
        read_text(&url, response).await
    }

    /// `PUT /{db}/{doc_id}`, with `rev` as the expected current revision for updates.
    pub async fn put_doc(
        &self,
        db: &str,
        doc_id: &str,
        body: &Value,
        rev: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> Result<DocWriteResult, ClientError> {
        let url = format!("{}/{db}/{doc_id}", self.public_url);
        let mut builder = self.request(Method::PUT, &url, credentials).json(body);
        if let Some(rev) = rev {
            builder = builder.query(&[("rev", rev)]);
        }
        let response = self.send(Method::PUT, &url, builder).await?;
        decode(&url, response).await
    }

    /// `POST /{db}/`, letting the server generate the id.
    pub async fn post_doc(
        &self,
        db: &str,
        body: &Value,
        credentials: Option<&Credentials>,
    ) -> Result<DocWriteResult, ClientError> {
        let url = format!("{}/{db}/", self.public_url);
        let builder = self.request(Method::POST, &url, credentials).json(body);
        let response = self.send(Method::POST, &url, builder).await?;
        decode(&url, response).await
    }

    /// `POST /{db}/_bulk_docs`
    pub async fn bulk_docs(
        &self,
        db: &str,
        docs: &[Value],
        credentials: Option<&Credentials>,
    ) -> Result<Vec<BulkDocResult>, ClientError> {
        let url = format!("{}/{db}/_bulk_docs", self.public_url);
        let builder = self
            .request(Method::POST, &url, credentials)
            .json(&json!({ "docs": docs }));
        let response = self.send(Method::POST, &url, builder).await?;
        decode(&url, response).await
    }

    /// `GET /{db}/{doc_id}`
    pub async fn get_doc(
        &self,
        db: &str,
        doc_id: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Value, ClientError> {
        let url = format!("{}/{db}/{doc_id}", self.public_url);
        self.get_json(&url, credentials).await
    }

    /// `DELETE /{db}/{doc_id}?rev={rev}`
    pub async fn delete_doc(
        &self,
        db: &str,
        doc_id: &str,
        rev: &str,
        credentials: Option<&Credentials>,
    ) -> Result<DocWriteResult, ClientError> {
        let url = format!("{}/{db}/{doc_id}", self.public_url);
        let builder = self
            .request(Method::DELETE, &url, credentials)
            .query(&[("rev", rev)]);
        let response = self.send(Method::DELETE, &url, builder).await?;
        decode(&url, response).await
    }

    /// `GET /{db}/_all_docs`
    pub async fn all_docs(
        &self,
        db: &str,
        credentials: Option<&Credentials>,
    ) -> Result<AllDocsResponse, ClientError> {
        let url = format!("{}/{db}/_all_docs", self.public_url);
        self.get_json(&url, credentials).await
    }

    /// `POST /{db}/_bulk_get`
    ///
    /// The response is multipart; every part line that starts with `{` is a document.
    pub async fn bulk_get(
        &self,
        db: &str,
        doc_ids: &[String],
        credentials: Option<&Credentials>,
    ) -> Result<Vec<Value>, ClientError> {
        let url = format!("{}/{db}/_bulk_get", self.public_url);
        let docs: Vec<Value> = doc_ids.iter().map(|id| json!({ "id": id })).collect();
        let builder = self
            .request(Method::POST, &url, credentials)
            .json(&json!({ "docs": docs }));
        let response = self.send(Method::POST, &url, builder).await?;
        let text = read_text(&url, response).await?;

        text.lines()
            .filter(|line| line.starts_with('{'))
            .map(|line| {
                serde_json::from_str(line).map_err(|e| ClientError::Decode {
                    url: url.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// `GET /{db}/_changes` for one-shot and long-poll feeds.
    ///
    /// One-shot requests use the per-request timeout. Long-poll requests carry
    /// no client-side timeout: the server's `timeout` parameter bounds each round.
    pub async fn changes(
        &self,
        db: &str,
        query: &ChangesQuery,
        credentials: Option<&Credentials>,
    ) -> Result<RawChangesResponse, ClientError> {
        let url = format!("{}/{db}/_changes", self.public_url);
        let mut builder = self
            .http
            .get(&url)
            .query(&query.to_params());
        if let Some(credentials) = credentials {
            builder = builder.header(AUTHORIZATION, credentials.header_value());
        }
        if query.feed == FeedType::Normal {
            builder = builder.timeout(self.request_timeout);
        }
        let response = self.send(Method::GET, &url, builder).await?;
        decode(&url, response).await
    }

    /// Open `GET /{db}/_changes?feed=continuous` and return its line reader.
    pub async fn changes_stream(
        &self,
        db: &str,
        query: &ChangesQuery,
        credentials: Option<&Credentials>,
    ) -> Result<ChangesLines, ClientError> {
        let url = format!("{}/{db}/_changes", self.public_url);
        let query = ChangesQuery {
            feed: FeedType::Continuous,
            ..query.clone()
        };
        let mut builder = self.http.get(&url).query(&query.to_params());
        if let Some(credentials) = credentials {
            builder = builder.header(AUTHORIZATION, credentials.header_value());
        }
        let response = self.send(Method::GET, &url, builder).await?;
        Ok(ChangesLines::new(url, response))
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn request(&self, method: Method, url: &str, credentials: Option<&Credentials>) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.request_timeout);
        if let Some(credentials) = credentials {
            builder = builder.header(AUTHORIZATION, credentials.header_value());
        }
        builder
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<T, ClientError> {
        let builder = self.request(Method::GET, url, credentials);
        let response = self.send(Method::GET, url, builder).await?;
        decode(url, response).await
    }

    /// Send and classify the status. Non-2xx responses are drained into the error.
    async fn send(
        &self,
        method: Method,
        url: &str,
        builder: RequestBuilder,
    ) -> Result<Response, ClientError> {
        let response = builder.send().await.map_err(|source| ClientError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        debug!("{method} {url} -> {status}");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(ClientError::ServerUnavailable {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            })
        } else {
            Err(ClientError::RequestRejected {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }
}

async fn read_text(url: &str, response: Response) -> Result<String, ClientError> {
    response
        .text()
        .await
        .map_err(|e| ClientError::StreamInterrupted {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ClientError> {
    let text = read_text(url, response).await?;
    serde_json::from_str(&text).map_err(|e| ClientError::Decode {
        url: url.to_string(),
        reason: format!("{e} in body: {}", truncate(&text, 256)),
    })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
