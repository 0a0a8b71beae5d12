//! In-process fake gateway for integration tests.
//!
//! Serves the admin and public REST surfaces on two ephemeral ports sharing
//! one in-memory state. Channel visibility, role inheritance, revision
//! preconditions and both sequence-token shapes behave like a real gateway;
//! persistence, sync functions and replication do not exist.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use sync_testkit::config::SessionSettings;
use sync_testkit::principal::GatewaySession;
use sync_testkit::types::ClusterMode;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

pub const DB: &str = "db";
const DI_HASH: &str = "1a2b";
const BANNER: &str = r#"{"couchdb":"Welcome","vendor":{"name":"Fake Sync Gateway","version":"0.1"}}"#;

struct StoredDoc {
    rev: String,
    generation: u64,
    seq: u64,
    body: Value,
    channels: Vec<String>,
    deleted: bool,
}

struct StoredUser {
    password: String,
    admin_channels: Vec<String>,
    admin_roles: Vec<String>,
    seq: u64,
}

#[derive(Default)]
struct GatewayState {
    last_seq: u64,
    docs: HashMap<String, StoredDoc>,
    local_docs: HashMap<String, Value>,
    users: BTreeMap<String, StoredUser>,
    roles: BTreeMap<String, Vec<String>>,
    unavailable: bool,
    offline: bool,
    config: Value,
    feeds_closed: bool,
}

type Rejection = (StatusCode, String);

impl GatewayState {
    fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }

    fn all_channels(&self, user: &str) -> BTreeSet<String> {
        let Some(stored) = self.users.get(user) else {
            return BTreeSet::new();
        };
        let mut channels: BTreeSet<String> = stored.admin_channels.iter().cloned().collect();
        for role in &stored.admin_roles {
            if let Some(role_channels) = self.roles.get(role) {
                channels.extend(role_channels.iter().cloned());
            }
        }
        channels
    }

    fn can_see(&self, channels: &BTreeSet<String>, doc: &StoredDoc) -> bool {
        channels.contains("*") || doc.channels.iter().any(|c| channels.contains(c))
    }

    fn write_doc(&mut self, doc_id: &str, mut body: Value, rev: Option<&str>) -> Result<String, Rejection> {
        let generation = match (self.docs.get(doc_id), rev) {
            (Some(doc), Some(rev)) if doc.rev != rev => {
                return Err((StatusCode::CONFLICT, format!("{doc_id} is at {}, not {rev}", doc.rev)))
            }
            (Some(doc), None) if !doc.deleted => {
                return Err((StatusCode::CONFLICT, format!("{doc_id} already exists")))
            }
            (None, Some(rev)) => {
                return Err((StatusCode::CONFLICT, format!("{doc_id} has no revision {rev}")))
            }
            (Some(doc), _) => doc.generation + 1,
            (None, None) => 1,
        };

        let deleted = body.get("_deleted").and_then(Value::as_bool).unwrap_or(false);
        if let Some(fields) = body.as_object_mut() {
            fields.retain(|key, _| !key.starts_with('_'));
        }
        let channels = match body.get("channels") {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        let seq = self.next_seq();
        let rev = format!("{generation}-r{seq}");
        self.docs.insert(
            doc_id.to_string(),
            StoredDoc {
                rev: rev.clone(),
                generation,
                seq,
                body,
                channels,
                deleted,
            },
        );
        Ok(rev)
    }

    /// Entries with `seq > since` visible to `user`, in sequence order.
    fn changes(
        &self,
        user: &str,
        since: u64,
        include_docs: bool,
        limit: Option<usize>,
        filter_channels: Option<&BTreeSet<String>>,
    ) -> Vec<(u64, Value)> {
        let granted = self.all_channels(user);
        let mut entries: Vec<(u64, Value)> = self
            .docs
            .iter()
            .filter(|(_, doc)| doc.seq > since && self.can_see(&granted, doc))
            .filter(|(_, doc)| {
                filter_channels.map_or(true, |wanted| doc.channels.iter().any(|c| wanted.contains(c)))
            })
            .map(|(id, doc)| {
                let mut entry = json!({"id": id, "changes": [{"rev": doc.rev}]});
                if doc.deleted {
                    entry["deleted"] = json!(true);
                }
                if include_docs {
                    let mut body = doc.body.clone();
                    body["_id"] = json!(id);
                    body["_rev"] = json!(doc.rev);
                    if doc.deleted {
                        body["_deleted"] = json!(true);
                    }
                    entry["doc"] = body;
                }
                (doc.seq, entry)
            })
            .collect();

        if let Some(stored) = self.users.get(user) {
            if stored.seq > since && filter_channels.is_none() {
                entries.push((stored.seq, json!({"id": format!("_user/{user}"), "changes": []})));
            }
        }
        entries.sort_by_key(|(seq, _)| *seq);
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        entries
    }

    fn principal_info(&self, name: &str) -> Option<Value> {
        let stored = self.users.get(name)?;
        let mut all_channels = self.all_channels(name);
        all_channels.insert("!".to_string());
        Some(json!({
            "name": name,
            "admin_channels": stored.admin_channels,
            "all_channels": all_channels,
            "admin_roles": stored.admin_roles,
            "roles": stored.admin_roles,
        }))
    }
}

struct Shared {
    mode: ClusterMode,
    state: Mutex<GatewayState>,
    changed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap()
    }

    /// Sequence values of one feed read, in the mode's shapes.
    ///
    /// Distributed index: every entry but the last carries a compound token.
    fn stamp(&self, entries: Vec<(u64, Value)>, last_plain: bool) -> Vec<Value> {
        let total = entries.len();
        entries
            .into_iter()
            .enumerate()
            .map(|(position, (seq, mut entry))| {
                let compound = self.mode == ClusterMode::DistributedIndex
                    && !(last_plain && position + 1 == total);
                entry["seq"] = if compound {
                    json!(format!("{DI_HASH}::{seq}"))
                } else {
                    json!(seq)
                };
                entry
            })
            .collect()
    }
}

/// A running fake gateway. Dropping it stops both listeners.
pub struct FakeGateway {
    pub admin_url: String,
    pub public_url: String,
    shared: Arc<Shared>,
    servers: Vec<JoinHandle<()>>,
}

impl FakeGateway {
    pub async fn start(mode: ClusterMode) -> Self {
        let shared = Arc::new(Shared {
            mode,
            state: Mutex::new(GatewayState::default()),
            changed: Notify::new(),
        });

        let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let public_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let admin_url = format!("http://{}", admin_listener.local_addr().unwrap());
        let public_url = format!("http://{}", public_listener.local_addr().unwrap());

        let admin_app = Router::new().fallback(admin_handler).with_state(shared.clone());
        let public_app = Router::new().fallback(public_handler).with_state(shared.clone());
        let servers = vec![
            tokio::spawn(async move {
                axum::serve(admin_listener, admin_app).await.unwrap();
            }),
            tokio::spawn(async move {
                axum::serve(public_listener, public_app).await.unwrap();
            }),
        ];

        Self {
            admin_url,
            public_url,
            shared,
            servers,
        }
    }

    pub fn mode(&self) -> ClusterMode {
        self.shared.mode
    }

    pub fn settings() -> SessionSettings {
        SessionSettings::default()
            .with_request_timeout(Duration::from_secs(10))
            .with_max_workers(20)
            .with_longpoll_timeout(Duration::from_millis(300))
            .with_poll_interval(Duration::from_millis(10))
    }

    pub fn session(&self) -> GatewaySession {
        GatewaySession::connect(&self.admin_url, &self.public_url, self.mode(), Self::settings()).unwrap()
    }

    /// Answer every public request other than `GET /` with 503 while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.lock().unavailable = unavailable;
        self.shared.changed.notify_waiters();
    }

    /// End every open continuous feed with a `last_seq` line.
    pub fn close_feeds(&self) {
        self.shared.lock().feeds_closed = true;
        self.shared.changed.notify_waiters();
    }

    /// Write a new revision behind the client's back.
    pub fn bump_revision(&self, doc_id: &str) -> String {
        let rev = {
            let mut state = self.shared.lock();
            let (body, rev) = {
                let doc = state.docs.get(doc_id).unwrap();
                (doc.body.clone(), doc.rev.clone())
            };
            state.write_doc(doc_id, body, Some(&rev)).unwrap()
        };
        self.shared.changed.notify_waiters();
        rev
    }

    pub fn is_offline(&self) -> bool {
        self.shared.lock().offline
    }

    pub fn doc_count(&self) -> usize {
        self.shared.lock().docs.len()
    }

    pub fn current_rev(&self, doc_id: &str) -> Option<String> {
        self.shared.lock().docs.get(doc_id).map(|doc| doc.rev.clone())
    }
}

impl Drop for FakeGateway {
    fn drop(&mut self) {
        for server in &self.servers {
            server.abort();
        }
    }
}

fn reject(status: StatusCode, reason: impl Into<String>) -> Response {
    let reason = reason.into();
    (
        status,
        Json(json!({"error": status.canonical_reason().unwrap_or("error"), "reason": reason})),
    )
        .into_response()
}

fn parse_body(body: &Bytes) -> Result<Value, Response> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| reject(StatusCode::BAD_REQUEST, e.to_string()))
}

/// Split `/{db}/{rest}`; `rest` keeps its slashes.
fn split_path(uri: &Uri) -> Result<String, Response> {
    let path = uri.path().trim_start_matches('/');
    let (db, rest) = path.split_once('/').unwrap_or((path, ""));
    if db != DB {
        return Err(reject(StatusCode::NOT_FOUND, format!("no database '{db}'")));
    }
    Ok(rest.to_string())
}

fn parse_since(since: &str) -> u64 {
    since
        .rsplit("::")
        .next()
        .and_then(|seq| seq.parse().ok())
        .unwrap_or(0)
}

async fn admin_handler(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    if uri.path() == "/" {
        return (StatusCode::OK, BANNER).into_response();
    }
    let rest = match split_path(&uri) {
        Ok(rest) => rest,
        Err(response) => return response,
    };
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    let response = {
        let mut state = shared.lock();
        match (&method, rest.split_once('/')) {
            (&Method::GET, None) if rest.is_empty() => Json(json!({
                "db_name": DB,
                "update_seq": state.last_seq,
                "doc_count": state.docs.values().filter(|d| !d.deleted).count(),
                "state": if state.offline { "Offline" } else { "Online" },
            }))
            .into_response(),
            (&Method::POST, None) if rest == "_offline" => {
                state.offline = true;
                StatusCode::OK.into_response()
            }
            (&Method::POST, None) if rest == "_online" => {
                let delay = body["delay"].as_u64().unwrap_or(0);
                if delay == 0 {
                    state.offline = false;
                } else {
                    let shared = shared.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_secs(delay)).await;
                        shared.lock().offline = false;
                        shared.changed.notify_waiters();
                    });
                }
                StatusCode::OK.into_response()
            }
            (&Method::POST, None) if rest == "_resync" => {
                if state.offline {
                    Json(json!({"changes": state.docs.len()})).into_response()
                } else {
                    reject(StatusCode::SERVICE_UNAVAILABLE, "resync needs the database offline")
                }
            }
            (&Method::GET, None) if rest == "_config" => {
                let mut config = state.config.clone();
                if !config.is_object() {
                    config = json!({});
                }
                config["name"] = json!(DB);
                Json(config).into_response()
            }
            (&Method::PUT, None) if rest == "_config" => {
                state.config = body;
                StatusCode::CREATED.into_response()
            }
            (&Method::GET, Some(("_user", ""))) => Json(state.users.keys().collect::<Vec<_>>()).into_response(),
            (&Method::GET, Some(("_role", ""))) => Json(state.roles.keys().collect::<Vec<_>>()).into_response(),
            (&Method::PUT, Some(("_user", name))) => {
                let admin_channels = strings(&body["admin_channels"]);
                let admin_roles = strings(&body["admin_roles"]);
                let password = body["password"].as_str().map(str::to_string);
                let seq = state.next_seq();
                match state.users.get_mut(name) {
                    Some(existing) => {
                        if let Some(password) = password {
                            existing.password = password;
                        }
                        existing.admin_channels = admin_channels;
                        existing.admin_roles = admin_roles;
                        existing.seq = seq;
                    }
                    None => {
                        let Some(password) = password else {
                            return reject(StatusCode::BAD_REQUEST, "new users need a password");
                        };
                        state.users.insert(
                            name.to_string(),
                            StoredUser {
                                password,
                                admin_channels,
                                admin_roles,
                                seq,
                            },
                        );
                    }
                }
                StatusCode::CREATED.into_response()
            }
            (&Method::GET, Some(("_user", name))) => match state.principal_info(name) {
                Some(info) => Json(info).into_response(),
                None => reject(StatusCode::NOT_FOUND, format!("no user '{name}'")),
            },
            (&Method::PUT, Some(("_role", name))) => {
                state
                    .roles
                    .insert(name.to_string(), strings(&body["admin_channels"]));
                StatusCode::CREATED.into_response()
            }
            (&Method::GET, Some(("_role", name))) => match state.roles.get(name) {
                Some(channels) => Json(json!({
                    "name": name,
                    "admin_channels": channels,
                    "all_channels": channels,
                }))
                .into_response(),
                None => reject(StatusCode::NOT_FOUND, format!("no role '{name}'")),
            },
            _ => reject(StatusCode::METHOD_NOT_ALLOWED, format!("{method} {}", uri.path())),
        }
    };
    shared.changed.notify_waiters();
    response
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|values| values.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Name of the user the basic-auth header authenticates, if any.
fn authenticate(state: &GatewayState, headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(token).ok()?).ok()?;
    let (name, password) = decoded.split_once(':')?;
    let user = state.users.get(name)?;
    (user.password == password).then(|| name.to_string())
}

async fn public_handler(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if uri.path() == "/" {
        return (StatusCode::OK, BANNER).into_response();
    }
    let rest = match split_path(&uri) {
        Ok(rest) => rest,
        Err(response) => return response,
    };
    let user = {
        let state = shared.lock();
        if state.unavailable {
            return reject(StatusCode::SERVICE_UNAVAILABLE, "gateway is going down");
        }
        if state.offline {
            return reject(StatusCode::SERVICE_UNAVAILABLE, "database is offline");
        }
        match authenticate(&state, &headers) {
            Some(user) => user,
            None => return reject(StatusCode::UNAUTHORIZED, "login required"),
        }
    };
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match (&method, rest.as_str()) {
        (&Method::GET, "_changes") => changes(shared, user, params).await,
        (&Method::GET, "_all_docs") => all_docs(&shared, &user),
        (&Method::POST, "_bulk_get") => bulk_get(&shared, &user, &body),
        (&Method::POST, "_bulk_docs") => {
            let results: Vec<Value> = {
                let mut state = shared.lock();
                let docs = body["docs"].as_array().cloned().unwrap_or_default();
                docs.into_iter()
                    .map(|doc| {
                        let doc_id = doc["_id"].as_str().unwrap_or_default().to_string();
                        let rev = doc["_rev"].as_str().map(str::to_string);
                        match state.write_doc(&doc_id, doc, rev.as_deref()) {
                            Ok(rev) => json!({"id": doc_id, "rev": rev}),
                            Err((status, reason)) => json!({
                                "id": doc_id,
                                "error": "conflict",
                                "reason": reason,
                                "status": status.as_u16(),
                            }),
                        }
                    })
                    .collect()
            };
            shared.changed.notify_waiters();
            (StatusCode::CREATED, Json(results)).into_response()
        }
        (&Method::POST, "") => {
            let written = {
                let mut state = shared.lock();
                let doc_id = format!("gen-{}", state.last_seq + 1);
                state.write_doc(&doc_id, body, None).map(|rev| (doc_id, rev))
            };
            shared.changed.notify_waiters();
            match written {
                Ok((id, rev)) => (StatusCode::CREATED, Json(json!({"id": id, "rev": rev, "ok": true}))).into_response(),
                Err((status, reason)) => reject(status, reason),
            }
        }
        (&Method::PUT, doc_id) if doc_id.starts_with("_local/") => {
            shared.lock().local_docs.insert(doc_id.to_string(), body);
            (StatusCode::CREATED, Json(json!({"id": doc_id, "rev": "0-1", "ok": true}))).into_response()
        }
        (&Method::PUT, doc_id) => {
            let written = shared
                .lock()
                .write_doc(doc_id, body, params.get("rev").map(String::as_str));
            shared.changed.notify_waiters();
            match written {
                Ok(rev) => (StatusCode::CREATED, Json(json!({"id": doc_id, "rev": rev, "ok": true}))).into_response(),
                Err((status, reason)) => reject(status, reason),
            }
        }
        (&Method::DELETE, doc_id) => {
            let Some(rev) = params.get("rev") else {
                return reject(StatusCode::CONFLICT, "rev is required");
            };
            let written = shared
                .lock()
                .write_doc(doc_id, json!({"_deleted": true}), Some(rev));
            shared.changed.notify_waiters();
            match written {
                Ok(rev) => Json(json!({"id": doc_id, "rev": rev, "ok": true})).into_response(),
                Err((status, reason)) => reject(status, reason),
            }
        }
        (&Method::GET, doc_id) => get_doc(&shared, &user, doc_id),
        _ => reject(StatusCode::METHOD_NOT_ALLOWED, format!("{method} {}", uri.path())),
    }
}

fn get_doc(shared: &Shared, user: &str, doc_id: &str) -> Response {
    let state = shared.lock();
    if let Some(local) = state.local_docs.get(doc_id) {
        return Json(local.clone()).into_response();
    }
    let granted = state.all_channels(user);
    match state.docs.get(doc_id) {
        Some(doc) if doc.deleted => reject(StatusCode::NOT_FOUND, "deleted"),
        Some(doc) if !state.can_see(&granted, doc) => reject(StatusCode::FORBIDDEN, "no access"),
        Some(doc) => {
            let mut body = doc.body.clone();
            body["_id"] = json!(doc_id);
            body["_rev"] = json!(doc.rev);
            Json(body).into_response()
        }
        None => reject(StatusCode::NOT_FOUND, "missing"),
    }
}

fn all_docs(shared: &Shared, user: &str) -> Response {
    let state = shared.lock();
    let granted = state.all_channels(user);
    let mut rows: Vec<(&String, &StoredDoc)> = state
        .docs
        .iter()
        .filter(|(_, doc)| !doc.deleted && state.can_see(&granted, doc))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    let rows: Vec<Value> = rows
        .into_iter()
        .map(|(id, doc)| json!({"id": id, "key": id, "value": {"rev": doc.rev}}))
        .collect();
    Json(json!({"total_rows": rows.len(), "rows": rows})).into_response()
}

fn bulk_get(shared: &Shared, user: &str, body: &Value) -> Response {
    let state = shared.lock();
    let granted = state.all_channels(user);
    let mut parts = String::new();
    for requested in body["docs"].as_array().cloned().unwrap_or_default() {
        let Some(doc_id) = requested["id"].as_str() else {
            continue;
        };
        let Some(doc) = state.docs.get(doc_id) else {
            continue;
        };
        if doc.deleted || !state.can_see(&granted, doc) {
            continue;
        }
        let mut body = doc.body.clone();
        body["_id"] = json!(doc_id);
        body["_rev"] = json!(doc.rev);
        parts.push_str("--fake-boundary\r\nContent-Type: application/json\r\n\r\n");
        parts.push_str(&body.to_string());
        parts.push_str("\r\n");
    }
    parts.push_str("--fake-boundary--\r\n");
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "multipart/mixed; boundary=fake-boundary")],
        parts,
    )
        .into_response()
}

async fn changes(shared: Arc<Shared>, user: String, params: HashMap<String, String>) -> Response {
    let since = params.get("since").map(|s| parse_since(s)).unwrap_or(0);
    let include_docs = params.get("include_docs").is_some_and(|v| v == "true");
    let limit = params.get("limit").and_then(|l| l.parse().ok());
    let filter: Option<BTreeSet<String>> = match params.get("filter").map(String::as_str) {
        Some("sync_gateway/bychannel") => Some(
            params
                .get("channels")
                .map(|c| c.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        ),
        _ => None,
    };

    match params.get("feed").map(String::as_str).unwrap_or("normal") {
        "continuous" => continuous(shared, user, since, include_docs, filter),
        "longpoll" => {
            let timeout = params
                .get("timeout")
                .and_then(|t| t.parse().ok())
                .unwrap_or(300_000);
            let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout);
            loop {
                let notified = shared.changed.notified();
                let entries = {
                    let state = shared.lock();
                    if state.unavailable || state.offline {
                        return reject(StatusCode::SERVICE_UNAVAILABLE, "gateway is going down");
                    }
                    state.changes(&user, since, include_docs, limit, filter.as_ref())
                };
                if !entries.is_empty() {
                    return feed_response(&shared, entries, since);
                }
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return feed_response(&shared, Vec::new(), since);
                }
            }
        }
        _ => {
            let entries = shared
                .lock()
                .changes(&user, since, include_docs, limit, filter.as_ref());
            feed_response(&shared, entries, since)
        }
    }
}

fn feed_response(shared: &Shared, entries: Vec<(u64, Value)>, since: u64) -> Response {
    let last_seq = entries.last().map(|(seq, _)| *seq).unwrap_or(since);
    let results = shared.stamp(entries, true);
    Json(json!({"results": results, "last_seq": last_seq})).into_response()
}

fn continuous(
    shared: Arc<Shared>,
    user: String,
    mut since: u64,
    include_docs: bool,
    filter: Option<BTreeSet<String>>,
) -> Response {
    let (tx, rx) = mpsc::channel::<Result<String, Infallible>>(64);
    tokio::spawn(async move {
        loop {
            let notified = shared.changed.notified();
            let (entries, closed) = {
                let state = shared.lock();
                (
                    state.changes(&user, since, include_docs, None, filter.as_ref()),
                    state.feeds_closed,
                )
            };
            if let Some((seq, _)) = entries.last() {
                since = *seq;
            }
            for entry in shared.stamp(entries, false) {
                if tx.send(Ok(format!("{entry}\n"))).await.is_err() {
                    return;
                }
            }
            if closed {
                let _ = tx.send(Ok(format!("{}\n", json!({"last_seq": since})))).await;
                return;
            }
            tokio::select! {
                _ = notified => {}
                _ = tx.closed() => return,
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    if tx.send(Ok("\n".to_string())).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap()
}
