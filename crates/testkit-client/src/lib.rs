//! Typed HTTP session over the sync gateway REST surfaces.
//!
//! [`GatewayClient`] wraps one `reqwest::Client` and exposes:
//!
//! - admin operations (no credentials): create/get user, create/get role, db info
//! - public operations (basic auth per call): document insert/update/delete,
//!   bulk insert, bulk get, all-docs, and the `_changes` feed in its
//!   one-shot, long-poll and continuous forms
//!
//! Every call maps the HTTP status to a typed result: 2xx parses the body,
//! 4xx becomes [`ClientError::RequestRejected`], 5xx becomes
//! [`ClientError::ServerUnavailable`] and a missing response becomes
//! [`ClientError::Transport`]. Nothing is retried here.

mod auth;
mod client;
mod error;
mod stream;
mod types;

pub use auth::Credentials;
pub use client::GatewayClient;
pub use error::ClientError;
pub use stream::ChangesLines;
pub use types::{
    AllDocsResponse, AllDocsRow, BulkDocResult, ChangesQuery, DocWriteResult, FeedType,
    PrincipalInfo, RoleSpec, RowValue, UserSpec,
};
