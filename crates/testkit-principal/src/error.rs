//! Error types for principals, mutation and tracking.

use crate::tracker::TrackedChanges;
use testkit_client::ClientError;
use testkit_types::{FeedParseError, SequenceError};
use thiserror::Error;

/// Errors raised by [`crate::Admin`], [`crate::User`] and the task helpers.
#[derive(Error, Debug)]
pub enum TestkitError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Feed(#[from] FeedParseError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("Failed to register '{name}': {reason}")]
    Registration { name: String, reason: String },

    /// Some registrations of a bulk request failed. Users already created stay.
    #[error(
        "Bulk registration failed for {} of {requested} users: {}",
        .failures.len(),
        failed_names(.failures)
    )]
    BulkRegistration {
        requested: usize,
        registered: Vec<String>,
        failures: Vec<(String, TestkitError)>,
    },

    /// The server refused a revision update because `expected_rev` was not current.
    #[error("Conflict updating '{doc_id}': expected current revision {expected_rev}")]
    Conflict { doc_id: String, expected_rev: String },

    #[error("Document '{doc_id}' rejected: {reason}")]
    DocumentRejected { doc_id: String, reason: String },

    #[error("All {attempted} insertions failed; first error: {}", first_error(.errors))]
    AllInsertionsFailed {
        attempted: usize,
        errors: Vec<(String, TestkitError)>,
    },

    #[error("Updates failed for {} documents: {}", .failures.len(), failed_names(.failures))]
    UpdateFailed { failures: Vec<(String, TestkitError)> },

    /// A tracking session lost its connection; `partial` holds what was observed.
    #[error(
        "Changes tracking for '{user}' interrupted after {} documents (last_seq {}): {source}",
        .partial.docs.len(),
        .partial.last_seq
    )]
    TrackingInterrupted {
        user: String,
        partial: Box<TrackedChanges>,
        #[source]
        source: Box<TestkitError>,
    },

    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task failed: {0}")]
    Task(String),
}

impl TestkitError {
    /// True for a conflict, or an aggregate that contains one.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::UpdateFailed { failures } => failures.iter().any(|(_, e)| e.is_conflict()),
            _ => false,
        }
    }

    /// Server unavailable (5xx) or unreachable.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Client(e) => e.is_unavailable(),
            Self::TrackingInterrupted { source, .. } => source.is_unavailable(),
            _ => false,
        }
    }
}

fn failed_names(failures: &[(String, TestkitError)]) -> String {
    failures
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn first_error(errors: &[(String, TestkitError)]) -> String {
    match errors.first() {
        Some((id, e)) => format!("{id}: {e}"),
        None => "none recorded".to_string(),
    }
}
