//! `_changes` feed entries and their mode-aware parsing.

use crate::mode::ClusterMode;
use crate::revision::is_principal_doc;
use crate::sequence::{SequenceError, SequenceToken};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised while turning a raw feed into typed entries.
#[derive(Error, Debug)]
pub enum FeedParseError {
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("Malformed changes line: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Changes entry for '{doc_id}' carries no revision")]
    MissingRevision { doc_id: String },
}

/// Revision reference inside a raw changes entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRevision {
    pub rev: String,
}

/// A changes entry exactly as the server sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChangesEntry {
    pub id: String,
    pub seq: Value,
    #[serde(default)]
    pub changes: Vec<RawRevision>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

/// A one-shot or long-poll response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChangesResponse {
    pub results: Vec<RawChangesEntry>,
    pub last_seq: Value,
}

/// A parsed changes entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangesEntry {
    pub id: String,
    pub seq: SequenceToken,
    pub rev: String,
    pub deleted: bool,
    /// Present when the feed was requested with `include_docs`.
    pub doc: Option<Value>,
}

impl ChangesEntry {
    pub fn from_raw(raw: RawChangesEntry, mode: ClusterMode) -> Result<Self, FeedParseError> {
        let seq = SequenceToken::from_json(&raw.seq, mode)?;
        let rev = match raw.changes.first() {
            Some(change) => change.rev.clone(),
            None => raw
                .doc
                .as_ref()
                .and_then(|doc| doc.get("_rev"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| is_principal_doc(&raw.id).then(String::new))
                .ok_or_else(|| FeedParseError::MissingRevision {
                    doc_id: raw.id.clone(),
                })?,
        };
        Ok(Self {
            id: raw.id,
            seq,
            rev,
            deleted: raw.deleted,
            doc: raw.doc,
        })
    }

    pub fn is_principal(&self) -> bool {
        is_principal_doc(&self.id)
    }
}

/// Enforce the distributed-index ordering rule on the entries of one feed read:
/// every entry except the last must carry a compound token.
pub fn check_compound_ordering(entries: &[ChangesEntry]) -> Result<(), SequenceError> {
    let total = entries.len();
    for (position, entry) in entries.iter().enumerate() {
        if position + 1 < total && !entry.seq.is_compound() {
            return Err(SequenceError::PlainBeforeLast {
                doc_id: entry.id.clone(),
                token: entry.seq.to_string(),
                position,
                total,
            });
        }
    }
    Ok(())
}

/// The parsed result of a single feed read.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangesFeed {
    pub entries: Vec<ChangesEntry>,
    pub last_seq: SequenceToken,
}

impl ChangesFeed {
    /// Parse a raw response, rejecting tokens that do not match `mode`.
    pub fn from_raw(raw: RawChangesResponse, mode: ClusterMode) -> Result<Self, FeedParseError> {
        let last_seq = SequenceToken::from_json(&raw.last_seq, mode)?;
        let entries = raw
            .results
            .into_iter()
            .map(|entry| ChangesEntry::from_raw(entry, mode))
            .collect::<Result<Vec<_>, _>>()?;

        if mode.is_distributed_index() {
            check_compound_ordering(&entries)?;
        }

        Ok(Self { entries, last_seq })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries that are not server-generated principal documents.
    pub fn document_entries(&self) -> impl Iterator<Item = &ChangesEntry> {
        self.entries.iter().filter(|entry| !entry.is_principal())
    }

    /// Distinct non-principal document ids in the feed.
    pub fn distinct_doc_ids(&self) -> HashSet<&str> {
        self.document_entries().map(|e| e.id.as_str()).collect()
    }

    /// Document ids that appear as more than one entry, in feed order.
    pub fn duplicate_doc_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for entry in self.document_entries() {
            if !seen.insert(entry.id.as_str()) && !duplicates.contains(&entry.id) {
                duplicates.push(entry.id.clone());
            }
        }
        duplicates
    }

    /// Latest revision per non-principal document id (last entry wins).
    pub fn latest_revisions(&self) -> HashMap<&str, &str> {
        self.document_entries()
            .map(|e| (e.id.as_str(), e.rev.as_str()))
            .collect()
    }
}

/// One line of a continuous feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangesLine {
    Entry(ChangesEntry),
    /// The trailing `{"last_seq": ...}` object a server sends before closing.
    LastSeq(SequenceToken),
    /// Blank keep-alive line.
    Heartbeat,
}

impl ChangesLine {
    pub fn parse(line: &str, mode: ClusterMode) -> Result<Self, FeedParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Heartbeat);
        }

        let value: Value = serde_json::from_str(line)?;
        if value.get("id").is_none() {
            if let Some(last_seq) = value.get("last_seq") {
                return Ok(Self::LastSeq(SequenceToken::from_json(last_seq, mode)?));
            }
        }

        let raw: RawChangesEntry = serde_json::from_value(value)?;
        Ok(Self::Entry(ChangesEntry::from_raw(raw, mode)?))
    }
}
