//! A principal's local record of the documents it has written.

use serde_json::Value;
use std::collections::HashMap;

/// Local state of one document.
///
/// `history` holds every revision id returned by a successful mutation,
/// oldest first, and is never empty; the current revision is its last element.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDocument {
    body: Value,
    history: Vec<String>,
}

impl CachedDocument {
    pub fn new(body: Value, rev: impl Into<String>) -> Self {
        Self {
            body,
            history: vec![rev.into()],
        }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn current_rev(&self) -> &str {
        self.history.last().map(String::as_str).unwrap_or_default()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Number of successful mutations recorded for this document.
    pub fn mutation_count(&self) -> usize {
        self.history.len()
    }

    fn push_revision(&mut self, rev: String, body: Option<Value>) {
        if let Some(body) = body {
            self.body = body;
        }
        self.history.push(rev);
    }
}

/// Document id → [`CachedDocument`] for a single principal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentCache {
    docs: HashMap<String, CachedDocument>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the first successful write of `doc_id`.
    ///
    /// A later insert of the same id (for example re-adding a deleted document)
    /// extends the existing history rather than replacing it.
    pub fn record_insert(&mut self, doc_id: impl Into<String>, body: Value, rev: impl Into<String>) {
        let doc_id = doc_id.into();
        let rev = rev.into();
        match self.docs.get_mut(&doc_id) {
            Some(existing) => existing.push_revision(rev, Some(body)),
            None => {
                self.docs.insert(doc_id, CachedDocument::new(body, rev));
            }
        }
    }

    /// Append a revision produced by an update or delete.
    ///
    /// Returns `false` when `doc_id` was never inserted through this cache.
    pub fn record_revision(&mut self, doc_id: &str, rev: impl Into<String>, body: Option<Value>) -> bool {
        match self.docs.get_mut(doc_id) {
            Some(doc) => {
                doc.push_revision(rev.into(), body);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, doc_id: &str) -> Option<&CachedDocument> {
        self.docs.get(doc_id)
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.docs.contains_key(doc_id)
    }

    pub fn current_rev(&self, doc_id: &str) -> Option<&str> {
        self.docs.get(doc_id).map(CachedDocument::current_rev)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Document ids sorted, so callers iterate in a stable order.
    pub fn doc_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.docs.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CachedDocument)> {
        self.docs.iter()
    }

    /// Current revision per document id.
    pub fn latest_revisions(&self) -> HashMap<&str, &str> {
        self.docs
            .iter()
            .map(|(id, doc)| (id.as_str(), doc.current_rev()))
            .collect()
    }

    /// Union of several caches, used when the expected document set spans
    /// more than one writer. Later caches win on id collisions.
    pub fn merged<'a>(caches: impl IntoIterator<Item = &'a DocumentCache>) -> Self {
        let mut merged = Self::new();
        for cache in caches {
            for (id, doc) in &cache.docs {
                merged.docs.insert(id.clone(), doc.clone());
            }
        }
        merged
    }
}
