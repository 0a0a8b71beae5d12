//! Document mutation engine: inserts, revision updates and deletes.
//!
//! Every successful write is recorded in the user's [`DocumentCache`] so the
//! history of each document always has one entry per successful mutation.
//! Failed writes are never recorded.
//!
//! [`DocumentCache`]: testkit_types::DocumentCache

use crate::error::TestkitError;
use crate::user::User;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use testkit_client::{ClientError, Credentials, GatewayClient};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Prefix of documents that are never replicated and never appear in feeds.
pub const LOCAL_DOC_PREFIX: &str = "_local/";

/// Per-document outcome of a chain of revision updates.
struct RevisionChain {
    doc_id: String,
    revisions: Vec<(String, Value)>,
    failure: Option<TestkitError>,
}

impl User {
    /// Insert `count` documents.
    ///
    /// Ids are `{name_prefix}{index}` when a prefix is given, otherwise random
    /// UUIDs. With `bulk` the documents go out in one `_bulk_docs` call,
    /// otherwise as concurrent single PUTs bounded by the worker pool size.
    ///
    /// Returns the `(doc_id, error)` pairs of failed insertions. Fails only
    /// when every insertion failed.
    pub async fn add_docs(
        &mut self,
        count: usize,
        name_prefix: Option<&str>,
        bulk: bool,
    ) -> Result<Vec<(String, TestkitError)>, TestkitError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let doc_ids: Vec<String> = match name_prefix {
            Some(prefix) => (0..count).map(|i| format!("{prefix}{i}")).collect(),
            None => (0..count).map(|_| Uuid::new_v4().to_string()).collect(),
        };

        info!("{} adding {count} docs (bulk: {bulk})", self.name());
        let (inserted, errors) = if bulk {
            self.insert_bulk(doc_ids).await
        } else {
            self.insert_each(doc_ids).await
        };

        if inserted == 0 {
            error!("{}: all {count} insertions failed", self.name());
            return Err(TestkitError::AllInsertionsFailed {
                attempted: count,
                errors,
            });
        }
        if !errors.is_empty() {
            warn!("{}: {} of {count} insertions failed", self.name(), errors.len());
        }
        Ok(errors)
    }

    async fn insert_each(&mut self, doc_ids: Vec<String>) -> (usize, Vec<(String, TestkitError)>) {
        let workers = self.session().settings().max_workers.max(1);
        let client = self.client();
        let db = self.db();
        let credentials = self.credentials();
        let planned: Vec<(String, Value)> = doc_ids
            .into_iter()
            .map(|id| {
                let body = self.new_body(None);
                (id, body)
            })
            .collect();

        let results: Vec<_> = stream::iter(planned)
            .map(|(doc_id, body)| async move {
                let result = client
                    .put_doc(db, &doc_id, &body, None, Some(credentials))
                    .await;
                (doc_id, body, result)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut inserted = 0;
        let mut errors = Vec::new();
        for (doc_id, body, result) in results {
            match result {
                Ok(written) => {
                    self.record_insert(&doc_id, body, written.rev);
                    inserted += 1;
                }
                Err(e) => {
                    debug!("Insert of {doc_id} failed: {e}");
                    errors.push((doc_id, e.into()));
                }
            }
        }
        (inserted, errors)
    }

    async fn insert_bulk(&mut self, doc_ids: Vec<String>) -> (usize, Vec<(String, TestkitError)>) {
        let body = self.new_body(None);
        let docs: Vec<Value> = doc_ids
            .iter()
            .map(|id| {
                let mut doc = body.clone();
                doc["_id"] = json!(id);
                doc
            })
            .collect();

        let results = match self
            .client()
            .bulk_docs(self.db(), &docs, Some(self.credentials()))
            .await
        {
            Ok(results) => results,
            // One request: its failure is every document's failure.
            Err(e) => {
                error!("{}: _bulk_docs of {} docs failed: {e}", self.name(), doc_ids.len());
                let reason = format!("_bulk_docs request failed: {e}");
                let errors = doc_ids
                    .into_iter()
                    .map(|doc_id| {
                        let rejected = TestkitError::DocumentRejected {
                            doc_id: doc_id.clone(),
                            reason: reason.clone(),
                        };
                        (doc_id, rejected)
                    })
                    .collect();
                return (0, errors);
            }
        };

        let mut inserted = 0;
        let mut errors = Vec::new();
        let mut results = results.into_iter();
        for doc_id in doc_ids {
            match results.next() {
                Some(result) if result.is_success() => {
                    let rev = result.rev.unwrap_or_default();
                    self.record_insert(&doc_id, body.clone(), rev);
                    inserted += 1;
                }
                Some(result) => errors.push((
                    doc_id.clone(),
                    TestkitError::DocumentRejected {
                        doc_id,
                        reason: result
                            .reason
                            .or(result.error)
                            .unwrap_or_else(|| "no revision returned".to_string()),
                    },
                )),
                None => errors.push((
                    doc_id.clone(),
                    TestkitError::DocumentRejected {
                        doc_id,
                        reason: "missing from _bulk_docs response".to_string(),
                    },
                )),
            }
        }
        (inserted, errors)
    }

    /// Insert one document. A `None` id lets the server generate one.
    ///
    /// Used for control documents such as tracking sentinels. Returns the id.
    pub async fn add_doc(
        &mut self,
        doc_id: Option<&str>,
        content: Option<Value>,
    ) -> Result<String, TestkitError> {
        let body = self.new_body(content);
        let written = match doc_id {
            Some(id) => {
                self.client()
                    .put_doc(self.db(), id, &body, None, Some(self.credentials()))
                    .await?
            }
            None => {
                self.client()
                    .post_doc(self.db(), &body, Some(self.credentials()))
                    .await?
            }
        };
        debug!("{} wrote {} at {}", self.name(), written.id, written.rev);
        self.record_insert(&written.id, body, written.rev);
        Ok(written.id)
    }

    /// Apply `num_revs_per_doc` sequential updates to every cached document.
    ///
    /// Each update sends the previous revision as the expected current one.
    /// A failure stops that document's chain only; revisions written before
    /// it stay recorded. All failures are returned together as
    /// [`TestkitError::UpdateFailed`], conflicts as [`TestkitError::Conflict`].
    pub async fn update_docs(&mut self, num_revs_per_doc: usize) -> Result<(), TestkitError> {
        if self.cache.is_empty() {
            warn!("{}: no cached docs to update", self.name());
            return Ok(());
        }

        let workers = self.session().settings().max_workers.max(1);
        let client = self.client();
        let db = self.db();
        let credentials = self.credentials();
        let starts: Vec<(String, Value, String)> = self
            .cache
            .iter()
            .map(|(id, doc)| (id.clone(), doc.body().clone(), doc.current_rev().to_string()))
            .collect();

        let chains: Vec<RevisionChain> = stream::iter(starts)
            .map(|(doc_id, body, rev)| {
                revise(client, db, credentials, doc_id, body, rev, num_revs_per_doc)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut failures = Vec::new();
        for chain in chains {
            for (rev, body) in chain.revisions {
                self.cache.record_revision(&chain.doc_id, rev, Some(body));
            }
            if let Some(failure) = chain.failure {
                error!("{}: update of {} failed: {failure}", self.name(), chain.doc_id);
                failures.push((chain.doc_id, failure));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TestkitError::UpdateFailed { failures })
        }
    }

    /// Apply `num_revs` sequential updates to one cached document.
    pub async fn update_doc(&mut self, doc_id: &str, num_revs: usize) -> Result<String, TestkitError> {
        let (body, rev) = match self.cache.get(doc_id) {
            Some(doc) => (doc.body().clone(), doc.current_rev().to_string()),
            None => {
                return Err(TestkitError::InvalidArgument(format!(
                    "'{doc_id}' was not written by {}",
                    self.name()
                )))
            }
        };

        let chain = revise(
            self.client(),
            self.db(),
            self.credentials(),
            doc_id.to_string(),
            body,
            rev,
            num_revs,
        )
        .await;
        for (rev, body) in chain.revisions {
            self.cache.record_revision(doc_id, rev, Some(body));
        }
        match chain.failure {
            Some(failure) => Err(failure),
            None => Ok(self.cache.current_rev(doc_id).unwrap_or_default().to_string()),
        }
    }

    /// Delete a document, writing a tombstone revision.
    ///
    /// Without `rev` the cached current revision is used, falling back to the
    /// server's. The tombstone is appended to the cached history.
    pub async fn delete_doc(&mut self, doc_id: &str, rev: Option<&str>) -> Result<String, TestkitError> {
        let rev = match rev {
            Some(rev) => rev.to_string(),
            None => match self.cache.current_rev(doc_id) {
                Some(rev) => rev.to_string(),
                None => {
                    let doc = self.get_doc(doc_id).await?;
                    doc.get("_rev")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| TestkitError::DocumentRejected {
                            doc_id: doc_id.to_string(),
                            reason: "document has no _rev".to_string(),
                        })?
                }
            },
        };

        let written = self
            .client()
            .delete_doc(self.db(), doc_id, &rev, Some(self.credentials()))
            .await
            .map_err(|e| conflict_or(e, doc_id, &rev))?;
        self.cache
            .record_revision(doc_id, written.rev.clone(), Some(json!({"_deleted": true})));
        Ok(written.rev)
    }

    fn record_insert(&mut self, doc_id: &str, body: Value, rev: String) {
        if doc_id.starts_with(LOCAL_DOC_PREFIX) {
            return;
        }
        self.cache.record_insert(doc_id, body, rev);
    }
}

/// Write `num_revs` revisions of one document in sequence.
async fn revise(
    client: &GatewayClient,
    db: &str,
    credentials: &Credentials,
    doc_id: String,
    mut body: Value,
    mut rev: String,
    num_revs: usize,
) -> RevisionChain {
    let mut revisions = Vec::with_capacity(num_revs);
    for _ in 0..num_revs {
        let updates = body.get("updates").and_then(Value::as_u64).unwrap_or(0);
        body["updates"] = json!(updates + 1);

        match client
            .put_doc(db, &doc_id, &body, Some(&rev), Some(credentials))
            .await
        {
            Ok(written) => {
                rev = written.rev;
                revisions.push((rev.clone(), body.clone()));
            }
            Err(e) => {
                return RevisionChain {
                    failure: Some(conflict_or(e, &doc_id, &rev)),
                    doc_id,
                    revisions,
                }
            }
        }
    }
    RevisionChain {
        doc_id,
        revisions,
        failure: None,
    }
}

fn conflict_or(error: ClientError, doc_id: &str, expected_rev: &str) -> TestkitError {
    if error.is_conflict() {
        TestkitError::Conflict {
            doc_id: doc_id.to_string(),
            expected_rev: expected_rev.to_string(),
        }
    } else {
        error.into()
    }
}
