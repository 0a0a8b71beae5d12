//! Convergence checks over changes feeds and document maps.

use crate::error::{VerificationFailure, VerifyError};
use crate::report::{Issue, RevisionMismatch, VerificationReport, ViewReport};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use testkit_client::ChangesQuery;
use testkit_principal::{TrackedChanges, User};
use testkit_types::{is_principal_doc, revision_generation, ChangesFeed, DocumentCache, SequenceToken};
use tracing::{debug, info, warn};

/// Something that maps document ids to their current revision.
pub trait RevisionView {
    fn revisions(&self) -> HashMap<String, String>;

    /// Control document ids to discard before comparison.
    fn control_ids(&self) -> Vec<String> {
        Vec::new()
    }
}

impl RevisionView for DocumentCache {
    fn revisions(&self) -> HashMap<String, String> {
        self.iter()
            .map(|(id, doc)| (id.clone(), doc.current_rev().to_string()))
            .collect()
    }
}

impl RevisionView for TrackedChanges {
    fn revisions(&self) -> HashMap<String, String> {
        TrackedChanges::revisions(self)
    }

    fn control_ids(&self) -> Vec<String> {
        vec![self.termination_doc_id.clone()]
    }
}

impl RevisionView for ChangesFeed {
    fn revisions(&self) -> HashMap<String, String> {
        self.latest_revisions()
            .into_iter()
            .map(|(id, rev)| (id.to_string(), rev.to_string()))
            .collect()
    }
}

impl RevisionView for HashMap<String, String> {
    fn revisions(&self) -> HashMap<String, String> {
        self.clone()
    }
}

/// Reject expectations that cannot describe a valid scenario.
///
/// With `expected_num_revisions == 0` no expected document may have been
/// updated, and an empty expected set only makes sense when no documents
/// are expected at all.
pub fn check_expectation(
    expected_num_docs: usize,
    expected_num_revisions: usize,
    expected_docs: &DocumentCache,
) -> Result<(), VerifyError> {
    if expected_num_revisions == 0 {
        let mut updated: Vec<(String, usize)> = expected_docs
            .iter()
            .filter(|(_, doc)| doc.history().len() > 1)
            .map(|(id, doc)| (id.clone(), doc.history().len()))
            .collect();
        if !updated.is_empty() {
            updated.sort();
            let (doc_id, len) = &updated[0];
            return Err(VerifyError::InvalidExpectation(format!(
                "expected_num_revisions is 0 but {} expected docs have several revisions \
                 (first: '{doc_id}' with {len})",
                updated.len()
            )));
        }
    }
    if expected_docs.is_empty() && expected_num_docs != 0 {
        return Err(VerifyError::InvalidExpectation(format!(
            "expected_docs is empty but expected_num_docs is {expected_num_docs}"
        )));
    }
    Ok(())
}

/// Compare one parsed feed against the expectation.
pub fn check_feed(
    view: &str,
    feed: &ChangesFeed,
    expected_num_docs: usize,
    expected_num_revisions: usize,
    expected_docs: &DocumentCache,
) -> ViewReport {
    let mut report = ViewReport::new(view, expected_num_docs);
    let observed = feed.latest_revisions();
    report.found_docs = observed.len();

    if observed.len() != expected_num_docs {
        report.issues.push(Issue::DocCount {
            expected: expected_num_docs,
            actual: observed.len(),
        });
    }

    for doc_id in expected_docs.doc_ids() {
        let expected_rev = expected_docs.current_rev(&doc_id).unwrap_or_default();
        match observed.get(doc_id.as_str()) {
            None => report.issues.push(Issue::Missing { doc_id }),
            Some(actual) if *actual != expected_rev => {
                report.issues.push(Issue::Revision(RevisionMismatch {
                    expected: expected_rev.to_string(),
                    actual: actual.to_string(),
                    doc_id,
                }))
            }
            Some(actual) => {
                report.matched += 1;
                if expected_num_revisions > 0 {
                    let expected_generation = expected_num_revisions as u64 + 1;
                    let generation = revision_generation(actual);
                    if generation != Some(expected_generation) {
                        report.issues.push(Issue::Generation(RevisionMismatch {
                            expected: expected_generation.to_string(),
                            actual: generation
                                .map(|g| g.to_string())
                                .unwrap_or_else(|| format!("unparseable ({actual})")),
                            doc_id,
                        }));
                    }
                }
            }
        }
    }

    if expected_num_revisions > 0 {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for entry in feed.document_entries() {
            *occurrences.entry(entry.id.as_str()).or_default() += 1;
        }
        let mut duplicates: Vec<(&str, usize)> =
            occurrences.into_iter().filter(|(_, n)| *n > 1).collect();
        duplicates.sort();
        for (doc_id, occurrences) in duplicates {
            report.issues.push(Issue::Duplicate {
                doc_id: doc_id.to_string(),
                occurrences,
            });
        }
    }

    report
}

/// Fetch each user's feed from sequence 0 and check it against `expected_docs`.
///
/// Asserts per user that the number of distinct non-principal ids equals
/// `expected_num_docs`, that every expected document is present at its
/// latest recorded revision, and, when `expected_num_revisions > 0`, that
/// each document surfaces exactly once at generation
/// `expected_num_revisions + 1`. An empty `users` slice is an
/// [`VerifyError::InvalidExpectation`].
pub async fn verify_changes(
    users: &[&User],
    expected_num_docs: usize,
    expected_num_revisions: usize,
    expected_docs: &DocumentCache,
) -> Result<VerificationReport, VerifyError> {
    check_expectation(expected_num_docs, expected_num_revisions, expected_docs)?;
    if users.is_empty() {
        return Err(VerifyError::InvalidExpectation(
            "no users to verify; an empty view set cannot show convergence".to_string(),
        ));
    }
    let start = Instant::now();
    let mut report = VerificationReport::default();

    for user in users {
        let query = ChangesQuery::one_shot().with_since(SequenceToken::zero());
        let feed = user
            .get_changes(&query)
            .await
            .map_err(|source| VerifyError::Feed {
                user: user.name().to_string(),
                source,
            })?;
        debug!("{}: verifying {} feed entries", user.name(), feed.len());
        report.views.push(check_feed(
            user.name(),
            &feed,
            expected_num_docs,
            expected_num_revisions,
            expected_docs,
        ));
    }

    report.total_duration = start.elapsed();
    finish(report)
}

/// Check that two independently collected views hold the same documents at
/// the same revisions, after discarding principal and control documents.
pub fn verify_same_docs(
    expected_num_docs: usize,
    one: &dyn RevisionView,
    two: &dyn RevisionView,
) -> Result<VerificationReport, VerifyError> {
    let start = Instant::now();
    let control: BTreeSet<String> = one.control_ids().into_iter().chain(two.control_ids()).collect();
    let keep = |(id, _): &(String, String)| !is_principal_doc(id) && !control.contains(id);
    let first: HashMap<String, String> = one.revisions().into_iter().filter(keep).collect();
    let second: HashMap<String, String> = two.revisions().into_iter().filter(keep).collect();

    let mut view = ViewReport::new("one vs two", expected_num_docs);
    view.found_docs = first.len();
    for (label, map) in [("one", &first), ("two", &second)] {
        if map.len() != expected_num_docs {
            warn!("View {label} holds {} docs, expected {expected_num_docs}", map.len());
            view.issues.push(Issue::DocCount {
                expected: expected_num_docs,
                actual: map.len(),
            });
        }
    }

    let mut ids: Vec<&String> = first.keys().chain(second.keys()).collect();
    ids.sort();
    ids.dedup();
    for doc_id in ids {
        match (first.get(doc_id), second.get(doc_id)) {
            (Some(a), Some(b)) if a == b => view.matched += 1,
            (Some(a), Some(b)) => view.issues.push(Issue::Revision(RevisionMismatch {
                doc_id: doc_id.clone(),
                expected: a.clone(),
                actual: b.clone(),
            })),
            (Some(_), None) => view.issues.push(Issue::Missing {
                doc_id: doc_id.clone(),
            }),
            (None, _) => view.issues.push(Issue::Unexpected {
                doc_id: doc_id.clone(),
            }),
        }
    }

    let report = VerificationReport {
        views: vec![view],
        total_duration: start.elapsed(),
    };
    finish(report)
}

fn finish(report: VerificationReport) -> Result<VerificationReport, VerifyError> {
    if report.is_success() {
        info!("{}", report.summary());
        Ok(report)
    } else {
        warn!("{}", report.summary());
        Err(VerificationFailure { report }.into())
    }
}
