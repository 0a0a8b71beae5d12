//! Verification report types.

use std::fmt;
use std::time::Duration;

/// Maximum number of individual issues spelled out in a summary.
const SUMMARY_ISSUE_LIMIT: usize = 10;

/// A document whose observed revision differs from the expected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionMismatch {
    pub doc_id: String,
    pub expected: String,
    pub actual: String,
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// The number of distinct document ids differs from the expected count.
    DocCount { expected: usize, actual: usize },
    /// An expected document is absent.
    Missing { doc_id: String },
    /// A document is present on one side only.
    Unexpected { doc_id: String },
    /// The observed revision is not the latest recorded one.
    Revision(RevisionMismatch),
    /// Revisions of one document surfaced as separate feed entries.
    Duplicate { doc_id: String, occurrences: usize },
    /// The revision generation does not match the number of updates.
    Generation(RevisionMismatch),
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DocCount { expected, actual } => {
                write!(f, "expected {expected} distinct docs, found {actual}")
            }
            Self::Missing { doc_id } => write!(f, "'{doc_id}' missing"),
            Self::Unexpected { doc_id } => write!(f, "'{doc_id}' unexpected"),
            Self::Revision(m) => write!(
                f,
                "'{}' at revision {}, expected {}",
                m.doc_id, m.actual, m.expected
            ),
            Self::Duplicate {
                doc_id,
                occurrences,
            } => write!(f, "'{doc_id}' appears {occurrences} times"),
            Self::Generation(m) => write!(
                f,
                "'{}' at generation {}, expected {}",
                m.doc_id, m.actual, m.expected
            ),
        }
    }
}

/// Checks performed against one view (a user's feed, or a pair of maps).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewReport {
    /// User name or label of the compared view.
    pub view: String,
    pub expected_docs: usize,
    pub found_docs: usize,
    pub matched: usize,
    pub issues: Vec<Issue>,
}

impl ViewReport {
    pub fn new(view: impl Into<String>, expected_docs: usize) -> Self {
        Self {
            view: view.into(),
            expected_docs,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Verification report over every checked view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub views: Vec<ViewReport>,
    pub total_duration: Duration,
}

impl VerificationReport {
    /// Check if every view passed.
    pub fn is_success(&self) -> bool {
        self.views.iter().all(ViewReport::is_success)
    }

    pub fn issue_count(&self) -> usize {
        self.views.iter().map(|v| v.issues.len()).sum()
    }

    /// Get a summary string naming the offending documents.
    pub fn summary(&self) -> String {
        if self.is_success() {
            let matched: usize = self.views.iter().map(|v| v.matched).sum();
            return format!(
                "Verification PASSED: {} views, {matched} docs matched in {:?}",
                self.views.len(),
                self.total_duration
            );
        }

        let mut lines = vec![format!(
            "Verification FAILED: {} issues across {} views",
            self.issue_count(),
            self.views.iter().filter(|v| !v.is_success()).count()
        )];
        let issues = self
            .views
            .iter()
            .flat_map(|v| v.issues.iter().map(move |issue| (v.view.as_str(), issue)));
        for (view, issue) in issues.clone().take(SUMMARY_ISSUE_LIMIT) {
            lines.push(format!("  {view}: {issue}"));
        }
        let remaining = issues.count().saturating_sub(SUMMARY_ISSUE_LIMIT);
        if remaining > 0 {
            lines.push(format!("  ... and {remaining} more"));
        }
        lines.join("\n")
    }
}
