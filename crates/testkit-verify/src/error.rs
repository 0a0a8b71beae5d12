//! Error types for verification.

use crate::report::VerificationReport;
use testkit_principal::TestkitError;
use thiserror::Error;

/// A verification that ran and found mismatches.
#[derive(Error, Debug, Clone)]
#[error("{}", .report.summary())]
pub struct VerificationFailure {
    pub report: VerificationReport,
}

/// Errors that can occur during verification.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The expectation itself is inconsistent with the scenario.
    #[error("Invalid expectation: {0}")]
    InvalidExpectation(String),

    /// A user's changes feed could not be fetched or parsed.
    #[error("Failed to read the changes feed of '{user}': {source}")]
    Feed {
        user: String,
        #[source]
        source: TestkitError,
    },

    #[error(transparent)]
    Failed(#[from] VerificationFailure),
}

impl VerifyError {
    /// The report of a verification that ran, if it got that far.
    pub fn report(&self) -> Option<&VerificationReport> {
        match self {
            Self::Failed(failure) => Some(&failure.report),
            _ => None,
        }
    }
}
