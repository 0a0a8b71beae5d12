//! Convergence verification for sync-testkit scenarios.
//!
//! After a scenario quiesces, [`verify_changes`] reads every user's changes
//! feed from sequence 0 and checks it against the merged
//! [`DocumentCache`](testkit_types::DocumentCache) of the writers the user
//! can see. [`verify_same_docs`] compares two independently collected views,
//! for example a long-poll tracker against a continuous one.
//!
//! Both return a [`VerificationReport`] on success and
//! [`VerifyError::Failed`] carrying the same report when any check fails.

mod error;
mod report;
mod verify;

pub use error::{VerificationFailure, VerifyError};
pub use report::{Issue, RevisionMismatch, VerificationReport, ViewReport};
pub use verify::{check_expectation, check_feed, verify_changes, verify_same_docs, RevisionView};
