//! Reusable end-to-end scenarios.
//!
//! Each scenario registers its own principals, drives writes, waits for the
//! workload to finish and only then verifies. They run against any gateway
//! reachable through a [`GatewaySession`](testkit_principal::GatewaySession).

mod bulk_users;
mod convergence;
mod sentinel;

pub use bulk_users::{bulk_users, BulkUsersOutcome, RADIO_STATIONS_ROLE};
pub use convergence::{convergence, ConvergenceCounts};
pub use sentinel::{sentinel_termination, SentinelOutcome, TrackingFeed, TERMINATION_DOC_ID};

use std::time::Duration;
use testkit_principal::TestkitError;

/// Settings shared by every scenario.
#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    pub db: String,
    /// Password given to every registered user.
    pub password: String,
    /// Pause between the end of the workload and verification.
    pub settle: Duration,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            db: "db".to_string(),
            password: "password".to_string(),
            settle: Duration::from_secs(1),
        }
    }
}

impl ScenarioOptions {
    pub fn new(db: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

/// Fail if any insertion of a batch failed.
fn ensure_inserted(user: &str, errors: Vec<(String, TestkitError)>) -> anyhow::Result<()> {
    if let Some((doc_id, first)) = errors.into_iter().next() {
        anyhow::bail!("{user} could not insert every document; first failure '{doc_id}': {first}");
    }
    Ok(())
}
