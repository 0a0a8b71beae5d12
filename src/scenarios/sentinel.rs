//! A tracking session stops exactly when the termination document arrives.

use super::{ensure_inserted, ScenarioOptions};
use anyhow::Context;
use clap::ValueEnum;
use std::time::Duration;
use testkit_principal::{Admin, GatewaySession, TrackedChanges, TrackerState};
use testkit_verify::{verify_same_docs, VerificationReport};
use tracing::info;

/// Id of the document that ends a tracking session.
pub const TERMINATION_DOC_ID: &str = "killcontinuous";

/// Which feed form the tracking user reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrackingFeed {
    Longpoll,
    Continuous,
}

#[derive(Debug)]
pub struct SentinelOutcome {
    pub tracked: TrackedChanges,
    pub report: VerificationReport,
}

/// One user tracks the feed while a second pushes `num_docs` documents into a
/// shared channel. `delay` after the pushes complete, a third user writes
/// the termination document. The tracker must return with exactly the
/// pushed documents, plus the termination document.
pub async fn sentinel_termination(
    session: &GatewaySession,
    options: &ScenarioOptions,
    feed: TrackingFeed,
    num_docs: usize,
    delay: Duration,
) -> anyhow::Result<SentinelOutcome> {
    let admin = Admin::new(session.clone());
    let db = options.db.as_str();
    let password = options.password.as_str();

    let tracker = admin.register_user(db, "tracker", password, &["NBC"], &[]).await?;
    let mut pusher = admin.register_user(db, "pusher", password, &["NBC"], &[]).await?;
    let mut terminator = admin
        .register_user(db, "terminator", password, &["NBC"], &[])
        .await?;

    let tracking = async {
        match feed {
            TrackingFeed::Longpoll => tracker.start_longpoll_changes_tracking(TERMINATION_DOC_ID).await,
            TrackingFeed::Continuous => {
                tracker
                    .start_continuous_changes_tracking(TERMINATION_DOC_ID)
                    .await
            }
        }
    };
    let workload = async {
        let pushed = pusher.add_docs(num_docs, None, false).await;
        tokio::time::sleep(delay).await;
        // Written even when the pushes failed so the tracker is released.
        let terminated = terminator.add_doc(Some(TERMINATION_DOC_ID), None).await;
        (pushed, terminated)
    };

    info!("Tracking {feed:?} feed while pushing {num_docs} docs");
    let (tracked, (pushed, terminated)) = tokio::join!(tracking, workload);
    ensure_inserted(pusher.name(), pushed?)?;
    terminated.context("Failed to write the termination document")?;
    let tracked = tracked.context("Tracking session failed")?;

    if tracked.state != TrackerState::Closed {
        anyhow::bail!(
            "Tracking ended in {:?} before '{TERMINATION_DOC_ID}' arrived ({} docs seen)",
            tracked.state,
            tracked.docs.len()
        );
    }
    let report = verify_same_docs(num_docs, pusher.cache(), &tracked)
        .context("Tracked documents differ from the pushed ones")?;

    info!(
        "Tracker saw {} docs in {} rounds",
        tracked.document_ids().len(),
        tracked.rounds
    );
    Ok(SentinelOutcome { tracked, report })
}
