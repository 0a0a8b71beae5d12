//! Three users with overlapping channels converge on what their channels grant.

use super::{ensure_inserted, ScenarioOptions};
use anyhow::Context;
use futures::future::try_join_all;
use testkit_principal::{Admin, GatewaySession, OperationArgs, OperationRegistry, User};
use testkit_types::DocumentCache;
use testkit_verify::{verify_changes, VerificationReport};
use tracing::info;

/// Documents each user bulk-inserts, and revisions applied afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceCounts {
    pub seth: usize,
    pub adam: usize,
    pub traun: usize,
    /// Updates applied to every document once all inserts are done.
    pub revisions: usize,
}

impl Default for ConvergenceCounts {
    fn default() -> Self {
        Self {
            seth: 1000,
            adam: 2000,
            traun: 3000,
            revisions: 0,
        }
    }
}

/// seth (ABC), adam (NBC, CBS) and traun (ABC, NBC, CBS) bulk-insert
/// concurrently. Each user must then see its own documents plus those of
/// every writer sharing a channel: seth sees seth + traun, adam sees
/// adam + traun, traun sees everything.
pub async fn convergence(
    session: &GatewaySession,
    options: &ScenarioOptions,
    counts: ConvergenceCounts,
) -> anyhow::Result<VerificationReport> {
    let admin = Admin::new(session.clone());
    let db = options.db.as_str();
    let password = options.password.as_str();

    let seth = admin.register_user(db, "seth", password, &["ABC"], &[]).await?;
    let adam = admin
        .register_user(db, "adam", password, &["NBC", "CBS"], &[])
        .await?;
    let traun = admin
        .register_user(db, "traun", password, &["ABC", "NBC", "CBS"], &[])
        .await?;
    let mut users = vec![seth, adam, traun];

    info!(
        "Inserting {}/{}/{} docs for seth/adam/traun",
        counts.seth, counts.adam, counts.traun
    );
    let inserts = users
        .iter_mut()
        .zip([counts.seth, counts.adam, counts.traun])
        .map(|(user, count)| user.add_docs(count, None, true));
    let outcomes = try_join_all(inserts).await.context("Bulk inserts failed")?;
    for (user, errors) in users.iter().zip(outcomes) {
        ensure_inserted(user.name(), errors)?;
    }

    if counts.revisions > 0 {
        let registry = OperationRegistry::default();
        let args = OperationArgs::new().with_num_revs(counts.revisions);
        let workers = session.settings().max_workers;
        for (name, outcome) in registry.in_parallel(&mut users, "update_docs", &args, workers).await? {
            outcome.with_context(|| format!("Updating {name}'s documents failed"))?;
        }
    }

    tokio::time::sleep(options.settle).await;

    let [seth, adam, traun] = &users[..] else {
        anyhow::bail!("expected three users");
    };
    let mut report = VerificationReport::default();
    for (user, visible) in [
        (seth, vec![seth, traun]),
        (adam, vec![adam, traun]),
        (traun, vec![seth, adam, traun]),
    ] {
        let expected = DocumentCache::merged(visible.iter().map(|u: &&User| u.cache()));
        let checked = verify_changes(&[user], expected.len(), counts.revisions, &expected)
            .await
            .with_context(|| format!("{}'s changes feed did not converge", user.name()))?;
        report.views.extend(checked.views);
        report.total_duration += checked.total_duration;
    }

    info!("{}", report.summary());
    Ok(report)
}
