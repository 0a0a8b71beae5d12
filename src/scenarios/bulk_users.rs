//! Bulk-registered users inherit their role's channels.

use super::{ensure_inserted, ScenarioOptions};
use anyhow::Context;
use testkit_principal::{Admin, GatewaySession, User};
use testkit_verify::{verify_changes, VerificationReport};
use tracing::info;

pub const RADIO_STATIONS_ROLE: &str = "radio_stations";
const STATION_CHANNELS: [&str; 2] = ["HWOD", "KDWB"];

#[derive(Debug)]
pub struct BulkUsersOutcome {
    pub users: Vec<User>,
    pub report: VerificationReport,
}

/// Register `count` users `{prefix}_0 …` holding only the radio_stations
/// role, then check that each one's effective channels include the role's
/// and that each sees documents written into a role channel.
pub async fn bulk_users(
    session: &GatewaySession,
    options: &ScenarioOptions,
    prefix: &str,
    count: usize,
) -> anyhow::Result<BulkUsersOutcome> {
    let admin = Admin::new(session.clone());
    let db = options.db.as_str();

    admin
        .create_role(db, RADIO_STATIONS_ROLE, &STATION_CHANNELS)
        .await?;
    let users = admin
        .register_bulk_users(db, prefix, count, &options.password, &[], &[RADIO_STATIONS_ROLE])
        .await?;

    let names: Vec<&str> = users.iter().map(User::name).collect();
    let expected: Vec<String> = (0..count).map(|i| format!("{prefix}_{i}")).collect();
    if names != expected {
        anyhow::bail!("Registered users {names:?}, expected {expected:?}");
    }

    for user in &users {
        let info = admin.get_user(db, user.name()).await?;
        let missing: Vec<&str> = STATION_CHANNELS
            .iter()
            .copied()
            .filter(|c| !info.all_channels.iter().any(|granted| granted == c))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "{} does not inherit {missing:?} from {RADIO_STATIONS_ROLE} (channels: {:?})",
                user.name(),
                info.all_channels
            );
        }
    }

    let mut station = admin
        .register_user(db, &format!("{prefix}_station"), &options.password, &["HWOD"], &[])
        .await?;
    let errors = station.add_docs(5, None, true).await?;
    ensure_inserted(station.name(), errors)?;
    tokio::time::sleep(options.settle).await;

    let listeners: Vec<&User> = users.iter().collect();
    let report = verify_changes(&listeners, station.cache().len(), 0, station.cache())
        .await
        .context("Role members do not see the role's channel")?;

    info!("{count} users registered with role {RADIO_STATIONS_ROLE}");
    Ok(BulkUsersOutcome { users, report })
}
