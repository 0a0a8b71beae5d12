//! Admin-side gateway management: principals, channel grants and database lifecycle.

use crate::error::TestkitError;
use crate::pool::TaskGroup;
use crate::session::GatewaySession;
use crate::user::User;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use testkit_client::{PrincipalInfo, RoleSpec, UserSpec};
use tracing::{error, info};

/// Registers principals through the admin REST surface.
#[derive(Debug, Clone)]
pub struct Admin {
    session: GatewaySession,
}

impl Admin {
    pub fn new(session: GatewaySession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &GatewaySession {
        &self.session
    }

    /// Create a user and return it bound to its credentials.
    ///
    /// Fails with [`TestkitError::Registration`] if the name is taken or a
    /// channel name is empty.
    pub async fn register_user(
        &self,
        db: &str,
        name: &str,
        password: &str,
        channels: &[&str],
        roles: &[&str],
    ) -> Result<User, TestkitError> {
        validate_name(name)?;
        validate_channels(name, channels)?;

        match self.session.client().get_user(db, name).await {
            Ok(_) => {
                return Err(TestkitError::Registration {
                    name: name.to_string(),
                    reason: "user already exists".to_string(),
                })
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let spec = UserSpec {
            name: name.to_string(),
            password: Some(password.to_string()),
            admin_channels: to_strings(channels),
            admin_roles: to_strings(roles),
        };
        self.session.client().create_user(db, &spec).await?;
        info!("Registered user '{name}' in '{db}' (channels: {channels:?}, roles: {roles:?})");

        Ok(User::new(
            self.session.clone(),
            db,
            name,
            password,
            spec.admin_channels,
        )
        .with_roles(spec.admin_roles))
    }

    /// Register `count` users named `{name_prefix}_0 … {name_prefix}_{count-1}` concurrently.
    ///
    /// Users are returned in index order. If any registration fails the
    /// result is [`TestkitError::BulkRegistration`] naming each failed user;
    /// the ones that succeeded are not removed.
    pub async fn register_bulk_users(
        &self,
        db: &str,
        name_prefix: &str,
        count: usize,
        password: &str,
        channels: &[&str],
        roles: &[&str],
    ) -> Result<Vec<User>, TestkitError> {
        let mut group = TaskGroup::new(self.session.settings().max_workers);
        for i in 0..count {
            let admin = self.clone();
            let db = db.to_string();
            let name = format!("{name_prefix}_{i}");
            let password = password.to_string();
            let channels = to_strings(channels);
            let roles = to_strings(roles);
            group.spawn(name.clone(), async move {
                let channels: Vec<&str> = channels.iter().map(String::as_str).collect();
                let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
                let user = admin
                    .register_user(&db, &name, &password, &channels, &roles)
                    .await?;
                Ok::<_, TestkitError>((i, user))
            });
        }

        let mut registered: Vec<(usize, User)> = Vec::with_capacity(count);
        let mut failures = Vec::new();
        for (name, outcome) in group.join_all().await {
            match outcome.and_then(|result| result) {
                Ok(indexed) => registered.push(indexed),
                Err(e) => {
                    error!("Bulk registration of '{name}' failed: {e}");
                    failures.push((name, e));
                }
            }
        }

        registered.sort_by_key(|(index, _)| *index);
        let users: Vec<User> = registered.into_iter().map(|(_, user)| user).collect();

        if failures.is_empty() {
            info!("Registered {count} users with prefix '{name_prefix}'");
            return Ok(users);
        }
        failures.sort_by(|a, b| a.0.cmp(&b.0));
        Err(TestkitError::BulkRegistration {
            requested: count,
            registered: users.iter().map(|u| u.name().to_string()).collect(),
            failures,
        })
    }

    /// Create a role. Roles carry channels but no password.
    pub async fn create_role(&self, db: &str, name: &str, channels: &[&str]) -> Result<(), TestkitError> {
        validate_name(name)?;
        validate_channels(name, channels)?;
        let spec = RoleSpec {
            name: name.to_string(),
            admin_channels: to_strings(channels),
        };
        self.session.client().create_role(db, &spec).await?;
        info!("Created role '{name}' in '{db}' (channels: {channels:?})");
        Ok(())
    }

    pub async fn get_user(&self, db: &str, name: &str) -> Result<PrincipalInfo, TestkitError> {
        Ok(self.session.client().get_user(db, name).await?)
    }

    pub async fn get_role(&self, db: &str, name: &str) -> Result<PrincipalInfo, TestkitError> {
        Ok(self.session.client().get_role(db, name).await?)
    }

    /// Add `channels` to a user's admin grants. Existing grants are kept.
    pub async fn grant_channels(
        &self,
        db: &str,
        name: &str,
        channels: &[&str],
    ) -> Result<PrincipalInfo, TestkitError> {
        validate_channels(name, channels)?;
        let current = self.get_user(db, name).await?;

        let mut granted: BTreeSet<String> = current.admin_channels.iter().cloned().collect();
        granted.extend(to_strings(channels));

        let spec = UserSpec {
            name: name.to_string(),
            password: None,
            admin_channels: granted.into_iter().collect(),
            admin_roles: current.admin_roles,
        };
        self.session.client().create_user(db, &spec).await?;
        info!("Granted {channels:?} to '{name}'");
        self.get_user(db, name).await
    }

    /// `GET /{db}/`
    pub async fn get_db_info(&self, db: &str) -> Result<Value, TestkitError> {
        Ok(self.session.client().get_db_info(db).await?)
    }

    /// Names of every user registered in `db`, sorted.
    pub async fn get_users_info(&self, db: &str) -> Result<Vec<String>, TestkitError> {
        let mut names = self.session.client().list_users(db).await?;
        names.sort();
        Ok(names)
    }

    /// Names of every role defined in `db`, sorted.
    pub async fn get_roles(&self, db: &str) -> Result<Vec<String>, TestkitError> {
        let mut names = self.session.client().list_roles(db).await?;
        names.sort();
        Ok(names)
    }

    /// Take `db` offline. Public requests fail with 503 until it is back.
    pub async fn take_db_offline(&self, db: &str) -> Result<u16, TestkitError> {
        let status = self.session.client().take_db_offline(db).await?;
        info!("Took '{db}' offline ({status})");
        Ok(status)
    }

    /// Bring `db` back online, after `delay` if given.
    ///
    /// The call returns as soon as the gateway accepts it; with a delay the
    /// database is still offline at that point.
    pub async fn bring_db_online(&self, db: &str, delay: Option<Duration>) -> Result<u16, TestkitError> {
        let status = self.session.client().bring_db_online(db, delay).await?;
        info!("Bringing '{db}' online (delay: {delay:?}, status {status})");
        Ok(status)
    }

    /// Re-run the sync function over every document. The gateway only
    /// accepts this while `db` is offline.
    pub async fn db_resync(&self, db: &str) -> Result<Value, TestkitError> {
        let payload = self.session.client().db_resync(db).await?;
        info!("Resynced '{db}': {payload}");
        Ok(payload)
    }

    pub async fn get_db_config(&self, db: &str) -> Result<Value, TestkitError> {
        Ok(self.session.client().get_db_config(db).await?)
    }

    pub async fn put_db_config(&self, db: &str, config: &Value) -> Result<u16, TestkitError> {
        let status = self.session.client().put_db_config(db, config).await?;
        info!("Replaced config of '{db}' ({status})");
        Ok(status)
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn validate_name(name: &str) -> Result<(), TestkitError> {
    if name.trim().is_empty() {
        return Err(TestkitError::Registration {
            name: name.to_string(),
            reason: "empty principal name".to_string(),
        });
    }
    Ok(())
}

fn validate_channels(name: &str, channels: &[&str]) -> Result<(), TestkitError> {
    if channels.iter().any(|c| c.trim().is_empty()) {
        return Err(TestkitError::Registration {
            name: name.to_string(),
            reason: format!("malformed channel list {channels:?}: empty channel name"),
        });
    }
    Ok(())
}
