//! Principals of a sync-testkit scenario and the work they drive.
//!
//! - [`GatewaySession`] - Explicit per-scenario handle (client, mode, settings)
//! - [`Admin`] - Registers users and roles, grants channels
//! - [`User`] - Writes documents (`add_docs`, `update_docs`, `add_doc`,
//!   `delete_doc`) and observes the changes feed (`get_changes`,
//!   `start_longpoll_changes_tracking`, `start_continuous_changes_tracking`)
//! - [`TaskGroup`] - Bounded group of spawned tasks with per-task outcomes
//! - [`OperationRegistry`] - Named user operations run across many users
//!
//! # Example
//!
//! ```rust,no_run
//! use testkit_config::SessionSettings;
//! use testkit_principal::{Admin, GatewaySession};
//! use testkit_types::ClusterMode;
//!
//! # async fn demo() -> Result<(), testkit_principal::TestkitError> {
//! let session = GatewaySession::connect(
//!     "http://127.0.0.1:4985",
//!     "http://127.0.0.1:4984",
//!     ClusterMode::ChannelCache,
//!     SessionSettings::default(),
//! )?;
//! let admin = Admin::new(session);
//! let mut seth = admin.register_user("db", "seth", "password", &["ABC"], &[]).await?;
//! seth.add_docs(100, None, true).await?;
//! seth.update_docs(2).await?;
//! # Ok(())
//! # }
//! ```

mod admin;
mod error;
mod mutation;
mod pool;
mod registry;
mod session;
mod tracker;
mod user;

pub use admin::Admin;
pub use error::TestkitError;
pub use mutation::LOCAL_DOC_PREFIX;
pub use pool::TaskGroup;
pub use registry::{OperationArgs, OperationFn, OperationOutput, OperationRegistry};
pub use session::GatewaySession;
pub use tracker::{TrackedChanges, TrackerState};
pub use user::User;
