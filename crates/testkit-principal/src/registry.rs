//! Named user operations, dispatched by exact key.
//!
//! Scenarios that run "the same operation for every user" look the operation
//! up once in an [`OperationRegistry`] and fan it out with
//! [`OperationRegistry::in_parallel`]. Unknown names fail with
//! [`TestkitError::UnknownOperation`] before anything runs.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo(users: &mut [testkit_principal::User]) -> Result<(), testkit_principal::TestkitError> {
//! use testkit_principal::{OperationArgs, OperationRegistry};
//!
//! let registry = OperationRegistry::default();
//! let outcomes = registry
//!     .in_parallel(users, "add_docs", &OperationArgs::new().with_count(100), 10)
//!     .await?;
//! for (user, outcome) in outcomes {
//!     outcome?;
//!     println!("{user} done");
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::TestkitError;
use crate::tracker::TrackedChanges;
use crate::user::User;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use testkit_client::ChangesQuery;
use testkit_types::{ChangesFeed, SequenceToken};
use tracing::debug;

/// Arguments shared by every registered operation; each reads what it needs.
#[derive(Debug, Clone, Default)]
pub struct OperationArgs {
    pub count: usize,
    pub name_prefix: Option<String>,
    pub bulk: bool,
    pub num_revs: usize,
    pub doc_id: Option<String>,
    pub termination_doc_id: Option<String>,
    pub query: ChangesQuery,
}

impl OperationArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn with_bulk(mut self, bulk: bool) -> Self {
        self.bulk = bulk;
        self
    }

    pub fn with_num_revs(mut self, num_revs: usize) -> Self {
        self.num_revs = num_revs;
        self
    }

    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    pub fn with_termination_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.termination_doc_id = Some(doc_id.into());
        self
    }

    pub fn with_query(mut self, query: ChangesQuery) -> Self {
        self.query = query;
        self
    }

    fn require_termination_doc_id(&self) -> Result<&str, TestkitError> {
        self.termination_doc_id.as_deref().ok_or_else(|| {
            TestkitError::InvalidArgument("termination_doc_id is required for tracking".to_string())
        })
    }
}

/// Result of a registered operation.
#[derive(Debug)]
pub enum OperationOutput {
    /// Non-fatal per-document failures of an insert batch.
    InsertErrors(Vec<(String, TestkitError)>),
    DocId(String),
    Feed(ChangesFeed),
    Tracked(TrackedChanges),
    Done,
}

pub type OperationFn =
    for<'a> fn(&'a mut User, &'a OperationArgs) -> BoxFuture<'a, Result<OperationOutput, TestkitError>>;

/// Operation name → function.
#[derive(Clone)]
pub struct OperationRegistry {
    operations: HashMap<String, OperationFn>,
}

impl Default for OperationRegistry {
    /// Registry with the built-in user operations.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("add_docs", add_docs);
        registry.register("update_docs", update_docs);
        registry.register("add_doc", add_doc);
        registry.register("get_changes", get_changes);
        registry.register("get_longpoll_changes", get_longpoll_changes);
        registry.register("start_longpoll_changes_tracking", start_longpoll_changes_tracking);
        registry.register("start_continuous_changes_tracking", start_continuous_changes_tracking);
        registry
    }
}

impl OperationRegistry {
    pub fn empty() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Register `operation` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, operation: OperationFn) {
        self.operations.insert(name.into(), operation);
    }

    pub fn get(&self, name: &str) -> Result<OperationFn, TestkitError> {
        self.operations
            .get(name)
            .copied()
            .ok_or_else(|| TestkitError::UnknownOperation(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run one operation for one user.
    pub async fn run(
        &self,
        name: &str,
        user: &mut User,
        args: &OperationArgs,
    ) -> Result<OperationOutput, TestkitError> {
        let operation = self.get(name)?;
        operation(user, args).await
    }

    /// Run `name` for every user concurrently, at most `max_workers` at a time.
    ///
    /// Returns one `(user name, outcome)` pair per user in completion order.
    /// A failing user does not stop the others.
    pub async fn in_parallel(
        &self,
        users: &mut [User],
        name: &str,
        args: &OperationArgs,
        max_workers: usize,
    ) -> Result<Vec<(String, Result<OperationOutput, TestkitError>)>, TestkitError> {
        let operation = self.get(name)?;
        debug!("Running '{name}' for {} users", users.len());

        let outcomes: Vec<_> = stream::iter(users.iter_mut())
            .map(|user| async move {
                let user_name = user.name().to_string();
                let outcome = operation(user, args).await;
                (user_name, outcome)
            })
            .buffer_unordered(max_workers.max(1))
            .collect()
            .await;
        Ok(outcomes)
    }
}

fn add_docs<'a>(
    user: &'a mut User,
    args: &'a OperationArgs,
) -> BoxFuture<'a, Result<OperationOutput, TestkitError>> {
    Box::pin(async move {
        let errors = user
            .add_docs(args.count, args.name_prefix.as_deref(), args.bulk)
            .await?;
        Ok(OperationOutput::InsertErrors(errors))
    })
}

fn update_docs<'a>(
    user: &'a mut User,
    args: &'a OperationArgs,
) -> BoxFuture<'a, Result<OperationOutput, TestkitError>> {
    Box::pin(async move {
        user.update_docs(args.num_revs).await?;
        Ok(OperationOutput::Done)
    })
}

fn add_doc<'a>(
    user: &'a mut User,
    args: &'a OperationArgs,
) -> BoxFuture<'a, Result<OperationOutput, TestkitError>> {
    Box::pin(async move {
        let doc_id = user.add_doc(args.doc_id.as_deref(), None).await?;
        Ok(OperationOutput::DocId(doc_id))
    })
}

fn get_changes<'a>(
    user: &'a mut User,
    args: &'a OperationArgs,
) -> BoxFuture<'a, Result<OperationOutput, TestkitError>> {
    Box::pin(async move { Ok(OperationOutput::Feed(user.get_changes(&args.query).await?)) })
}

fn get_longpoll_changes<'a>(
    user: &'a mut User,
    args: &'a OperationArgs,
) -> BoxFuture<'a, Result<OperationOutput, TestkitError>> {
    Box::pin(async move {
        let since = args.query.since.clone().unwrap_or_else(SequenceToken::zero);
        Ok(OperationOutput::Feed(user.get_longpoll_changes(since).await?))
    })
}

fn start_longpoll_changes_tracking<'a>(
    user: &'a mut User,
    args: &'a OperationArgs,
) -> BoxFuture<'a, Result<OperationOutput, TestkitError>> {
    Box::pin(async move {
        let termination = args.require_termination_doc_id()?;
        let tracked = user.start_longpoll_changes_tracking(termination).await?;
        Ok(OperationOutput::Tracked(tracked))
    })
}

fn start_continuous_changes_tracking<'a>(
    user: &'a mut User,
    args: &'a OperationArgs,
) -> BoxFuture<'a, Result<OperationOutput, TestkitError>> {
    Box::pin(async move {
        let termination = args.require_termination_doc_id()?;
        let tracked = user.start_continuous_changes_tracking(termination).await?;
        Ok(OperationOutput::Tracked(tracked))
    })
}
