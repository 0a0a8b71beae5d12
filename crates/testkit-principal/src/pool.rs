//! Bounded task group for independent per-principal work.
//!
//! Tasks are spawned immediately but at most `max_workers` run at once.
//! [`TaskGroup::join_all`] waits for every task and returns one labelled
//! outcome per task; a panic is reported as [`TestkitError::Task`] rather
//! than being lost.

use crate::error::TestkitError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error};

pub struct TaskGroup<T> {
    tasks: JoinSet<T>,
    labels: HashMap<Id, String>,
    permits: Arc<Semaphore>,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn new(max_workers: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            labels: HashMap::new(),
            permits: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }

    /// Submit a task. It starts as soon as a worker slot is free.
    pub fn spawn<F>(&mut self, label: impl Into<String>, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let handle = self.tasks.spawn(async move {
            // The semaphore is never closed, so acquisition only waits.
            let _permit = permits.acquire_owned().await.ok();
            task.await
        });
        self.labels.insert(handle.id(), label.into());
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Await every task. Outcomes are returned in completion order.
    pub async fn join_all(mut self) -> Vec<(String, Result<T, TestkitError>)> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((id, value)) => {
                    let label = self.labels.remove(&id).unwrap_or_default();
                    debug!("Task '{label}' finished");
                    outcomes.push((label, Ok(value)));
                }
                Err(e) => {
                    let label = self.labels.remove(&e.id()).unwrap_or_default();
                    error!("Task '{label}' did not complete: {e}");
                    outcomes.push((label, Err(TestkitError::Task(e.to_string()))));
                }
            }
        }
        outcomes
    }
}
