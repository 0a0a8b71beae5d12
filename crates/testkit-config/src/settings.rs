//! Client-side settings for one test scenario.

use std::time::Duration;

/// Knobs shared by every request issued during a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Per-request timeout for ordinary (non-feed) calls.
    pub request_timeout: Duration,
    /// Upper bound on concurrently running operations in the worker pool.
    pub max_workers: usize,
    /// Server-side timeout sent with each long-poll request.
    pub longpoll_timeout: Duration,
    /// Pause between long-poll round trips.
    pub poll_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_workers: 100,
            longpoll_timeout: Duration::from_millis(10_000),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl SessionSettings {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the worker-pool size. Zero is raised to one.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    pub fn with_longpoll_timeout(mut self, timeout: Duration) -> Self {
        self.longpoll_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
