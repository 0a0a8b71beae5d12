//! Changes-feed tracking sessions.
//!
//! A session moves `Idle → Polling → Closed | TimedOut`:
//!
//! - **One-shot** ([`User::get_changes`]) is a single round trip.
//! - **Long-poll** ([`User::start_longpoll_changes_tracking`]) re-issues
//!   `feed=longpoll` requests from the previous `last_seq` until the
//!   termination document shows up. An empty round is the server's own
//!   long-poll timeout and simply starts the next round.
//!   [`User::get_longpoll_changes`] stops after the first round that
//!   delivers documents.
//! - **Continuous** ([`User::start_continuous_changes_tracking`]) reads one
//!   streaming response line by line until the termination document shows
//!   up. A stream the server closes first ends in `TimedOut`.
//!
//! There is no client-side deadline on either tracking form: a session that
//! never sees its termination document does not return.

use crate::error::TestkitError;
use crate::user::User;
use std::collections::HashMap;
use testkit_client::ChangesQuery;
use testkit_types::{is_principal_doc, ChangesEntry, ChangesFeed, ChangesLine, SequenceToken};
use tracing::{debug, info, warn};

/// Lifecycle of one tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    Idle,
    Polling,
    /// The termination document was observed.
    Closed,
    /// The server ended the feed before the termination document arrived.
    TimedOut,
}

/// Everything a tracking session observed.
///
/// `docs` is keyed by document id, last entry wins. It includes the
/// termination document and any principal documents; verification discards
/// both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedChanges {
    pub termination_doc_id: String,
    pub docs: HashMap<String, ChangesEntry>,
    pub last_seq: SequenceToken,
    pub state: TrackerState,
    /// Completed long-poll rounds, or 1 for a continuous session.
    pub rounds: usize,
}

impl TrackedChanges {
    fn polling(termination_doc_id: &str) -> Self {
        Self {
            termination_doc_id: termination_doc_id.to_string(),
            state: TrackerState::Polling,
            ..Self::default()
        }
    }

    /// Record `entry`; returns true if it is the termination document.
    fn absorb(&mut self, entry: ChangesEntry) -> bool {
        let terminates = entry.id == self.termination_doc_id;
        self.last_seq = entry.seq.clone();
        self.docs.insert(entry.id.clone(), entry);
        terminates
    }

    /// Revision per document id, including the termination document.
    pub fn revisions(&self) -> HashMap<String, String> {
        self.docs
            .iter()
            .map(|(id, entry)| (id.clone(), entry.rev.clone()))
            .collect()
    }

    /// Ids of observed documents other than principal documents and the termination document.
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .docs
            .keys()
            .filter(|id| **id != self.termination_doc_id && !is_principal_doc(id))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.docs.contains_key(doc_id)
    }
}

impl User {
    /// One `_changes` round trip, parsed against the session's mode.
    pub async fn get_changes(&self, query: &ChangesQuery) -> Result<ChangesFeed, TestkitError> {
        let raw = self
            .client()
            .changes(self.db(), query, Some(self.credentials()))
            .await?;
        let feed = ChangesFeed::from_raw(raw, self.mode())?;
        if feed.is_empty() {
            warn!("{}: changes feed returned no entries", self.name());
        }
        debug!("{}: {} changes, last_seq {}", self.name(), feed.len(), feed.last_seq);
        Ok(feed)
    }

    /// Long-poll the feed from sequence 0 until `termination_doc_id` is observed.
    ///
    /// A failed round ends the session with [`TestkitError::TrackingInterrupted`]
    /// carrying what was observed so far. Malformed sequence tokens end it
    /// with the parse error.
    pub async fn start_longpoll_changes_tracking(
        &self,
        termination_doc_id: &str,
    ) -> Result<TrackedChanges, TestkitError> {
        let settings = self.session().settings().clone();
        let mut tracked = TrackedChanges::polling(termination_doc_id);
        info!(
            "{}: long-poll tracking until '{termination_doc_id}' arrives",
            self.name()
        );

        loop {
            let query = ChangesQuery::longpoll(tracked.last_seq.clone(), settings.longpoll_timeout);
            let raw = match self
                .client()
                .changes(self.db(), &query, Some(self.credentials()))
                .await
            {
                Ok(raw) => raw,
                Err(e) => return Err(self.interrupted(tracked, e.into())),
            };
            let feed = ChangesFeed::from_raw(raw, self.mode())?;
            tracked.rounds += 1;

            let duplicates = feed.duplicate_doc_ids();
            if !duplicates.is_empty() {
                warn!("{}: duplicate ids in one long-poll response: {duplicates:?}", self.name());
            }
            if feed.is_empty() {
                debug!("{}: long-poll round {} returned nothing", self.name(), tracked.rounds);
            }

            let last_seq = feed.last_seq;
            for entry in feed.entries {
                if tracked.absorb(entry) {
                    tracked.last_seq = last_seq;
                    tracked.state = TrackerState::Closed;
                    info!(
                        "{}: termination doc seen after {} rounds ({} docs)",
                        self.name(),
                        tracked.rounds,
                        tracked.docs.len()
                    );
                    return Ok(tracked);
                }
            }
            tracked.last_seq = last_seq;

            tokio::time::sleep(settings.poll_interval).await;
        }
    }

    /// Long-poll from `since` until a round delivers something other than
    /// principal documents, and return that round.
    ///
    /// Empty rounds (the server's long-poll timeout) and rounds holding only
    /// `_user/` documents are skipped, advancing `since` each time.
    pub async fn get_longpoll_changes(&self, since: SequenceToken) -> Result<ChangesFeed, TestkitError> {
        let timeout = self.session().settings().longpoll_timeout;
        let poll_interval = self.session().settings().poll_interval;
        let mut since = since;
        loop {
            let raw = self
                .client()
                .changes(self.db(), &ChangesQuery::longpoll(since.clone(), timeout), Some(self.credentials()))
                .await?;
            let feed = ChangesFeed::from_raw(raw, self.mode())?;
            if feed.entries.iter().any(|entry| !is_principal_doc(&entry.id)) {
                debug!("{}: long-poll round from {since} returned {} changes", self.name(), feed.len());
                return Ok(feed);
            }
            since = feed.last_seq;
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Stream the feed from sequence 0 until `termination_doc_id` is observed.
    pub async fn start_continuous_changes_tracking(
        &self,
        termination_doc_id: &str,
    ) -> Result<TrackedChanges, TestkitError> {
        let mut tracked = TrackedChanges::polling(termination_doc_id);
        tracked.rounds = 1;
        info!(
            "{}: continuous tracking until '{termination_doc_id}' arrives",
            self.name()
        );

        let query = ChangesQuery::continuous(SequenceToken::zero());
        let mut lines = match self
            .client()
            .changes_stream(self.db(), &query, Some(self.credentials()))
            .await
        {
            Ok(lines) => lines,
            Err(e) => return Err(self.interrupted(tracked, e.into())),
        };

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    warn!(
                        "{}: continuous feed closed before '{termination_doc_id}' arrived",
                        self.name()
                    );
                    tracked.state = TrackerState::TimedOut;
                    return Ok(tracked);
                }
                Err(e) => return Err(self.interrupted(tracked, e.into())),
            };

            match ChangesLine::parse(&line, self.mode())? {
                ChangesLine::Entry(entry) => {
                    if tracked.absorb(entry) {
                        // Dropping the reader closes the connection.
                        tracked.state = TrackerState::Closed;
                        info!(
                            "{}: termination doc seen ({} docs)",
                            self.name(),
                            tracked.docs.len()
                        );
                        return Ok(tracked);
                    }
                }
                ChangesLine::LastSeq(seq) => tracked.last_seq = seq,
                ChangesLine::Heartbeat => {}
            }
        }
    }

    fn interrupted(&self, tracked: TrackedChanges, source: TestkitError) -> TestkitError {
        warn!("{}: tracking interrupted: {source}", self.name());
        TestkitError::TrackingInterrupted {
            user: self.name().to_string(),
            partial: Box::new(tracked),
            source: Box::new(source),
        }
    }
}
