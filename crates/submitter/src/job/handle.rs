use std::error::Error as StdError;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use super::content_type::ContentType;
use super::entry::LogEntry;
use super::state::{CollectionState, JobState, LogKind, Phase};

/// Capacity of the live-tail channel. Older unconsumed entries are dropped
/// once it is full; `full_log` stays complete.
pub const LOG_EVENT_CAPACITY: usize = 20;

/// A tracked submission: identity, current state and append-only log.
///
/// All mutation goes through the log-append methods, which update state and
/// log together under one lock and offer the new entry to the live-tail
/// channel read by [`Job::poll_log`].
pub struct Job<S = JobState> {
    id: String,
    forced_type: Option<ContentType>,
    inner: Mutex<JobInner<S>>,
    events_tx: Sender<LogEntry<S>>,
    events_rx: Receiver<LogEntry<S>>,
}

/// A job publishing a collection.
pub type CollectionJob = Job<CollectionState>;

struct JobInner<S> {
    state: S,
    log: Vec<LogEntry<S>>,
    done: bool,
}

/// Serialized view of a job, used for audit snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot<S = JobState> {
    pub id: String,
    pub state: S,
    pub log: Vec<LogEntry<S>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_type: Option<ContentType>,
}

impl Job {
    /// Creates a job with a freshly generated identifier.
    pub fn new(forced_type: Option<ContentType>) -> Self {
        Self::with_id(generate_id(), forced_type)
    }

    /// Creates a job with the given identifier.
    pub fn with_id(id: impl Into<String>, forced_type: Option<ContentType>) -> Self {
        let job = Self::create(id.into(), forced_type);
        if let Some(forced) = forced_type {
            job.info(format!("Content type is forced to {}", forced));
        }
        job
    }
}

impl Job<CollectionState> {
    /// Creates a collection job with a freshly generated identifier.
    pub fn collection() -> Self {
        Self::create(generate_id(), None)
    }

    pub fn collection_with_id(id: impl Into<String>) -> Self {
        Self::create(id.into(), None)
    }
}

impl<S: Phase> Job<S> {
    fn create(id: String, forced_type: Option<ContentType>) -> Self {
        let (events_tx, events_rx) = bounded(LOG_EVENT_CAPACITY);
        let job = Self {
            id,
            forced_type,
            inner: Mutex::new(JobInner {
                state: S::INITIAL,
                log: Vec::new(),
                done: false,
            }),
            events_tx,
            events_rx,
        };

        job.info(format!("Job created with ID {}", job.id));
        job
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn forced_type(&self) -> Option<ContentType> {
        self.forced_type
    }

    pub fn state(&self) -> S {
        self.lock_inner().state
    }

    /// Returns true once a poller has observed a terminal state.
    pub fn is_done(&self) -> bool {
        self.lock_inner().done
    }

    /// Timestamp of the most recent log entry.
    pub fn last_activity(&self) -> DateTime<Utc> {
        let inner = self.lock_inner();
        inner
            .log
            .last()
            .map(|entry| entry.time)
            .unwrap_or_else(Utc::now)
    }

    /// Appends an entry, moving to `state` when one is given.
    pub fn log(&self, state: Option<S>, message: impl Into<String>, kind: LogKind) {
        let mut inner = self.lock_inner();
        let next = state.unwrap_or(inner.state);
        let entry = LogEntry::new(next, message.into(), kind);
        self.append(&mut inner, entry);
    }

    /// Appends an error entry carrying the failure that caused it.
    pub fn log_error(
        &self,
        state: Option<S>,
        message: impl Into<String>,
        error: &dyn StdError,
    ) {
        let mut inner = self.lock_inner();
        let next = state.unwrap_or(inner.state);
        let entry = LogEntry::with_error(next, message.into(), error);
        self.append(&mut inner, entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(None, message, LogKind::Info);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(None, message, LogKind::Warn);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(None, message, LogKind::Error);
    }

    /// Moves to `state` with an informational entry.
    pub fn transition(&self, state: S, message: impl Into<String>) {
        self.log(Some(state), message, LogKind::Info);
    }

    /// Waits up to `timeout` for a new entry, then drains whatever else is
    /// queued without blocking.
    ///
    /// Delivery is at-most-once: entries dropped on overflow, or taken by
    /// another poller, are only visible through [`Job::full_log`].
    pub fn poll_log(&self, timeout: Duration) -> Vec<LogEntry<S>> {
        let mut polled = Vec::new();
        match self.events_rx.recv_timeout(timeout) {
            Ok(head) => {
                polled.push(head);
                polled.extend(self.events_rx.try_iter());
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }

        let mut inner = self.lock_inner();
        if !inner.done && inner.state.is_terminal() {
            inner.done = true;
        }

        polled
    }

    /// The complete log, oldest first.
    pub fn full_log(&self) -> Vec<LogEntry<S>> {
        self.lock_inner().log.clone()
    }

    pub fn snapshot(&self) -> JobSnapshot<S> {
        let inner = self.lock_inner();
        JobSnapshot {
            id: self.id.clone(),
            state: inner.state,
            log: inner.log.clone(),
            forced_type: self.forced_type,
        }
    }

    fn append(&self, inner: &mut JobInner<S>, entry: LogEntry<S>) {
        if !inner.state.can_transition_to(entry.state) {
            log::warn!(
                "Job {} moved from {} to {} outside the state graph",
                self.id,
                inner.state,
                entry.state
            );
        }

        log::info!("{} {}: {}", self.id, entry.state, entry);

        inner.state = entry.state;
        inner.log.push(entry.clone());
        self.offer(entry);
    }

    fn offer(&self, entry: LogEntry<S>) {
        match self.events_tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                // make room by discarding the oldest unread notification
                let _ = self.events_rx.try_recv();
                let _ = self.events_tx.try_send(entry);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, JobInner<S>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job {} lock was poisoned, recovering", self.id);
                poisoned.into_inner()
            }
        }
    }
}

impl<S: Phase> std::fmt::Debug for Job<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("forced_type", &self.forced_type)
            .finish_non_exhaustive()
    }
}

/// Short random identifier; also used in branch names.
fn generate_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
