use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{Job, JobState, Phase};

/// Jobs removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepStats {
    /// Removed after reaching a terminal state.
    pub done: u64,
    /// Removed while still in an intermediate state.
    pub stuck: u64,
}

impl SweepStats {
    pub fn total(&self) -> u64 {
        self.done + self.stuck
    }
}

/// In-memory index of every job the service knows about.
pub struct JobRegistry<S = JobState> {
    jobs: RwLock<HashMap<String, Arc<Job<S>>>>,
}

impl<S> Default for JobRegistry<S> {
    fn default() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

impl<S: Phase> JobRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a job with the same id was already tracked.
    pub fn track(&self, job: Arc<Job<S>>) -> bool {
        let mut jobs = self.write_jobs();
        if jobs.contains_key(job.id()) {
            log::warn!("Job {} is already tracked", job.id());
            return false;
        }
        jobs.insert(job.id().to_string(), job);
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<Job<S>>> {
        self.read_jobs().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Job<S>>> {
        self.write_jobs().remove(id)
    }

    /// All tracked jobs, most recently active first.
    pub fn all(&self) -> Vec<Arc<Job<S>>> {
        let mut jobs: Vec<Arc<Job<S>>> = self.read_jobs().values().cloned().collect();
        jobs.sort_by_key(|job| std::cmp::Reverse(job.last_activity()));
        jobs
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_jobs().is_empty()
    }

    /// Removes jobs whose last log entry is older than `max_age`.
    pub fn sweep(&self, max_age: Duration) -> SweepStats {
        self.sweep_at(Utc::now(), max_age)
    }

    pub fn sweep_at(&self, now: DateTime<Utc>, max_age: Duration) -> SweepStats {
        let mut stats = SweepStats::default();
        let mut jobs = self.write_jobs();

        jobs.retain(|id, job| {
            let expired = now
                .signed_duration_since(job.last_activity())
                .to_std()
                .map(|age| age > max_age)
                .unwrap_or(false);
            if !expired {
                return true;
            }

            if job.state().is_terminal() {
                stats.done += 1;
                log::debug!("Removing completed job {}", id);
            } else {
                stats.stuck += 1;
                log::warn!("Removing stuck job {} in state {}", id, job.state());
            }
            false
        });

        stats
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Job<S>>>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Job<S>>>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
