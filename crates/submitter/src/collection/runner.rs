use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::gateway::CollectionRepository;
use super::CollectionSubmission;
use crate::error::Result;
use crate::job::{CollectionJob, CollectionState, LogKind};
use crate::worker::stages::panic_message;
use crate::worker::{QueueWorker, SubmissionQueue};

/// A collection waiting for the collection worker.
#[derive(Debug, Clone)]
pub struct PendingCollection {
    pub job: Arc<CollectionJob>,
    pub submit_time: DateTime<Utc>,
    pub submission: CollectionSubmission,
}

impl PendingCollection {
    pub fn new(job: Arc<CollectionJob>, submission: CollectionSubmission) -> Self {
        Self {
            job,
            submit_time: Utc::now(),
            submission,
        }
    }
}

/// Publishes queued collections one at a time under the repository lock.
pub struct CollectionRunner {
    repo: Arc<CollectionRepository>,
    queue: SubmissionQueue<PendingCollection>,
    lock_wait: Duration,
}

impl CollectionRunner {
    pub fn new(
        repo: Arc<CollectionRepository>,
        queue: SubmissionQueue<PendingCollection>,
        lock_wait: Duration,
    ) -> Self {
        Self {
            repo,
            queue,
            lock_wait,
        }
    }

    /// Runs the whole collection pipeline for `pending`. Every failure ends
    /// up on the job's log.
    pub fn process(&self, pending: PendingCollection) {
        let job = Arc::clone(&pending.job);
        job.info("Picked up for processing");

        let span = tracing::info_span!("collection.submit", job_id = %job.id());
        let _entered = span.enter();

        match panic::catch_unwind(AssertUnwindSafe(|| self.submit(&pending))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::warn!("[{}] Collection processing failed: {}", job.id(), e);
                job.log_error(
                    Some(CollectionState::SubmitFailed),
                    format!("Failed to process submission: {}", e),
                    &e,
                );
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!("[{}] Collection processing panicked: {}", job.id(), message);
                job.log(
                    Some(CollectionState::SubmitFailed),
                    format!("Failed to process submission: {}", message),
                    LogKind::Error,
                );
            }
        }

        if job.state() == CollectionState::Submitted {
            job.log(Some(CollectionState::Completed), "Complete!", LogKind::Good);
        }
    }

    fn submit(&self, pending: &PendingCollection) -> Result<()> {
        let guard = self.repo.lock().lock_timeout(self.lock_wait)?;
        self.repo.submit(&guard, &pending.job, &pending.submission)
    }
}

impl QueueWorker for CollectionRunner {
    type Item = PendingCollection;

    fn queue(&self) -> &SubmissionQueue<PendingCollection> {
        &self.queue
    }

    fn process(&self, item: PendingCollection) {
        CollectionRunner::process(self, item)
    }
}
