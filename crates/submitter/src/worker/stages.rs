//! One pipeline stage per dequeue, chosen by the job's current state.

use std::any::Any;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::pending::PendingSubmission;
use super::processor::QueueWorker;
use super::queue::SubmissionQueue;
use super::snapshot::JobSnapshotWriter;
use crate::error::{Result, SubmitterError};
use crate::job::{Job, JobState, LogKind};
use crate::repo::ContentRepository;
use crate::virus::VirusScanner;

/// Runs the stage matching a submission's state, then either requeues it or
/// cleans up its files.
pub struct StageRunner {
    repo: Arc<ContentRepository>,
    scanner: Arc<dyn VirusScanner>,
    queue: SubmissionQueue,
    snapshots: JobSnapshotWriter,
    lock_wait: Duration,
}

impl StageRunner {
    pub fn new(
        repo: Arc<ContentRepository>,
        scanner: Arc<dyn VirusScanner>,
        queue: SubmissionQueue,
        snapshots: JobSnapshotWriter,
        lock_wait: Duration,
    ) -> Self {
        Self {
            repo,
            scanner,
            queue,
            snapshots,
            lock_wait,
        }
    }

    pub fn queue(&self) -> &SubmissionQueue {
        &self.queue
    }

    /// Processes one stage of `submission`. Never panics and never returns
    /// an error: every failure ends up on the job's log.
    pub fn process(&self, submission: PendingSubmission) {
        let job = Arc::clone(&submission.job);
        job.info("Picked up for processing");

        let span = tracing::info_span!(
            "submission.stage",
            job_id = %job.id(),
            state = %job.state()
        );
        let _entered = span.enter();

        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&submission))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("[{}] Stage failed: {}", job.id(), e);
                job.log_error(
                    Some(JobState::Failed),
                    format!("Failed to process submission: {}", e),
                    &e,
                );
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!("[{}] Stage panicked: {}", job.id(), message);
                job.log(
                    Some(JobState::Failed),
                    format!("Failed to process submission: {}", message),
                    LogKind::Error,
                );
            }
        }

        self.snapshots.write_logged(&submission);

        if job.state().is_terminal() {
            submission.cleanup();
            return;
        }

        if let Err(rejected) = self.queue.offer(submission) {
            rejected.job.log(
                Some(JobState::Failed),
                "Submission queue is full, processing stopped",
                LogKind::Error,
            );
            rejected.cleanup();
            self.snapshots.write_logged(&rejected);
        }
    }

    fn dispatch(&self, submission: &PendingSubmission) -> Result<()> {
        let job = submission.job.as_ref();
        match job.state() {
            JobState::Created => self.virus_scan(job, &submission.files),
            JobState::VirusFree => {
                self.content_scan(job, &submission.files);
                Ok(())
            }
            JobState::Scanned => self.index(job, &submission.files),
            other => {
                job.log(
                    Some(JobState::Failed),
                    format!("Invalid processing state {}", other),
                    LogKind::Error,
                );
                Ok(())
            }
        }
    }

    fn virus_scan(&self, job: &Job, files: &[PathBuf]) -> Result<()> {
        if files.is_empty() {
            return Err(SubmitterError::NoPaths);
        }
        let verdict = self.scanner.scan(job, files);
        log::debug!("[{}] Malware scan verdict {:?}", job.id(), verdict);
        Ok(())
    }

    fn content_scan(&self, job: &Job, files: &[PathBuf]) {
        if let Some(forced) = job.forced_type() {
            job.transition(
                JobState::Scanned,
                format!("Content scan skipped, forcing type to {}", forced),
            );
            return;
        }

        if let Err(e) = self.repo.scan(job, files) {
            log::warn!("[{}] Content scan failed: {}", job.id(), e);
            job.log_error(Some(JobState::ScanFailed), "Scanning failed", &e);
        }
    }

    fn index(&self, job: &Job, files: &[PathBuf]) -> Result<()> {
        let guard = self.repo.lock().lock_timeout(self.lock_wait)?;
        let submitted = self.repo.submit(&guard, job, files);
        drop(guard);

        let results = match submitted {
            Ok(results) => results,
            Err(e) => {
                job.log_error(
                    Some(JobState::Failed),
                    format!("Failed to index or submit content: {}", e),
                    &e,
                );
                return Ok(());
            }
        };

        let state = job.state();
        if state.is_terminal() {
            return Ok(());
        }

        if results.is_empty() {
            job.log(Some(JobState::Failed), "No content was added", LogKind::Error);
        } else if state == JobState::Submitted {
            job.log(Some(JobState::Completed), "Complete!", LogKind::Good);
        } else {
            job.log(
                Some(JobState::Failed),
                format!("Submission stopped in state {}", state),
                LogKind::Error,
            );
        }
        Ok(())
    }
}

impl QueueWorker for StageRunner {
    type Item = PendingSubmission;

    fn queue(&self) -> &SubmissionQueue {
        &self.queue
    }

    fn process(&self, item: PendingSubmission) {
        StageRunner::process(self, item)
    }
}

pub(crate) fn remove_files(job_id: &str, files: &[PathBuf]) {
    for file in files {
        match fs::remove_file(file) {
            Ok(()) => log::debug!("[{}] Removed {}", job_id, file.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to delete file {} for job {}: {}",
                file.display(),
                job_id,
                e
            ),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
