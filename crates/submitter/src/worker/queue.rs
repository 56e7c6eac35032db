use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use super::pending::PendingSubmission;

/// Bounded FIFO of submissions waiting for their next stage.
///
/// Admission never blocks; a full queue rejects the submission and hands it
/// back to the caller.
pub struct SubmissionQueue<T = PendingSubmission> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> Clone for SubmissionQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> SubmissionQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Appends `submission` to the tail, or returns it if the queue is full.
    pub fn offer(&self, submission: T) -> Result<(), T> {
        match self.tx.try_send(submission) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(submission)) | Err(TrySendError::Disconnected(submission)) => {
                Err(submission)
            }
        }
    }

    /// Returns false when the queue is full.
    pub fn add(&self, submission: T) -> bool {
        self.offer(submission).is_ok()
    }

    /// Waits up to `timeout` for the next submission.
    pub fn poll(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(submission) => Some(submission),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
