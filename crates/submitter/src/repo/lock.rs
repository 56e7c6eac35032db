//! Exclusive access to the shared working copy.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LockError {
    #[error("Already locked")]
    AlreadyLocked,

    #[error("Timed out after {0:?} waiting for the content repository lock")]
    Timeout(Duration),

    #[error("Lock guard belongs to a different repository")]
    ForeignGuard,
}

/// Non-reentrant lock over the working copy.
///
/// Held by the publish path for the whole checkout → commit → push →
/// checkout-back sequence, and by the background refresh while it pulls.
#[derive(Debug, Default)]
pub struct RepoLock {
    held: Mutex<bool>,
    released: Condvar,
}

/// Proof that the lock is held. Releases it on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct RepoLockGuard<'a> {
    lock: &'a RepoLock,
}

impl RepoLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock, failing immediately if it is held.
    pub fn lock(&self) -> Result<RepoLockGuard<'_>, LockError> {
        let mut held = self.state();
        if *held {
            return Err(LockError::AlreadyLocked);
        }
        *held = true;
        Ok(RepoLockGuard { lock: self })
    }

    /// Acquires the lock if it is free; `None` means skip this round.
    pub fn try_lock(&self) -> Option<RepoLockGuard<'_>> {
        self.lock().ok()
    }

    /// Waits up to `timeout` for the lock to be released, then acquires it.
    pub fn lock_timeout(&self, timeout: Duration) -> Result<RepoLockGuard<'_>, LockError> {
        let deadline = Instant::now() + timeout;
        let mut held = self.state();

        while *held {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LockError::Timeout(timeout));
            }
            held = match self.released.wait_timeout(held, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }

        *held = true;
        Ok(RepoLockGuard { lock: self })
    }

    pub fn is_locked(&self) -> bool {
        *self.state()
    }

    fn state(&self) -> MutexGuard<'_, bool> {
        match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Repository lock state was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn release(&self) {
        *self.state() = false;
        self.released.notify_one();
    }
}

impl RepoLockGuard<'_> {
    /// Whether this guard was issued by `lock`.
    pub fn guards(&self, lock: &RepoLock) -> bool {
        std::ptr::eq(self.lock, lock)
    }
}

impl Drop for RepoLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
