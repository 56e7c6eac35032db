use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info};

use super::queue::SubmissionQueue;
use crate::error::{Result, SubmitterError};

/// Handles items taken from its own queue, one at a time.
pub trait QueueWorker: Send + Sync + 'static {
    type Item: Send + 'static;

    fn queue(&self) -> &SubmissionQueue<Self::Item>;

    /// Must not panic or block past the item's own work.
    fn process(&self, item: Self::Item);
}

/// A single worker thread that drains a submission queue.
pub struct SubmissionProcessor {
    name: &'static str,
    worker: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl SubmissionProcessor {
    /// Starts the worker thread. `poll_wait` bounds each dequeue so the
    /// shutdown flag is rechecked regularly.
    pub fn start<W: QueueWorker>(
        name: &'static str,
        runner: Arc<W>,
        poll_wait: Duration,
    ) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(name, runner, shutdown_flag, poll_wait))
            .map_err(|e| SubmitterError::SpawnThread { name, source: e })?;

        info!("{} started", name);

        Ok(Self {
            name,
            worker: Some(worker),
            shutdown,
        })
    }

    pub fn shutdown(&self) {
        info!("Shutting down {}...", self.name);
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Waits for the worker to finish its current item and exit.
    pub fn wait(mut self) {
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.join() {
                error!("{} panicked: {:?}", self.name, e);
            }
        }
        info!("{} stopped", self.name);
    }
}

fn run_worker<W: QueueWorker>(
    name: &str,
    runner: Arc<W>,
    shutdown: Arc<AtomicBool>,
    poll_wait: Duration,
) {
    debug!("{} running", name);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("{} received shutdown signal", name);
            break;
        }

        let Some(item) = runner.queue().poll(poll_wait) else {
            continue;
        };
        runner.process(item);
    }

    debug!("{} exiting", name);
}
