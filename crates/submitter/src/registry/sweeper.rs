use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};

use super::store::{JobRegistry, SweepStats};
use crate::error::{Result, SubmitterError};
use crate::job::Phase;

#[derive(Default)]
struct Counters {
    done: AtomicU64,
    stuck: AtomicU64,
}

/// Periodically evicts idle jobs from the registry.
pub struct Sweeper {
    counters: Arc<Counters>,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn start<S: Phase>(
        registry: Arc<JobRegistry<S>>,
        interval: Duration,
        max_age: Duration,
    ) -> Result<Self> {
        let counters = Arc::new(Counters::default());
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread_counters = Arc::clone(&counters);
        let worker = thread::Builder::new()
            .name("job-sweeper".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let swept = registry.sweep(max_age);
                            if swept.total() > 0 {
                                log::info!(
                                    "Swept {} finished and {} stuck jobs",
                                    swept.done,
                                    swept.stuck
                                );
                            }
                            thread_counters.done.fetch_add(swept.done, Ordering::Relaxed);
                            thread_counters.stuck.fetch_add(swept.stuck, Ordering::Relaxed);
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                log::debug!("Job sweeper stopped");
            })
            .map_err(|e| SubmitterError::SpawnThread {
                name: "job-sweeper",
                source: e,
            })?;

        Ok(Self {
            counters,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })
    }

    /// Cumulative removals since start.
    pub fn stats(&self) -> SweepStats {
        SweepStats {
            done: self.counters.done.load(Ordering::Relaxed),
            stuck: self.counters.stuck.load(Ordering::Relaxed),
        }
    }

    pub fn stop(&mut self) {
        // dropping the sender wakes the loop
        self.stop_tx.take();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.join() {
                log::error!("Job sweeper panicked: {:?}", e);
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
