//! Background refresh of the content repository from its remote.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{broadcast, Notify};

use super::gateway::{ContentRepository, RefreshOutcome};
use crate::error::{Result, SubmitterError};

/// Periodically pulls the default branch, deferring to active publishes.
pub struct RefreshScheduler {
    repo: Arc<ContentRepository>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl RefreshScheduler {
    pub fn new(repo: Arc<ContentRepository>, interval: Duration) -> Self {
        Self {
            repo,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Starts the refresh loop on its own thread.
    /// `trigger_rx` requests an immediate refresh.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> Result<JoinHandle<()>> {
        let repo = Arc::clone(&self.repo);
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        let interval = self.interval;

        std::thread::Builder::new()
            .name("content-refresh".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::error!("Failed to start content refresh runtime: {}", e);
                        return;
                    }
                };

                rt.block_on(async {
                    let mut timer = tokio::time::interval(interval);
                    timer.tick().await; // skip immediate first tick

                    loop {
                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        tokio::select! {
                            _ = timer.tick() => {},
                            Ok(()) = trigger_rx.recv() => {
                                log::info!("Manual content refresh triggered");
                            },
                            _ = wake.notified() => {},
                        }

                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        match repo.refresh() {
                            Ok(RefreshOutcome::Updated { revision }) => {
                                log::info!("Content repository refreshed to {}", revision);
                            }
                            Ok(RefreshOutcome::Skipped) => {
                                log::info!("Content repository locked, refresh skipped");
                            }
                            Ok(RefreshOutcome::Unchanged) => {}
                            Err(e) => log::error!("Content repository refresh failed: {}", e),
                        }
                    }
                });

                log::debug!("Content refresh stopped");
            })
            .map_err(|e| SubmitterError::SpawnThread {
                name: "content-refresh",
                source: e,
            })
    }

    /// Signals the refresh loop to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}
