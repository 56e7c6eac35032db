//! Scan and publish operations against the shared content repository.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::lock::{LockError, RepoLock, RepoLockGuard};
use super::view::ContentView;
use crate::engine::{ContentEngine, IndexEvent, IndexResult, ScanEvent, ScanResult};
use crate::error::{Result, SubmitterError};
use crate::git::{CommitIdentity, GitError, VersionControl};
use crate::github::{PullRequestRequest, PullRequestService};
use crate::job::{ContentType, Job, JobState, LogKind};
use crate::sanitize::{file_name, slug};

/// Publishing settings for the content repository.
#[derive(Debug, Clone)]
pub struct RepositorySettings {
    /// Path pattern staged after indexing.
    pub content_path: String,
    /// Path pattern staged after a collection checkin.
    pub collections_path: String,
    pub author: CommitIdentity,
    /// Base URL of the submission page, linked from pull requests.
    pub submission_url: String,
    pub pull_request_labels: Vec<String>,
}

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RefreshOutcome {
    /// The repository was busy.
    Skipped,
    Unchanged,
    Updated { revision: String },
}

/// The shared working copy, its content view and the collaborators that
/// scan, index and publish into it.
pub struct ContentRepository {
    vcs: Arc<dyn VersionControl>,
    pull_requests: Arc<dyn PullRequestService>,
    engine: Arc<dyn ContentEngine>,
    view: RwLock<Arc<ContentView>>,
    lock: RepoLock,
    settings: RepositorySettings,
}

impl ContentRepository {
    /// Wraps a checked-out working copy and loads its initial content view.
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        pull_requests: Arc<dyn PullRequestService>,
        engine: Arc<dyn ContentEngine>,
        settings: RepositorySettings,
    ) -> Result<Self> {
        let revision = vcs.head_revision(vcs.default_branch())?;
        let view = ContentView::load(vcs.root(), &settings.content_path, revision);

        log::info!("Content repo started at {}", vcs.root().display());

        Ok(Self {
            vcs,
            pull_requests,
            engine,
            view: RwLock::new(Arc::new(view)),
            lock: RepoLock::new(),
            settings,
        })
    }

    pub fn lock(&self) -> &RepoLock {
        &self.lock
    }

    pub fn settings(&self) -> &RepositorySettings {
        &self.settings
    }

    /// Root of the working copy.
    pub fn root(&self) -> &Path {
        self.vcs.root()
    }

    pub(crate) fn vcs(&self) -> &dyn VersionControl {
        self.vcs.as_ref()
    }

    pub(crate) fn pull_requests(&self) -> &dyn PullRequestService {
        self.pull_requests.as_ref()
    }

    /// The current content view. Callers keep the snapshot they were given
    /// even if a refresh publishes a newer one.
    pub fn view(&self) -> Arc<ContentView> {
        match self.view.read() {
            Ok(view) => Arc::clone(&view),
            Err(poisoned) => {
                log::warn!("Content view lock was poisoned, recovering");
                Arc::clone(&poisoned.into_inner())
            }
        }
    }

    fn publish_view(&self, view: ContentView) {
        let view = Arc::new(view);
        match self.view.write() {
            Ok(mut current) => *current = view,
            Err(poisoned) => {
                log::warn!("Content view lock was poisoned, recovering");
                *poisoned.into_inner() = view;
            }
        }
    }

    /// Classifies `paths` and returns the newly recognised content.
    ///
    /// Leaves the job in `SCANNED` when something new was found, otherwise
    /// in `UNKNOWN_CONTENT` (nothing recognisable at all) or `SCAN_FAILED`.
    pub fn scan(&self, job: &Job, paths: &[PathBuf]) -> Result<Vec<ScanResult>> {
        if paths.is_empty() {
            return Err(SubmitterError::NoPaths);
        }

        let view = self.view();
        job.transition(JobState::Scanning, "Begin scanning content");

        let mut found = Vec::new();
        let mut scanned = 0usize;
        let mut unrecognised = 0usize;

        self.engine.scan(&view, paths, &mut |event| match event {
            ScanEvent::Starting { found: count } => {
                log::info!("[{}] Start scanning {} files", job.id(), count);
            }
            ScanEvent::Progress { scanned: done, total, .. } => {
                log::info!("[{}] Scanned {} of {}", job.id(), done, total);
            }
            ScanEvent::Scanned(result) => {
                scanned += 1;
                let name = file_name(&result.path);
                if let Some(failure) = &result.failure {
                    job.error(format!("Error scanning file {}: {}", name, failure));
                } else if result.known {
                    job.warn(format!("No new content found in file {}", name));
                } else if result.content_type == ContentType::Unknown {
                    unrecognised += 1;
                    job.error(format!("No recognisable content found in file {}", name));
                } else {
                    job.info(format!("Found a {} in file {}", result.content_type, name));
                    found.push(result);
                }
            }
            ScanEvent::Completed { scanned: count } => {
                log::info!("[{}] Completed scanning {}", job.id(), count);
            }
        })?;

        if !found.is_empty() {
            job.transition(JobState::Scanned, "Scan completed");
        } else if scanned > 0 && unrecognised == scanned {
            job.log(
                Some(JobState::UnknownContent),
                "No recognisable content found",
                LogKind::Error,
            );
        } else {
            job.log(Some(JobState::ScanFailed), "No new content found", LogKind::Error);
        }

        Ok(found)
    }

    /// Indexes `paths` on a fresh branch and opens a pull request for it.
    ///
    /// Indexing and publishing failures are recorded on the job
    /// (`INDEX_FAILED`, `SUBMIT_FAILED`) rather than returned. The working
    /// copy is back on the default branch when this returns, whatever the
    /// outcome.
    pub fn submit(
        &self,
        guard: &RepoLockGuard<'_>,
        job: &Job,
        paths: &[PathBuf],
    ) -> Result<Vec<IndexResult>> {
        if !guard.guards(&self.lock) {
            return Err(LockError::ForeignGuard.into());
        }
        let first = paths.first().ok_or(SubmitterError::NoPaths)?;

        let branch = format!("{}_{}", slug(&file_name(first)), job.id());
        let view = self.view();

        let _restore = BranchRestore::new(self.vcs.as_ref());

        job.info(format!("Checkout content data branch {}", branch));
        self.vcs.checkout(&branch, true)?;

        job.transition(JobState::Indexing, "Begin indexing content");

        let mut results = Vec::new();
        let indexed = self.engine.index(&view, paths, job.forced_type(), &mut |event| {
            match event {
                IndexEvent::Starting { found } => {
                    log::info!("[{}] Start indexing {} files", job.id(), found);
                }
                IndexEvent::Progress { indexed, total, .. } => {
                    log::info!("[{}] Indexed {} of {}", job.id(), indexed, total);
                }
                IndexEvent::Indexed {
                    path,
                    result: Some(result),
                    ..
                } => {
                    log::debug!("[{}] Indexed {}", job.id(), path.display());
                    job.info(format!(
                        "Indexed {}: {} by {}",
                        result.content_type, result.name, result.author
                    ));
                    results.push(result);
                }
                IndexEvent::Indexed {
                    path,
                    result: None,
                    log: lines,
                } => {
                    job.info(format!("Failed to index content in file {}", file_name(&path)));
                    log::warn!("[{}] {}", job.id(), lines.join("; "));
                }
                IndexEvent::Completed { indexed, errors } => {
                    job.info("Indexing complete");
                    log::info!(
                        "[{}] Completed indexing {} files with {} errors",
                        job.id(),
                        indexed,
                        errors
                    );
                }
            }
        });

        if let Err(e) = indexed {
            log::warn!("[{}] Content index failed: {}", job.id(), e);
            job.log_error(
                Some(JobState::IndexFailed),
                format!("Content indexing failed: {}", e),
                &e,
            );
            return Ok(results);
        }

        if results.is_empty() {
            return Ok(results);
        }

        job.transition(
            JobState::Submitting,
            "Submitting content and opening pull request",
        );
        match self.publish(job, &branch, &results) {
            Ok(_) => job.transition(JobState::Submitted, "Submission completed"),
            Err(e) => job.log_error(
                Some(JobState::SubmitFailed),
                format!("Submission failed: {}", e),
                &e,
            ),
        }

        Ok(results)
    }

    /// Commits the indexed content, pushes `branch` and opens a pull request.
    fn publish(&self, job: &Job, branch: &str, results: &[IndexResult]) -> Result<String> {
        let status = self.vcs.status()?;
        if status.is_clean() {
            return Err(GitError::NothingToCommit.into());
        }

        log::info!("[{}] Adding files: {}", job.id(), status.untracked.join(", "));
        self.vcs.add(&self.settings.content_path)?;

        job.info("Commit changes to content data");
        let commit = self
            .vcs
            .commit(&commit_message(results), &self.settings.author)?;
        log::info!("[{}] Committed {}", job.id(), commit);

        job.info("Push content data changes ...");
        self.vcs.push(branch)?;
        job.info("Content data changes pushed");

        job.info("Creating Pull Request for content data change");
        let request = PullRequestRequest {
            title: branch.to_string(),
            body: pull_request_body(results, &self.settings.submission_url, job.id()),
            head: branch.to_string(),
            base: self.vcs.default_branch().to_string(),
            labels: self.settings.pull_request_labels.clone(),
        };
        let url = self.pull_requests.create_pull_request(&request)?;
        job.info(format!("Created Pull Request at {}", url));

        Ok(url)
    }

    /// Pulls the default branch and republishes the content view if it moved.
    ///
    /// Skipped without waiting when the repository is locked.
    pub fn refresh(&self) -> Result<RefreshOutcome> {
        let Some(_guard) = self.lock.try_lock() else {
            log::debug!("Content repository busy, skipping refresh");
            return Ok(RefreshOutcome::Skipped);
        };

        let branch = self.vcs.default_branch();
        let before = self.vcs.head_revision(branch)?;
        self.vcs.pull()?;
        let after = self.vcs.head_revision(branch)?;

        if before == after {
            return Ok(RefreshOutcome::Unchanged);
        }

        log::info!("Content repository moved from {} to {}", before, after);
        let view = ContentView::load(self.vcs.root(), &self.settings.content_path, after.clone());
        self.publish_view(view);

        Ok(RefreshOutcome::Updated { revision: after })
    }
}

/// Returns the working copy to the default branch when dropped.
pub(crate) struct BranchRestore<'a> {
    vcs: &'a dyn VersionControl,
}

impl<'a> BranchRestore<'a> {
    pub(crate) fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs }
    }
}

impl Drop for BranchRestore<'_> {
    fn drop(&mut self) {
        let default_branch = self.vcs.default_branch();
        if let Err(e) = self.vcs.discard_changes() {
            log::warn!("Failed to discard working copy changes: {}", e);
        }
        if let Err(e) = self.vcs.checkout(default_branch, false) {
            log::error!(
                "Failed to return working copy to branch {}: {}",
                default_branch,
                e
            );
        }
    }
}

/// `Add content [UT MAP] DM-Deck16, [UT SKIN] Soldier`
pub fn commit_message(results: &[IndexResult]) -> String {
    let items: Vec<String> = results.iter().map(ToString::to_string).collect();
    format!("Add content {}", items.join(", "))
}

pub fn pull_request_body(results: &[IndexResult], submission_url: &str, job_id: &str) -> String {
    let items: Vec<String> = results.iter().map(ToString::to_string).collect();
    format!(
        "Add content: \n - {}\n\n---\nSubmission log: {}/#{}",
        items.join("\n - "),
        submission_url.trim_end_matches('/'),
        job_id
    )
}
