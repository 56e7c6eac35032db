//! Checkin, archive, sync and publish of a collection on its own branch.

use std::sync::Arc;

use super::image::{decode_data_uri, TitleImage};
use super::{CollectionManifest, CollectionSubmission};
use crate::engine::{CollectionCurator, CurateEvent};
use crate::error::Result;
use crate::git::GitError;
use crate::github::PullRequestRequest;
use crate::job::{CollectionJob, CollectionState, LogEntry};
use crate::repo::gateway::BranchRestore;
use crate::repo::{ContentRepository, LockError, RepoLock, RepoLockGuard};
use crate::sanitize::slug;

/// Publishes collections into the shared content repository.
pub struct CollectionRepository {
    repo: Arc<ContentRepository>,
    curator: Arc<dyn CollectionCurator>,
}

impl CollectionRepository {
    pub fn new(repo: Arc<ContentRepository>, curator: Arc<dyn CollectionCurator>) -> Self {
        Self { repo, curator }
    }

    /// The content repository's lock; collections and uploads share it.
    pub fn lock(&self) -> &RepoLock {
        self.repo.lock()
    }

    /// Checks in, archives and syncs `submission` on a fresh branch, then
    /// opens a pull request for it.
    ///
    /// Failures are recorded on the job (`CHECKIN_FAILED`, `ARCHIVE_FAILED`,
    /// `SYNC_FAILED`, `SUBMIT_FAILED`); only a guard for another lock is
    /// returned as an error. The working copy is back on the default branch
    /// when this returns.
    pub fn submit(
        &self,
        guard: &RepoLockGuard<'_>,
        job: &CollectionJob,
        submission: &CollectionSubmission,
    ) -> Result<()> {
        if !guard.guards(self.repo.lock()) {
            return Err(LockError::ForeignGuard.into());
        }

        let branch = format!("collection_{}_{}", slug(&submission.title), job.id());
        let _restore = BranchRestore::new(self.repo.vcs());

        if let Err(e) = self.curate(job, &branch, submission) {
            log::error!("[{}] Collection submission failed: {}", job.id(), e);
            job.log_error(
                Some(CollectionState::SubmitFailed),
                format!("Submission failed: {}", e),
                &e,
            );
        }

        Ok(())
    }

    fn curate(
        &self,
        job: &CollectionJob,
        branch: &str,
        submission: &CollectionSubmission,
    ) -> Result<()> {
        job.info(format!("Checkout content data branch {}", branch));
        self.repo.vcs().checkout(branch, true)?;

        let mut manifest = CollectionManifest::from_submission(submission)?;
        let image = match submission.image.as_deref().map(decode_data_uri).transpose()? {
            Some(Some(data)) => Some(TitleImage::write(&data)?),
            _ => None,
        };
        if let Some(image) = &image {
            manifest.title_image = Some(image.file_name());
        }

        let view = self.repo.view();
        let mut sink = |event: CurateEvent| match event {
            CurateEvent::Log { message } => job.info(message),
            CurateEvent::Completed => log::debug!("[{}] Curator step completed", job.id()),
        };

        job.transition(CollectionState::CheckingIn, "Initial collection checkin");
        let checked_in = self.curator.checkin(
            &view,
            &manifest,
            image.as_ref().map(TitleImage::path),
            &mut sink,
        );
        drop(image);
        if let Err(e) = checked_in {
            job.log_error(
                Some(CollectionState::CheckinFailed),
                format!("Collection checkin failed: {}", e),
                &e,
            );
            return Ok(());
        }
        job.transition(CollectionState::CheckedIn, "Collection checked in");

        job.transition(CollectionState::Archiving, "Creating collection archive");
        if let Err(e) = self.curator.archive(&view, &manifest, &mut sink) {
            job.log_error(
                Some(CollectionState::ArchiveFailed),
                format!("Collection archive failed: {}", e),
                &e,
            );
            return Ok(());
        }
        job.transition(CollectionState::Archived, "Collection archive created");

        job.transition(CollectionState::Syncing, "Syncing collection archive");
        if let Err(e) = self.curator.sync(&view, &manifest, &mut sink) {
            job.log_error(
                Some(CollectionState::SyncFailed),
                format!("Collection sync failed: {}", e),
                &e,
            );
            return Ok(());
        }
        job.transition(CollectionState::Synced, "Collection archive synced");

        job.transition(
            CollectionState::Submitting,
            "Submitting changes and opening pull request",
        );
        self.publish(job, branch, &manifest)?;
        job.transition(CollectionState::Submitted, "Submission completed");

        Ok(())
    }

    fn publish(&self, job: &CollectionJob, branch: &str, manifest: &CollectionManifest) -> Result<String> {
        let vcs = self.repo.vcs();
        let settings = self.repo.settings();

        let status = vcs.status()?;
        if status.is_clean() {
            return Err(GitError::NothingToCommit.into());
        }

        log::info!("[{}] Adding files: {}", job.id(), status.untracked.join(", "));
        vcs.add(&settings.collections_path)?;

        let title = format!("Add collection {}", manifest.title);
        job.info("Commit changes to content data");
        let commit = vcs.commit(&title, &settings.author)?;
        log::info!("[{}] Committed {}", job.id(), commit);

        job.info("Push content data changes ...");
        vcs.push(branch)?;
        job.info("Content data changes pushed");

        job.info("Creating Pull Request for content data change");
        let request = PullRequestRequest {
            title,
            body: collection_pull_request_body(
                manifest,
                &job.full_log(),
                &settings.submission_url,
                job.id(),
            ),
            head: branch.to_string(),
            base: vcs.default_branch().to_string(),
            labels: settings.pull_request_labels.clone(),
        };
        let url = self.repo.pull_requests().create_pull_request(&request)?;
        job.info(format!("Created Pull Request at {}", url));

        Ok(url)
    }
}

/// Pull request body naming the collection, with the job log so far as
/// `[I 0.25s] message` lines timed from the first entry.
pub fn collection_pull_request_body<S>(
    manifest: &CollectionManifest,
    log: &[LogEntry<S>],
    submission_url: &str,
    job_id: &str,
) -> String {
    let start = log.first().map(|entry| entry.time);
    let lines: Vec<String> = log
        .iter()
        .map(|entry| {
            let elapsed = start
                .map(|start| (entry.time - start).num_milliseconds() as f64 / 1000.0)
                .unwrap_or_default();
            let kind = entry.kind.to_string();
            format!(
                "[{} {:.2}s] {}",
                kind.chars().next().unwrap_or('?'),
                elapsed,
                entry.message
            )
        })
        .collect();

    format!(
        "Add collection: \n - {} by {}\n\n---\nJob log:\n```\n{}\n```\n\n---\nSubmission log: {}/#{}",
        manifest.title,
        manifest.author,
        lines.join("\n"),
        submission_url.trim_end_matches('/'),
        job_id
    )
}
