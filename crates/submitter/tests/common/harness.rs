//! Wires the fakes into a working pipeline inside a temp directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use submitter::collection::{CollectionItem, CollectionRepository, CollectionSubmission};
use submitter::git::CommitIdentity;
use submitter::job::{CollectionJob, CollectionState, Job, JobState};
use submitter::repo::{ContentRepository, RepositorySettings};
use submitter::worker::{JobSnapshotWriter, PendingSubmission, StageRunner, SubmissionQueue};
use submitter::ServiceOptions;

use super::fakes::{FakeCurator, FakeEngine, FakePullRequests, FakeScanner, FakeVcs};

pub const SUBMISSION_URL: &str = "https://unrealarchive.org/submit";

/// A content repository over fakes, plus a stage runner and queue that the
/// test drives by hand.
pub struct Pipeline {
    dir: TempDir,
    pub vcs: Arc<FakeVcs>,
    pub engine: Arc<FakeEngine>,
    pub pull_requests: Arc<FakePullRequests>,
    pub scanner: Arc<FakeScanner>,
    pub curator: Arc<FakeCurator>,
    pub repo: Arc<ContentRepository>,
    pub collections: Arc<CollectionRepository>,
    pub queue: SubmissionQueue,
    pub runner: StageRunner,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_scanner(FakeScanner::clean())
    }

    pub fn with_scanner(scanner: FakeScanner) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = dir.path().join("repo");
        std::fs::create_dir_all(root.join("content")).expect("Failed to create content dir");
        std::fs::create_dir_all(dir.path().join("uploads")).expect("Failed to create uploads");

        let vcs = Arc::new(FakeVcs::new(&root));
        let engine = Arc::new(FakeEngine::new());
        let pull_requests = Arc::new(FakePullRequests::new());
        let scanner = Arc::new(scanner);
        let curator = Arc::new(FakeCurator::new());

        let repo = Arc::new(
            ContentRepository::new(
                vcs.clone(),
                pull_requests.clone(),
                engine.clone(),
                settings(),
            )
            .expect("Failed to open content repository"),
        );

        let collections = Arc::new(CollectionRepository::new(Arc::clone(&repo), curator.clone()));

        let queue = SubmissionQueue::new(8);
        let runner = StageRunner::new(
            Arc::clone(&repo),
            scanner.clone(),
            queue.clone(),
            JobSnapshotWriter::new(dir.path().join("jobs")),
            Duration::from_secs(1),
        );

        Self {
            dir,
            vcs,
            engine,
            pull_requests,
            scanner,
            curator,
            repo,
            collections,
            queue,
            runner,
        }
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.dir.path().join("jobs")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    /// Writes placeholder upload files and returns their paths.
    pub fn upload(&self, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = self.uploads_dir().join(name);
                std::fs::write(&path, b"PK\x03\x04").expect("Failed to write upload");
                path
            })
            .collect()
    }

    /// Queues a new job over `files`.
    pub fn enqueue(&self, job: Job, files: Vec<PathBuf>) -> Arc<Job> {
        let job = Arc::new(job);
        let name = files
            .first()
            .map(|f| submitter::sanitize::file_name(f))
            .unwrap_or_default();
        assert!(self
            .queue
            .add(PendingSubmission::new(Arc::clone(&job), name, files)));
        job
    }

    /// Writes uploads into a staging directory of their own and queues
    /// them the way the service does.
    pub fn enqueue_staged(&self, job: Job, names: &[&str]) -> (Arc<Job>, PathBuf) {
        let job = Arc::new(job);
        let dir = self.dir.path().join("staged").join(job.id());
        std::fs::create_dir_all(&dir).expect("Failed to create staging dir");
        let files: Vec<PathBuf> = names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"PK\x03\x04").expect("Failed to write staged file");
                path
            })
            .collect();
        let submission = PendingSubmission::new(Arc::clone(&job), names[0], files).staged_in(&dir);
        assert!(self.queue.add(submission));
        (job, dir)
    }

    /// Processes queued stages until the queue drains; returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut stages = 0;
        while let Some(submission) = self.queue.poll(Duration::from_millis(1)) {
            self.runner.process(submission);
            stages += 1;
            assert!(stages < 50, "pipeline did not settle");
        }
        stages
    }

    /// Options for a service over this pipeline's repository, with short
    /// background intervals.
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            queue_capacity: 4,
            collection_capacity: 2,
            poll_wait: Duration::from_millis(20),
            lock_wait: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(3600),
            sweep_max_age: Duration::from_secs(3600),
            refresh_interval: Duration::from_secs(3600),
            jobs_path: self.jobs_dir(),
            upload_path: self.dir.path().join("staged"),
        }
    }
}

pub fn settings() -> RepositorySettings {
    RepositorySettings {
        content_path: "content".to_string(),
        collections_path: "collections".to_string(),
        author: CommitIdentity {
            name: "submitter".to_string(),
            email: "submitter@example.com".to_string(),
        },
        submission_url: SUBMISSION_URL.to_string(),
        pull_request_labels: vec!["submission".to_string()],
    }
}

pub fn collection(title: &str) -> CollectionSubmission {
    CollectionSubmission {
        title: title.to_string(),
        description: "Maps worth playing".to_string(),
        author: "Tester".to_string(),
        links: Default::default(),
        image: None,
        created_date: "2026-01-03".to_string(),
        items: vec![CollectionItem {
            reference: "a1b2c3".to_string(),
            title: "DM-Deck16".to_string(),
        }],
    }
}

/// Long-polls `job` until a poller has seen it finish.
pub fn wait_until_done(job: &Job, timeout: Duration) -> JobState {
    let deadline = Instant::now() + timeout;
    while !job.is_done() && Instant::now() < deadline {
        job.poll_log(Duration::from_millis(50));
    }
    job.state()
}

pub fn wait_until_collection_done(job: &CollectionJob, timeout: Duration) -> CollectionState {
    let deadline = Instant::now() + timeout;
    while !job.is_done() && Instant::now() < deadline {
        job.poll_log(Duration::from_millis(50));
    }
    job.state()
}

pub fn collection_trail(job: &CollectionJob) -> Vec<CollectionState> {
    let mut trail: Vec<CollectionState> = Vec::new();
    for entry in job.full_log() {
        if trail.last() != Some(&entry.state) {
            trail.push(entry.state);
        }
    }
    trail
}

/// States in the order the job's log recorded them, without repeats.
pub fn state_trail(job: &Job) -> Vec<JobState> {
    let mut trail: Vec<JobState> = Vec::new();
    for entry in job.full_log() {
        if trail.last() != Some(&entry.state) {
            trail.push(entry.state);
        }
    }
    trail
}

pub fn messages(job: &Job) -> Vec<String> {
    job.full_log().into_iter().map(|e| e.message).collect()
}
