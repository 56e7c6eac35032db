//! In-memory stand-ins for git, the content engine, the collection curator,
//! the malware scanner and the pull-request service.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use submitter::collection::CollectionManifest;
use submitter::engine::{
    CollectionCurator, ContentEngine, CurateEvent, EngineError, IndexEvent, IndexResult,
    ScanEvent, ScanResult,
};
use submitter::git::{CommitIdentity, GitError, VersionControl, WorkingCopyStatus};
use submitter::github::{GitHubError, PullRequestRequest, PullRequestService};
use submitter::job::{ContentType, Job, JobState};
use submitter::repo::ContentView;
use submitter::sanitize::file_name;
use submitter::virus::{VirusScanError, VirusScanner, VirusVerdict};

// ─── Version control ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct VcsState {
    branch: String,
    head: String,
    remote_head: String,
    calls: Vec<String>,
    fail_push: bool,
    clean: bool,
    commits: usize,
}

/// Records every operation and tracks the checked-out branch.
pub struct FakeVcs {
    root: PathBuf,
    default_branch: String,
    state: Mutex<VcsState>,
}

impl FakeVcs {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            default_branch: "master".to_string(),
            state: Mutex::new(VcsState {
                branch: "master".to_string(),
                head: "rev-0".to_string(),
                remote_head: "rev-0".to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn fail_push(&self) {
        self.state.lock().unwrap().fail_push = true;
    }

    /// Makes `status` report nothing to commit.
    pub fn clean_status(&self) {
        self.state.lock().unwrap().clean = true;
    }

    /// Moves the remote tip, as if someone merged a pull request.
    pub fn advance_remote(&self, revision: &str) {
        self.state.lock().unwrap().remote_head = revision.to_string();
    }

    pub fn branch(&self) -> String {
        self.state.lock().unwrap().branch.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls other than reads of the current state.
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("head_revision") && c != "status")
            .collect()
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }
}

impl VersionControl for FakeVcs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn default_branch(&self) -> &str {
        &self.default_branch
    }

    fn checkout(&self, branch: &str, create: bool) -> submitter::git::Result<()> {
        self.record(format!("checkout:{}:{}", branch, create));
        self.state.lock().unwrap().branch = branch.to_string();
        Ok(())
    }

    fn current_branch(&self) -> submitter::git::Result<String> {
        Ok(self.branch())
    }

    fn status(&self) -> submitter::git::Result<WorkingCopyStatus> {
        self.record("status");
        let state = self.state.lock().unwrap();
        if state.clean {
            return Ok(WorkingCopyStatus::default());
        }
        Ok(WorkingCopyStatus {
            untracked: vec!["content/new.yml".to_string()],
            modified: Vec::new(),
        })
    }

    fn discard_changes(&self) -> submitter::git::Result<()> {
        self.record("discard");
        Ok(())
    }

    fn add(&self, pattern: &str) -> submitter::git::Result<()> {
        self.record(format!("add:{}", pattern));
        Ok(())
    }

    fn commit(&self, message: &str, author: &CommitIdentity) -> submitter::git::Result<String> {
        self.record(format!("commit:{}:{}", author.name, message));
        let mut state = self.state.lock().unwrap();
        state.commits += 1;
        Ok(format!("commit-{}", state.commits))
    }

    fn push(&self, branch: &str) -> submitter::git::Result<()> {
        self.record(format!("push:{}", branch));
        if self.state.lock().unwrap().fail_push {
            return Err(GitError::Operation("remote rejected push".to_string()));
        }
        Ok(())
    }

    fn pull(&self) -> submitter::git::Result<()> {
        self.record("pull");
        let mut state = self.state.lock().unwrap();
        state.head = state.remote_head.clone();
        Ok(())
    }

    fn head_revision(&self, branch: &str) -> submitter::git::Result<String> {
        self.record(format!("head_revision:{}", branch));
        Ok(self.state.lock().unwrap().head.clone())
    }
}

// ─── Content engine ─────────────────────────────────────────────────────────

/// How the fake engine classifies a file, keyed by file name.
#[derive(Debug, Clone, Copy)]
pub enum Verdict {
    New(ContentType),
    Known(ContentType),
    Unrecognised,
    Broken,
}

/// Classifies files from a script; indexing yields one result per file of
/// recognised type.
#[derive(Default)]
pub struct FakeEngine {
    verdicts: Mutex<HashMap<String, Verdict>>,
    fail_index: Mutex<bool>,
    panic_on_scan: Mutex<bool>,
    scans: AtomicUsize,
    indexes: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, verdict: Verdict) {
        self.verdicts.lock().unwrap().insert(name.to_string(), verdict);
    }

    pub fn fail_index(&self) {
        *self.fail_index.lock().unwrap() = true;
    }

    pub fn panic_on_scan(&self) {
        *self.panic_on_scan.lock().unwrap() = true;
    }

    pub fn scan_calls(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn index_calls(&self) -> usize {
        self.indexes.load(Ordering::SeqCst)
    }

    fn verdict(&self, path: &Path) -> Verdict {
        self.verdicts
            .lock()
            .unwrap()
            .get(&file_name(path))
            .copied()
            .unwrap_or(Verdict::Unrecognised)
    }
}

impl ContentEngine for FakeEngine {
    fn scan(
        &self,
        _view: &ContentView,
        paths: &[PathBuf],
        sink: &mut dyn FnMut(ScanEvent),
    ) -> Result<(), EngineError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if *self.panic_on_scan.lock().unwrap() {
            panic!("engine exploded");
        }

        sink(ScanEvent::Starting { found: paths.len() });
        for path in paths {
            let (content_type, known, failure) = match self.verdict(path) {
                Verdict::New(t) => (t, false, None),
                Verdict::Known(t) => (t, true, None),
                Verdict::Unrecognised => (ContentType::Unknown, false, None),
                Verdict::Broken => (ContentType::Unknown, false, Some("corrupt archive".to_string())),
            };
            sink(ScanEvent::Scanned(ScanResult {
                path: path.clone(),
                content_type,
                known,
                failure,
            }));
        }
        sink(ScanEvent::Completed { scanned: paths.len() });
        Ok(())
    }

    fn index(
        &self,
        _view: &ContentView,
        paths: &[PathBuf],
        forced_type: Option<ContentType>,
        sink: &mut dyn FnMut(IndexEvent),
    ) -> Result<(), EngineError> {
        self.indexes.fetch_add(1, Ordering::SeqCst);
        if *self.fail_index.lock().unwrap() {
            return Err(EngineError::Failed {
                code: Some(1),
                stderr: "indexer crashed".to_string(),
            });
        }

        sink(IndexEvent::Starting { found: paths.len() });
        let mut errors = 0;
        for path in paths {
            let content_type = forced_type.or(match self.verdict(path) {
                Verdict::New(t) | Verdict::Known(t) => Some(t),
                Verdict::Unrecognised | Verdict::Broken => None,
            });

            let result = content_type.map(|content_type| IndexResult {
                path: path.clone(),
                content_type,
                name: file_name(path).trim_end_matches(".zip").to_string(),
                author: "Tester".to_string(),
                game: "UT".to_string(),
            });
            if result.is_none() {
                errors += 1;
            }

            sink(IndexEvent::Indexed {
                path: path.clone(),
                result,
                log: Vec::new(),
            });
        }
        sink(IndexEvent::Completed {
            indexed: paths.len(),
            errors,
        });
        Ok(())
    }
}

// ─── Collection curator ─────────────────────────────────────────────────────

/// Records each step and the manifests it was given; fails at a chosen step.
#[derive(Default)]
pub struct FakeCurator {
    steps: Mutex<Vec<String>>,
    manifests: Mutex<Vec<CollectionManifest>>,
    images: Mutex<Vec<(String, Vec<u8>)>>,
    fail_at: Mutex<Option<&'static str>>,
}

impl FakeCurator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `step` (`checkin`, `archive` or `sync`) fail.
    pub fn fail_at(&self, step: &'static str) {
        *self.fail_at.lock().unwrap() = Some(step);
    }

    pub fn steps(&self) -> Vec<String> {
        self.steps.lock().unwrap().clone()
    }

    pub fn manifests(&self) -> Vec<CollectionManifest> {
        self.manifests.lock().unwrap().clone()
    }

    /// File name and bytes of each title image seen at checkin.
    pub fn images(&self) -> Vec<(String, Vec<u8>)> {
        self.images.lock().unwrap().clone()
    }

    fn step(
        &self,
        step: &'static str,
        manifest: &CollectionManifest,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<(), EngineError> {
        self.steps.lock().unwrap().push(step.to_string());
        self.manifests.lock().unwrap().push(manifest.clone());
        if *self.fail_at.lock().unwrap() == Some(step) {
            return Err(EngineError::Failed {
                code: Some(1),
                stderr: format!("{} broke", step),
            });
        }
        sink(CurateEvent::Log {
            message: format!("{} {}", step, manifest.title),
        });
        sink(CurateEvent::Completed);
        Ok(())
    }
}

impl CollectionCurator for FakeCurator {
    fn checkin(
        &self,
        _view: &ContentView,
        manifest: &CollectionManifest,
        image: Option<&Path>,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<(), EngineError> {
        if let Some(image) = image {
            let bytes = std::fs::read(image).unwrap();
            self.images.lock().unwrap().push((file_name(image), bytes));
        }
        self.step("checkin", manifest, sink)
    }

    fn archive(
        &self,
        _view: &ContentView,
        manifest: &CollectionManifest,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<(), EngineError> {
        self.step("archive", manifest, sink)
    }

    fn sync(
        &self,
        _view: &ContentView,
        manifest: &CollectionManifest,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<(), EngineError> {
        self.step("sync", manifest, sink)
    }
}

// ─── Malware scanner ────────────────────────────────────────────────────────

/// Reports a fixed verdict and moves the job the way a real scanner does.
pub struct FakeScanner {
    verdict: VirusVerdict,
    scans: AtomicUsize,
}

impl FakeScanner {
    pub fn new(verdict: VirusVerdict) -> Self {
        Self {
            verdict,
            scans: AtomicUsize::new(0),
        }
    }

    pub fn clean() -> Self {
        Self::new(VirusVerdict::Clean)
    }

    pub fn calls(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl VirusScanner for FakeScanner {
    fn scan(&self, job: &Job, _files: &[PathBuf]) -> VirusVerdict {
        self.scans.fetch_add(1, Ordering::SeqCst);
        job.transition(JobState::VirusScanning, "Scanning for malware");
        match self.verdict {
            VirusVerdict::Clean => job.transition(JobState::VirusFree, "No malware found"),
            VirusVerdict::Infected => job.log_error(
                Some(JobState::VirusFound),
                "Malware found!!",
                &VirusScanError::Infected,
            ),
            VirusVerdict::ScanFailed | VirusVerdict::ToolError => job.log_error(
                Some(JobState::VirusError),
                "Malware scan failed.",
                &VirusScanError::Failed(Some(2)),
            ),
        }
        self.verdict
    }
}

// ─── Pull requests ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePullRequests {
    requests: Mutex<Vec<PullRequestRequest>>,
    fail: Mutex<bool>,
}

impl FakePullRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn requests(&self) -> Vec<PullRequestRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl PullRequestService for FakePullRequests {
    fn create_pull_request(
        &self,
        request: &PullRequestRequest,
    ) -> Result<String, GitHubError> {
        if *self.fail.lock().unwrap() {
            return Err(GitHubError::Api {
                status: 422,
                body: "Validation Failed".to_string(),
            });
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(format!(
            "https://github.com/example/content/pull/{}",
            requests.len()
        ))
    }
}
