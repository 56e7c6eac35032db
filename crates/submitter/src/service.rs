//! Wires the pipeline together and exposes the surface used by an upload
//! handler: submit files, then follow the job's log.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::collection::{
    CollectionManifest, CollectionRepository, CollectionRunner, CollectionSubmission,
    PendingCollection,
};
use crate::config::Config;
use crate::engine::{CollectionCurator, CommandEngine};
use crate::error::{Result, SubmitterError};
use crate::git::{CommitIdentity, GitCredentials, GitRepository, VersionControl};
use crate::github::GitHubClient;
use crate::job::{
    CollectionJob, CollectionState, ContentType, Job, JobState, LogEntry, LogKind,
};
use crate::registry::{JobRegistry, SweepStats, Sweeper};
use crate::repo::{ContentRepository, RefreshScheduler, RepositorySettings};
use crate::sanitize::{file_name, redact_repo_url};
use crate::secrets::{resolve_secret, resolve_secret_optional, SecretSource};
use crate::virus::{ClamScan, ClamdConfig, VirusScanError, VirusScanner};
use crate::worker::pending::remove_staging_dir;
use crate::worker::stages::remove_files;
use crate::worker::{
    JobSnapshotWriter, PendingSubmission, StageRunner, SubmissionProcessor, SubmissionQueue,
};

/// Runtime knobs for the background tasks, independent of how the
/// repository and scanner were built.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub queue_capacity: usize,
    pub collection_capacity: usize,
    pub poll_wait: Duration,
    pub lock_wait: Duration,
    pub sweep_interval: Duration,
    pub sweep_max_age: Duration,
    pub refresh_interval: Duration,
    pub jobs_path: PathBuf,
    pub upload_path: PathBuf,
}

impl ServiceOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue_capacity: config.queue.capacity,
            collection_capacity: config.queue.collection_capacity,
            poll_wait: config.queue.poll_wait(),
            lock_wait: config.queue.lock_wait(),
            sweep_interval: config.sweep.interval(),
            sweep_max_age: config.sweep.max_age(),
            refresh_interval: config.repository.refresh_interval(),
            jobs_path: config.jobs_path.clone(),
            upload_path: config.upload_path.clone(),
        }
    }
}

/// The running submission pipeline.
pub struct SubmitterService {
    registry: Arc<JobRegistry>,
    queue: SubmissionQueue,
    collection_registry: Arc<JobRegistry<CollectionState>>,
    collection_queue: SubmissionQueue<PendingCollection>,
    repo: Arc<ContentRepository>,
    upload_path: PathBuf,
    processor: Option<SubmissionProcessor>,
    collection_processor: Option<SubmissionProcessor>,
    sweeper: Sweeper,
    collection_sweeper: Sweeper,
    refresh: RefreshScheduler,
    refresh_thread: Option<JoinHandle<()>>,
    refresh_tx: broadcast::Sender<()>,
    /// Working copy cloned into a fresh temp directory, removed on shutdown.
    owned_clone: Option<PathBuf>,
}

impl SubmitterService {
    /// Clones the content repository and starts the pipeline described by
    /// `config`.
    pub fn start(config: &Config) -> Result<Self> {
        let repository = &config.repository;

        let password = resolve_secret_optional(SecretSource {
            direct: repository.password.as_deref(),
            file: repository.password_file.as_deref(),
            env_var: repository.password_env_var.as_deref(),
        })?;
        let credentials = GitCredentials::new(repository.username.clone(), password);

        let (vcs, owned_clone) = open_or_clone(config, credentials)?;

        match Self::assemble(config, vcs) {
            Ok(mut service) => {
                service.owned_clone = owned_clone;
                Ok(service)
            }
            Err(e) => {
                if let Some(dir) = owned_clone {
                    remove_clone(&dir);
                }
                Err(e)
            }
        }
    }

    fn assemble(config: &Config, vcs: GitRepository) -> Result<Self> {
        let repository = &config.repository;

        let token = resolve_secret(SecretSource {
            direct: repository.github_token.as_deref(),
            file: repository.github_token_file.as_deref(),
            env_var: repository.github_token_env_var.as_deref(),
        })?;
        let pull_requests = GitHubClient::new(&repository.github_api_url, &repository.url, token)?;

        let engine = Arc::new(CommandEngine::new(&config.engine.command));

        let settings = RepositorySettings {
            content_path: repository.content_path.clone(),
            collections_path: repository.collections_path.clone(),
            author: CommitIdentity {
                name: repository.username.clone(),
                email: repository.email.clone(),
            },
            submission_url: repository.submission_url.clone(),
            pull_request_labels: repository.pull_request_labels.clone(),
        };

        let repo = ContentRepository::new(
            Arc::new(vcs),
            Arc::new(pull_requests),
            engine.clone(),
            settings,
        )?;

        let scanner = build_virus_scanner(config)?;

        Self::with_components(
            Arc::new(repo),
            scanner,
            engine,
            ServiceOptions::from_config(config),
        )
    }

    /// Starts the pipeline around an already constructed repository,
    /// scanner and collection curator.
    pub fn with_components(
        repo: Arc<ContentRepository>,
        scanner: Arc<dyn VirusScanner>,
        curator: Arc<dyn CollectionCurator>,
        options: ServiceOptions,
    ) -> Result<Self> {
        let registry = Arc::new(JobRegistry::new());
        let queue = SubmissionQueue::new(options.queue_capacity);

        let runner = Arc::new(StageRunner::new(
            Arc::clone(&repo),
            scanner,
            queue.clone(),
            JobSnapshotWriter::new(&options.jobs_path),
            options.lock_wait,
        ));
        let processor =
            SubmissionProcessor::start("submission-worker", runner, options.poll_wait)?;

        let collection_registry: Arc<JobRegistry<CollectionState>> =
            Arc::new(JobRegistry::new());
        let collection_queue: SubmissionQueue<PendingCollection> =
            SubmissionQueue::new(options.collection_capacity);
        let collection_runner = Arc::new(CollectionRunner::new(
            Arc::new(CollectionRepository::new(Arc::clone(&repo), curator)),
            collection_queue.clone(),
            options.lock_wait,
        ));
        let collection_processor =
            SubmissionProcessor::start("collection-worker", collection_runner, options.poll_wait)?;

        let sweeper = Sweeper::start(
            Arc::clone(&registry),
            options.sweep_interval,
            options.sweep_max_age,
        )?;
        let collection_sweeper = Sweeper::start(
            Arc::clone(&collection_registry),
            options.sweep_interval,
            options.sweep_max_age,
        )?;

        let (refresh_tx, refresh_rx) = broadcast::channel(4);
        let refresh = RefreshScheduler::new(Arc::clone(&repo), options.refresh_interval);
        let refresh_thread = refresh.start(refresh_rx)?;

        log::info!(
            "Submission service started (queue capacity {}, collection queue capacity {}, snapshots in {})",
            queue.capacity(),
            collection_queue.capacity(),
            options.jobs_path.display()
        );

        Ok(Self {
            registry,
            queue,
            collection_registry,
            collection_queue,
            repo,
            upload_path: options.upload_path,
            processor: Some(processor),
            collection_processor: Some(collection_processor),
            sweeper,
            collection_sweeper,
            refresh,
            refresh_thread: Some(refresh_thread),
            refresh_tx,
            owned_clone: None,
        })
    }

    /// Stages `files` and queues them as one submission.
    ///
    /// Returns [`SubmitterError::QueueFull`] when the queue has no room; the
    /// job is logged as failed, its staged copies are deleted and it is
    /// forgotten in that case.
    pub fn submit(
        &self,
        name: &str,
        files: &[PathBuf],
        forced_type: Option<ContentType>,
    ) -> Result<Arc<Job>> {
        if files.is_empty() {
            return Err(SubmitterError::NoPaths);
        }

        let job = Arc::new(Job::new(forced_type));
        let (dir, staged) = self.stage_files(&job, files)?;

        self.registry.track(Arc::clone(&job));
        let submission = PendingSubmission::new(Arc::clone(&job), name, staged).staged_in(dir);

        if let Err(rejected) = self.queue.offer(submission) {
            job.log(
                Some(JobState::Failed),
                "Submission queue is full, try again later",
                LogKind::Error,
            );
            rejected.cleanup();
            self.registry.remove(job.id());
            return Err(SubmitterError::QueueFull);
        }

        log::info!("Queued submission {} as job {}", name, job.id());
        Ok(job)
    }

    /// Copies uploads into a directory of their own under the upload path.
    fn stage_files(&self, job: &Job, files: &[PathBuf]) -> Result<(PathBuf, Vec<PathBuf>)> {
        let dir = self.upload_path.join(job.id());
        fs::create_dir_all(&dir).map_err(|e| SubmitterError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;

        let mut staged = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let name = file_name(file);
            let mut target = dir.join(&name);
            if target.exists() {
                target = dir.join(format!("{}-{}", index, name));
            }
            if let Err(e) = fs::copy(file, &target) {
                remove_files(job.id(), &staged);
                remove_staging_dir(job.id(), &dir);
                return Err(SubmitterError::StageFile {
                    path: file.clone(),
                    source: e,
                });
            }
            staged.push(target);
        }

        Ok((dir, staged))
    }

    /// Queues a collection for checkin and publication.
    ///
    /// Invalid collections are rejected before a job is created. A full
    /// collection queue gives [`SubmitterError::QueueFull`].
    pub fn submit_collection(&self, submission: CollectionSubmission) -> Result<Arc<CollectionJob>> {
        CollectionManifest::from_submission(&submission)?;

        let job = Arc::new(CollectionJob::collection());
        self.collection_registry.track(Arc::clone(&job));

        let title = submission.title.clone();
        if self
            .collection_queue
            .offer(PendingCollection::new(Arc::clone(&job), submission))
            .is_err()
        {
            job.log(
                Some(CollectionState::SubmitFailed),
                "Collection queue is full, try again later",
                LogKind::Error,
            );
            self.collection_registry.remove(job.id());
            return Err(SubmitterError::QueueFull);
        }

        log::info!("Queued collection {} as job {}", title, job.id());
        Ok(job)
    }

    pub fn job(&self, id: &str) -> Option<Arc<Job>> {
        self.registry.get(id)
    }

    pub fn jobs(&self) -> Vec<Arc<Job>> {
        self.registry.all()
    }

    /// Long-poll for new log entries of job `id`.
    pub fn poll_log(&self, id: &str, timeout: Duration) -> Result<Vec<LogEntry>> {
        self.find(id).map(|job| job.poll_log(timeout))
    }

    pub fn full_log(&self, id: &str) -> Result<Vec<LogEntry>> {
        self.find(id).map(|job| job.full_log())
    }

    fn find(&self, id: &str) -> Result<Arc<Job>> {
        self.registry
            .get(id)
            .ok_or_else(|| SubmitterError::JobNotFound(id.to_string()))
    }

    pub fn collection_job(&self, id: &str) -> Option<Arc<CollectionJob>> {
        self.collection_registry.get(id)
    }

    pub fn collection_jobs(&self) -> Vec<Arc<CollectionJob>> {
        self.collection_registry.all()
    }

    pub fn poll_collection_log(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<Vec<LogEntry<CollectionState>>> {
        self.find_collection(id).map(|job| job.poll_log(timeout))
    }

    pub fn full_collection_log(&self, id: &str) -> Result<Vec<LogEntry<CollectionState>>> {
        self.find_collection(id).map(|job| job.full_log())
    }

    fn find_collection(&self, id: &str) -> Result<Arc<CollectionJob>> {
        self.collection_registry
            .get(id)
            .ok_or_else(|| SubmitterError::JobNotFound(id.to_string()))
    }

    /// Submissions waiting for their next stage.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_collections(&self) -> usize {
        self.collection_queue.len()
    }

    pub fn sweep_stats(&self) -> SweepStats {
        self.sweeper.stats()
    }

    pub fn collection_sweep_stats(&self) -> SweepStats {
        self.collection_sweeper.stats()
    }

    pub fn repository(&self) -> &Arc<ContentRepository> {
        &self.repo
    }

    /// Asks the refresh task to pull the content repository now.
    pub fn trigger_refresh(&self) {
        if self.refresh_tx.send(()).is_err() {
            log::warn!("Content refresh is not running");
        }
    }

    /// Stops the background tasks, waiting for the current stage to finish,
    /// then deletes a working copy the service cloned itself.
    pub fn shutdown(&mut self) {
        let processors = [self.processor.take(), self.collection_processor.take()];
        for processor in processors.iter().flatten() {
            processor.shutdown();
        }
        for processor in processors.into_iter().flatten() {
            processor.wait();
        }

        self.refresh.stop();
        if let Some(handle) = self.refresh_thread.take() {
            if let Err(e) = handle.join() {
                log::error!("Content refresh thread panicked: {:?}", e);
            }
        }

        self.sweeper.stop();
        self.collection_sweeper.stop();

        if let Some(dir) = self.owned_clone.take() {
            remove_clone(&dir);
        }
    }
}

impl Drop for SubmitterService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Opens the configured clone directory, or clones into a fresh temp
/// directory. The second value is set when the clone is the service's own.
fn open_or_clone(
    config: &Config,
    credentials: GitCredentials,
) -> Result<(GitRepository, Option<PathBuf>)> {
    let repository = &config.repository;
    let (target, owned) = match &repository.clone_directory {
        Some(dir) => (dir.clone(), false),
        None => (
            std::env::temp_dir().join(format!("ua-content-{}", Uuid::new_v4())),
            true,
        ),
    };

    if target.join(".git").exists() {
        log::info!(
            "Using existing clone of {} at {}",
            redact_repo_url(&repository.url),
            target.display()
        );
        let repo = GitRepository::open(&target, &repository.branch, credentials)?;
        repo.checkout(&repository.branch, false)?;
        repo.pull()?;
        return Ok((repo, None));
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| SubmitterError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    match GitRepository::clone_shallow(&repository.url, &repository.branch, &target, credentials) {
        Ok(repo) => Ok((repo, owned.then_some(target))),
        Err(e) => {
            if owned {
                remove_clone(&target);
            }
            Err(e.into())
        }
    }
}

fn remove_clone(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => log::info!("Removed content repository clone {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            "Failed to remove content repository clone {}: {}",
            dir.display(),
            e
        ),
    }
}

fn build_virus_scanner(config: &Config) -> Result<Arc<dyn VirusScanner>> {
    let virus = &config.virus_scan;

    let scanner = match &virus.clamd_socket {
        Some(socket) => {
            // the default standalone scanner cannot talk to a daemon
            let program = if virus.command == "clamscan" {
                "clamdscan"
            } else {
                virus.command.as_str()
            };
            let clamd =
                ClamdConfig::new(socket).map_err(|e| VirusScanError::Setup(e.to_string()))?;
            log::info!("Malware scans go through clamd at {}", socket.display());
            ClamScan::new(program, virus.options.clone(), virus.timeout())?.with_clamd(clamd)
        }
        None => ClamScan::new(virus.command.clone(), virus.options.clone(), virus.timeout())?,
    };

    Ok(Arc::new(scanner))
}
