use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stages::remove_files;
use crate::job::{Job, JobSnapshot};

/// A job queued for its next stage, with the uploaded files it covers.
#[derive(Clone)]
pub struct PendingSubmission {
    pub job: Arc<Job>,
    /// Fixed at admission; names the snapshot file for every stage.
    pub submit_time: DateTime<Utc>,
    pub name: String,
    pub files: Vec<PathBuf>,
    /// Directory the files were staged into, removed with them.
    pub staging_dir: Option<PathBuf>,
}

impl PendingSubmission {
    pub fn new(job: Arc<Job>, name: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            job,
            submit_time: Utc::now(),
            name: name.into(),
            files,
            staging_dir: None,
        }
    }

    pub fn staged_in(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Deletes the submission's files and its staging directory.
    pub fn cleanup(&self) {
        remove_files(self.job.id(), &self.files);
        if let Some(dir) = &self.staging_dir {
            remove_staging_dir(self.job.id(), dir);
        }
    }

    pub fn snapshot(&self) -> SubmissionSnapshot {
        SubmissionSnapshot {
            job: self.job.snapshot(),
            submit_time: self.submit_time,
            name: self.name.clone(),
            files: self.files.clone(),
        }
    }
}

impl std::fmt::Debug for PendingSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSubmission")
            .field("job", &self.job.id())
            .field("state", &self.job.state())
            .field("name", &self.name)
            .field("files", &self.files)
            .finish()
    }
}

pub(crate) fn remove_staging_dir(job_id: &str, dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => log::debug!("[{}] Removed {}", job_id, dir.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            "Failed to delete staging directory {} for job {}: {}",
            dir.display(),
            job_id,
            e
        ),
    }
}

/// Serialized form of a submission written for offline audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSnapshot {
    pub job: JobSnapshot,
    pub submit_time: DateTime<Utc>,
    pub name: String,
    pub files: Vec<PathBuf>,
}
