use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::pending::PendingSubmission;

/// Writes a JSON snapshot of each processed submission into a directory.
#[derive(Debug, Clone)]
pub struct JobSnapshotWriter {
    dir: PathBuf,
}

impl JobSnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<submit-time-millis>-<job-id>.json`
    pub fn path_for(&self, submission: &PendingSubmission) -> PathBuf {
        self.dir.join(format!(
            "{}-{}.json",
            submission.submit_time.timestamp_millis(),
            submission.job.id()
        ))
    }

    pub fn write(&self, submission: &PendingSubmission) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(submission);
        let json = serde_json::to_vec_pretty(&submission.snapshot())?;
        fs::write(&path, json)?;
        Ok(path)
    }

    /// Writes the snapshot, logging rather than returning any failure.
    pub fn write_logged(&self, submission: &PendingSubmission) {
        match self.write(submission) {
            Ok(path) => log::debug!(
                "[{}] Wrote job snapshot {}",
                submission.job.id(),
                path.display()
            ),
            Err(e) => log::warn!(
                "[{}] Failed to write job snapshot to {}: {}",
                submission.job.id(),
                self.dir.display(),
                e
            ),
        }
    }
}
