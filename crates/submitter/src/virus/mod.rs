//! Malware scanning of uploaded files.

pub mod clamd;
pub mod clamscan;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::Job;

pub use clamd::ClamdConfig;
pub use clamscan::ClamScan;

/// Result of scanning a set of files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VirusVerdict {
    Clean,
    Infected,
    ScanFailed,
    ToolError,
}

impl VirusVerdict {
    /// Maps a clamscan-style exit code.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => VirusVerdict::Clean,
            Some(1) => VirusVerdict::Infected,
            Some(2) => VirusVerdict::ScanFailed,
            _ => VirusVerdict::ToolError,
        }
    }
}

#[derive(Error, Debug)]
pub enum VirusScanError {
    #[error("Found some malware")]
    Infected,

    #[error("Malware scan failure (exit code {0:?})")]
    Failed(Option<i32>),

    #[error("Failed to run malware scanner '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malware scan timed out after {0} seconds")]
    Timeout(u64),

    #[error("Failed to prepare malware scanner: {0}")]
    Setup(String),
}

/// Scans files on behalf of a job and records the outcome on it.
///
/// Implementations move the job to `VIRUS_SCANNING` and then to exactly one
/// of `VIRUS_FREE`, `VIRUS_FOUND` or `VIRUS_ERROR`.
pub trait VirusScanner: Send + Sync {
    fn scan(&self, job: &Job, files: &[PathBuf]) -> VirusVerdict;
}
