//! Submission job states and the edges between them.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A state graph a [`Job`](super::Job) can move through.
pub trait Phase:
    Copy + Eq + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// State of a freshly created job.
    const INITIAL: Self;

    fn is_terminal(self) -> bool;

    fn can_transition_to(self, next: Self) -> bool;
}

/// State of a submission job.
///
/// A job moves through three stages (virus scan, content scan, index and
/// publish). Each stage ends in either an intermediate state, which sends the
/// job back to the queue, or a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Created,
    VirusScanning,
    VirusFree,
    VirusFound,
    VirusError,
    Scanning,
    UnknownContent,
    KnownContent,
    ScanFailed,
    Scanned,
    Indexing,
    IndexFailed,
    Submitting,
    Submitted,
    SubmitFailed,
    Failed,
    Completed,
}

impl JobState {
    /// Returns true once the job will never be queued again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::VirusFound
                | JobState::VirusError
                | JobState::UnknownContent
                | JobState::ScanFailed
                | JobState::IndexFailed
                | JobState::SubmitFailed
                | JobState::Failed
                | JobState::Completed
        )
    }

    /// Returns true if `next` is a legal successor of this state.
    ///
    /// Staying in the same state is always legal; it is what every
    /// informational log line does.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;

        if self == next {
            return true;
        }
        if next == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Created, VirusScanning)
                | (VirusScanning, VirusFree | VirusFound | VirusError)
                | (VirusFree, Scanning)
                // forced content type skips the content scan
                | (VirusFree, Scanned)
                | (Scanning, Scanned | UnknownContent | KnownContent | ScanFailed)
                | (Scanned, Indexing)
                | (Indexing, Submitting | IndexFailed)
                | (Submitting, Submitted | SubmitFailed)
                | (Submitted, Completed)
        )
    }

    /// Returns the wire name of this state.
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Created => "CREATED",
            JobState::VirusScanning => "VIRUS_SCANNING",
            JobState::VirusFree => "VIRUS_FREE",
            JobState::VirusFound => "VIRUS_FOUND",
            JobState::VirusError => "VIRUS_ERROR",
            JobState::Scanning => "SCANNING",
            JobState::UnknownContent => "UNKNOWN_CONTENT",
            JobState::KnownContent => "KNOWN_CONTENT",
            JobState::ScanFailed => "SCAN_FAILED",
            JobState::Scanned => "SCANNED",
            JobState::Indexing => "INDEXING",
            JobState::IndexFailed => "INDEX_FAILED",
            JobState::Submitting => "SUBMITTING",
            JobState::Submitted => "SUBMITTED",
            JobState::SubmitFailed => "SUBMIT_FAILED",
            JobState::Failed => "FAILED",
            JobState::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Phase for JobState {
    const INITIAL: Self = JobState::Created;

    fn is_terminal(self) -> bool {
        JobState::is_terminal(self)
    }

    fn can_transition_to(self, next: Self) -> bool {
        JobState::can_transition_to(self, next)
    }
}

/// State of a collection submission.
///
/// A collection is published in a single pass: checked in, archived,
/// synced to storage, then committed and proposed as a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionState {
    Created,
    CheckingIn,
    CheckedIn,
    CheckinFailed,
    Archiving,
    Archived,
    ArchiveFailed,
    Syncing,
    Synced,
    SyncFailed,
    Submitting,
    Submitted,
    SubmitFailed,
    Completed,
}

impl CollectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionState::Created => "CREATED",
            CollectionState::CheckingIn => "CHECKING_IN",
            CollectionState::CheckedIn => "CHECKED_IN",
            CollectionState::CheckinFailed => "CHECKIN_FAILED",
            CollectionState::Archiving => "ARCHIVING",
            CollectionState::Archived => "ARCHIVED",
            CollectionState::ArchiveFailed => "ARCHIVE_FAILED",
            CollectionState::Syncing => "SYNCING",
            CollectionState::Synced => "SYNCED",
            CollectionState::SyncFailed => "SYNC_FAILED",
            CollectionState::Submitting => "SUBMITTING",
            CollectionState::Submitted => "SUBMITTED",
            CollectionState::SubmitFailed => "SUBMIT_FAILED",
            CollectionState::Completed => "COMPLETED",
        }
    }
}

impl Phase for CollectionState {
    const INITIAL: Self = CollectionState::Created;

    fn is_terminal(self) -> bool {
        matches!(
            self,
            CollectionState::CheckinFailed
                | CollectionState::ArchiveFailed
                | CollectionState::SyncFailed
                | CollectionState::SubmitFailed
                | CollectionState::Completed
        )
    }

    fn can_transition_to(self, next: Self) -> bool {
        use CollectionState::*;

        if self == next {
            return true;
        }
        if next == SubmitFailed {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Created, CheckingIn)
                | (CheckingIn, CheckedIn | CheckinFailed)
                | (CheckedIn, Archiving)
                | (Archiving, Archived | ArchiveFailed)
                | (Archived, Syncing)
                | (Syncing, Synced | SyncFailed)
                | (Synced, Submitting)
                | (Submitting, Submitted)
                | (Submitted, Completed)
        )
    }
}

impl fmt::Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a log entry, as shown to the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    Info,
    Warn,
    Error,
    Good,
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogKind::Info => write!(f, "INFO"),
            LogKind::Warn => write!(f, "WARN"),
            LogKind::Error => write!(f, "ERROR"),
            LogKind::Good => write!(f, "GOOD"),
        }
    }
}
