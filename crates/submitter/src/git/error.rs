//! Version-control error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while driving the working copy.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git operation failed: {0}")]
    Operation(String),

    #[error("Git network error: {0}")]
    Network(String),

    #[error("Git authentication failed: {0}")]
    AuthFailed(String),

    #[error("Git merge conflict: {0}")]
    MergeConflict(String),

    #[error("Git repository not initialized at '{0}'")]
    NotInitialized(PathBuf),

    #[error("Failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("There are no new files to add")]
    NothingToCommit,

    #[error("Reference not found: {0}")]
    RefNotFound(String),

    #[error("Failed to prepare git credentials: {0}")]
    Credentials(String),
}

impl GitError {
    /// Returns true if the error is likely transient and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GitError::Network(_))
    }
}

/// Classifies a git stderr string into a more specific error variant.
pub fn classify_git_error(stderr: &str) -> GitError {
    let lower = stderr.to_lowercase();

    if lower.contains("could not resolve host")
        || lower.contains("connection refused")
        || lower.contains("connection timed out")
        || lower.contains("network is unreachable")
        || lower.contains("unable to access")
        || lower.contains("failed to connect")
        || lower.contains("the remote end hung up unexpectedly")
    {
        return GitError::Network(stderr.trim().to_string());
    }

    if lower.contains("merge conflict") || lower.contains("conflict") && lower.contains("merge") {
        return GitError::MergeConflict(stderr.trim().to_string());
    }

    if lower.contains("authentication failed")
        || lower.contains("permission denied")
        || lower.contains("invalid credentials")
    {
        return GitError::AuthFailed(stderr.trim().to_string());
    }

    GitError::Operation(stderr.trim().to_string())
}

pub type Result<T> = std::result::Result<T, GitError>;
