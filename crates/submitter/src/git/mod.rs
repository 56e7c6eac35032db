//! Version-control transport for the shared working copy.

pub mod auth;
pub mod error;
pub mod parse;
pub mod repository;
pub mod types;

use std::path::Path;

pub use auth::GitCredentials;
pub use error::{classify_git_error, GitError, Result};
pub use repository::GitRepository;
pub use types::*;

/// Operations the publish sequence needs from a working copy.
///
/// Implementations are not expected to serialise callers themselves; the
/// repository lock does that.
pub trait VersionControl: Send + Sync {
    /// Root directory of the working copy.
    fn root(&self) -> &Path;

    /// Branch the working copy tracks and returns to after a publish.
    fn default_branch(&self) -> &str;

    /// Checks out `branch`, creating it from the current HEAD when `create` is set.
    fn checkout(&self, branch: &str, create: bool) -> Result<()>;

    fn current_branch(&self) -> Result<String>;

    fn status(&self) -> Result<WorkingCopyStatus>;

    /// Drops uncommitted changes and untracked files.
    fn discard_changes(&self) -> Result<()>;

    /// Stages everything matching `pattern`.
    fn add(&self, pattern: &str) -> Result<()>;

    /// Commits staged changes and returns the new commit hash.
    fn commit(&self, message: &str, author: &CommitIdentity) -> Result<String>;

    /// Pushes `branch` to the remote.
    fn push(&self, branch: &str) -> Result<()>;

    /// Fast-forwards the default branch from the remote.
    fn pull(&self) -> Result<()>;

    /// Commit hash that `branch` currently points at.
    fn head_revision(&self, branch: &str) -> Result<String>;
}
