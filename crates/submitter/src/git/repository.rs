//! Working-copy operations backed by the `git` command line.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::auth::{build_auth_env, GitCredentials};
use super::error::{classify_git_error, GitError, Result};
use super::parse::{format_git_error, parse_porcelain_status};
use super::types::{CommitIdentity, WorkingCopyStatus};
use super::VersionControl;
use crate::sanitize::redact_repo_url;

/// Remote name used for the cloned repository.
const REMOTE: &str = "origin";

/// A local clone of the content repository.
pub struct GitRepository {
    /// Path to the working copy.
    repo_path: PathBuf,
    /// Branch that the working copy returns to between publishes.
    default_branch: String,
    credentials: GitCredentials,
}

impl GitRepository {
    /// Opens an existing working copy.
    pub fn open(
        repo_path: impl Into<PathBuf>,
        default_branch: impl Into<String>,
        credentials: GitCredentials,
    ) -> Result<Self> {
        let repo = Self {
            repo_path: repo_path.into(),
            default_branch: default_branch.into(),
            credentials,
        };

        if !repo.is_git_repo() {
            return Err(GitError::NotInitialized(repo.repo_path.clone()));
        }

        Ok(repo)
    }

    /// Clones a single branch of `url` with depth 1 into `target`.
    pub fn clone_shallow(
        url: &str,
        branch: &str,
        target: &Path,
        credentials: GitCredentials,
    ) -> Result<Self> {
        log::info!(
            "Cloning git repository {} into {}",
            redact_repo_url(url),
            target.display()
        );

        let target_str = target
            .to_str()
            .ok_or_else(|| GitError::Operation(format!("Invalid clone path {:?}", target)))?;

        let auth = build_auth_env(&credentials)?;
        let mut cmd = Command::new("git");
        cmd.args([
            "clone",
            "--depth",
            "1",
            "--single-branch",
            "--branch",
            branch,
            url,
            target_str,
        ]);
        for (key, value) in &auth.env_vars {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(GitError::Spawn)?;
        drop(auth);

        if !output.status.success() {
            return Err(classify_git_error(&format_git_error(&output)));
        }

        Self::open(target, branch, credentials)
    }

    /// Checks if the directory is a git repository.
    pub fn is_git_repo(&self) -> bool {
        self.repo_path.join(".git").exists()
    }

    /// Runs a git command in the repository directory.
    fn run_git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.repo_path)
            .args(args)
            .output()
            .map_err(GitError::Spawn)
    }

    /// Runs a git command and returns trimmed stdout, failing on non-zero exit.
    fn run_git_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run_git(args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(classify_git_error(&format_git_error(&output)))
        }
    }

    /// Runs a git command that talks to the remote.
    fn run_git_remote(&self, args: &[&str]) -> Result<()> {
        let auth = build_auth_env(&self.credentials)?;

        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_path).args(args);
        for (key, value) in &auth.env_vars {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(GitError::Spawn)?;
        drop(auth);

        if output.status.success() {
            Ok(())
        } else {
            Err(classify_git_error(&format_git_error(&output)))
        }
    }
}

impl VersionControl for GitRepository {
    fn root(&self) -> &Path {
        &self.repo_path
    }

    fn default_branch(&self) -> &str {
        &self.default_branch
    }

    fn checkout(&self, branch: &str, create: bool) -> Result<()> {
        if create {
            self.run_git_checked(&["checkout", "-b", branch])?;
        } else {
            self.run_git_checked(&["checkout", branch])?;
        }
        Ok(())
    }

    fn current_branch(&self) -> Result<String> {
        self.run_git_checked(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn status(&self) -> Result<WorkingCopyStatus> {
        let text = self.run_git_checked(&["status", "--porcelain", "--untracked-files=all"])?;
        Ok(parse_porcelain_status(&text))
    }

    fn discard_changes(&self) -> Result<()> {
        self.run_git_checked(&["reset", "--hard", "--quiet"])?;
        self.run_git_checked(&["clean", "-fd", "--quiet"])?;
        Ok(())
    }

    fn add(&self, pattern: &str) -> Result<()> {
        self.run_git_checked(&["add", "--", pattern])?;
        Ok(())
    }

    fn commit(&self, message: &str, author: &CommitIdentity) -> Result<String> {
        let name = format!("user.name={}", author.name);
        let email = format!("user.email={}", author.email);
        let author_arg = author.to_string();

        self.run_git_checked(&[
            "-c",
            &name,
            "-c",
            &email,
            "commit",
            "--author",
            &author_arg,
            "-m",
            message,
        ])?;

        self.run_git_checked(&["rev-parse", "HEAD"])
    }

    fn push(&self, branch: &str) -> Result<()> {
        self.run_git_remote(&["push", REMOTE, branch])
    }

    fn pull(&self) -> Result<()> {
        self.run_git_remote(&["pull", "--ff-only", REMOTE, &self.default_branch])
    }

    fn head_revision(&self, branch: &str) -> Result<String> {
        let reference = format!("refs/heads/{}", branch);
        self.run_git_checked(&["rev-parse", "--verify", &reference])
            .map_err(|_| GitError::RefNotFound(reference))
    }
}
