//! Pull-request service used to propose published content.

pub mod client;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::GitHubClient;

/// Errors raised while talking to the pull-request service.
#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("Could not find repo organisation and name in input {0}")]
    InvalidRepositoryUrl(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("GitHub request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, GitHubError>;

/// A pull request to open against the content repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRequest {
    pub title: String,
    pub body: String,
    /// Source branch.
    pub head: String,
    /// Target branch.
    pub base: String,
    #[serde(skip)]
    pub labels: Vec<String>,
}

/// Opens pull requests on the hosted code-review service.
pub trait PullRequestService: Send + Sync {
    /// Creates the pull request, applies any labels, and returns its web URL.
    fn create_pull_request(&self, request: &PullRequestRequest) -> Result<String>;
}

/// Owner and repository name of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Extracts `owner/name` from a clone URL ending in `/<owner>/<name>.git`.
pub fn parse_repo_slug(url: &str) -> Result<RepoSlug> {
    let pattern = Regex::new(r".*/(.*)/(.*)\.git")
        .map_err(|e| GitHubError::InvalidRepositoryUrl(e.to_string()))?;

    let captures = pattern
        .captures(url)
        .ok_or_else(|| GitHubError::InvalidRepositoryUrl(url.to_string()))?;

    let owner = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let name = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
    if owner.is_empty() || name.is_empty() {
        return Err(GitHubError::InvalidRepositoryUrl(url.to_string()));
    }

    Ok(RepoSlug {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}
