//! GitHub REST client for opening pull requests.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::runtime::Runtime;

use super::{parse_repo_slug, GitHubError, PullRequestRequest, PullRequestService, RepoSlug, Result};

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of an error body kept in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

const USER_AGENT: &str = concat!("unreal-archive-submitter/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct CreatedPullRequest {
    number: u64,
    html_url: String,
}

/// Blocking facade over the GitHub pulls API.
///
/// Owns a single-threaded runtime so that it can be called from the worker
/// thread without an ambient executor.
pub struct GitHubClient {
    client: Client,
    runtime: Runtime,
    api_url: String,
    repo: RepoSlug,
    token: SecretString,
}

impl GitHubClient {
    /// Creates a client for the repository behind `repo_url`.
    pub fn new(api_url: &str, repo_url: &str, token: SecretString) -> Result<Self> {
        let repo = parse_repo_slug(repo_url)?;

        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GitHubError::Client(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GitHubError::Client(e.to_string()))?;

        log::info!("Pull requests will be opened against {}", repo);

        Ok(Self {
            client,
            runtime,
            api_url: api_url.trim_end_matches('/').to_string(),
            repo,
            token,
        })
    }

    pub fn repo(&self) -> &RepoSlug {
        &self.repo
    }

    fn pulls_url(&self) -> String {
        format!("{}/repos/{}/{}/pulls", self.api_url, self.repo.owner, self.repo.name)
    }

    fn labels_url(&self, number: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/labels",
            self.api_url, self.repo.owner, self.repo.name, number
        )
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .header("Accept", "application/vnd.github+json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api {
                status,
                body: truncate(&body),
            });
        }

        Ok(response)
    }

    async fn open(&self, request: &PullRequestRequest) -> Result<String> {
        let body = serde_json::to_value(request).map_err(|e| GitHubError::Client(e.to_string()))?;
        let created: CreatedPullRequest = self.post(&self.pulls_url(), &body).await?.json().await?;

        log::info!(
            "Opened pull request #{} for {} -> {}",
            created.number,
            request.head,
            request.base
        );

        if !request.labels.is_empty() {
            let labels = json!({ "labels": request.labels });
            // labels are best-effort once the pull request exists
            if let Err(e) = self.post(&self.labels_url(created.number), &labels).await {
                log::warn!("Failed to label pull request #{}: {}", created.number, e);
            }
        }

        Ok(created.html_url)
    }
}

impl PullRequestService for GitHubClient {
    fn create_pull_request(&self, request: &PullRequestRequest) -> Result<String> {
        self.runtime.block_on(self.open(request))
    }
}

fn truncate(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}
