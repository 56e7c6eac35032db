use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub virus_scan: VirusScanConfig,
    pub engine: EngineConfig,
    #[serde(default = "default_jobs_path")]
    pub jobs_path: PathBuf,
    #[serde(default = "default_upload_path")]
    pub upload_path: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_jobs_path() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("/tmp/ua-submit-files")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Where to clone; a fresh temp directory when unset.
    #[serde(default)]
    pub clone_directory: Option<PathBuf>,
    #[serde(default = "default_content_path")]
    pub content_path: String,
    #[serde(default = "default_collections_path")]
    pub collections_path: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_file: Option<String>,
    #[serde(default)]
    pub password_env_var: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub github_token: Option<String>,
    #[serde(default)]
    pub github_token_file: Option<String>,
    #[serde(default)]
    pub github_token_env_var: Option<String>,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    #[serde(default)]
    pub pull_request_labels: Vec<String>,
    #[serde(default = "default_submission_url")]
    pub submission_url: String,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_content_path() -> String {
    "content".to_string()
}

fn default_collections_path() -> String {
    "collections".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_submission_url() -> String {
    "https://unrealarchive.org/submit".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    30 * 60
}

impl RepositoryConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_poll_wait_ms")]
    pub poll_wait_ms: u64,
    /// How long a publish waits for a refresh to release the repository.
    #[serde(default = "default_lock_wait_secs")]
    pub lock_wait_secs: u64,
    #[serde(default = "default_capacity")]
    pub collection_capacity: usize,
}

fn default_capacity() -> usize {
    5
}

fn default_poll_wait_ms() -> u64 {
    5000
}

fn default_lock_wait_secs() -> u64 {
    600
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            poll_wait_ms: default_poll_wait_ms(),
            lock_wait_secs: default_lock_wait_secs(),
            collection_capacity: default_capacity(),
        }
    }
}

impl QueueConfig {
    pub fn poll_wait(&self) -> Duration {
        Duration::from_millis(self.poll_wait_ms)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
}

fn default_sweep_interval_secs() -> u64 {
    120
}

fn default_max_age_hours() -> u64 {
    36
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            max_age_hours: default_max_age_hours(),
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 60 * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirusScanConfig {
    #[serde(default = "default_virus_command")]
    pub command: String,
    #[serde(default = "default_virus_options")]
    pub options: Vec<String>,
    /// When set, scans go through clamd listening on this socket.
    #[serde(default)]
    pub clamd_socket: Option<PathBuf>,
    #[serde(default = "default_virus_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_virus_command() -> String {
    "clamscan".to_string()
}

fn default_virus_options() -> Vec<String> {
    vec!["-avr".to_string()]
}

fn default_virus_timeout_secs() -> u64 {
    300
}

impl Default for VirusScanConfig {
    fn default() -> Self {
        Self {
            command: default_virus_command(),
            options: default_virus_options(),
            clamd_socket: None,
            timeout_secs: default_virus_timeout_secs(),
        }
    }
}

impl VirusScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Executable (and leading arguments) of the content engine.
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
