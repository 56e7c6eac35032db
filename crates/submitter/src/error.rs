use std::path::PathBuf;
use thiserror::Error;

use crate::collection::ImageError;
use crate::engine::EngineError;
use crate::git::GitError;
use crate::github::GitHubError;
use crate::repo::LockError;
use crate::secrets::SecretError;
use crate::virus::VirusScanError;

#[derive(Error, Debug)]
pub enum SubmitterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error("Content engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Malware scan error: {0}")]
    VirusScan(#[from] VirusScanError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Title image error: {0}")]
    Image(#[from] ImageError),

    #[error("Invalid collection: {0}")]
    InvalidCollection(String),

    #[error("No paths to index")]
    NoPaths,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Submission queue is full, try again later")]
    QueueFull,

    #[error("Failed to prepare directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage upload '{path}': {source}")]
    StageFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn {name} thread: {source}")]
    SpawnThread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

pub type Result<T> = std::result::Result<T, SubmitterError>;
