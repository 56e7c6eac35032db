pub mod collection;
pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod github;
pub mod job;
pub mod logging;
pub mod registry;
pub mod repo;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod virus;
pub mod worker;

pub use config::{load_config, Config};
pub use error::{ConfigError, Result, SubmitterError};
pub use job::{CollectionJob, CollectionState, ContentType, Job, JobState, LogEntry, LogKind};
pub use repo::ContentRepository;
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use service::{ServiceOptions, SubmitterService};
