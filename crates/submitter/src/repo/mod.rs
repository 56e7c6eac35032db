//! The shared content repository: its lock, content view, publish
//! sequence and background refresh.

pub mod gateway;
pub mod lock;
pub mod refresh;
pub mod view;

pub use gateway::{
    commit_message, pull_request_body, ContentRepository, RefreshOutcome, RepositorySettings,
};
pub use lock::{LockError, RepoLock, RepoLockGuard};
pub use refresh::RefreshScheduler;
pub use view::ContentView;
