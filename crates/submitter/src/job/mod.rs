//! Submission jobs and their event logs.

pub mod content_type;
pub mod entry;
pub mod handle;
pub mod state;

pub use content_type::ContentType;
pub use entry::{render_error_chain, LogEntry};
pub use handle::{CollectionJob, Job, JobSnapshot, LOG_EVENT_CAPACITY};
pub use state::{CollectionState, JobState, LogKind, Phase};
