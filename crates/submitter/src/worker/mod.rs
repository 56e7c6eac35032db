//! Submission queue, the stage runner and the worker that drives it.

pub mod pending;
pub mod processor;
pub mod queue;
pub mod snapshot;
pub mod stages;

pub use pending::{PendingSubmission, SubmissionSnapshot};
pub use processor::{QueueWorker, SubmissionProcessor};
pub use queue::SubmissionQueue;
pub use snapshot::JobSnapshotWriter;
pub use stages::StageRunner;
