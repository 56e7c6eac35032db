use std::error::Error as StdError;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{JobState, LogKind};

/// One immutable line in a job's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry<S = JobState> {
    pub time: DateTime<Utc>,
    /// Job state after this entry was appended.
    pub state: S,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    /// Error chain rendered to text, for entries caused by a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<S> LogEntry<S> {
    pub(crate) fn new(state: S, message: String, kind: LogKind) -> Self {
        Self {
            time: Utc::now(),
            state,
            message,
            kind,
            error: None,
        }
    }

    pub(crate) fn with_error(state: S, message: String, error: &dyn StdError) -> Self {
        Self {
            time: Utc::now(),
            state,
            message,
            kind: LogKind::Error,
            error: Some(render_error_chain(error)),
        }
    }
}

impl<S> std::fmt::Display for LogEntry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.time.timestamp_millis(),
            self.kind,
            self.message
        )
    }
}

/// Renders an error and its sources as `outer: inner: root`.
pub fn render_error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(rendered, ": {}", cause);
        source = cause.source();
    }
    rendered
}
