//! Content engine: recognises and indexes submitted content.
//!
//! The engine is a black box that reports what it finds as tagged events.
//! The repository gateway interprets those events; it never decides on
//! content classification itself.

pub mod command;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collection::CollectionManifest;
use crate::job::ContentType;
use crate::repo::ContentView;

pub use command::CommandEngine;

/// Errors raised by a content engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to start content engine '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Content engine I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Content engine exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Outcome of scanning a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub path: PathBuf,
    pub content_type: ContentType,
    /// Already present in the content index.
    #[serde(default)]
    pub known: bool,
    /// Set when the file could not be scanned.
    #[serde(default)]
    pub failure: Option<String>,
}

/// Content produced by indexing a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResult {
    pub path: PathBuf,
    pub content_type: ContentType,
    pub name: String,
    #[serde(default)]
    pub author: String,
    /// Short game name, e.g. `UT`.
    pub game: String,
}

impl std::fmt::Display for IndexResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}] {}", self.game, self.content_type, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ScanEvent {
    Starting { found: usize },
    Progress { scanned: usize, total: usize, path: PathBuf },
    Scanned(ScanResult),
    Completed { scanned: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum IndexEvent {
    Starting {
        found: usize,
    },
    Progress {
        indexed: usize,
        total: usize,
        path: PathBuf,
    },
    Indexed {
        path: PathBuf,
        #[serde(default)]
        result: Option<IndexResult>,
        #[serde(default)]
        log: Vec<String>,
    },
    Completed {
        indexed: usize,
        errors: usize,
    },
}

/// Output of a collection checkin, archive or sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum CurateEvent {
    Log { message: String },
    Completed,
}

/// The scanner and indexer consumed by the pipeline.
pub trait ContentEngine: Send + Sync {
    /// Classifies each of `paths` against `view`, reporting through `sink`.
    fn scan(
        &self,
        view: &ContentView,
        paths: &[PathBuf],
        sink: &mut dyn FnMut(ScanEvent),
    ) -> Result<()>;

    /// Indexes `paths` into the working copy behind `view`.
    ///
    /// Per-file failures are reported as `Indexed` events without a result;
    /// an `Err` means the whole batch failed.
    fn index(
        &self,
        view: &ContentView,
        paths: &[PathBuf],
        forced_type: Option<ContentType>,
        sink: &mut dyn FnMut(IndexEvent),
    ) -> Result<()>;
}

/// Records curated collections in the working copy and builds their
/// downloadable archives.
pub trait CollectionCurator: Send + Sync {
    /// Writes the collection record, attaching `image` as its title image.
    fn checkin(
        &self,
        view: &ContentView,
        manifest: &CollectionManifest,
        image: Option<&Path>,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<()>;

    fn archive(
        &self,
        view: &ContentView,
        manifest: &CollectionManifest,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<()>;

    /// Uploads the archive and records its download location.
    fn sync(
        &self,
        view: &ContentView,
        manifest: &CollectionManifest,
        sink: &mut dyn FnMut(CurateEvent),
    ) -> Result<()>;
}

/// Absolute form of `path` for handing to external tools.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_event_wire_format() {
        let event: ScanEvent = serde_json::from_str(
            r#"{"event":"scanned","path":"/tmp/a.zip","contentType":"MAP","known":false}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ScanEvent::Scanned(ScanResult {
                path: PathBuf::from("/tmp/a.zip"),
                content_type: ContentType::Map,
                known: false,
                failure: None,
            })
        );
    }

    #[test]
    fn test_index_event_without_result() {
        let event: IndexEvent =
            serde_json::from_str(r#"{"event":"indexed","path":"/tmp/a.zip","log":["bad header"]}"#)
                .unwrap();
        match event {
            IndexEvent::Indexed { result, log, .. } => {
                assert!(result.is_none());
                assert_eq!(log, vec!["bad header"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_index_result_display() {
        let result = IndexResult {
            path: PathBuf::from("dm-deck16.zip"),
            content_type: ContentType::Map,
            name: "DM-Deck16".to_string(),
            author: "Elliot Cannon".to_string(),
            game: "UT".to_string(),
        };
        assert_eq!(result.to_string(), "[UT MAP] DM-Deck16");
    }

    #[test]
    fn test_curate_event_wire_format() {
        let event: CurateEvent =
            serde_json::from_str(r#"{"event":"log","message":"Archive written"}"#).unwrap();
        assert_eq!(
            event,
            CurateEvent::Log {
                message: "Archive written".to_string()
            }
        );
        let done: CurateEvent = serde_json::from_str(r#"{"event":"completed"}"#).unwrap();
        assert_eq!(done, CurateEvent::Completed);
    }
}
