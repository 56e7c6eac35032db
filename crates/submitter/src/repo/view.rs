//! Immutable snapshot of the content index.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

/// Content catalogue as of one revision of the default branch.
///
/// A view is never mutated. A refresh builds a new one and publishes it;
/// work already holding the old view keeps using it.
#[derive(Debug, Clone)]
pub struct ContentView {
    root: PathBuf,
    content_dir: PathBuf,
    revision: String,
    loaded_at: DateTime<Utc>,
    entries: BTreeSet<PathBuf>,
}

impl ContentView {
    /// Loads the catalogue under `root/content_path` at `revision`.
    ///
    /// Unreadable entries are skipped with a warning; a missing content
    /// directory yields an empty view.
    pub fn load(root: &Path, content_path: &str, revision: impl Into<String>) -> Self {
        let content_dir = root.join(content_path);
        let mut entries = BTreeSet::new();

        if content_dir.is_dir() {
            for entry in WalkDir::new(&content_dir).follow_links(false) {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        if let Ok(relative) = entry.path().strip_prefix(&content_dir) {
                            entries.insert(relative.to_path_buf());
                        }
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("Skipping unreadable content entry: {}", e),
                }
            }
        }

        let view = Self {
            root: root.to_path_buf(),
            content_dir,
            revision: revision.into(),
            loaded_at: Utc::now(),
            entries,
        };

        log::info!(
            "Loaded content index with {} entries at revision {}",
            view.entries.len(),
            view.revision
        );

        view
    }

    /// Root of the working copy this view was loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a catalogue entry exists at `relative` (relative to the content directory).
    pub fn contains(&self, relative: &Path) -> bool {
        self.entries.contains(relative)
    }
}
