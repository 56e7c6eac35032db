//! Plain data types for working-copy operations.

use serde::{Deserialize, Serialize};

/// Untracked and modified paths in the working copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingCopyStatus {
    pub untracked: Vec<String>,
    pub modified: Vec<String>,
}

impl WorkingCopyStatus {
    pub fn is_clean(&self) -> bool {
        self.untracked.is_empty() && self.modified.is_empty()
    }
}

/// Author and committer identity for publish commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl std::fmt::Display for CommitIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
