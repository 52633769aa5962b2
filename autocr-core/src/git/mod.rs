//! Git operations for autocr
//!
//! This module provides repository detection and the read-only queries the
//! poller and change filter need (HEAD, per-commit line stats, summaries).

mod repo;

pub use repo::GitRepo;

/// Lines added and deleted in one file by one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFileInfo {
    /// Path relative to the repository root
    pub path: String,
    /// Lines added
    pub added: u64,
    /// Lines deleted
    pub deleted: u64,
}

impl ChangedFileInfo {
    /// Total changed lines in this file
    pub fn total(&self) -> u64 {
        self.added + self.deleted
    }
}
