//! File-based signal channel between repository hooks and the poller
//!
//! Each channel is a single slot backed by one file under the git dir. Hooks
//! write the slot; the poller consumes it by reading and deleting the file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::Result;

/// Marker written by the post-commit hook (contains a commit hash)
pub const COMMIT_MARKER: &str = ".pending-review";

/// Marker written by the post-merge hook (contains a branch name)
pub const MERGE_MARKER: &str = ".pending-merge-review";

/// One single-slot marker file
#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    /// A marker at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The commit marker for a git dir
    pub fn commit(git_dir: &Path) -> Self {
        Self::new(git_dir.join(COMMIT_MARKER))
    }

    /// The merge marker for a git dir
    pub fn merge(git_dir: &Path) -> Self {
        Self::new(git_dir.join(MERGE_MARKER))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a value is waiting in the slot
    pub fn is_pending(&self) -> bool {
        self.path.exists()
    }

    /// Consume the pending value, if any
    ///
    /// The file is deleted after reading, whatever it holds. A missing, blank
    /// or non UTF-8 file means no event. If the delete fails the value is
    /// still returned and may be seen again on the next call.
    pub fn take(&self) -> Option<String> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read marker {}: {}", self.path.display(), e);
                return None;
            }
        };

        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to delete marker {}: {}. It may be read again.",
                    self.path.display(),
                    e
                );
            }
        }

        let contents = match String::from_utf8(bytes) {
            Ok(c) => c,
            Err(_) => {
                tracing::warn!("Discarding marker {}: not valid UTF-8", self.path.display());
                return None;
            }
        };

        let value = contents.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Write a value into the slot, replacing any pending one
    pub fn post(&self, value: &str) -> Result<()> {
        std::fs::write(&self.path, format!("{}\n", value.trim()))?;
        Ok(())
    }
}

/// The commit and merge markers of one repository
#[derive(Debug, Clone)]
pub struct MarkerChannel {
    /// Commit slot
    pub commit: MarkerFile,
    /// Merge slot
    pub merge: MarkerFile,
}

impl MarkerChannel {
    /// Markers under the given git dir
    pub fn new(git_dir: &Path) -> Self {
        Self {
            commit: MarkerFile::commit(git_dir),
            merge: MarkerFile::merge(git_dir),
        }
    }
}
