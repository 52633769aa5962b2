//! Git repository detection and queries

use std::path::{Path, PathBuf};

use git2::{DiffOptions, Patch, Repository};

use super::ChangedFileInfo;
use crate::{Error, Result};

/// A git repository wrapper providing the queries autocr needs
pub struct GitRepo {
    /// The underlying git2 repository
    repo: Repository,
    /// Path to the working tree root
    root: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open a git repository at the given path
    ///
    /// This will search upward from the given path to find the repository root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = Repository::discover(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Config(format!(
                    "Not a git repository: {}. Run 'git init' first or navigate to a git repository.",
                    path.display()
                ))
            } else {
                Error::Git(e)
            }
        })?;

        let root = repo
            .workdir()
            .ok_or_else(|| Error::Config("Bare repositories are not supported".to_string()))?
            .to_path_buf();

        Ok(Self { repo, root })
    }

    /// Get the working tree root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the repository control directory (`.git`, or the worktree's gitdir)
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Full hash of the commit HEAD points to
    pub fn head_commit(&self) -> Result<String> {
        let commit = self.repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// Get the current branch name, `None` when detached or unborn
    pub fn current_branch(&self) -> Result<Option<String>> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(Error::Git(e)),
        };

        if head.is_branch() {
            Ok(head.shorthand().map(|s| s.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Resolve a revision (`HEAD`, a branch, a short hash) to a full commit hash
    pub fn resolve_commit(&self, rev: &str) -> Result<String> {
        let commit = self.repo.revparse_single(rev)?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// First line of a commit's message
    pub fn commit_summary(&self, rev: &str) -> Result<String> {
        let commit = self.repo.revparse_single(rev)?.peel_to_commit()?;
        Ok(commit.summary().unwrap_or_default().to_string())
    }

    /// Per-file added/deleted line counts introduced by a commit
    ///
    /// The commit is diffed against its first parent, root commits against the
    /// empty tree. Binary files report zero lines.
    pub fn changed_files(&self, rev: &str) -> Result<Vec<ChangedFileInfo>> {
        let commit = self.repo.revparse_single(rev)?.peel_to_commit()?;
        let commit_tree = commit.tree()?;

        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree()?)
        } else {
            None
        };

        let mut diff_opts = DiffOptions::new();
        let diff = self.repo.diff_tree_to_tree(
            parent_tree.as_ref(),
            Some(&commit_tree),
            Some(&mut diff_opts),
        )?;

        let mut files = Vec::with_capacity(diff.deltas().len());
        for idx in 0..diff.deltas().len() {
            let Some(delta) = diff.get_delta(idx) else {
                continue;
            };

            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();

            if path.is_empty() {
                continue;
            }

            let (added, deleted) = match Patch::from_diff(&diff, idx)? {
                Some(patch) => {
                    let (_, additions, deletions) = patch.line_stats()?;
                    (additions as u64, deletions as u64)
                }
                None => (0, 0),
            };

            files.push(ChangedFileInfo {
                path,
                added,
                deleted,
            });
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::{commit_files, init_repo};
    use tempfile::TempDir;

    #[test]
    fn test_open_non_git_dir() {
        let dir = TempDir::new().unwrap();
        let result = GitRepo::open(dir.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_head_and_summary() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo(dir.path());
        let hash = commit_files(&raw, &[("src/lib.rs", "fn main() {}\n")], "Add lib\n\nbody");

        let repo = GitRepo::open(dir.path()).unwrap();
        assert_eq!(repo.head_commit().unwrap(), hash);
        assert_eq!(repo.resolve_commit("HEAD").unwrap(), hash);
        assert_eq!(repo.commit_summary(&hash).unwrap(), "Add lib");
        assert_eq!(repo.current_branch().unwrap(), Some("main".to_string()));
        assert!(repo.git_dir().ends_with(".git/") || repo.git_dir().ends_with(".git"));
    }

    #[test]
    fn test_head_of_empty_repo_fails() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let repo = GitRepo::open(dir.path()).unwrap();
        assert!(repo.head_commit().is_err());
        assert_eq!(repo.current_branch().unwrap(), None);
    }

    #[test]
    fn test_changed_files_counts_lines() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo(dir.path());
        commit_files(&raw, &[("a.rs", "one\ntwo\nthree\n")], "first");
        let hash = commit_files(
            &raw,
            &[("a.rs", "one\nTWO\nthree\nfour\n"), ("b.md", "x\ny\n")],
            "second",
        );

        let repo = GitRepo::open(dir.path()).unwrap();
        let mut files = repo.changed_files(&hash).unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(
            files,
            vec![
                ChangedFileInfo {
                    path: "a.rs".to_string(),
                    added: 2,
                    deleted: 1
                },
                ChangedFileInfo {
                    path: "b.md".to_string(),
                    added: 2,
                    deleted: 0
                },
            ]
        );
    }

    #[test]
    fn test_changed_files_root_commit() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo(dir.path());
        let hash = commit_files(&raw, &[("README", "a\nb\nc\n")], "root");

        let repo = GitRepo::open(dir.path()).unwrap();
        let files = repo.changed_files(&hash).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].added, 3);
    }

    #[test]
    fn test_changed_files_invalid_hash() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo(dir.path());
        commit_files(&raw, &[("a", "a\n")], "root");

        let repo = GitRepo::open(dir.path()).unwrap();
        assert!(repo.changed_files("deadbeefdeadbeef").is_err());
    }
}
