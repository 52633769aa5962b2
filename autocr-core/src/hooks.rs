//! Git hook installation
//!
//! The hooks are the producer side of the marker channel: `post-commit`
//! writes the new HEAD into the commit marker, `post-merge` writes the merged
//! branch name into the merge marker when the merge landed on a primary
//! branch. Each block is delimited so installation is idempotent and leaves
//! existing hook content alone.

use std::path::{Path, PathBuf};
use serde::Serialize;

use crate::marker::{COMMIT_MARKER, MERGE_MARKER};
use crate::Result;

/// Delimiter tag of the post-commit block
pub const POST_COMMIT_TAG: &str = "AUTOCR_POST_COMMIT";
/// Delimiter tag of the post-merge block
pub const POST_MERGE_TAG: &str = "AUTOCR_POST_MERGE";

/// One of the hooks this crate manages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// `post-commit`
    PostCommit,
    /// `post-merge`
    PostMerge,
}

impl HookKind {
    /// File name under `hooks/`
    pub fn file_name(&self) -> &'static str {
        match self {
            HookKind::PostCommit => "post-commit",
            HookKind::PostMerge => "post-merge",
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            HookKind::PostCommit => POST_COMMIT_TAG,
            HookKind::PostMerge => POST_MERGE_TAG,
        }
    }

    /// Path of the hook file in `git_dir`
    pub fn path(&self, git_dir: &Path) -> PathBuf {
        git_dir.join("hooks").join(self.file_name())
    }
}

/// Result of an install request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The block was appended
    Installed,
    /// The block was already there
    AlreadyPresent,
}

/// Which managed blocks are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HookStatus {
    /// Post-commit block installed
    pub post_commit: bool,
    /// Post-merge block installed
    pub post_merge: bool,
}

/// Shell block for `post-commit`
pub fn post_commit_script(git_dir: &Path) -> String {
    format!(
        r#"
# --- {tag} ---
MARKER_FILE="{marker}"
git rev-parse HEAD > "$MARKER_FILE" 2>/dev/null || true
# --- end {tag} ---
"#,
        tag = POST_COMMIT_TAG,
        marker = shell_path(&git_dir.join(COMMIT_MARKER)),
    )
}

/// Shell block for `post-merge`
///
/// With no primary branches configured every branch counts as primary.
pub fn post_merge_script(git_dir: &Path, primary_branches: &[String]) -> String {
    let branches: Vec<&str> = primary_branches
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .collect();
    let pattern = if branches.is_empty() {
        "*".to_string()
    } else {
        branches.join("|")
    };

    format!(
        r#"
# --- {tag} ---
MARKER_FILE="{marker}"
CUR=$(git rev-parse --abbrev-ref HEAD 2>/dev/null)
case "$CUR" in
  {pattern})
    MSG=$(git log -1 --pretty=%s HEAD 2>/dev/null)
    BRANCH=$(echo "$MSG" | sed -n "s/^Merge branch '\([^']*\)'.*/\1/p")
    [ -z "$BRANCH" ] && BRANCH=$(echo "$MSG" | sed -n 's/^Merge branch "\([^"]*\)".*/\1/p')
    [ -n "$BRANCH" ] && echo "$BRANCH" > "$MARKER_FILE" 2>/dev/null
    ;;
esac
true
# --- end {tag} ---
"#,
        tag = POST_MERGE_TAG,
        marker = shell_path(&git_dir.join(MERGE_MARKER)),
        pattern = pattern,
    )
}

fn shell_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Append the post-commit block unless present
pub fn install_post_commit_hook(git_dir: &Path) -> Result<InstallOutcome> {
    install(git_dir, HookKind::PostCommit, &post_commit_script(git_dir))
}

/// Append the post-merge block unless present
pub fn install_post_merge_hook(git_dir: &Path, primary_branches: &[String]) -> Result<InstallOutcome> {
    install(
        git_dir,
        HookKind::PostMerge,
        &post_merge_script(git_dir, primary_branches),
    )
}

fn install(git_dir: &Path, kind: HookKind, block: &str) -> Result<InstallOutcome> {
    let path = kind.path(git_dir);

    let existing = if path.exists() {
        std::fs::read_to_string(&path)?
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        String::new()
    };

    if existing.contains(kind.tag()) {
        tracing::info!("{} hook already contains the autocr block", kind.file_name());
        return Ok(InstallOutcome::AlreadyPresent);
    }

    let mut content = existing;
    if content.is_empty() {
        content.push_str("#!/bin/sh\n");
    }
    content.push_str(block);
    std::fs::write(&path, content)?;
    make_executable(&path)?;

    tracing::info!("Installed {} hook at {}", kind.file_name(), path.display());
    Ok(InstallOutcome::Installed)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Whether the managed block of `kind` is installed
pub fn is_installed(git_dir: &Path, kind: HookKind) -> bool {
    std::fs::read_to_string(kind.path(git_dir))
        .map(|content| content.contains(kind.tag()))
        .unwrap_or(false)
}

/// Presence of both managed blocks
pub fn hook_status(git_dir: &Path) -> HookStatus {
    HookStatus {
        post_commit: is_installed(git_dir, HookKind::PostCommit),
        post_merge: is_installed(git_dir, HookKind::PostMerge),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_install_creates_executable_hook() {
        let dir = TempDir::new().unwrap();
        let git_dir = dir.path();

        assert_eq!(
            install_post_commit_hook(git_dir).unwrap(),
            InstallOutcome::Installed
        );

        let path = HookKind::PostCommit.path(git_dir);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#!/bin/sh\n"));
        assert!(content.contains("# --- AUTOCR_POST_COMMIT ---"));
        assert!(content.contains(&shell_path(&git_dir.join(COMMIT_MARKER))));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_install_is_idempotent_and_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let git_dir = dir.path();
        let path = HookKind::PostMerge.path(git_dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "#!/bin/bash\necho existing\n").unwrap();

        let primary = vec!["main".to_string(), "develop".to_string()];
        assert_eq!(
            install_post_merge_hook(git_dir, &primary).unwrap(),
            InstallOutcome::Installed
        );
        assert_eq!(
            install_post_merge_hook(git_dir, &primary).unwrap(),
            InstallOutcome::AlreadyPresent
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#!/bin/bash\necho existing\n"));
        assert_eq!(content.matches("# --- AUTOCR_POST_MERGE ---").count(), 1);
        assert!(content.contains("  main|develop)"));
    }

    #[test]
    fn test_empty_primary_branches_match_any() {
        let script = post_merge_script(Path::new("/repo/.git"), &[]);
        assert!(script.contains("  *)"));
    }

    #[test]
    fn test_hook_status() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            hook_status(dir.path()),
            HookStatus {
                post_commit: false,
                post_merge: false
            }
        );

        install_post_commit_hook(dir.path()).unwrap();
        let status = hook_status(dir.path());
        assert!(status.post_commit);
        assert!(!status.post_merge);
    }
}
