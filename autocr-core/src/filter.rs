//! Changed-line filter
//!
//! Decides whether a commit is large enough to be worth a review after
//! documentation, excluded directories and (optionally) test files are taken
//! out of the count.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Config;
use crate::git::{ChangedFileInfo, GitRepo};

static TEST_FILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)Test\.(java|kt|kts|ts|js|tsx|jsx)$",
        r"(?i)Tests\.(java|kt|kts)$",
        r"(?i)Spec\.(java|kt|kts|ts|js)$",
        r"(?i)^test_.*\.py$",
        r"(?i)\.(test|spec)\.(ts|js|tsx|jsx)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid test file regex"))
    .collect()
});

/// Check whether a file name looks like a test file
pub fn is_test_file(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    let name = normalized.rsplit('/').next().unwrap_or(&normalized);
    TEST_FILE_PATTERNS.iter().any(|p| p.is_match(name))
}

/// Which files do not count towards the changed-line total
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    /// Extensions, stored lowercase with a leading dot
    pub exclude_extensions: Vec<String>,
    /// Path prefixes, stored with forward slashes
    pub exclude_paths: Vec<String>,
    /// Whether test files are excluded
    pub exclude_test_files: bool,
}

impl ExclusionPolicy {
    /// Build a policy, normalizing extension and path entries
    pub fn new(
        extensions: &[String],
        paths: &[String],
        exclude_test_files: bool,
    ) -> Self {
        let exclude_extensions = extensions
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .map(|e| if e.starts_with('.') { e } else { format!(".{}", e) })
            .collect();

        let exclude_paths = paths
            .iter()
            .map(|p| p.trim().replace('\\', "/"))
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            exclude_extensions,
            exclude_paths,
            exclude_test_files,
        }
    }

    /// Build the policy from the current configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.exclude_extensions,
            &config.exclude_paths,
            config.exclude_test_files,
        )
    }

    /// Check whether a changed file is excluded
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_by_extension(path)
            || self.excluded_by_path(path)
            || (self.exclude_test_files && is_test_file(path))
    }

    fn excluded_by_extension(&self, path: &str) -> bool {
        let Some(ext) = Path::new(path).extension() else {
            return false;
        };
        let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
        self.exclude_extensions.iter().any(|e| *e == ext)
    }

    fn excluded_by_path(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        self.exclude_paths.iter().any(|p| normalized.starts_with(p.as_str()))
    }
}

/// Included-line summary for one commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSummary {
    /// Sum of added + deleted lines over included files
    pub total_lines: u64,
    /// Number of included files
    pub included_files: usize,
    /// Number of files the commit touched
    pub changed_files: usize,
}

impl ChangeSummary {
    /// Summarize a commit's changed files under a policy
    pub fn from_files(files: &[ChangedFileInfo], policy: &ExclusionPolicy) -> Self {
        let mut total_lines = 0;
        let mut included_files = 0;

        for file in files.iter().filter(|f| !policy.is_excluded(&f.path)) {
            included_files += 1;
            total_lines += file.total();
        }

        Self {
            total_lines,
            included_files,
            changed_files: files.len(),
        }
    }

    /// The commit touched files but every one of them was excluded
    pub fn all_excluded(&self) -> bool {
        self.changed_files > 0 && self.included_files == 0
    }
}

/// Outcome of the changed-line check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDecision {
    /// Whether the commit should not be reviewed
    pub skip: bool,
    /// Why the commit is skipped
    pub reason: Option<String>,
}

impl SkipDecision {
    fn review() -> Self {
        Self {
            skip: false,
            reason: None,
        }
    }

    fn skip(reason: String) -> Self {
        Self {
            skip: true,
            reason: Some(reason),
        }
    }
}

/// Apply the skip rules to an already computed summary
pub fn decide(summary: &ChangeSummary, min_changed_lines: u64) -> SkipDecision {
    if summary.all_excluded() {
        return SkipDecision::skip(format!(
            "all {} changed files are excluded, skipping review",
            summary.changed_files
        ));
    }

    if summary.total_lines < min_changed_lines {
        return SkipDecision::skip(format!(
            "only {} < {} changed lines, skipping review",
            summary.total_lines, min_changed_lines
        ));
    }

    SkipDecision::review()
}

/// Decide whether a commit should be skipped
///
/// A failing repository query counts as a commit with no changed files.
pub fn should_skip(
    repo: &GitRepo,
    commit: &str,
    policy: &ExclusionPolicy,
    min_changed_lines: u64,
) -> SkipDecision {
    let files = repo.changed_files(commit).unwrap_or_else(|e| {
        tracing::debug!("Could not read changes for {}: {}", commit, e);
        Vec::new()
    });

    let summary = ChangeSummary::from_files(&files, policy);
    let decision = decide(&summary, min_changed_lines);

    tracing::debug!(
        commit = %commit,
        total_lines = summary.total_lines,
        included = summary.included_files,
        changed = summary.changed_files,
        skip = decision.skip,
        "Evaluated changed lines"
    );

    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::{commit_files, init_repo, lines};
    use tempfile::TempDir;

    fn file(path: &str, added: u64, deleted: u64) -> ChangedFileInfo {
        ChangedFileInfo {
            path: path.to_string(),
            added,
            deleted,
        }
    }

    fn policy(exts: &[&str], paths: &[&str], tests: bool) -> ExclusionPolicy {
        let exts: Vec<String> = exts.iter().map(|s| s.to_string()).collect();
        let paths: Vec<String> = paths.iter().map(|s| s.to_string()).collect();
        ExclusionPolicy::new(&exts, &paths, tests)
    }

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file("src/UserServiceTest.java"));
        assert!(is_test_file("src/UserServiceTests.kt"));
        assert!(is_test_file("app/LoginSpec.ts"));
        assert!(is_test_file("pkg/test_utils.py"));
        assert!(is_test_file("web/button.test.tsx"));
        assert!(is_test_file("web/button.spec.js"));
        assert!(is_test_file("win\\dir\\test_x.py"));

        assert!(!is_test_file("src/testing.rs"));
        assert!(!is_test_file("pkg/utils_test.go"));
        assert!(!is_test_file("src/contest.py"));
        assert!(!is_test_file("src/Latest.java.bak"));
    }

    #[test]
    fn test_extension_case_insensitive() {
        let p = policy(&[".MD", "txt"], &[], false);
        assert!(p.is_excluded("README.md"));
        assert!(p.is_excluded("docs/Guide.Md"));
        assert!(p.is_excluded("notes.TXT"));
        assert!(!p.is_excluded("src/main.rs"));
        assert!(!p.is_excluded("Makefile"));
    }

    #[test]
    fn test_path_prefix_normalized() {
        let p = policy(&[], &["vendor\\", "generated/"], false);
        assert!(p.is_excluded("vendor/lib.c"));
        assert!(p.is_excluded("generated\\api.rs"));
        assert!(!p.is_excluded("src/vendor/lib.c"));
    }

    #[test]
    fn test_test_files_only_when_enabled() {
        assert!(!policy(&[], &[], false).is_excluded("a.test.ts"));
        assert!(policy(&[], &[], true).is_excluded("a.test.ts"));
    }

    #[test]
    fn test_all_excluded_wins_over_threshold() {
        let p = policy(&[".md"], &[], false);
        let summary = ChangeSummary::from_files(&[file("README.md", 500, 0)], &p);
        let decision = decide(&summary, 20);
        assert!(decision.skip);
        assert!(decision.reason.unwrap().contains("excluded"));
    }

    #[test]
    fn test_below_threshold() {
        let p = policy(&[".md"], &[], false);
        let summary = ChangeSummary::from_files(
            &[file("src/a.rs", 10, 5), file("README.md", 300, 0)],
            &p,
        );
        assert_eq!(summary.total_lines, 15);
        let decision = decide(&summary, 20);
        assert!(decision.skip);
        assert!(decision.reason.unwrap().contains("15 < 20"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let p = ExclusionPolicy::default();
        let at = ChangeSummary::from_files(&[file("a.rs", 12, 8)], &p);
        assert_eq!(decide(&at, 20), SkipDecision::review());

        let below = ChangeSummary::from_files(&[file("a.rs", 12, 7)], &p);
        assert!(decide(&below, 20).skip);
    }

    #[test]
    fn test_empty_commit_uses_threshold_rule() {
        let summary = ChangeSummary::from_files(&[], &ExclusionPolicy::default());
        assert!(!summary.all_excluded());
        let decision = decide(&summary, 20);
        assert!(decision.skip);
        assert!(decision.reason.unwrap().contains("0 < 20"));
    }

    #[test]
    fn test_should_skip_against_repository() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo(dir.path());
        commit_files(&raw, &[("seed.txt", "seed\n")], "seed");
        let small = commit_files(&raw, &[("src/a.rs", &lines(5))], "small");
        let large = commit_files(&raw, &[("src/b.rs", &lines(25))], "large");

        let repo = GitRepo::open(dir.path()).unwrap();
        let p = policy(&[".md"], &[], true);

        assert!(should_skip(&repo, &small, &p, 20).skip);
        assert!(!should_skip(&repo, &large, &p, 20).skip);
    }

    #[test]
    fn test_query_failure_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo(dir.path());
        commit_files(&raw, &[("a.rs", "a\n")], "root");

        let repo = GitRepo::open(dir.path()).unwrap();
        let decision = should_skip(&repo, "0000000000000000000000000000000000000000", &ExclusionPolicy::default(), 20);
        assert!(decision.skip);
    }
}
