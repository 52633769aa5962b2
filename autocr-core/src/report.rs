//! Review report watcher
//!
//! Notices report files the assistant writes into the output directory and
//! tells the user how many critical issues the report lists.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use ::notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use tokio::sync::mpsc;

use crate::config::NotifyMode;
use crate::instruction::report_output_dir;
use crate::notify::Notifier;
use crate::pipeline::Session;
use crate::Result;

/// Heading of the critical issue section
pub const CRITICAL_HEADING: &str = "### 🔴 严重问题";

/// Only the head of a report is scanned
const MAX_LINES_TO_SCAN: usize = 50;

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*]\s+\S|^\d+\.\s+\S").expect("Invalid list item regex"));

/// Count list items under the critical heading in the first 50 lines
///
/// The section ends at the next `### ` heading that is not itself marked red.
pub fn parse_critical_count(content: &str) -> usize {
    let mut in_section = false;
    let mut count = 0;

    for line in content.lines().take(MAX_LINES_TO_SCAN) {
        if line.contains(CRITICAL_HEADING) {
            in_section = true;
            continue;
        }
        if !in_section {
            continue;
        }
        if line.starts_with("### ") && !line.contains('🔴') {
            break;
        }
        if LIST_ITEM.is_match(line) {
            count += 1;
        }
    }

    count
}

/// Whether `name` looks like a review report
pub fn is_report_file(name: &str) -> bool {
    (name.starts_with("review-") || name.starts_with("prd-review-")) && name.ends_with(".md")
}

/// Pause between size checks of a new report
pub const SETTLE_INTERVAL: Duration = Duration::from_millis(300);

/// Size checks before a still growing report is read anyway
const SETTLE_MAX_CHECKS: u32 = 20;

/// Detects report files created after the watcher started
///
/// File system events for the directory arrive over a channel. A new report
/// is handed out once its size is unchanged between two checks, so
/// half-written reports are not parsed.
pub struct ReportWatcher {
    dir: PathBuf,
    known: HashSet<OsString>,
    events: mpsc::UnboundedReceiver<PathBuf>,
    settle_interval: Duration,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for ReportWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportWatcher")
            .field("dir", &self.dir)
            .field("known", &self.known.len())
            .finish_non_exhaustive()
    }
}

impl ReportWatcher {
    /// Start watching `dir`; reports already present are ignored
    pub fn start(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let known = existing_reports(&dir);
        let (tx, events) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |result: ::notify::Result<Event>| match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        return;
                    }
                    for path in event.paths {
                        if report_name(&path).is_some() && tx.send(path).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => tracing::warn!("Report watch error: {}", e),
            },
            ::notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            dir,
            known,
            events,
            settle_interval: SETTLE_INTERVAL,
            _watcher: watcher,
        })
    }

    /// Override the pause between size checks
    pub fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    /// Watched directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Wait for the next new report whose size has settled
    ///
    /// Each report is handed out once. Returns `None` when the watcher stops.
    pub async fn next_report(&mut self) -> Option<PathBuf> {
        while let Some(path) = self.events.recv().await {
            let Some(name) = report_name(&path) else {
                continue;
            };
            if self.known.contains(&name) {
                continue;
            }

            // Event paths may be canonicalized differently from `dir`
            let path = self.dir.join(&name);
            if settle(&path, self.settle_interval).await.is_some() {
                self.known.insert(name);
                return Some(path);
            }
        }
        None
    }
}

fn report_name(path: &Path) -> Option<OsString> {
    let name = path.file_name()?;
    is_report_file(&name.to_string_lossy()).then(|| name.to_os_string())
}

fn existing_reports(dir: &Path) -> HashSet<OsString> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return HashSet::new();
    };

    entries
        .flatten()
        .map(|e| e.file_name())
        .filter(|name| is_report_file(&name.to_string_lossy()))
        .collect()
}

/// Wait until the size of `path` stops changing
///
/// `None` if the file vanished or stayed empty.
async fn settle(path: &Path, interval: Duration) -> Option<u64> {
    let mut last = file_len(path)?;
    for _ in 0..SETTLE_MAX_CHECKS {
        tokio::time::sleep(interval).await;
        let len = file_len(path)?;
        if len == last && len > 0 {
            return Some(len);
        }
        last = len;
    }
    (last > 0).then_some(last)
}

fn file_len(path: &Path) -> Option<u64> {
    let meta = std::fs::metadata(path).ok()?;
    meta.is_file().then(|| meta.len())
}

/// Read one report and notify the user; returns the critical count
pub fn notify_report(path: &Path, mode: NotifyMode, notifier: &dyn Notifier) -> Option<usize> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            notifier.error(&format!(
                "Failed to read review report {}: {}",
                path.display(),
                e
            ));
            return None;
        }
    };

    let critical = parse_critical_count(&content);
    if critical > 0 {
        notifier.warn(&format!(
            "Review finished with {} critical issue(s), see {}",
            critical,
            path.display()
        ));
    } else if mode == NotifyMode::Always {
        notifier.info(&format!(
            "Review finished with no critical issues, see {}",
            path.display()
        ));
    } else {
        tracing::info!("Review finished with no critical issues: {}", path.display());
    }

    Some(critical)
}

/// Watch the report directory until the surrounding task is dropped
///
/// The directory is taken from the configuration at start; the notification
/// mode is re-read for every report.
pub async fn run(session: Arc<Session>) {
    let config = match session.config() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Report watcher not started: {}", e);
            return;
        }
    };
    let watcher = report_output_dir(session.root(), &config).and_then(ReportWatcher::start);
    let mut watcher = match watcher {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!("Report watcher not started: {}", e);
            return;
        }
    };
    tracing::debug!("Watching reports in {}", watcher.dir().display());

    while let Some(path) = watcher.next_report().await {
        let mode = session
            .config()
            .map(|c| c.notify_on_complete)
            .unwrap_or(config.notify_on_complete);
        notify_report(&path, mode, session.notifier());
    }
    tracing::debug!("Report watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Level, MemoryNotifier};
    use tempfile::TempDir;

    const REPORT: &str = "# Review\n\n### 🔴 严重问题\n- SQL injection in login\n* token logged\n1. missing auth check\n\n### 🟡 建议\n- rename variable\n";

    #[test]
    fn test_parse_critical_count() {
        assert_eq!(parse_critical_count(REPORT), 3);
        assert_eq!(parse_critical_count("# Review\n- item\n"), 0);
        assert_eq!(parse_critical_count("### 🔴 严重问题\n无\n"), 0);
    }

    #[test]
    fn test_parse_only_scans_head() {
        let mut content = "filler\n".repeat(MAX_LINES_TO_SCAN);
        content.push_str("### 🔴 严重问题\n- late\n");
        assert_eq!(parse_critical_count(&content), 0);
    }

    #[test]
    fn test_is_report_file() {
        assert!(is_report_file("review-2024-01-01.md"));
        assert!(is_report_file("prd-review-x.md"));
        assert!(!is_report_file("review-x.txt"));
        assert!(!is_report_file("notes.md"));
    }

    #[tokio::test]
    async fn test_watcher_reports_new_files_once() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("review-old.md");
        std::fs::write(&old, "old").unwrap();

        let mut watcher = ReportWatcher::start(dir.path())
            .unwrap()
            .with_settle_interval(Duration::from_millis(20));

        std::fs::write(&old, "old, edited").unwrap();
        std::fs::write(dir.path().join("notes.md"), "x").unwrap();
        let new = dir.path().join("review-new.md");
        std::fs::write(&new, REPORT).unwrap();

        let found = tokio::time::timeout(Duration::from_secs(5), watcher.next_report())
            .await
            .unwrap();
        assert_eq!(found, Some(new.clone()));

        // Touching a report already handed out does not repeat it
        std::fs::write(&new, REPORT).unwrap();
        let prd = dir.path().join("prd-review-login.md");
        std::fs::write(&prd, REPORT).unwrap();

        let found = tokio::time::timeout(Duration::from_secs(5), watcher.next_report())
            .await
            .unwrap();
        assert_eq!(found, Some(prd));
    }

    #[test]
    fn test_watcher_needs_existing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(ReportWatcher::start(dir.path().join("missing")).is_err());
    }

    #[tokio::test]
    async fn test_settle() {
        let dir = TempDir::new().unwrap();
        let tick = Duration::from_millis(1);

        let full = dir.path().join("review-a.md");
        std::fs::write(&full, REPORT).unwrap();
        assert_eq!(settle(&full, tick).await, Some(REPORT.len() as u64));

        let empty = dir.path().join("review-b.md");
        std::fs::write(&empty, "").unwrap();
        assert_eq!(settle(&empty, tick).await, None);

        assert_eq!(settle(&dir.path().join("review-c.md"), tick).await, None);
    }

    #[test]
    fn test_notify_levels() {
        let dir = TempDir::new().unwrap();
        let critical = dir.path().join("review-a.md");
        let clean = dir.path().join("review-b.md");
        std::fs::write(&critical, REPORT).unwrap();
        std::fs::write(&clean, "# Review\nall good\n").unwrap();

        let notifier = MemoryNotifier::new();
        assert_eq!(notify_report(&critical, NotifyMode::CriticalOnly, &notifier), Some(3));
        assert_eq!(notify_report(&clean, NotifyMode::CriticalOnly, &notifier), Some(0));
        assert_eq!(notifier.at(Level::Warning).len(), 1);
        assert!(notifier.at(Level::Info).is_empty());

        assert_eq!(notify_report(&clean, NotifyMode::Always, &notifier), Some(0));
        assert_eq!(notifier.at(Level::Info).len(), 1);

        assert_eq!(
            notify_report(&dir.path().join("review-missing.md"), NotifyMode::Always, &notifier),
            None
        );
        assert_eq!(notifier.at(Level::Error).len(), 1);
    }
}
