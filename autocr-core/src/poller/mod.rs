//! Commit and merge event detection
//!
//! The poller merges two evidence sources for commits (the hook-written marker
//! and a direct HEAD comparison) plus the merge marker into at most one commit
//! and one merge event per tick. Dedup state is updated synchronously inside
//! [`EventPoller::tick`]; pipelines are spawned afterwards and never joined, so
//! a slow review may overlap with later ticks.

mod dedup;

use std::sync::Arc;
use std::time::Duration;

pub use dedup::{ProcessedHashes, PROCESSED_CAPACITY};

use crate::config::TriggerKind;
use crate::git::GitRepo;
use crate::marker::MarkerChannel;
use crate::pipeline::{self, Session};

/// Shortest accepted poll interval
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// An event waiting to be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEvent {
    /// A new commit hash
    Commit(String),
    /// A merge of the named branch
    Merge(String),
}

impl PendingEvent {
    /// The trigger this event feeds
    pub fn kind(&self) -> TriggerKind {
        match self {
            PendingEvent::Commit(_) => TriggerKind::Commit,
            PendingEvent::Merge(_) => TriggerKind::Merge,
        }
    }
}

/// Which sources are consulted on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionToggles {
    /// Commit marker and HEAD comparison
    pub commits: bool,
    /// Merge marker
    pub merges: bool,
}

/// Timer-driven detector of commit and merge events
#[derive(Debug)]
pub struct EventPoller {
    markers: MarkerChannel,
    last_head: Option<String>,
    processed: ProcessedHashes,
    pending_commit: Option<String>,
    pending_merge: Option<String>,
}

impl EventPoller {
    /// Create a poller that treats `initial_head` as already observed
    pub fn new(markers: MarkerChannel, initial_head: Option<String>) -> Self {
        Self {
            markers,
            last_head: initial_head,
            processed: ProcessedHashes::default(),
            pending_commit: None,
            pending_merge: None,
        }
    }

    /// Create a poller for a repository, starting from its current HEAD
    pub fn for_repo(repo: &GitRepo) -> Self {
        Self::new(MarkerChannel::new(repo.git_dir()), repo.head_commit().ok())
    }

    /// Last HEAD seen by the poller
    pub fn last_head(&self) -> Option<&str> {
        self.last_head.as_deref()
    }

    /// Hashes already dispatched
    pub fn processed(&self) -> &ProcessedHashes {
        &self.processed
    }

    /// Collect this tick's events from the repository
    pub fn tick(&mut self, repo: &GitRepo, toggles: DetectionToggles) -> Vec<PendingEvent> {
        let head = if toggles.commits {
            match repo.head_commit() {
                Ok(h) => Some(h),
                Err(e) => {
                    tracing::debug!("HEAD query failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        self.tick_with_head(head, toggles)
    }

    /// Collect this tick's events given a freshly observed HEAD
    ///
    /// `head` is `None` when the HEAD query failed; `last_head` is then kept.
    pub fn tick_with_head(
        &mut self,
        head: Option<String>,
        toggles: DetectionToggles,
    ) -> Vec<PendingEvent> {
        if toggles.commits {
            if let Some(hash) = self.markers.commit.take() {
                if self.processed.insert(&hash) {
                    tracing::debug!(commit = %hash, "Commit marker consumed");
                    self.pending_commit = Some(hash);
                }
            }

            if let Some(ref head) = head {
                if self.last_head.as_deref() != Some(head.as_str()) && self.processed.insert(head) {
                    tracing::debug!(commit = %head, "HEAD moved");
                    self.pending_commit = Some(head.clone());
                }
            }

            if head.is_some() {
                self.last_head = head;
            }
        }

        if toggles.merges {
            if let Some(branch) = self.markers.merge.take() {
                tracing::debug!(branch = %branch, "Merge marker consumed");
                self.pending_merge = Some(branch);
            }
        }

        let mut events = Vec::new();
        if let Some(hash) = self.pending_commit.take() {
            events.push(PendingEvent::Commit(hash));
        }
        if let Some(branch) = self.pending_merge.take() {
            events.push(PendingEvent::Merge(branch));
        }
        events
    }

    /// Poll until the surrounding task is dropped
    ///
    /// The interval is read from the configuration once at start; every tick
    /// re-reads the configuration for the enable flags. Pipelines are spawned
    /// and left to finish on their own.
    pub async fn run(mut self, repo: GitRepo, session: Arc<Session>) {
        let interval = match session.config() {
            Ok(config) => config.poll_interval,
            Err(e) => {
                tracing::warn!("Using default poll interval: {}", e);
                crate::config::Config::default().poll_interval
            }
        };
        let interval = interval.max(MIN_POLL_INTERVAL);

        tracing::info!(
            root = %repo.root().display(),
            interval_ms = interval.as_millis() as u64,
            head = ?self.last_head,
            "Watching repository"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let config = match session.config() {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Skipping tick, configuration unavailable: {}", e);
                    continue;
                }
            };

            let toggles = DetectionToggles {
                commits: session.is_enabled(&config, TriggerKind::Commit),
                merges: session.is_enabled(&config, TriggerKind::Merge),
            };

            for event in self.tick(&repo, toggles) {
                tracing::info!(event = ?event, "Dispatching review pipeline");
                drop(pipeline::spawn(&session, event));
            }
        }
    }
}
