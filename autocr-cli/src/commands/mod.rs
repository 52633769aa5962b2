//! CLI command implementations

pub mod config;
pub mod hooks;
pub mod review;
pub mod watch;

pub use config::ConfigArgs;
pub use hooks::HooksArgs;
pub use review::ReviewArgs;
pub use watch::WatchArgs;

use std::path::PathBuf;
use std::sync::Arc;

use autocr_core::notify::ConsoleNotifier;
use autocr_core::{ConfigOverrides, ConfigStore, GitRepo, Session};

/// Global options shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    /// Verbose output requested
    pub verbose: bool,
    /// Explicit config file
    pub config: Option<PathBuf>,
    /// Directory inside the repository to operate on
    pub repo: PathBuf,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Log file mentioned in error notifications
    pub log_file: Option<PathBuf>,
}

impl Context {
    /// Open the repository, refusing to run outside a git working tree
    pub fn open_repo(&self) -> anyhow::Result<GitRepo> {
        GitRepo::open(&self.repo).map_err(|e| anyhow::anyhow!("{}", e))
    }

    /// Configuration store for `repo` with the CLI overrides applied
    pub fn store(&self, repo: &GitRepo, mut overrides: ConfigOverrides) -> ConfigStore {
        overrides.assume_yes |= self.yes;
        let store = ConfigStore::new(repo.root()).with_overrides(overrides);
        match self.config {
            Some(ref path) => store.with_file(path),
            None => store,
        }
    }

    /// Session with the console notifier pointing at the log file
    pub fn session(&self, repo: &GitRepo, store: ConfigStore) -> anyhow::Result<Arc<Session>> {
        let mut notifier = ConsoleNotifier::new();
        if let Some(ref path) = self.log_file {
            notifier = notifier.with_log_file(path);
        }

        let session = Session::new(repo, store)
            .map_err(|e| anyhow::anyhow!("Failed to create session: {}", e))?
            .with_notifier(Arc::new(notifier));
        Ok(Arc::new(session))
    }
}
