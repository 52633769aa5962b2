//! Configuration management for autocr
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (AUTOCR_*)
//! 3. Repository config file (`<repo>/.autocr.toml`)
//! 4. Global config file (~/.config/autocr/config.toml)
//! 5. Default values
//!
//! Nothing here is cached: [`ConfigStore::current`] re-reads the file on every
//! call so edits take effect on the next detected event.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::instruction::ExtraContextItem;
use crate::{Error, Result};

/// Name of the per-repository config file
pub const REPO_CONFIG_FILE: &str = ".autocr.toml";

/// Which event a review is being triggered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// A new commit on the current branch
    Commit,
    /// A merge into a primary branch
    Merge,
}

impl TriggerKind {
    /// Config table holding this trigger's settings
    pub fn section(&self) -> &'static str {
        match self {
            TriggerKind::Commit => "on_commit",
            TriggerKind::Merge => "on_merge",
        }
    }

    /// Command template used when none is configured
    pub fn default_command(&self) -> &'static str {
        match self {
            TriggerKind::Commit => "/review [commit-hash] -o --dir [outputDir]",
            TriggerKind::Merge => "/review --b [branch] -o --dir [outputDir]",
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::Commit => write!(f, "commit"),
            TriggerKind::Merge => write!(f, "merge"),
        }
    }
}

/// How a rule template file is placed into the instruction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateMode {
    /// Reference the file as `@<path>` and let the assistant open it
    #[default]
    Reference,
    /// Embed the file contents
    Inline,
}

/// When to notify about a finished review report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotifyMode {
    /// Notify for every report
    #[default]
    Always,
    /// Notify only when the report lists critical issues
    CriticalOnly,
}

/// Per-trigger settings (`[on_commit]` / `[on_merge]`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Whether this trigger is active; unset means the trigger's default
    pub enabled: Option<bool>,

    /// Custom rule template path (absolute or relative to the repository root)
    pub template_path: String,

    /// Command template; empty means the trigger's default
    pub command: String,
}

/// Agent trigger settings (`[agent]`)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Actions tried in order to open a new assistant chat
    pub open_actions: Vec<String>,

    /// Actions tried in order to submit the pasted instruction
    pub submit_actions: Vec<String>,

    /// Action that pastes the clipboard into the chat input
    pub paste_action: String,

    /// Action run after submitting to hand focus back to the editor
    pub focus_action: Option<String>,

    /// Rounds over `open_actions` before giving up
    pub open_attempts: u32,

    /// Pause between open rounds
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Pause after the chat opened, before pasting
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,

    /// Pause between clipboard write, paste and submit
    #[serde(with = "humantime_serde")]
    pub step_delay: Duration,

    /// Command line bound to each action identifier
    pub bindings: BTreeMap<String, Vec<String>>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let chord = |keys: &str| -> Vec<String> {
            vec![
                "xdotool".to_string(),
                "key".to_string(),
                "--clearmodifiers".to_string(),
                keys.to_string(),
            ]
        };

        let mut bindings = BTreeMap::new();
        bindings.insert("composer.newAgentChat".to_string(), chord("ctrl+i"));
        bindings.insert("aichat.newchataction".to_string(), chord("ctrl+l"));
        bindings.insert(
            "editor.action.clipboardPasteAction".to_string(),
            chord("ctrl+v"),
        );
        bindings.insert("composer.submitChat".to_string(), chord("Return"));
        bindings.insert(
            "workbench.action.focusActiveEditorGroup".to_string(),
            chord("ctrl+1"),
        );

        Self {
            open_actions: vec![
                "composer.newAgentChat".to_string(),
                "aichat.newchataction".to_string(),
            ],
            submit_actions: vec![
                "composer.submitChat".to_string(),
                "composer.submit".to_string(),
            ],
            paste_action: "editor.action.clipboardPasteAction".to_string(),
            focus_action: Some("workbench.action.focusActiveEditorGroup".to_string()),
            open_attempts: 3,
            retry_delay: Duration::from_millis(500),
            settle_delay: Duration::from_millis(300),
            step_delay: Duration::from_millis(200),
            bindings,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// How often the repository is polled
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Commits with fewer included changed lines are not reviewed
    pub min_changed_lines: u64,

    /// File extensions that never count towards the changed-line total
    pub exclude_extensions: Vec<String>,

    /// Path prefixes that never count towards the changed-line total
    pub exclude_paths: Vec<String>,

    /// Whether test files are excluded from the changed-line total
    pub exclude_test_files: bool,

    /// Ask before launching each review
    pub confirm_before_review: bool,

    /// Submit the pasted instruction automatically
    pub auto_submit: bool,

    /// Directory review reports are written to
    pub report_output_dir: String,

    /// How rule template files are placed into the instruction
    pub template_mode: TemplateMode,

    /// When to notify about finished reports
    pub notify_on_complete: NotifyMode,

    /// Branches whose merges are reviewed by the post-merge hook
    pub primary_branches: Vec<String>,

    /// Commit trigger settings
    pub on_commit: TriggerConfig,

    /// Merge trigger settings
    pub on_merge: TriggerConfig,

    /// Extra context appended to every instruction
    pub extra_context: Vec<ExtraContextItem>,

    /// Agent trigger settings
    pub agent: AgentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            min_changed_lines: 20,
            exclude_extensions: vec![".md".to_string(), ".txt".to_string(), ".lock".to_string()],
            exclude_paths: Vec::new(),
            exclude_test_files: true,
            confirm_before_review: true,
            auto_submit: true,
            report_output_dir: "Ai/review-reports".to_string(),
            template_mode: TemplateMode::default(),
            notify_on_complete: NotifyMode::default(),
            primary_branches: vec!["main".to_string(), "master".to_string()],
            on_commit: TriggerConfig::default(),
            on_merge: TriggerConfig::default(),
            extra_context: Vec::new(),
            agent: AgentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get the global config file path
    ///
    /// Returns `~/.config/autocr/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("autocr").join("config.toml"))
    }

    /// Settings for one trigger kind
    pub fn trigger(&self, kind: TriggerKind) -> &TriggerConfig {
        match kind {
            TriggerKind::Commit => &self.on_commit,
            TriggerKind::Merge => &self.on_merge,
        }
    }

    /// Whether a trigger kind is enabled (commit defaults on, merge off)
    pub fn trigger_enabled(&self, kind: TriggerKind) -> bool {
        self.trigger(kind)
            .enabled
            .unwrap_or(kind == TriggerKind::Commit)
    }

    /// Command template for a trigger kind, falling back to its default
    pub fn command_template(&self, kind: TriggerKind) -> &str {
        let command = self.trigger(kind).command.trim();
        if command.is_empty() {
            kind.default_command()
        } else {
            command
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - AUTOCR_POLL_INTERVAL_MS: poll interval in milliseconds
    /// - AUTOCR_MIN_CHANGED_LINES: changed-line threshold
    /// - AUTOCR_AUTO_SUBMIT: `true`/`false`
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(ms) = env_parse::<u64>("AUTOCR_POLL_INTERVAL_MS") {
            self.poll_interval = Duration::from_millis(ms);
        }

        if let Some(lines) = env_parse::<u64>("AUTOCR_MIN_CHANGED_LINES") {
            self.min_changed_lines = lines;
        }

        if let Some(auto_submit) = env_parse::<bool>("AUTOCR_AUTO_SUBMIT") {
            self.auto_submit = auto_submit;
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(interval) = overrides.poll_interval {
            self.poll_interval = interval;
        }

        if overrides.assume_yes {
            self.confirm_before_review = false;
        }

        if overrides.no_submit {
            self.auto_submit = false;
        }

        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", name, raw);
            None
        }
    }
}

/// Overrides coming from command line flags
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Poll interval override
    pub poll_interval: Option<Duration>,
    /// Skip the confirmation gate
    pub assume_yes: bool,
    /// Paste without submitting
    pub no_submit: bool,
}

/// Source of fresh configuration for one repository
///
/// Every call to [`ConfigStore::current`] goes back to disk.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
    explicit: Option<PathBuf>,
    overrides: ConfigOverrides,
}

impl ConfigStore {
    /// Create a store for the repository at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            explicit: None,
            overrides: ConfigOverrides::default(),
        }
    }

    /// Use a specific config file instead of the repository/global lookup
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    /// Apply CLI overrides on every load
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// The config file that will be read, if any exists
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.explicit {
            return Some(path.clone());
        }

        let repo_file = self.root.join(REPO_CONFIG_FILE);
        if repo_file.exists() {
            return Some(repo_file);
        }

        Config::default_config_path().filter(|p| p.exists())
    }

    /// Load the configuration with all overrides applied
    ///
    /// An explicitly requested file that does not exist is an error; the
    /// implicit lookups fall back to defaults.
    pub fn current(&self) -> Result<Config> {
        let base = match self.config_path() {
            Some(path) => {
                if self.explicit.is_some() && !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Config::load_from_file(&path)?
            }
            None => Config::default(),
        };

        Ok(base.with_env_overrides().with_cli_overrides(&self.overrides))
    }

    /// Turn `kind` off in the config file and return the file written
    ///
    /// Writes to the file [`ConfigStore::config_path`] resolves to, or
    /// creates the repository file when there is none. Other keys are kept.
    pub fn disable_trigger(&self, kind: TriggerKind) -> Result<PathBuf> {
        let path = self
            .config_path()
            .unwrap_or_else(|| self.root.join(REPO_CONFIG_FILE));

        let mut table = if path.exists() {
            std::fs::read_to_string(&path)?
                .parse::<toml::Table>()
                .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?
        } else {
            toml::Table::new()
        };

        let section = table
            .entry(kind.section())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let Some(section) = section.as_table_mut() else {
            return Err(Error::Config(format!(
                "[{}] in {} is not a table",
                kind.section(),
                path.display()
            )));
        };
        section.insert("enabled".to_string(), toml::Value::Boolean(false));

        let contents = toml::to_string_pretty(&table)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;

        tracing::info!("Disabled {} reviews in {}", kind, path.display());
        Ok(path)
    }
}
