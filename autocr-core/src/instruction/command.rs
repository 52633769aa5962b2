//! Outbound command resolution

use std::path::{Path, PathBuf};

use super::template::absolutize;
use crate::config::{Config, TriggerKind};
use crate::Result;

/// Placeholder for the reviewed commit
pub const COMMIT_PLACEHOLDER: &str = "[commit-hash]";
/// Placeholder for the merged branch
pub const BRANCH_PLACEHOLDER: &str = "[branch]";
/// Placeholder for the report directory
pub const OUTPUT_DIR_PLACEHOLDER: &str = "[outputDir]";

/// Absolute report directory for a repository, created if missing
pub fn report_output_dir(root: &Path, config: &Config) -> Result<PathBuf> {
    let configured = config.report_output_dir.trim();
    let configured = if configured.is_empty() {
        Config::default().report_output_dir
    } else {
        configured.to_string()
    };

    let dir = absolutize(root, &configured);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        tracing::debug!("Created report directory {}", dir.display());
    }
    Ok(dir)
}

/// Substitute placeholders in a command template
///
/// `target` fills `[commit-hash]` for commits and `[branch]` for merges; the
/// other trigger's placeholder is left untouched.
pub fn render_command(template: &str, kind: TriggerKind, target: &str, output_dir: &Path) -> String {
    let placeholder = match kind {
        TriggerKind::Commit => COMMIT_PLACEHOLDER,
        TriggerKind::Merge => BRANCH_PLACEHOLDER,
    };

    template
        .replace(placeholder, target)
        .replace(OUTPUT_DIR_PLACEHOLDER, &output_dir.display().to_string())
}

/// Resolve the command for a trigger from the configuration
pub fn resolve_command(config: &Config, kind: TriggerKind, target: &str, output_dir: &Path) -> String {
    render_command(config.command_template(kind), kind, target, output_dir)
}
