//! Review rule template resolution

use std::path::{Path, PathBuf};

use crate::config::TemplateMode;

/// Conventional template location inside a repository
pub const DEFAULT_TEMPLATE: &str = ".cursor/commands/review.md";

/// Rules used when no template file exists
pub const FALLBACK_RULES: &str = "# 默认审查规则\n请对提交的代码进行审查，关注：逻辑正确性、潜在 bug、代码风格与可维护性。";

/// Where the review rules come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// A template file (configured or conventional)
    File(PathBuf),
    /// The built-in fallback text
    Builtin,
}

impl RuleSource {
    /// Resolve the template for a trigger
    ///
    /// Order: configured path if it exists, then [`DEFAULT_TEMPLATE`], then the
    /// built-in rules. Missing files are logged, never fatal.
    pub fn resolve(root: &Path, configured: &str) -> Self {
        let configured = configured.trim();
        if !configured.is_empty() {
            let path = absolutize(root, configured);
            if path.is_file() {
                return RuleSource::File(path);
            }
            tracing::info!(
                "Custom template not found, falling back to default: {}",
                path.display()
            );
        }

        let default = root.join(DEFAULT_TEMPLATE);
        if default.is_file() {
            return RuleSource::File(default);
        }

        tracing::info!(
            "Default template not found at {}, using built-in rules",
            default.display()
        );
        RuleSource::Builtin
    }

    /// The rules block placed into the instruction
    pub fn render(&self, mode: TemplateMode) -> String {
        match (self, mode) {
            (RuleSource::Builtin, _) => FALLBACK_RULES.to_string(),
            (RuleSource::File(path), TemplateMode::Reference) => format!("@{}", path.display()),
            (RuleSource::File(path), TemplateMode::Inline) => {
                std::fs::read_to_string(path).unwrap_or_else(|e| {
                    tracing::warn!("Failed to read template {}: {}", path.display(), e);
                    FALLBACK_RULES.to_string()
                })
            }
        }
    }
}

/// Interpret `path` relative to `root` unless it is absolute
pub(crate) fn absolutize(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}
