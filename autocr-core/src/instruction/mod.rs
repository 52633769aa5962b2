//! Review instruction assembly
//!
//! An instruction has four parts: an intro naming the commit or branch and the
//! report directory, the review rules, extra user context and the command the
//! assistant should run. The result is capped at [`INSTRUCTION_MAX`]
//! characters.

mod command;
mod context;
mod template;

use std::path::Path;

pub use command::{
    render_command, report_output_dir, resolve_command, BRANCH_PLACEHOLDER, COMMIT_PLACEHOLDER,
    OUTPUT_DIR_PLACEHOLDER,
};
pub use context::{
    resolve_extra_context, truncate_chars, ExtraContextItem, ResolvedContext, DIR_MAX_FILES,
    DIR_MAX_FILE_SIZE, TEXT_MAX, URL_MAX, URL_TIMEOUT,
};
pub use template::{RuleSource, DEFAULT_TEMPLATE, FALLBACK_RULES};

use crate::config::{Config, TriggerKind};
use crate::Result;

/// Maximum instruction length in characters
pub const INSTRUCTION_MAX: usize = 10000;

/// Appended when an instruction was cut
pub const INSTRUCTION_TRUNCATED: &str = "\n...[指令已截断]";

/// Cap an instruction at [`INSTRUCTION_MAX`] characters
///
/// Returns the possibly shortened text and whether it was cut.
pub fn truncate_instruction(text: String) -> (String, bool) {
    match text.char_indices().nth(INSTRUCTION_MAX) {
        Some((idx, _)) => (format!("{}{}", &text[..idx], INSTRUCTION_TRUNCATED), true),
        None => (text, false),
    }
}

/// Builds the instruction for one review request
pub struct InstructionBuilder<'a> {
    root: &'a Path,
    config: &'a Config,
    http: &'a reqwest::Client,
}

impl<'a> InstructionBuilder<'a> {
    /// Create a builder for the repository at `root`
    pub fn new(root: &'a Path, config: &'a Config, http: &'a reqwest::Client) -> Self {
        Self { root, config, http }
    }

    /// Build the instruction for a commit hash or merged branch name
    pub async fn build(&self, kind: TriggerKind, target: &str) -> Result<String> {
        let output_dir = report_output_dir(self.root, self.config)?;

        let rules = RuleSource::resolve(self.root, &self.config.trigger(kind).template_path)
            .render(self.config.template_mode);

        let command = resolve_command(self.config, kind, target, &output_dir);

        let context = resolve_extra_context(self.root, &self.config.extra_context, self.http).await;

        let raw = compose(kind, target, &output_dir, &rules, &context, &command);
        let (instruction, truncated) = truncate_instruction(raw);
        if truncated {
            tracing::info!("Review instruction truncated to {} characters", INSTRUCTION_MAX);
        }

        Ok(instruction)
    }
}

fn intro(kind: TriggerKind, target: &str, output_dir: &Path) -> String {
    match kind {
        TriggerKind::Commit => format!(
            "请按照以下审查规则，对提交 {} 的代码变更进行代码审查，并将审查报告输出到 {} 目录。",
            target,
            output_dir.display()
        ),
        TriggerKind::Merge => format!(
            "请按照以下审查规则，对合并分支 {} 与当前分支的差异进行代码审查，并将审查报告输出到 {} 目录。",
            target,
            output_dir.display()
        ),
    }
}

fn compose(
    kind: TriggerKind,
    target: &str,
    output_dir: &Path,
    rules: &str,
    context: &ResolvedContext,
    command: &str,
) -> String {
    let context_section = if context.is_empty() {
        "--- 用户补充上下文 ---\n无".to_string()
    } else {
        format!(
            "--- 用户补充上下文 ---\n{}\n（来源: {})",
            context.body,
            context.sources.join("; ")
        )
    };

    format!(
        "{}\n\n--- 审查规则 ---\n{}\n\n{}\n\n执行命令: {}",
        intro(kind, target, output_dir),
        rules,
        context_section,
        command
    )
}
