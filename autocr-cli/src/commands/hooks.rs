//! Hook management commands

use autocr_core::hooks::{
    hook_status, install_post_commit_hook, install_post_merge_hook, HookKind, InstallOutcome,
};
use autocr_core::{ConfigOverrides, TriggerKind};
use clap::{Args, Subcommand};

use super::Context;

/// Hook management commands
#[derive(Args, Debug)]
pub struct HooksArgs {
    #[command(subcommand)]
    pub command: HooksCommand,
}

#[derive(Subcommand, Debug)]
pub enum HooksCommand {
    /// Install the post-commit hook (and the post-merge hook if requested)
    Install {
        /// Also install the post-merge hook
        #[arg(long)]
        merge: bool,
    },

    /// Show which hooks are installed
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

impl HooksArgs {
    /// Execute the hooks command
    pub fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let repo = ctx.open_repo()?;
        let git_dir = repo.git_dir();

        match &self.command {
            HooksCommand::Install { merge } => {
                let config = ctx
                    .store(&repo, ConfigOverrides::default())
                    .current()
                    .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

                let outcome = install_post_commit_hook(git_dir)
                    .map_err(|e| anyhow::anyhow!("Failed to install post-commit hook: {}", e))?;
                report(HookKind::PostCommit, outcome);

                if *merge || config.trigger_enabled(TriggerKind::Merge) {
                    let outcome = install_post_merge_hook(git_dir, &config.primary_branches)
                        .map_err(|e| anyhow::anyhow!("Failed to install post-merge hook: {}", e))?;
                    report(HookKind::PostMerge, outcome);
                }
            }
            HooksCommand::Status { json } => {
                let status = hook_status(git_dir);
                if *json {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                } else {
                    println!("Hooks in {}", git_dir.join("hooks").display());
                    println!("  post-commit: {}", installed(status.post_commit));
                    println!("  post-merge: {}", installed(status.post_merge));
                }
            }
        }

        Ok(())
    }
}

fn report(kind: HookKind, outcome: InstallOutcome) {
    match outcome {
        InstallOutcome::Installed => println!("Installed {} hook", kind.file_name()),
        InstallOutcome::AlreadyPresent => {
            println!("{} hook already installed", kind.file_name())
        }
    }
}

fn installed(present: bool) -> &'static str {
    if present {
        "installed"
    } else {
        "missing"
    }
}
