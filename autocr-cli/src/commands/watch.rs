//! Watch command - poll for commits and merges until interrupted

use std::time::Duration;

use autocr_core::agent::{CommandActionRunner, SystemClipboard};
use autocr_core::hooks::hook_status;
use autocr_core::{report, Config, ConfigOverrides, EventPoller, GitRepo, TriggerKind, TriggerPlan};
use clap::Args;

use super::Context;

/// Watch the repository and request reviews
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Poll interval in milliseconds (overrides config and env)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Paste the instruction without submitting it
    #[arg(long)]
    no_submit: bool,

    /// Do not watch the report directory
    #[arg(long)]
    no_reports: bool,
}

impl WatchArgs {
    /// Execute the watch command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let repo = ctx.open_repo()?;
        let store = ctx.store(
            &repo,
            ConfigOverrides {
                poll_interval: self.interval_ms.map(Duration::from_millis),
                no_submit: self.no_submit,
                ..ConfigOverrides::default()
            },
        );
        let config = store
            .current()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        startup_checks(&repo, &config);

        let session = ctx.session(&repo, store)?;
        let poller = EventPoller::for_repo(&repo);

        match repo.current_branch() {
            Ok(Some(branch)) => println!("Watching {} on {}", repo.root().display(), branch),
            _ => println!("Watching {}", repo.root().display()),
        }
        println!("  commit reviews: {}", on_off(config.trigger_enabled(TriggerKind::Commit)));
        println!("  merge reviews: {}", on_off(config.trigger_enabled(TriggerKind::Merge)));
        println!("  poll interval: {:?}", config.poll_interval);
        println!("Press Ctrl-C to stop");

        let reports = {
            let session = session.clone();
            let enabled = !self.no_reports;
            async move {
                if enabled {
                    report::run(session).await;
                }
                // Keep the select below waiting on the other branches
                std::future::pending::<()>().await
            }
        };

        tokio::select! {
            _ = poller.run(repo, session.clone()) => {}
            _ = reports => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                println!();
                println!("Stopping");
            }
        }

        Ok(())
    }
}

/// Warn about setup problems that would make reviews silently fail
fn startup_checks(repo: &GitRepo, config: &Config) {
    let hooks = hook_status(repo.git_dir());
    if !hooks.post_commit {
        tracing::warn!(
            "post-commit hook not installed, relying on HEAD detection (run `autocr hooks install`)"
        );
    }
    if config.trigger_enabled(TriggerKind::Merge) && !hooks.post_merge {
        tracing::warn!(
            "Merge reviews are enabled but the post-merge hook is missing (run `autocr hooks install --merge`)"
        );
    }

    let plan = TriggerPlan::from_config(config);
    for program in plan.programs() {
        if !CommandActionRunner::is_available(program) {
            tracing::warn!(
                "{} not found, bind the agent actions in [agent.bindings] to a working command",
                program
            );
        }
    }

    if !SystemClipboard::is_available() {
        tracing::warn!("No system clipboard available, instructions cannot be pasted");
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
