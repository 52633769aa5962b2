//! Review command - run the commit pipeline for one revision now

use autocr_core::pipeline::run_commit_pipeline;
use autocr_core::{ConfigOverrides, PipelineOutcome, TriggerOutcome};
use clap::Args;

use super::Context;

/// Request a review for a commit
#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Revision to review
    #[arg(default_value = "HEAD")]
    rev: String,

    /// Paste the instruction without submitting it
    #[arg(long)]
    no_submit: bool,
}

impl ReviewArgs {
    /// Execute the review command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let repo = ctx.open_repo()?;
        let hash = repo
            .resolve_commit(&self.rev)
            .map_err(|e| anyhow::anyhow!("Cannot resolve {}: {}", self.rev, e))?;

        let store = ctx.store(
            &repo,
            ConfigOverrides {
                no_submit: self.no_submit,
                ..ConfigOverrides::default()
            },
        );
        let session = ctx.session(&repo, store)?;

        if ctx.verbose {
            println!("Reviewing {} ({})", self.rev, hash);
        }

        match run_commit_pipeline(session, hash).await {
            PipelineOutcome::Skipped(reason) => println!("Skipped: {}", reason),
            PipelineOutcome::Declined(choice) => println!("Not reviewed ({:?})", choice),
            PipelineOutcome::Triggered(TriggerOutcome::Submitted) => {
                println!("Review requested")
            }
            PipelineOutcome::Triggered(TriggerOutcome::Pasted) => {
                println!("Instruction pasted, send it in the chat to start the review")
            }
            PipelineOutcome::Triggered(TriggerOutcome::OpenFailed) => {
                anyhow::bail!("Could not open an assistant chat")
            }
            PipelineOutcome::Triggered(TriggerOutcome::Failed(reason))
            | PipelineOutcome::Failed(reason) => {
                anyhow::bail!("Review failed: {}", reason)
            }
        }

        Ok(())
    }
}
