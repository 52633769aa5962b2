//! Review pipelines and the session they run in
//!
//! A commit pipeline runs the changed-line filter, the confirmation gate, the
//! instruction builder and the agent trigger. A merge pipeline skips the
//! filter. Pipelines never return errors to the poller; failures are reported
//! through the session's notifier.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::agent::{AgentTrigger, CommandActionRunner, SystemClipboard, TriggerOutcome, TriggerPlan};
use crate::config::{Config, ConfigStore, TriggerKind};
use crate::filter::{self, ExclusionPolicy, SkipDecision};
use crate::gate::{self, ConfirmChoice, ConfirmGate, TerminalConfirm};
use crate::git::GitRepo;
use crate::instruction::{InstructionBuilder, URL_TIMEOUT};
use crate::notify::{ConsoleNotifier, Notifier};
use crate::poller::PendingEvent;
use crate::{Error, Result};

/// Everything a pipeline needs for one watched repository
pub struct Session {
    root: PathBuf,
    git_dir: PathBuf,
    store: ConfigStore,
    gate: Arc<dyn ConfirmGate>,
    agent: AgentTrigger,
    notifier: Arc<dyn Notifier>,
    http: reqwest::Client,
    disabled: Mutex<HashSet<TriggerKind>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("root", &self.root)
            .field("git_dir", &self.git_dir)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session with the terminal gate, console notifier and
    /// command-driven agent trigger
    pub fn new(repo: &GitRepo, store: ConfigStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(URL_TIMEOUT)
            .user_agent(concat!("autocr/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let agent = AgentTrigger::new(
            Arc::new(CommandActionRunner::new(repo.root())),
            Arc::new(SystemClipboard::new()),
        );

        Ok(Self {
            root: repo.root().to_path_buf(),
            git_dir: repo.git_dir().to_path_buf(),
            store,
            gate: Arc::new(TerminalConfirm::new()),
            agent,
            notifier: Arc::new(ConsoleNotifier::new()),
            http,
            disabled: Mutex::new(HashSet::new()),
        })
    }

    /// Replace the confirmation gate
    pub fn with_gate(mut self, gate: Arc<dyn ConfirmGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Replace the notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the agent trigger
    pub fn with_agent(mut self, agent: AgentTrigger) -> Self {
        self.agent = agent;
        self
    }

    /// Repository working tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Repository git directory, where marker files live
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Notifier for user-facing messages
    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Freshly loaded configuration
    pub fn config(&self) -> Result<Config> {
        self.store.current()
    }

    /// Whether `kind` is enabled in `config` and not disabled for this session
    pub fn is_enabled(&self, config: &Config, kind: TriggerKind) -> bool {
        config.trigger_enabled(kind) && !self.is_disabled(kind)
    }

    /// Whether the user turned `kind` off for this session
    pub fn is_disabled(&self, kind: TriggerKind) -> bool {
        self.disabled
            .lock()
            .map(|d| d.contains(&kind))
            .unwrap_or(false)
    }

    /// Stop reviewing `kind` in this session; see [`ConfigStore::disable_trigger`]
    /// for the persistent switch
    pub fn disable(&self, kind: TriggerKind) {
        if let Ok(mut disabled) = self.disabled.lock() {
            disabled.insert(kind);
        }
    }
}

/// How a pipeline ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The filter or a session toggle ruled the event out
    Skipped(String),
    /// The user answered skip or disable
    Declined(ConfirmChoice),
    /// The agent trigger ran
    Triggered(TriggerOutcome),
    /// The pipeline could not run to the trigger
    Failed(String),
}

/// Run the pipeline for `event` on its own task
pub fn spawn(session: &Arc<Session>, event: PendingEvent) -> JoinHandle<PipelineOutcome> {
    let session = Arc::clone(session);
    tokio::spawn(async move {
        match event {
            PendingEvent::Commit(hash) => run_commit_pipeline(session, hash).await,
            PendingEvent::Merge(branch) => run_merge_pipeline(session, branch).await,
        }
    })
}

/// Review one commit
pub async fn run_commit_pipeline(session: Arc<Session>, hash: String) -> PipelineOutcome {
    let outcome = match commit_pipeline(&session, &hash).await {
        Ok(outcome) => outcome,
        Err(e) => {
            session
                .notifier()
                .error(&format!("Review of commit {} failed: {}", short_hash(&hash), e));
            PipelineOutcome::Failed(e.to_string())
        }
    };
    tracing::info!(commit = %hash, outcome = ?outcome, "Commit pipeline finished");
    outcome
}

/// Review the difference introduced by merging `branch`
pub async fn run_merge_pipeline(session: Arc<Session>, branch: String) -> PipelineOutcome {
    let outcome = match merge_pipeline(&session, &branch).await {
        Ok(outcome) => outcome,
        Err(e) => {
            session
                .notifier()
                .error(&format!("Review of merge {} failed: {}", branch, e));
            PipelineOutcome::Failed(e.to_string())
        }
    };
    tracing::info!(branch = %branch, outcome = ?outcome, "Merge pipeline finished");
    outcome
}

async fn commit_pipeline(session: &Session, hash: &str) -> Result<PipelineOutcome> {
    let config = session.config()?;
    let policy = ExclusionPolicy::from_config(&config);
    let min_changed_lines = config.min_changed_lines;

    let root = session.root.clone();
    let target = hash.to_string();
    let (decision, subject) = tokio::task::spawn_blocking(
        move || -> Result<(SkipDecision, Option<String>)> {
            let repo = GitRepo::open(&root)?;
            let decision = filter::should_skip(&repo, &target, &policy, min_changed_lines);
            let subject = repo.commit_summary(&target).ok();
            Ok((decision, subject))
        },
    )
    .await
    .map_err(|e| Error::Other(format!("Commit inspection task failed: {}", e)))??;

    if decision.skip {
        let reason = decision
            .reason
            .unwrap_or_else(|| "skipping review".to_string());
        tracing::info!(commit = %hash, "{}", reason);
        return Ok(PipelineOutcome::Skipped(reason));
    }

    let detail = gate::commit_detail(hash, subject.as_deref());
    review(session, &config, TriggerKind::Commit, hash, &detail).await
}

async fn merge_pipeline(session: &Session, branch: &str) -> Result<PipelineOutcome> {
    let config = session.config()?;
    let detail = gate::merge_detail(branch);
    review(session, &config, TriggerKind::Merge, branch, &detail).await
}

/// Gate, build and trigger
async fn review(
    session: &Session,
    config: &Config,
    kind: TriggerKind,
    target: &str,
    detail: &str,
) -> Result<PipelineOutcome> {
    // Events dispatched before a "disable" answer are dropped here
    if session.is_disabled(kind) {
        return Ok(PipelineOutcome::Skipped(format!(
            "{} reviews are disabled for this session",
            kind
        )));
    }

    if config.confirm_before_review {
        let choice = session.gate.confirm(kind, detail).await;
        if !choice.proceeds() {
            if choice == ConfirmChoice::Disable {
                session.disable(kind);
                match session.store.disable_trigger(kind) {
                    Ok(path) => session.notifier().info(&format!(
                        "{} reviews disabled, re-enable in {}",
                        kind,
                        path.display()
                    )),
                    Err(e) => session.notifier().warn(&format!(
                        "{} reviews disabled for this session only: {}",
                        kind, e
                    )),
                }
            } else {
                tracing::info!("Review skipped by user: {}", detail);
            }
            return Ok(PipelineOutcome::Declined(choice));
        }
    }

    let instruction = InstructionBuilder::new(&session.root, config, &session.http)
        .build(kind, target)
        .await?;
    tracing::debug!(chars = instruction.chars().count(), "Instruction built");

    let plan = TriggerPlan::from_config(config);
    let outcome = session
        .agent
        .trigger(&plan, &instruction, session.notifier())
        .await;
    if outcome.delivered() {
        tracing::info!("{} review handed to the assistant: {}", kind, detail);
    }

    Ok(PipelineOutcome::Triggered(outcome))
}

fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}
