//! Delivering an instruction to the editor's assistant chat
//!
//! The protocol: open a new chat (several candidate actions, several rounds),
//! put the instruction on the clipboard, paste it, optionally submit it and
//! return focus to the editor. The user's clipboard is restored afterwards
//! whatever happens.

use std::sync::Arc;
use std::time::Duration;

use super::actions::{first_success, Action, ActionRunner};
use super::clipboard::{Clipboard, ClipboardLease};
use crate::config::Config;
use crate::notify::Notifier;
use crate::Result;

/// Result of one trigger attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Pasted and submitted
    Submitted,
    /// Pasted; the user has to send it
    Pasted,
    /// No open action worked in any round
    OpenFailed,
    /// A step after opening failed
    Failed(String),
}

impl TriggerOutcome {
    /// Whether the instruction reached the chat input
    pub fn delivered(&self) -> bool {
        matches!(self, TriggerOutcome::Submitted | TriggerOutcome::Pasted)
    }
}

/// Actions and pacing for one trigger, taken from `[agent]`
#[derive(Debug, Clone)]
pub struct TriggerPlan {
    /// Candidate actions that open a new chat
    pub open: Vec<Action>,
    /// Action pasting the clipboard
    pub paste: Action,
    /// Candidate actions that submit the chat input
    pub submit: Vec<Action>,
    /// Action handing focus back to the editor
    pub focus: Option<Action>,
    /// Rounds over `open`
    pub open_attempts: u32,
    /// Pause between open rounds
    pub retry_delay: Duration,
    /// Pause after the chat opened
    pub settle_delay: Duration,
    /// Pause between steps
    pub step_delay: Duration,
    /// Try to submit after pasting
    pub auto_submit: bool,
}

impl TriggerPlan {
    /// Build the plan from configuration
    pub fn from_config(config: &Config) -> Self {
        let agent = &config.agent;
        let bind = |ids: &[String]| -> Vec<Action> {
            ids.iter().map(|id| Action::bind(id, &agent.bindings)).collect()
        };

        Self {
            open: bind(&agent.open_actions),
            paste: Action::bind(&agent.paste_action, &agent.bindings),
            submit: bind(&agent.submit_actions),
            focus: agent
                .focus_action
                .as_deref()
                .filter(|id| !id.trim().is_empty())
                .map(|id| Action::bind(id, &agent.bindings)),
            open_attempts: agent.open_attempts.max(1),
            retry_delay: agent.retry_delay,
            settle_delay: agent.settle_delay,
            step_delay: agent.step_delay,
            auto_submit: config.auto_submit,
        }
    }

    /// Distinct programs the bound actions start, in first-use order
    pub fn programs(&self) -> Vec<&str> {
        let mut programs: Vec<&str> = Vec::new();
        let actions = self
            .open
            .iter()
            .chain(std::iter::once(&self.paste))
            .chain(&self.submit)
            .chain(&self.focus);
        for action in actions {
            if let Some(program) = action.command.first() {
                if !programs.contains(&program.as_str()) {
                    programs.push(program.as_str());
                }
            }
        }
        programs
    }
}

/// Drives the editor through the trigger protocol
#[derive(Clone)]
pub struct AgentTrigger {
    runner: Arc<dyn ActionRunner>,
    clipboard: Arc<dyn Clipboard>,
}

impl AgentTrigger {
    /// Create a trigger over an action runner and a clipboard
    pub fn new(runner: Arc<dyn ActionRunner>, clipboard: Arc<dyn Clipboard>) -> Self {
        Self { runner, clipboard }
    }

    /// Deliver `instruction`
    ///
    /// Failures are reported through `notifier`; the clipboard is restored
    /// before this returns, and also if the future is dropped mid-way.
    pub async fn trigger(
        &self,
        plan: &TriggerPlan,
        instruction: &str,
        notifier: &dyn Notifier,
    ) -> TriggerOutcome {
        let lease = ClipboardLease::acquire(self.clipboard.clone());

        let Some(opened) = self.open_chat(plan).await else {
            notifier.error(
                "Could not open an assistant chat. Open one and run the review command manually.",
            );
            return TriggerOutcome::OpenFailed;
        };
        tracing::debug!("Assistant chat opened with {}", opened.id);

        let outcome = match self.deliver(plan, instruction, &lease).await {
            Ok(outcome) => outcome,
            Err(e) => {
                notifier.error(&format!("Failed to trigger the review: {}", e));
                TriggerOutcome::Failed(e.to_string())
            }
        };

        drop(lease);
        outcome
    }

    async fn open_chat<'a>(&self, plan: &'a TriggerPlan) -> Option<&'a Action> {
        for round in 1..=plan.open_attempts {
            if let Some(action) = first_success(self.runner.as_ref(), &plan.open).await {
                tokio::time::sleep(plan.settle_delay).await;
                return Some(action);
            }
            tracing::debug!("Open round {}/{} failed", round, plan.open_attempts);
            if round < plan.open_attempts {
                tokio::time::sleep(plan.retry_delay).await;
            }
        }
        None
    }

    async fn deliver(
        &self,
        plan: &TriggerPlan,
        instruction: &str,
        lease: &ClipboardLease,
    ) -> Result<TriggerOutcome> {
        lease.write(instruction)?;
        tokio::time::sleep(plan.step_delay).await;

        self.runner.run(&plan.paste).await?;
        tokio::time::sleep(plan.step_delay).await;

        let mut outcome = TriggerOutcome::Pasted;
        if plan.auto_submit {
            match first_success(self.runner.as_ref(), &plan.submit).await {
                Some(action) => {
                    tracing::debug!("Instruction submitted with {}", action.id);
                    outcome = TriggerOutcome::Submitted;
                }
                None => tracing::info!("Auto submit did not take effect, send the pasted instruction manually"),
            }
        }

        // Focus is cosmetic; a failure here does not undo the delivery
        if let Some(focus) = &plan.focus {
            if let Err(e) = self.runner.run(focus).await {
                tracing::debug!("Could not return focus to the editor: {}", e);
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MemoryClipboard;
    use crate::notify::{Level, MemoryNotifier};
    use crate::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records calls, fails listed ids and remembers what the clipboard held at paste time
    struct FakeEditor {
        fail: Vec<String>,
        calls: Mutex<Vec<String>>,
        pasted: Mutex<Option<String>>,
        clipboard: Arc<MemoryClipboard>,
    }

    impl FakeEditor {
        fn new(clipboard: Arc<MemoryClipboard>, fail: &[&str]) -> Self {
            Self {
                fail: fail.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
                pasted: Mutex::new(None),
                clipboard,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActionRunner for FakeEditor {
        async fn run(&self, action: &Action) -> Result<()> {
            self.calls.lock().unwrap().push(action.id.clone());
            if self.fail.contains(&action.id) {
                return Err(Error::Agent(format!("{} unavailable", action.id)));
            }
            if action.id == "paste" {
                *self.pasted.lock().unwrap() = Some(self.clipboard.contents());
            }
            Ok(())
        }
    }

    fn action(id: &str) -> Action {
        Action {
            id: id.to_string(),
            command: Vec::new(),
        }
    }

    fn plan(auto_submit: bool) -> TriggerPlan {
        TriggerPlan {
            open: vec![action("open-a"), action("open-b")],
            paste: action("paste"),
            submit: vec![action("submit-a"), action("submit-b")],
            focus: Some(action("focus")),
            open_attempts: 3,
            retry_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            step_delay: Duration::ZERO,
            auto_submit,
        }
    }

    #[tokio::test]
    async fn test_successful_trigger() {
        let clipboard = Arc::new(MemoryClipboard::new("user text"));
        let editor = Arc::new(FakeEditor::new(clipboard.clone(), &["open-a", "submit-a"]));
        let notifier = MemoryNotifier::new();
        let trigger = AgentTrigger::new(editor.clone(), clipboard.clone());

        let outcome = trigger.trigger(&plan(true), "review this", &notifier).await;

        assert_eq!(outcome, TriggerOutcome::Submitted);
        assert_eq!(
            editor.calls(),
            vec!["open-a", "open-b", "paste", "submit-a", "submit-b", "focus"]
        );
        assert_eq!(editor.pasted.lock().unwrap().as_deref(), Some("review this"));
        assert_eq!(clipboard.contents(), "user text");
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_open_failure_after_all_rounds() {
        let clipboard = Arc::new(MemoryClipboard::new("user text"));
        let editor = Arc::new(FakeEditor::new(clipboard.clone(), &["open-a", "open-b"]));
        let notifier = MemoryNotifier::new();
        let trigger = AgentTrigger::new(editor.clone(), clipboard.clone());

        let outcome = trigger.trigger(&plan(true), "review this", &notifier).await;

        assert_eq!(outcome, TriggerOutcome::OpenFailed);
        assert_eq!(editor.calls().len(), 6);
        assert!(editor.calls().iter().all(|c| c.starts_with("open-")));
        assert_eq!(notifier.at(Level::Error).len(), 1);
        assert_eq!(clipboard.contents(), "user text");
        assert!(clipboard.writes().iter().all(|w| w != "review this"));
    }

    #[tokio::test]
    async fn test_paste_failure_restores_clipboard() {
        let clipboard = Arc::new(MemoryClipboard::new("user text"));
        let editor = Arc::new(FakeEditor::new(clipboard.clone(), &["paste"]));
        let notifier = MemoryNotifier::new();
        let trigger = AgentTrigger::new(editor.clone(), clipboard.clone());

        let outcome = trigger.trigger(&plan(true), "review this", &notifier).await;

        assert!(matches!(outcome, TriggerOutcome::Failed(_)));
        assert_eq!(notifier.at(Level::Error).len(), 1);
        assert_eq!(clipboard.contents(), "user text");
    }

    #[tokio::test]
    async fn test_no_auto_submit() {
        let clipboard = Arc::new(MemoryClipboard::new(""));
        let editor = Arc::new(FakeEditor::new(clipboard.clone(), &[]));
        let notifier = MemoryNotifier::new();
        let trigger = AgentTrigger::new(editor.clone(), clipboard.clone());

        let outcome = trigger.trigger(&plan(false), "review this", &notifier).await;

        assert_eq!(outcome, TriggerOutcome::Pasted);
        assert_eq!(editor.calls(), vec!["open-a", "paste", "focus"]);
    }

    #[tokio::test]
    async fn test_unsubmitted_still_pasted() {
        let clipboard = Arc::new(MemoryClipboard::new(""));
        let editor = Arc::new(FakeEditor::new(
            clipboard.clone(),
            &["submit-a", "submit-b", "focus"],
        ));
        let notifier = MemoryNotifier::new();
        let trigger = AgentTrigger::new(editor, clipboard.clone());

        let outcome = trigger.trigger(&plan(true), "review this", &notifier).await;

        assert_eq!(outcome, TriggerOutcome::Pasted);
        assert!(outcome.delivered());
        assert!(notifier.at(Level::Error).is_empty());
    }

    #[tokio::test]
    async fn test_panicking_runner_restores_clipboard() {
        struct Exploding;

        #[async_trait]
        impl ActionRunner for Exploding {
            async fn run(&self, action: &Action) -> Result<()> {
                if action.id == "paste" {
                    panic!("editor went away");
                }
                Ok(())
            }
        }

        let clipboard = Arc::new(MemoryClipboard::new("user text"));
        let trigger = AgentTrigger::new(Arc::new(Exploding), clipboard.clone());

        let handle = tokio::spawn(async move {
            let notifier = MemoryNotifier::new();
            trigger.trigger(&plan(true), "review this", &notifier).await
        });

        assert!(handle.await.is_err());
        assert_eq!(clipboard.contents(), "user text");
    }

    #[test]
    fn test_plan_from_config() {
        let config = Config::default();
        let plan = TriggerPlan::from_config(&config);

        assert_eq!(plan.open.len(), 2);
        assert_eq!(plan.open[0].id, "composer.newAgentChat");
        assert!(plan.open.iter().all(Action::is_bound));
        assert!(plan.paste.is_bound());
        // composer.submit has no default binding
        assert!(plan.submit[0].is_bound());
        assert!(!plan.submit[1].is_bound());
        assert_eq!(plan.open_attempts, 3);
        assert!(plan.auto_submit);
        assert!(plan.focus.is_some());
        assert_eq!(plan.programs(), vec!["xdotool"]);
    }

    #[test]
    fn test_plan_programs_are_distinct() {
        let mut plan = plan(true);
        plan.open[0].command = vec!["cursor-ctl".to_string(), "open".to_string()];
        plan.paste.command = vec!["xdotool".to_string(), "key".to_string()];
        plan.submit[1].command = vec!["cursor-ctl".to_string(), "submit".to_string()];

        assert_eq!(plan.programs(), vec!["cursor-ctl", "xdotool"]);
    }
}
