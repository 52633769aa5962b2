//! Editor actions and the runner that performs them

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::{Error, Result};

/// Upper bound on a single action command
const ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// An editor action identifier with the command line bound to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Editor command identifier, e.g. `composer.newAgentChat`
    pub id: String,
    /// Program and arguments; empty when nothing is bound
    pub command: Vec<String>,
}

impl Action {
    /// Look up the binding for `id`
    pub fn bind(id: &str, bindings: &BTreeMap<String, Vec<String>>) -> Self {
        Self {
            id: id.to_string(),
            command: bindings.get(id).cloned().unwrap_or_default(),
        }
    }

    /// Whether a command line is bound
    pub fn is_bound(&self) -> bool {
        !self.command.is_empty()
    }
}

/// Performs editor actions
#[async_trait]
pub trait ActionRunner: Send + Sync {
    /// Perform one action; an error means it did not take effect
    async fn run(&self, action: &Action) -> Result<()>;
}

/// Try `actions` in order and return the first that succeeds
pub async fn first_success<'a>(runner: &dyn ActionRunner, actions: &'a [Action]) -> Option<&'a Action> {
    for action in actions {
        match runner.run(action).await {
            Ok(()) => return Some(action),
            Err(e) => tracing::debug!("Action {} failed: {}", action.id, e),
        }
    }
    None
}

/// Runs the command line bound to each action
#[derive(Debug, Clone)]
pub struct CommandActionRunner {
    workdir: PathBuf,
    timeout: Duration,
}

impl CommandActionRunner {
    /// Create a runner executing commands in `workdir`
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: ACTION_TIMEOUT,
        }
    }

    /// Override the per action timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether `program` can be started at all
    pub fn is_available(program: &str) -> bool {
        std::process::Command::new(program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }
}

#[async_trait]
impl ActionRunner for CommandActionRunner {
    async fn run(&self, action: &Action) -> Result<()> {
        let Some((program, args)) = action.command.split_first() else {
            return Err(Error::Agent(format!("No command bound to action {}", action.id)));
        };

        tracing::debug!("Running action {}: {:?}", action.id, action.command);

        let status = Command::new(program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        let status = tokio::time::timeout(self.timeout, status)
            .await
            .map_err(|_| Error::Agent(format!("Action {} timed out", action.id)))?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::Agent(format!("{} not found for action {}", program, action.id))
                } else {
                    Error::Io(e)
                }
            })?;

        if !status.success() {
            return Err(Error::Agent(format!(
                "Action {} exited with {}",
                action.id, status
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn action(id: &str, command: &[&str]) -> Action {
        Action {
            id: id.to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_bind() {
        let mut bindings = BTreeMap::new();
        bindings.insert("a".to_string(), vec!["true".to_string()]);

        assert!(Action::bind("a", &bindings).is_bound());
        assert!(!Action::bind("b", &bindings).is_bound());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runner_exit_status() {
        let runner = CommandActionRunner::new(std::env::temp_dir());

        assert!(runner.run(&action("ok", &["true"])).await.is_ok());
        assert!(runner.run(&action("fail", &["false"])).await.is_err());
    }

    #[tokio::test]
    async fn test_command_runner_unbound_and_missing() {
        let runner = CommandActionRunner::new(std::env::temp_dir());

        let err = runner.run(&action("none", &[])).await.unwrap_err();
        assert!(err.to_string().contains("No command bound"));

        let err = runner
            .run(&action("ghost", &["autocr-definitely-not-a-program"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(!CommandActionRunner::is_available("autocr-definitely-not-a-program"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runner_timeout() {
        let runner =
            CommandActionRunner::new(std::env::temp_dir()).with_timeout(Duration::from_millis(50));
        let err = runner.run(&action("slow", &["sleep", "5"])).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    struct Recording {
        fail: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ActionRunner for Recording {
        async fn run(&self, action: &Action) -> Result<()> {
            self.calls.lock().unwrap().push(action.id.clone());
            if self.fail.contains(&action.id.as_str()) {
                Err(Error::Agent("unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_at_first_working_action() {
        let runner = Recording {
            fail: vec!["a"],
            calls: Mutex::new(Vec::new()),
        };
        let actions = vec![action("a", &[]), action("b", &[]), action("c", &[])];

        let hit = first_success(&runner, &actions).await;
        assert_eq!(hit.map(|a| a.id.as_str()), Some("b"));
        assert_eq!(*runner.calls.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_first_success_none() {
        let runner = Recording {
            fail: vec!["a", "b"],
            calls: Mutex::new(Vec::new()),
        };
        let actions = vec![action("a", &[]), action("b", &[])];
        assert!(first_success(&runner, &actions).await.is_none());
        assert!(first_success(&runner, &[]).await.is_none());
    }
}
