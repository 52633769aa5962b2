//! Confirmation gate asked before each review is launched

use std::io::BufRead;
use std::sync::OnceLock;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};

use crate::config::TriggerKind;

/// Answer from the confirmation gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    /// Launch the review
    Yes,
    /// Skip this event only
    Skip,
    /// Skip and turn this trigger kind off in the session and config file
    Disable,
}

impl ConfirmChoice {
    /// Whether the pipeline continues to the agent trigger
    pub fn proceeds(&self) -> bool {
        matches!(self, ConfirmChoice::Yes)
    }
}

/// Asks whether a detected event should be reviewed
#[async_trait]
pub trait ConfirmGate: Send + Sync {
    /// Ask about one event; `detail` describes the commit or merge
    async fn confirm(&self, kind: TriggerKind, detail: &str) -> ConfirmChoice;
}

/// Gate that always says yes
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl ConfirmGate for AutoConfirm {
    async fn confirm(&self, _kind: TriggerKind, _detail: &str) -> ConfirmChoice {
        ConfirmChoice::Yes
    }
}

/// Gate that prompts on the terminal
///
/// The question goes to stderr. Answers come from a single stdin reader
/// thread started on the first prompt, so overlapping pipelines ask one at a
/// time and share the buffered input. End of input or a read error counts as
/// skip.
#[derive(Debug, Default)]
pub struct TerminalConfirm {
    answers: OnceLock<Mutex<mpsc::Receiver<String>>>,
}

impl TerminalConfirm {
    /// Create a gate reading answers from stdin
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gate reading answers from `lines` instead of stdin
    pub fn from_lines(lines: mpsc::Receiver<String>) -> Self {
        let answers = OnceLock::new();
        let _ = answers.set(Mutex::new(lines));
        Self { answers }
    }

    fn answers(&self) -> &Mutex<mpsc::Receiver<String>> {
        self.answers.get_or_init(|| Mutex::new(spawn_stdin_reader()))
    }
}

/// Forward stdin lines until end of input
///
/// A plain thread, so a blocked read never holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);
    let spawned = std::thread::Builder::new()
        .name("autocr-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read confirmation answer: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("stdin closed, further prompts will skip");
        });
    if let Err(e) = spawned {
        tracing::warn!("Failed to start stdin reader: {}", e);
    }
    rx
}

#[async_trait]
impl ConfirmGate for TerminalConfirm {
    async fn confirm(&self, kind: TriggerKind, detail: &str) -> ConfirmChoice {
        let mut answers = self.answers().lock().await;

        // Lines typed while no question was open are not answers
        while answers.try_recv().is_ok() {}

        let question = match kind {
            TriggerKind::Commit => "Review this commit?",
            TriggerKind::Merge => "Review this merge?",
        };
        let prompt = format!(
            "\n{}\n  {}\n[Y]es / [s]kip this one / [d]isable {} reviews: ",
            question, detail, kind
        );

        let mut stderr = tokio::io::stderr();
        if let Err(e) = stderr.write_all(prompt.as_bytes()).await {
            tracing::warn!("Failed to write confirmation prompt: {}", e);
            return ConfirmChoice::Skip;
        }
        let _ = stderr.flush().await;

        match answers.recv().await {
            Some(line) => parse_answer(&line),
            None => ConfirmChoice::Skip,
        }
    }
}

/// Interpret a typed answer; an empty line accepts
pub fn parse_answer(line: &str) -> ConfirmChoice {
    match line.trim().to_lowercase().as_str() {
        "" | "y" | "yes" => ConfirmChoice::Yes,
        "d" | "disable" => ConfirmChoice::Disable,
        _ => ConfirmChoice::Skip,
    }
}

/// Text shown for a commit: short hash and the first 60 characters of the subject
pub fn commit_detail(hash: &str, subject: Option<&str>) -> String {
    let short: String = hash.chars().take(8).collect();
    match subject.map(str::trim).filter(|s| !s.is_empty()) {
        Some(subject) if subject.chars().count() > 60 => {
            let cut: String = subject.chars().take(60).collect();
            format!("{} {}...", short, cut)
        }
        Some(subject) => format!("{} {}", short, subject),
        None => short,
    }
}

/// Text shown for a merge
pub fn merge_detail(branch: &str) -> String {
    format!("merge branch: {}", branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("\n"), ConfirmChoice::Yes);
        assert_eq!(parse_answer("Y\n"), ConfirmChoice::Yes);
        assert_eq!(parse_answer("yes"), ConfirmChoice::Yes);
        assert_eq!(parse_answer("s"), ConfirmChoice::Skip);
        assert_eq!(parse_answer("nope"), ConfirmChoice::Skip);
        assert_eq!(parse_answer(" D "), ConfirmChoice::Disable);
    }

    #[test]
    fn test_only_yes_proceeds() {
        assert!(ConfirmChoice::Yes.proceeds());
        assert!(!ConfirmChoice::Skip.proceeds());
        assert!(!ConfirmChoice::Disable.proceeds());
    }

    #[test]
    fn test_commit_detail() {
        let hash = "0123456789abcdef0123456789abcdef01234567";
        assert_eq!(commit_detail(hash, Some("Fix login")), "01234567 Fix login");
        assert_eq!(commit_detail(hash, None), "01234567");

        let long = "x".repeat(70);
        assert_eq!(
            commit_detail(hash, Some(&long)),
            format!("01234567 {}...", "x".repeat(60))
        );
    }

    #[tokio::test]
    async fn test_terminal_answers_from_lines() {
        let (tx, rx) = mpsc::channel(4);
        let gate = TerminalConfirm::from_lines(rx);

        tx.send("d".to_string()).await.unwrap();
        // Typed before the prompt, then discarded
        let pending = tokio::spawn(async move {
            gate.confirm(TriggerKind::Commit, "01234567 Fix").await
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.send("s".to_string()).await.unwrap();

        assert_eq!(pending.await.unwrap(), ConfirmChoice::Skip);
    }

    #[tokio::test]
    async fn test_terminal_closed_input_skips() {
        let (tx, rx) = mpsc::channel(4);
        let gate = TerminalConfirm::from_lines(rx);
        tx.send(String::new()).await.unwrap();
        drop(tx);

        // The queued empty line is stale, then input is closed
        assert_eq!(
            gate.confirm(TriggerKind::Merge, "merge branch: x").await,
            ConfirmChoice::Skip
        );
    }

    #[tokio::test]
    async fn test_terminal_prompts_one_at_a_time() {
        let (tx, rx) = mpsc::channel(4);
        let gate = std::sync::Arc::new(TerminalConfirm::from_lines(rx));

        let first = tokio::spawn({
            let gate = gate.clone();
            async move { gate.confirm(TriggerKind::Commit, "a").await }
        });
        let second = tokio::spawn({
            let gate = gate.clone();
            async move { gate.confirm(TriggerKind::Commit, "b").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.send("y".to_string()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.send("d".to_string()).await.unwrap();

        let mut answers = vec![first.await.unwrap(), second.await.unwrap()];
        answers.sort_by_key(|c| *c as u8);
        assert_eq!(answers, vec![ConfirmChoice::Yes, ConfirmChoice::Disable]);
    }

    #[tokio::test]
    async fn test_auto_confirm() {
        assert_eq!(
            AutoConfirm.confirm(TriggerKind::Merge, "x").await,
            ConfirmChoice::Yes
        );
    }
}
