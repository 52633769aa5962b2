//! User-facing notifications

use std::path::PathBuf;
use std::sync::Mutex;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Informational
    Info,
    /// Something needs attention
    Warning,
    /// An event could not be processed
    Error,
}

/// Sink for messages the user should see
pub trait Notifier: Send + Sync {
    /// Show a message
    fn notify(&self, level: Level, message: &str);

    /// Show an informational message
    fn info(&self, message: &str) {
        self.notify(Level::Info, message);
    }

    /// Show a warning
    fn warn(&self, message: &str) {
        self.notify(Level::Warning, message);
    }

    /// Show an error
    fn error(&self, message: &str) {
        self.notify(Level::Error, message);
    }
}

/// Prints notifications to stderr and records them in the log
///
/// Errors point at the log file when one is configured.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier {
    log_file: Option<PathBuf>,
}

impl ConsoleNotifier {
    /// Create a notifier without a log file pointer
    pub fn new() -> Self {
        Self::default()
    }

    /// Mention this log file in error notifications
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: Level, message: &str) {
        match level {
            Level::Info => {
                tracing::info!("{}", message);
                eprintln!("autocr: {}", message);
            }
            Level::Warning => {
                tracing::warn!("{}", message);
                eprintln!("autocr: warning: {}", message);
            }
            Level::Error => {
                tracing::error!("{}", message);
                match self.log_file {
                    Some(ref path) => {
                        eprintln!("autocr: error: {}\n  see the log for details: {}", message, path.display())
                    }
                    None => eprintln!("autocr: error: {}", message),
                }
            }
        }
    }
}

/// Keeps notifications in memory, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<(Level, String)>>,
}

impl MemoryNotifier {
    /// Create an empty notifier
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded notifications
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Recorded notifications of one level
    pub fn at(&self, level: Level) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, level: Level, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_notifier_records_levels() {
        let notifier = MemoryNotifier::new();
        notifier.info("one");
        notifier.error("two");
        notifier.warn("three");

        assert_eq!(notifier.messages().len(), 3);
        assert_eq!(notifier.at(Level::Error), vec!["two".to_string()]);
    }
}
