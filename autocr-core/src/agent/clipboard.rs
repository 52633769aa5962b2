//! Clipboard access and the save/restore lease used while pasting

use std::sync::{Arc, Mutex};

use crate::{Error, Result};

/// Text clipboard
pub trait Clipboard: Send + Sync {
    /// Current clipboard text
    fn read_text(&self) -> Result<String>;

    /// Replace the clipboard text
    fn write_text(&self, text: &str) -> Result<()>;
}

fn clipboard_error(e: arboard::Error) -> Error {
    Error::Agent(format!("Clipboard unavailable: {}", e))
}

/// The desktop clipboard
///
/// One handle is kept for the lifetime of the value so that on X11 the
/// written text stays served after a write returns.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Mutex<Option<arboard::Clipboard>>,
}

impl std::fmt::Debug for SystemClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemClipboard").finish_non_exhaustive()
    }
}

impl SystemClipboard {
    /// Create a lazily connected clipboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a native clipboard can be reached
    pub fn is_available() -> bool {
        arboard::Clipboard::new().is_ok()
    }

    fn with<R>(
        &self,
        f: impl FnOnce(&mut arboard::Clipboard) -> std::result::Result<R, arboard::Error>,
    ) -> Result<R> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| Error::Agent("Clipboard lock poisoned".to_string()))?;
        if guard.is_none() {
            *guard = Some(arboard::Clipboard::new().map_err(clipboard_error)?);
        }
        let Some(clipboard) = guard.as_mut() else {
            return Err(Error::Agent("Clipboard unavailable".to_string()));
        };
        f(clipboard).map_err(clipboard_error)
    }
}

impl Clipboard for SystemClipboard {
    fn read_text(&self) -> Result<String> {
        self.with(|c| match c.get_text() {
            // An empty or non-text clipboard reads as empty text
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            other => other,
        })
    }

    fn write_text(&self, text: &str) -> Result<()> {
        self.with(|c| c.set_text(text))
    }
}

/// In-memory clipboard, for headless use and tests
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    text: String,
    writes: Vec<String>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryClipboard {
    /// Create a clipboard holding `text`
    pub fn new(text: impl Into<String>) -> Self {
        let clipboard = Self::default();
        if let Ok(mut state) = clipboard.state.lock() {
            state.text = text.into();
        }
        clipboard
    }

    /// Make every read fail
    pub fn failing_reads(self) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.fail_reads = true;
        }
        self
    }

    /// Make every write fail
    pub fn failing_writes(self) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.fail_writes = true;
        }
        self
    }

    /// Current text
    pub fn contents(&self) -> String {
        self.state.lock().map(|s| s.text.clone()).unwrap_or_default()
    }

    /// Every text written so far, oldest first
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().map(|s| s.writes.clone()).unwrap_or_default()
    }
}

impl Clipboard for MemoryClipboard {
    fn read_text(&self) -> Result<String> {
        let state = self
            .state
            .lock()
            .map_err(|_| Error::Agent("Clipboard lock poisoned".to_string()))?;
        if state.fail_reads {
            return Err(Error::Agent("Clipboard read refused".to_string()));
        }
        Ok(state.text.clone())
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Agent("Clipboard lock poisoned".to_string()))?;
        if state.fail_writes {
            return Err(Error::Agent("Clipboard write refused".to_string()));
        }
        state.text = text.to_string();
        state.writes.push(text.to_string());
        Ok(())
    }
}

/// Holds the clipboard contents saved before a paste
///
/// Dropping the lease writes the saved text back, on success, on error and
/// while unwinding. If the clipboard could not be read, nothing is restored.
pub struct ClipboardLease {
    clipboard: Arc<dyn Clipboard>,
    saved: Option<String>,
}

impl ClipboardLease {
    /// Snapshot the current clipboard text
    pub fn acquire(clipboard: Arc<dyn Clipboard>) -> Self {
        let saved = match clipboard.read_text() {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!("Could not save clipboard contents: {}", e);
                None
            }
        };
        Self { clipboard, saved }
    }

    /// Text that will be restored
    pub fn saved(&self) -> Option<&str> {
        self.saved.as_deref()
    }

    /// Put `text` on the clipboard for pasting
    pub fn write(&self, text: &str) -> Result<()> {
        self.clipboard.write_text(text)
    }
}

impl Drop for ClipboardLease {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            if let Err(e) = self.clipboard.write_text(&saved) {
                tracing::warn!("Failed to restore clipboard contents: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_restores_on_drop() {
        let clipboard = Arc::new(MemoryClipboard::new("mine"));
        {
            let lease = ClipboardLease::acquire(clipboard.clone());
            assert_eq!(lease.saved(), Some("mine"));
            lease.write("instruction").unwrap();
            assert_eq!(clipboard.contents(), "instruction");
        }
        assert_eq!(clipboard.contents(), "mine");
        assert_eq!(clipboard.writes(), vec!["instruction", "mine"]);
    }

    #[test]
    fn test_lease_without_snapshot_restores_nothing() {
        let clipboard = Arc::new(MemoryClipboard::new("mine").failing_reads());
        {
            let lease = ClipboardLease::acquire(clipboard.clone());
            assert_eq!(lease.saved(), None);
            lease.write("instruction").unwrap();
        }
        assert_eq!(clipboard.contents(), "instruction");
    }

    #[test]
    fn test_lease_restores_while_unwinding() {
        let clipboard = Arc::new(MemoryClipboard::new("mine"));
        let shared = clipboard.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let lease = ClipboardLease::acquire(shared);
            lease.write("instruction").unwrap();
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(clipboard.contents(), "mine");
    }

    #[test]
    fn test_restore_failure_is_not_fatal() {
        let clipboard = Arc::new(MemoryClipboard::new("mine").failing_writes());
        let lease = ClipboardLease::acquire(clipboard.clone());
        assert!(lease.write("instruction").is_err());
        drop(lease);
        assert_eq!(clipboard.contents(), "mine");
    }
}
