//! Editor assistant trigger: actions, clipboard and the paste protocol

mod actions;
mod clipboard;
mod trigger;

pub use actions::{first_success, Action, ActionRunner, CommandActionRunner};
pub use clipboard::{Clipboard, ClipboardLease, MemoryClipboard, SystemClipboard};
pub use trigger::{AgentTrigger, TriggerOutcome, TriggerPlan};
