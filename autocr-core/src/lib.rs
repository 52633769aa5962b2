//! autocr core - automatic code review requests for an editor assistant
//!
//! This crate watches a git working tree for new commits and merges, decides
//! whether a change is worth reviewing, builds a review instruction and hands
//! it to the editor's assistant chat.

pub mod agent;
pub mod config;
pub mod error;
pub mod filter;
pub mod gate;
pub mod git;
pub mod hooks;
pub mod instruction;
pub mod marker;
pub mod notify;
pub mod pipeline;
pub mod poller;
pub mod report;

pub use agent::{AgentTrigger, TriggerOutcome, TriggerPlan};
pub use config::{Config, ConfigOverrides, ConfigStore, TriggerKind};
pub use error::{Error, Result};
pub use gate::{ConfirmChoice, ConfirmGate};
pub use git::GitRepo;
pub use pipeline::{PipelineOutcome, Session};
pub use poller::{EventPoller, PendingEvent};
