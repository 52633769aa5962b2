//! Error types for autocr

use thiserror::Error;

/// Result type alias for autocr operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for autocr operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Git repository error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// HTTP error while fetching extra context
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Report directory watch error
    #[error("File watch error: {0}")]
    Watch(#[from] ::notify::Error),

    /// Agent action or clipboard error
    #[error("Agent error: {0}")]
    Agent(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
