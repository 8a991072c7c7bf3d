//! Common error types for the uptime monitor.

use std::fmt;

/// A specialized Result type for uptime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for uptime operations.
///
/// A failed probe is never an `Error`; it is recorded as a down observation.
/// These variants cover the monitor's own infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed registration input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The persistence layer is unavailable or rejected the operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Fault while preparing a sweep (registry snapshot failed or stalled).
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new validation error.
    pub fn validation(msg: impl fmt::Display) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new storage error.
    pub fn storage(msg: impl fmt::Display) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Create a new scheduler error.
    pub fn scheduler(msg: impl fmt::Display) -> Self {
        Error::Scheduler(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }

    /// True for errors caused by caller input rather than the monitor itself.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
