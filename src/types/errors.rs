//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. Inside the
//! supervisor event loop errors are logged and absorbed; only config
//! persistence failures cross the lifecycle API.

use std::path::PathBuf;

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the supervisor.
#[derive(Error, Debug)]
pub enum Error {
    /// The new configuration could not be persisted, so it cannot take effect.
    #[error("write config file {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The child process could not be spawned.
    #[error("spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Host list delivery gave up after exhausting its retry budget.
    #[error("deliver hosts for module {module} after {attempts} attempts: {reason}")]
    Delivery {
        module: String,
        attempts: u32,
        reason: String,
    },

    /// The child rejected a notification.
    #[error("notify child: {0}")]
    Notify(String),

    /// HTTP transport errors.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("resolve path: {0}")]
    PathResolution(String),

    /// Lifecycle call made in a state that does not allow it.
    #[error("state transition error: {0}")]
    StateTransition(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl Error {
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    pub fn invalid_log_level(msg: impl Into<String>) -> Self {
        Self::InvalidLogLevel(msg.into())
    }

    pub fn path_resolution(msg: impl Into<String>) -> Self {
        Self::PathResolution(msg.into())
    }

    pub fn state_transition(msg: impl Into<String>) -> Self {
        Self::StateTransition(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a notifier call failing with this error is worth another attempt.
    ///
    /// Everything the child or the transport can report is retryable; only
    /// local programming/configuration errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Notify(_) | Error::Http(_) | Error::Io(_))
    }
}
