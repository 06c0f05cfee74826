//! Error types for vseq-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for vseq-player
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Asset lookup failed (network or not-found)
    #[error("Resolution error for {id}: {reason}")]
    Resolution { id: String, reason: String },

    /// Duration measurement failed
    #[error("Probe error for {id}: {reason}")]
    Probe { id: String, reason: String },

    /// Active handle reported an error during playback
    #[error("Playback error: {0}")]
    Playback(String),

    /// Resolution or probe did not settle in time
    #[error("{operation} timed out for {id} after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        id: String,
        after_ms: u64,
    },

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote object storage transport errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Controller task is no longer running
    #[error("Sequence controller has shut down")]
    Shutdown,
}

impl Error {
    /// Asset lookup failure
    pub fn is_resolution(&self) -> bool {
        matches!(self, Error::Resolution { .. })
            || matches!(self, Error::Timeout { operation, .. } if *operation == "resolve")
    }

    /// Duration measurement failure
    pub fn is_probe(&self) -> bool {
        matches!(self, Error::Probe { .. })
            || matches!(self, Error::Timeout { operation, .. } if *operation == "probe")
    }

    /// Fatal active-handle failure
    pub fn is_playback(&self) -> bool {
        matches!(self, Error::Playback(_))
    }
}

impl From<vseq_common::Error> for Error {
    fn from(err: vseq_common::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Convenience Result type using vseq-player Error
pub type Result<T> = std::result::Result<T, Error>;
