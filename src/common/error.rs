//! Error types for launchd process queries
//!
//! Every failure of the query path is returned as a typed variant so callers
//! can decide retry policy themselves. "Process not found" is not an error;
//! it is an empty result.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for launchd process queries
#[derive(Error, Debug)]
pub enum Error {
    // === Caller Errors ===
    #[error("Invalid pid {pid}: must be a positive process identifier")]
    InvalidArgument { pid: i64 },

    // === Foreign State Errors ===
    #[error("XPC global state slot {slot} is not initialized yet. Retry once the process has talked to launchd")]
    UninitializedState { slot: usize },

    #[error("XPC global state layout mismatch: {0}")]
    LayoutMismatch(String),

    // === Transport Errors ===
    #[error("XPC pipe routine failed with status {status}")]
    Transport { status: i64 },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    // === Timeout Errors ===
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a layout mismatch error
    pub fn layout_mismatch(reason: impl Into<String>) -> Self {
        Self::LayoutMismatch(reason.into())
    }

    /// Whether the same query may succeed if the caller tries again later
    ///
    /// Only an uninitialized pipe and transport hiccups qualify. Layout
    /// mismatches and bad arguments never fix themselves.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::UninitializedState { .. } | Error::Transport { .. } | Error::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::UninitializedState { slot: 1 }.is_retryable());
        assert!(Error::Transport { status: 5 }.is_retryable());
        assert!(!Error::InvalidArgument { pid: 0 }.is_retryable());
        assert!(!Error::layout_mismatch("flags").is_retryable());
        assert!(!Error::UnsupportedPlatform("linux".into()).is_retryable());
    }

    #[test]
    fn test_messages_carry_details() {
        let msg = Error::Transport { status: 113 }.to_string();
        assert!(msg.contains("113"));
        let msg = Error::InvalidArgument { pid: -4 }.to_string();
        assert!(msg.contains("-4"));
        let msg = Error::Timeout(Duration::from_millis(50)).to_string();
        assert_eq!(msg, "Query timed out after 50ms");
    }
}
