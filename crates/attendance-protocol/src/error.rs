//! Link error types.

use std::time::Duration;
use thiserror::Error;

/// Failure talking to an interactive context.
#[derive(Error, Debug)]
pub enum LinkError {
    /// No interactive context is attached or listening.
    #[error("No interactive context available")]
    NoContext,

    /// The context did not reply within the bound.
    #[error("No reply within {0:?}")]
    Timeout(Duration),

    /// The context went away before replying.
    #[error("Connection closed")]
    ConnectionClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected frame or reply
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using LinkError.
pub type LinkResult<T> = Result<T, LinkError>;
