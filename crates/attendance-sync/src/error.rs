//! Sync error types.

use attendance_queue::QueueError;
use thiserror::Error;

/// Sync orchestrator error type.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The local queue could not be read or written.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// The remote store permanently refused a fresh mark; it was not queued.
    #[error("Attendance rejected by remote store: {0}")]
    Rejected(String),
}

/// Result type alias using SyncError.
pub type SyncResult<T> = Result<T, SyncError>;
