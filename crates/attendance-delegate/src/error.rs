//! Delegate error types.

use attendance_queue::QueueError;
use thiserror::Error;

/// Failure that stops a whole delegate pass.
///
/// Per-event failures never surface here; they leave the event pending
/// and count toward [`PassReport::failed`](crate::PassReport).
#[derive(Error, Debug)]
pub enum DelegateError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

pub type DelegateResult<T> = Result<T, DelegateError>;
