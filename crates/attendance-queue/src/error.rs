//! Queue error types.

use thiserror::Error;

/// Queue error type.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The durable store cannot be opened or refused a write.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// No event with this id exists.
    #[error("Event not found: {0}")]
    NotFound(i64),

    /// A stored row could not be decoded.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for QueueError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                Self::InvalidData(format!("column {column}: {source}"))
            }
            other => Self::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<std::io::Error> for QueueError {
    fn from(e: std::io::Error) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

/// Result type alias using QueueError.
pub type QueueResult<T> = Result<T, QueueError>;
