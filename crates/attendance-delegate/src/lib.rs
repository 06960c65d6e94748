//! Background sync delegate.
//!
//! Runs when the platform wakes it after connectivity returns, possibly
//! with no interactive context open. It reads the shared queue and hands
//! each event to a context over an [`InteractiveLink`], deleting only what
//! a context confirms.
//!
//! [`InteractiveLink`]: attendance_protocol::InteractiveLink

mod delegate;
mod error;

pub use delegate::{BackgroundSyncDelegate, DelegateConfig};
pub use error::{DelegateError, DelegateResult};

use serde::Serialize;

/// Counts from one delegate pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}
