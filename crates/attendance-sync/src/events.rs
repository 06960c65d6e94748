//! Events the orchestrator publishes to observers, and pass reports.

use attendance_protocol::ConnectivityState;
use attendance_queue::PendingEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Engine event delivered to every observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Online,
    Offline,
    /// A fresh mark could not be delivered and was queued.
    SavedOffline { event: PendingEvent },
    SyncStart { count: usize },
    SyncComplete { succeeded: usize, failed: usize },
    /// A pass could not run at all.
    SyncError { error: String },
    /// The remote store refused a queued event; it moved to dead letters.
    Rejected { event: PendingEvent, reason: String },
}

/// Counts from one drain pass.
///
/// `failed` counts every event not delivered; `rejected` is the part of it
/// that moved to dead letters instead of staying pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub succeeded: usize,
    pub failed: usize,
    pub rejected: usize,
}

/// What a drain request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A pass ran over a non-empty snapshot.
    Completed(DrainReport),
    /// Another pass was already running; this request was dropped.
    Coalesced,
    /// Nothing was pending.
    Empty,
}

/// What happened to a freshly recorded mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Committed straight to the remote store.
    Delivered,
    /// Queued for a later drain.
    SavedOffline { id: i64 },
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub connectivity: ConnectivityState,
    pub pending: usize,
    pub rejected: usize,
    pub draining: bool,
    pub last_drain_at: Option<DateTime<Utc>>,
    pub last_report: Option<DrainReport>,
}
