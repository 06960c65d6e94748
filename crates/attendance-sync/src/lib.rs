//! Sync orchestrator for the attendance write queue.
//!
//! [`SyncOrchestrator`] tracks connectivity, sends fresh marks straight to
//! the remote store when it can, queues them when it cannot, and drains the
//! queue after the connection settles. It also answers the background
//! delegate, either in-process via [`SyncOrchestrator::serve`] or over the
//! daemon socket via [`SyncSocketServer`].

mod clock;
mod error;
mod events;
mod observers;
mod orchestrator;
mod server;
mod wake;

pub use clock::{Clock, SystemClock};
pub use error::{SyncError, SyncResult};
pub use events::{DrainOutcome, DrainReport, RecordOutcome, SyncEvent, SyncStatus};
pub use observers::ListenerId;
pub use orchestrator::{OrchestratorConfig, SyncOrchestrator, SyncOrchestratorBuilder};
pub use server::SyncSocketServer;
pub use wake::{UnsupportedWake, WakeError, WakeRegistrar, SYNC_TAG};
