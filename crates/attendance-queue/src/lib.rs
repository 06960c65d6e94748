//! Local durable queue for the attendance sync engine.
//!
//! This crate provides:
//! - An async SQLite executor with a dedicated thread ([`AsyncDatabase`])
//! - Schema migrations for the pending and rejected tables
//! - Model types ([`AttendanceMark`], [`PendingEvent`], [`RejectedEvent`])
//! - Query helpers over a plain `rusqlite::Connection`
//! - [`PendingQueue`], the handle the orchestrator and delegate share
//!
//! ```ignore
//! let queue = PendingQueue::open(&paths.queue_file()).await?;
//! let id = queue.append(mark).await?;
//! for event in queue.list_pending().await? {
//!     // deliver, then
//!     queue.delete(event.id).await?;
//! }
//! ```

mod error;
mod executor;
mod migrations;
mod models;
pub mod queries;
mod queue;

pub use error::{QueueError, QueueResult};
pub use executor::AsyncDatabase;
pub use migrations::{run_migrations, CURRENT_VERSION};
pub use models::{AttendanceMark, EventStatus, PendingEvent, RejectedEvent};
pub use queue::PendingQueue;
