//! The local durable queue of attendance marks.

use crate::{
    queries, AsyncDatabase, AttendanceMark, EventStatus, PendingEvent, QueueResult,
    RejectedEvent,
};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, warn};

/// Crash-durable queue of pending attendance events.
///
/// Every operation commits before returning `Ok`, so its effect survives a
/// process crash. Cloning is cheap and clones share one executor thread.
/// Two processes may open the same file; SQLite serializes their writes.
#[derive(Clone)]
pub struct PendingQueue {
    db: AsyncDatabase,
}

impl PendingQueue {
    /// Open the queue stored at `path`.
    pub async fn open(path: &Path) -> QueueResult<Self> {
        let db = AsyncDatabase::open(path).await?;
        Ok(Self { db })
    }

    /// Open a throwaway in-memory queue.
    pub async fn open_in_memory() -> QueueResult<Self> {
        let db = AsyncDatabase::open_in_memory().await?;
        Ok(Self { db })
    }

    /// Insert a new pending event and return its id.
    pub async fn append(&self, mark: AttendanceMark) -> QueueResult<i64> {
        Ok(self.append_event(mark).await?.id)
    }

    /// Insert a new pending event and return the stored record.
    pub async fn append_event(&self, mark: AttendanceMark) -> QueueResult<PendingEvent> {
        let queued_at = Utc::now();
        let event = self
            .db
            .call(move |conn| {
                let id = queries::insert_pending(conn, &mark, queued_at)?;
                Ok(PendingEvent {
                    id,
                    mark,
                    status: EventStatus::Pending,
                    synced_at: None,
                    queued_at,
                })
            })
            .await?;
        info!(
            event_id = event.id,
            session_id = %event.mark.session_id,
            "Queued attendance mark"
        );
        Ok(event)
    }

    /// All pending events, oldest first.
    pub async fn list_pending(&self) -> QueueResult<Vec<PendingEvent>> {
        self.db.call(queries::list_pending).await
    }

    /// One event by id regardless of status.
    pub async fn get(&self, id: i64) -> QueueResult<Option<PendingEvent>> {
        self.db.call(move |conn| queries::get_event(conn, id)).await
    }

    /// Mark an event synced. Fails with `NotFound` for an unknown id.
    pub async fn mark_synced(&self, id: i64) -> QueueResult<()> {
        self.db
            .call(move |conn| queries::mark_synced(conn, id, Utc::now()))
            .await?;
        debug!(event_id = id, "Marked event synced");
        Ok(())
    }

    /// Delete an event. Unknown ids are ignored.
    pub async fn delete(&self, id: i64) -> QueueResult<()> {
        let removed = self
            .db
            .call(move |conn| queries::delete_event(conn, id))
            .await?;
        if removed {
            debug!(event_id = id, "Deleted event");
        } else {
            debug!(event_id = id, "Delete of unknown event ignored");
        }
        Ok(())
    }

    pub async fn count_pending(&self) -> QueueResult<usize> {
        self.db.call(queries::count_pending).await
    }

    /// Purge events already marked synced.
    pub async fn clear_synced(&self) -> QueueResult<usize> {
        let count = self.db.call(queries::clear_synced).await?;
        info!(count, "Purged synced events");
        Ok(count)
    }

    /// Purge every queued event.
    pub async fn clear_all(&self) -> QueueResult<usize> {
        let count = self.db.call(queries::clear_all).await?;
        warn!(count, "Purged all queued events");
        Ok(count)
    }

    /// Move a pending event to the dead-letter table.
    pub async fn reject(&self, id: i64, reason: impl Into<String>) -> QueueResult<()> {
        let reason = reason.into();
        let logged_reason = reason.clone();
        self.db
            .call(move |conn| queries::reject_event(conn, id, &reason, Utc::now()))
            .await?;
        warn!(event_id = id, reason = %logged_reason, "Moved event to rejected");
        Ok(())
    }

    pub async fn list_rejected(&self) -> QueueResult<Vec<RejectedEvent>> {
        self.db.call(queries::list_rejected).await
    }

    pub async fn count_rejected(&self) -> QueueResult<usize> {
        self.db.call(queries::count_rejected).await
    }

    pub async fn clear_rejected(&self) -> QueueResult<usize> {
        let count = self.db.call(queries::clear_rejected).await?;
        info!(count, "Purged rejected events");
        Ok(count)
    }

    /// Location of the backing store.
    pub fn path(&self) -> &str {
        self.db.path()
    }

    /// Check the store still answers.
    pub async fn health_check(&self) -> QueueResult<()> {
        self.db.health_check().await
    }

    /// Close the executor once queued statements finish. Other clones of
    /// this handle fail with `StorageUnavailable` afterwards.
    pub async fn close(self) -> QueueResult<()> {
        self.db.close().await
    }
}
