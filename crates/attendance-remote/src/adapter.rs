//! The capability the sync engine uses to reach the remote store.

use crate::RemoteResult;
use async_trait::async_trait;
use attendance_queue::AttendanceMark;

/// Commits one attendance mark to the authoritative remote store.
///
/// Implementations must be safe to call again with the same mark: the
/// engine delivers at least once and may repeat a commit whose local
/// delete never happened. Marks carry an `event_key` for exactly this.
#[async_trait]
pub trait RemoteWriteAdapter: Send + Sync {
    /// Write the mark and update any derived aggregate.
    async fn commit(&self, mark: &AttendanceMark) -> RemoteResult<()>;
}
