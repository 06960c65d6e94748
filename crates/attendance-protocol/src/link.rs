//! The delegate's view of an interactive context.

use crate::{LinkResult, Notification, SyncRequest, SyncReply};
use async_trait::async_trait;

/// A channel from the background delegate to whichever interactive context
/// is currently reachable.
///
/// The delegate bounds every [`request`](InteractiveLink::request) with its
/// own timeout; implementations may wait indefinitely.
#[async_trait]
pub trait InteractiveLink: Send + Sync {
    /// Tell listening contexts about pass progress. Best effort.
    async fn broadcast(&self, notification: Notification) -> LinkResult<()>;

    /// Ask a context to commit one event and wait for its reply.
    async fn request(&self, request: SyncRequest) -> LinkResult<SyncReply>;
}
