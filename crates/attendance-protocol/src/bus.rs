//! In-process link between a delegate task and interactive contexts.
//!
//! Requests go to the first attached context still alive; notifications
//! fan out to all of them.

use crate::{InteractiveLink, LinkError, LinkResult, Notification, SyncReply, SyncRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

const REQUEST_BUFFER: usize = 32;
const NOTIFICATION_BUFFER: usize = 64;

/// A request plus the channel its reply must go back on.
#[derive(Debug)]
pub struct PendingRequest {
    pub request: SyncRequest,
    reply_tx: oneshot::Sender<SyncReply>,
}

impl PendingRequest {
    /// Send the reply. Returns false when the requester stopped waiting.
    pub fn reply(self, success: bool) -> bool {
        let reply = SyncReply {
            request_id: self.request.request_id,
            success,
        };
        self.reply_tx.send(reply).is_ok()
    }
}

/// What an attached context receives.
#[derive(Debug)]
pub enum Inbound {
    Notification(Notification),
    Request(PendingRequest),
}

/// Receiving side held by one interactive context.
pub struct ContextEndpoint {
    requests: mpsc::Receiver<PendingRequest>,
    notifications: broadcast::Receiver<Notification>,
}

impl ContextEndpoint {
    /// Next inbound message. `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<Inbound> {
        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    return request.map(Inbound::Request);
                }
                notification = self.notifications.recv() => match notification {
                    Ok(notification) => return Some(Inbound::Notification(notification)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Context endpoint lagged, skipped notifications");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return self.requests.recv().await.map(Inbound::Request);
                    }
                },
            }
        }
    }
}

struct BusInner {
    contexts: Mutex<Vec<mpsc::Sender<PendingRequest>>>,
    notifications: broadcast::Sender<Notification>,
}

/// In-process [`InteractiveLink`].
#[derive(Clone)]
pub struct ContextBus {
    inner: Arc<BusInner>,
}

impl ContextBus {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self {
            inner: Arc::new(BusInner {
                contexts: Mutex::new(Vec::new()),
                notifications,
            }),
        }
    }

    /// Attach an interactive context. Dropping the endpoint detaches it.
    pub fn attach(&self) -> ContextEndpoint {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
        self.inner.contexts.lock().push(tx);
        debug!("Interactive context attached");

        ContextEndpoint {
            requests: rx,
            notifications: self.inner.notifications.subscribe(),
        }
    }

    /// Number of attached contexts still alive.
    pub fn context_count(&self) -> usize {
        let mut contexts = self.inner.contexts.lock();
        contexts.retain(|tx| !tx.is_closed());
        contexts.len()
    }

    fn live_context(&self) -> Option<mpsc::Sender<PendingRequest>> {
        let mut contexts = self.inner.contexts.lock();
        contexts.retain(|tx| !tx.is_closed());
        contexts.first().cloned()
    }
}

impl Default for ContextBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InteractiveLink for ContextBus {
    async fn broadcast(&self, notification: Notification) -> LinkResult<()> {
        // No receivers is fine: nobody is listening.
        let _ = self.inner.notifications.send(notification);
        Ok(())
    }

    async fn request(&self, request: SyncRequest) -> LinkResult<SyncReply> {
        let context = self.live_context().ok_or(LinkError::NoContext)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let request_id = request.request_id;
        context
            .send(PendingRequest { request, reply_tx })
            .await
            .map_err(|_| LinkError::NoContext)?;

        debug!(request_id = %request_id, "Sync request delivered to context");
        reply_rx.await.map_err(|_| LinkError::ConnectionClosed)
    }
}
