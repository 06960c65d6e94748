//! Observer fan-out.
//!
//! Callback listeners run inline in registration order. A listener that
//! panics is logged and skipped; the remaining listeners and the caller are
//! unaffected. Async consumers use a broadcast receiver instead.

use crate::SyncEvent;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, warn};

const EVENT_BUFFER: usize = 256;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

pub(crate) struct ObserverRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    events: broadcast::Sender<SyncEvent>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
            events,
        }
    }

    pub(crate) fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn receiver(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        // Snapshot so listeners may (un)subscribe from inside a callback.
        let listeners: Vec<(ListenerId, Listener)> = self.listeners.lock().clone();

        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                error!(listener = id.0, event = ?event, "Sync listener panicked");
            }
        }

        if self.events.receiver_count() > 0 && self.events.send(event).is_err() {
            warn!("Sync event dropped, receivers closed");
        }
    }
}
