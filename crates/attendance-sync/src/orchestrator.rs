//! The sync orchestrator.
//!
//! One instance per interactive process owns connectivity state, decides
//! when to drain the local queue, and performs every remote write.
//!
//! # State
//!
//! ```text
//! Idle --(online transition + settle delay | sync_now)--> Draining --> Idle
//! ```
//!
//! At most one drain pass runs at a time. A trigger that arrives while a
//! pass is running is coalesced: it returns [`DrainOutcome::Coalesced`]
//! and nothing is queued behind the running pass.

use crate::observers::ObserverRegistry;
use crate::{
    Clock, DrainOutcome, DrainReport, ListenerId, RecordOutcome, SyncError, SyncEvent,
    SyncResult, SyncStatus, SystemClock, UnsupportedWake, WakeError, WakeRegistrar, SYNC_TAG,
};
use attendance_protocol::{ConnectivityState, ContextEndpoint, Inbound, Notification};
use attendance_queue::{AttendanceMark, PendingEvent, PendingQueue, QueueError};
use attendance_remote::{RemoteError, RemoteWriteAdapter};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wait after an online transition before draining.
    pub settle_delay: Duration,
    /// Tag used for wake-on-connectivity registration.
    pub wake_tag: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            wake_tag: SYNC_TAG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DrainTrigger {
    Reachability,
    Manual,
}

impl DrainTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Reachability => "reachability",
            Self::Manual => "manual",
        }
    }
}

/// Holds the draining flag for the life of one pass.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct Inner {
    queue: PendingQueue,
    remote: Arc<dyn RemoteWriteAdapter>,
    clock: Arc<dyn Clock>,
    wake: Arc<dyn WakeRegistrar>,
    config: OrchestratorConfig,
    connectivity: Mutex<ConnectivityState>,
    draining: AtomicBool,
    observers: ObserverRegistry,
    settle_timer: Mutex<Option<JoinHandle<()>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    last_drain: Mutex<Option<(DateTime<Utc>, DrainReport)>>,
}

/// Builder for [`SyncOrchestrator`].
pub struct SyncOrchestratorBuilder {
    queue: PendingQueue,
    remote: Arc<dyn RemoteWriteAdapter>,
    clock: Arc<dyn Clock>,
    wake: Arc<dyn WakeRegistrar>,
    config: OrchestratorConfig,
    initial_state: ConnectivityState,
}

impl SyncOrchestratorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn wake_registrar(mut self, wake: Arc<dyn WakeRegistrar>) -> Self {
        self.wake = wake;
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Connectivity assumed until the platform reports otherwise.
    /// Defaults to offline.
    pub fn initial_state(mut self, state: ConnectivityState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn build(self) -> SyncOrchestrator {
        SyncOrchestrator {
            inner: Arc::new(Inner {
                queue: self.queue,
                remote: self.remote,
                clock: self.clock,
                wake: self.wake,
                config: self.config,
                connectivity: Mutex::new(self.initial_state),
                draining: AtomicBool::new(false),
                observers: ObserverRegistry::new(),
                settle_timer: Mutex::new(None),
                watcher: Mutex::new(None),
                last_drain: Mutex::new(None),
            }),
        }
    }
}

/// Decides when to deliver queued attendance and performs the delivery.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    pub fn builder(
        queue: PendingQueue,
        remote: Arc<dyn RemoteWriteAdapter>,
    ) -> SyncOrchestratorBuilder {
        SyncOrchestratorBuilder {
            queue,
            remote,
            clock: Arc::new(SystemClock),
            wake: Arc::new(UnsupportedWake),
            config: OrchestratorConfig::default(),
            initial_state: ConnectivityState::Offline,
        }
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.inner.queue
    }

    pub fn connectivity(&self) -> ConnectivityState {
        *self.inner.connectivity.lock()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity().is_online()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Acquire)
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register a callback for every engine event.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(listener)
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    /// Receive engine events asynchronously.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.observers.receiver()
    }

    fn emit(&self, event: SyncEvent) {
        self.inner.observers.emit(event);
    }

    // =========================================================================
    // Write path
    // =========================================================================

    /// Record one attendance mark.
    ///
    /// Online, the mark goes straight to the remote store. When that fails
    /// transiently, or the engine is known offline, the mark is queued, a
    /// `SavedOffline` event is emitted, and a background wake is requested.
    /// A permanent rejection is returned to the caller and nothing is queued.
    pub async fn record_attendance(&self, mark: AttendanceMark) -> SyncResult<RecordOutcome> {
        if self.is_online() {
            match self.inner.remote.commit(&mark).await {
                Ok(()) => {
                    info!(
                        session_id = %mark.session_id,
                        member_id = %mark.member_id,
                        "Attendance delivered"
                    );
                    return Ok(RecordOutcome::Delivered);
                }
                Err(RemoteError::Rejected(reason)) => {
                    warn!(
                        session_id = %mark.session_id,
                        member_id = %mark.member_id,
                        reason = %reason,
                        "Attendance rejected by remote store"
                    );
                    return Err(SyncError::Rejected(reason));
                }
                Err(RemoteError::Transient(reason)) => {
                    info!(reason = %reason, "Remote write failed, queueing attendance");
                }
            }
        } else {
            debug!("Offline, queueing attendance");
        }

        let event = match self.inner.queue.append_event(mark).await {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "Failed to queue attendance");
                self.emit(SyncEvent::SyncError {
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let id = event.id;
        self.emit(SyncEvent::SavedOffline { event });
        self.register_wake().await;
        Ok(RecordOutcome::SavedOffline { id })
    }

    async fn register_wake(&self) {
        let tag = &self.inner.config.wake_tag;
        match self.inner.wake.register(tag).await {
            Ok(()) => debug!(tag = %tag, "Background sync registered"),
            Err(WakeError::Unsupported) => {
                debug!(tag = %tag, "Background sync unsupported; next online transition will drain")
            }
            Err(e) => warn!(tag = %tag, error = %e, "Background sync registration failed"),
        }
    }

    // =========================================================================
    // Reachability
    // =========================================================================

    /// Apply a reachability report. Reports that do not change the state
    /// are ignored.
    ///
    /// Going offline emits `Offline` and cancels a pending settle timer.
    /// Going online emits `Online` and schedules a drain after the settle
    /// delay; the drain is skipped if the engine is offline again by then.
    /// Must be called inside a Tokio runtime.
    pub fn handle_reachability(&self, state: ConnectivityState) {
        let previous = std::mem::replace(&mut *self.inner.connectivity.lock(), state);
        if previous == state {
            debug!(state = %state, "Reachability unchanged");
            return;
        }

        info!(from = %previous, to = %state, "Reachability changed");
        match state {
            ConnectivityState::Offline => {
                if let Some(timer) = self.inner.settle_timer.lock().take() {
                    timer.abort();
                }
                self.emit(SyncEvent::Offline);
            }
            ConnectivityState::Online => {
                self.emit(SyncEvent::Online);
                self.schedule_drain();
            }
        }
    }

    fn schedule_drain(&self) {
        let orchestrator = self.clone();
        let delay = self.inner.config.settle_delay;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !orchestrator.is_online() {
                debug!("Offline again after settle delay, skipping drain");
                return;
            }
            // Detached so that cancelling the timer never cancels a running pass.
            tokio::spawn(async move {
                if let Err(e) = orchestrator.drain(DrainTrigger::Reachability).await {
                    warn!(error = %e, "Scheduled drain failed");
                }
            });
        });

        if let Some(previous) = self.inner.settle_timer.lock().replace(timer) {
            previous.abort();
        }
    }

    // =========================================================================
    // Drain
    // =========================================================================

    /// Drain the queue now, whatever the connectivity flag says.
    pub async fn sync_now(&self) -> SyncResult<DrainOutcome> {
        self.drain(DrainTrigger::Manual).await
    }

    async fn drain(&self, trigger: DrainTrigger) -> SyncResult<DrainOutcome> {
        let Some(_guard) = DrainGuard::acquire(&self.inner.draining) else {
            debug!(trigger = trigger.as_str(), "Drain already running, coalesced");
            return Ok(DrainOutcome::Coalesced);
        };

        let snapshot = match self.inner.queue.list_pending().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(trigger = trigger.as_str(), error = %e, "Drain aborted, queue unavailable");
                self.emit(SyncEvent::SyncError {
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };

        if snapshot.is_empty() {
            debug!(trigger = trigger.as_str(), "Nothing to drain");
            return Ok(DrainOutcome::Empty);
        }

        let count = snapshot.len();
        info!(trigger = trigger.as_str(), count, "Drain pass started");
        self.emit(SyncEvent::SyncStart { count });

        let mut report = DrainReport::default();
        for event in snapshot {
            match self.inner.remote.commit(&event.mark).await {
                Ok(()) => {
                    report.succeeded += 1;
                    if let Err(e) = self.inner.queue.delete(event.id).await {
                        error!(
                            event_id = event.id,
                            error = %e,
                            "Delivered event could not be deleted; it will be redelivered"
                        );
                    }
                }
                Err(RemoteError::Transient(reason)) => {
                    report.failed += 1;
                    warn!(event_id = event.id, reason = %reason, "Delivery failed, event stays pending");
                }
                Err(RemoteError::Rejected(reason)) => {
                    report.failed += 1;
                    report.rejected += 1;
                    self.dead_letter(event, reason).await;
                }
            }
        }

        *self.inner.last_drain.lock() = Some((self.inner.clock.now(), report));

        info!(
            trigger = trigger.as_str(),
            succeeded = report.succeeded,
            failed = report.failed,
            rejected = report.rejected,
            "Drain pass complete"
        );
        self.emit(SyncEvent::SyncComplete {
            succeeded: report.succeeded,
            failed: report.failed,
        });

        Ok(DrainOutcome::Completed(report))
    }

    async fn dead_letter(&self, event: PendingEvent, reason: String) {
        match self.inner.queue.reject(event.id, reason.clone()).await {
            Ok(()) => self.emit(SyncEvent::Rejected { event, reason }),
            Err(QueueError::NotFound(id)) => {
                debug!(event_id = id, "Rejected event already left the queue");
            }
            Err(e) => {
                error!(event_id = event.id, error = %e, "Failed to move rejected event");
            }
        }
    }

    // =========================================================================
    // Delegated requests
    // =========================================================================

    /// Commit one event on behalf of the background delegate.
    ///
    /// Returns whether the delegate may delete the event. The queue is left
    /// to the delegate, except that a permanently rejected event is moved to
    /// dead letters here so no later pass retries it.
    ///
    /// This does not take the drain guard. A delegated commit can run beside
    /// a local drain pass, is not reflected by [`is_draining`](Self::is_draining),
    /// and leaves [`status`](Self::status) and its last pass untouched. The
    /// event's `event_key` makes a commit from both paths land once remotely.
    pub async fn handle_delegated_record(&self, event: &PendingEvent) -> bool {
        if !self.is_online() {
            debug!(event_id = event.id, "Offline, declining delegated record");
            return false;
        }

        match self.inner.remote.commit(&event.mark).await {
            Ok(()) => {
                debug!(event_id = event.id, "Delegated record committed");
                true
            }
            Err(RemoteError::Transient(reason)) => {
                warn!(event_id = event.id, reason = %reason, "Delegated record failed");
                false
            }
            Err(RemoteError::Rejected(reason)) => {
                self.dead_letter(event.clone(), reason).await;
                false
            }
        }
    }

    /// Surface a delegate progress notice to this context's observers.
    pub fn relay_notification(&self, notification: Notification) {
        match notification {
            Notification::SyncStart { count } => {
                info!(count, "Background sync started");
                self.emit(SyncEvent::SyncStart { count });
            }
            Notification::SyncComplete { succeeded, failed } => {
                info!(succeeded, failed, "Background sync complete");
                self.emit(SyncEvent::SyncComplete { succeeded, failed });
            }
        }
    }

    /// Answer delegate traffic arriving on an in-process endpoint until the
    /// bus goes away.
    pub fn serve(&self, mut endpoint: ContextEndpoint) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            while let Some(inbound) = endpoint.next().await {
                match inbound {
                    Inbound::Notification(notification) => {
                        orchestrator.relay_notification(notification)
                    }
                    Inbound::Request(pending) => {
                        let success = orchestrator
                            .handle_delegated_record(&pending.request.event)
                            .await;
                        if !pending.reply(success) {
                            debug!("Delegate stopped waiting for reply");
                        }
                    }
                }
            }
            debug!("Context endpoint closed");
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Follow a reachability signal until [`stop`](Self::stop).
    ///
    /// The receiver's current value is applied first, so starting online
    /// drains whatever an earlier run left queued. Only changes are acted
    /// on after that; the signal is never polled.
    pub fn start(&self, mut reachability: watch::Receiver<ConnectivityState>) {
        let current = *reachability.borrow_and_update();
        self.handle_reachability(current);

        let weak = Arc::downgrade(&self.inner);
        let watcher = tokio::spawn(async move {
            while reachability.changed().await.is_ok() {
                let state = *reachability.borrow_and_update();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                SyncOrchestrator { inner }.handle_reachability(state);
            }
            debug!("Reachability watcher finished");
        });

        if let Some(previous) = self.inner.watcher.lock().replace(watcher) {
            previous.abort();
        }
        info!(state = %current, "Sync orchestrator started");
    }

    /// Stop following reachability and cancel a pending settle timer.
    /// A drain pass already running completes.
    pub fn stop(&self) {
        if let Some(watcher) = self.inner.watcher.lock().take() {
            watcher.abort();
        }
        if let Some(timer) = self.inner.settle_timer.lock().take() {
            timer.abort();
        }
        info!("Sync orchestrator stopped");
    }

    /// Snapshot of connectivity, queue sizes, and the last pass.
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let pending = self.inner.queue.count_pending().await?;
        let rejected = self.inner.queue.count_rejected().await?;
        let last_drain = *self.inner.last_drain.lock();

        Ok(SyncStatus {
            connectivity: self.connectivity(),
            pending,
            rejected,
            draining: self.is_draining(),
            last_drain_at: last_drain.map(|(at, _)| at),
            last_report: last_drain.map(|(_, report)| report),
        })
    }
}
