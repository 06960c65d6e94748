//! The background sync delegate.

use crate::{DelegateResult, PassReport};
use attendance_protocol::{InteractiveLink, LinkError, Notification, SyncRequest};
use attendance_queue::PendingQueue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delegate configuration.
#[derive(Debug, Clone)]
pub struct DelegateConfig {
    /// How long to wait for each context reply.
    pub reply_timeout: Duration,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(10),
        }
    }
}

/// Drains the queue when the platform wakes it, by asking a live
/// interactive context to commit each event.
///
/// The delegate holds no credentials and never calls the remote store
/// itself. An event leaves the queue only after a context replies that it
/// committed it; a failed, missing, or late reply leaves it pending.
pub struct BackgroundSyncDelegate {
    queue: PendingQueue,
    link: Arc<dyn InteractiveLink>,
    config: DelegateConfig,
}

impl BackgroundSyncDelegate {
    pub fn new(queue: PendingQueue, link: Arc<dyn InteractiveLink>) -> Self {
        Self::with_config(queue, link, DelegateConfig::default())
    }

    pub fn with_config(
        queue: PendingQueue,
        link: Arc<dyn InteractiveLink>,
        config: DelegateConfig,
    ) -> Self {
        Self {
            queue,
            link,
            config,
        }
    }

    /// Run one pass over a snapshot of the pending events.
    ///
    /// Fails only when the queue cannot be read.
    pub async fn run_pass(&self) -> DelegateResult<PassReport> {
        let snapshot = self.queue.list_pending().await.map_err(|e| {
            error!(error = %e, "Background sync could not read the queue");
            e
        })?;

        if snapshot.is_empty() {
            debug!("Background sync found nothing pending");
            return Ok(PassReport::default());
        }

        let total = snapshot.len();
        info!(count = total, "Background sync started");
        self.notify(Notification::SyncStart { count: total }).await;

        let mut report = PassReport {
            total,
            ..Default::default()
        };

        for event in snapshot {
            let id = event.id;
            match self.request(SyncRequest::new(event)).await {
                Ok(true) => {
                    report.succeeded += 1;
                    if let Err(e) = self.queue.delete(id).await {
                        error!(
                            event_id = id,
                            error = %e,
                            "Committed event could not be deleted; it will be redelivered"
                        );
                    }
                }
                Ok(false) => {
                    report.failed += 1;
                    debug!(event_id = id, "Context could not commit event");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(event_id = id, error = %e, "No usable reply for event");
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Background sync complete"
        );
        self.notify(Notification::SyncComplete {
            succeeded: report.succeeded,
            failed: report.failed,
        })
        .await;

        Ok(report)
    }

    async fn request(&self, request: SyncRequest) -> Result<bool, LinkError> {
        let timeout = self.config.reply_timeout;
        match tokio::time::timeout(timeout, self.link.request(request)).await {
            Ok(reply) => Ok(reply?.success),
            Err(_) => Err(LinkError::Timeout(timeout)),
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.link.broadcast(notification).await {
            debug!(error = %e, "Progress notice not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use attendance_protocol::{ContextBus, Inbound, LinkResult, SyncReply};
    use attendance_queue::AttendanceMark;
    use chrono::Utc;
    use parking_lot::Mutex;

    /// Link that answers from a script keyed by member id.
    #[derive(Default)]
    struct ScriptedLink {
        refuse: Vec<String>,
        notices: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl InteractiveLink for ScriptedLink {
        async fn broadcast(&self, notification: Notification) -> LinkResult<()> {
            self.notices.lock().push(notification);
            Ok(())
        }

        async fn request(&self, request: SyncRequest) -> LinkResult<SyncReply> {
            let success = !self.refuse.contains(&request.event.mark.member_id);
            Ok(SyncReply {
                request_id: request.request_id,
                success,
            })
        }
    }

    fn mark(member: &str) -> AttendanceMark {
        AttendanceMark::new("S1", member, member, None, Utc::now())
    }

    #[tokio::test]
    async fn empty_queue_sends_nothing() {
        let queue = PendingQueue::open_in_memory().await.unwrap();
        let link = Arc::new(ScriptedLink::default());
        let delegate = BackgroundSyncDelegate::new(queue, link.clone());

        let report = delegate.run_pass().await.unwrap();

        assert_eq!(report, PassReport::default());
        assert!(link.notices.lock().is_empty());
    }

    #[tokio::test]
    async fn only_acknowledged_events_are_deleted() {
        let queue = PendingQueue::open_in_memory().await.unwrap();
        queue.append(mark("M1")).await.unwrap();
        let kept = queue.append(mark("M2")).await.unwrap();
        queue.append(mark("M3")).await.unwrap();

        let link = Arc::new(ScriptedLink {
            refuse: vec!["M2".to_string()],
            ..Default::default()
        });
        let delegate = BackgroundSyncDelegate::new(queue.clone(), link.clone());

        let report = delegate.run_pass().await.unwrap();

        assert_eq!(
            report,
            PassReport {
                total: 3,
                succeeded: 2,
                failed: 1
            }
        );
        let pending = queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, kept);
        assert_eq!(
            *link.notices.lock(),
            vec![
                Notification::SyncStart { count: 3 },
                Notification::SyncComplete {
                    succeeded: 2,
                    failed: 1
                }
            ]
        );
    }

    #[tokio::test]
    async fn no_context_leaves_everything_pending() {
        let queue = PendingQueue::open_in_memory().await.unwrap();
        queue.append(mark("M1")).await.unwrap();
        queue.append(mark("M2")).await.unwrap();

        let delegate = BackgroundSyncDelegate::new(queue.clone(), Arc::new(ContextBus::new()));
        let report = delegate.run_pass().await.unwrap();

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(queue.count_pending().await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_context_times_out_and_event_stays() {
        let queue = PendingQueue::open_in_memory().await.unwrap();
        let id = queue.append(mark("M1")).await.unwrap();

        let bus = ContextBus::new();
        let mut endpoint = bus.attach();
        // Hold requests without ever replying.
        let held = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(inbound) = endpoint.next().await {
                if let Inbound::Request(pending) = inbound {
                    held.push(pending);
                }
            }
            held
        });

        let delegate = BackgroundSyncDelegate::new(queue.clone(), Arc::new(bus.clone()));
        let started = tokio::time::Instant::now();
        let report = delegate.run_pass().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(report.failed, 1);
        assert!(queue.get(id).await.unwrap().is_some());

        drop(delegate);
        drop(bus);
        held.abort();
    }
}
