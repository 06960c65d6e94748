//! One background delegate pass, as run by the platform wake job.

use crate::wake::{self, FileWakeRegistrar};
use attendance_config::{Config, Paths};
use attendance_delegate::{BackgroundSyncDelegate, DelegateConfig, PassReport};
use attendance_protocol::{InteractiveLink, SocketLink};
use attendance_queue::PendingQueue;
use attendance_sync::{WakeRegistrar, SYNC_TAG};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn background_sync(config: &Config, paths: &Paths, force: bool) -> anyhow::Result<()> {
    if !force && !wake::is_registered(paths, SYNC_TAG) {
        info!("No wake registration pending, nothing to do");
        return Ok(());
    }

    let queue = PendingQueue::open(&paths.queue_file()).await?;
    let link = Arc::new(SocketLink::new(paths.socket_file()));
    let delegate_config = DelegateConfig {
        reply_timeout: config.delegate_reply_timeout(),
    };

    let report = run_woken_pass(paths, queue, link, delegate_config).await?;
    println!(
        "{} pending, {} delivered, {} failed",
        report.total, report.succeeded, report.failed
    );
    Ok(())
}

/// Consume the wake marker, run one pass, and register again while
/// anything is still pending.
///
/// The marker is removed before the snapshot is read, so a mark queued
/// offline during the pass writes a fresh one that survives.
async fn run_woken_pass(
    paths: &Paths,
    queue: PendingQueue,
    link: Arc<dyn InteractiveLink>,
    config: DelegateConfig,
) -> anyhow::Result<PassReport> {
    wake::clear(paths, SYNC_TAG)?;

    let delegate = BackgroundSyncDelegate::with_config(queue.clone(), link, config);
    let result = delegate.run_pass().await;

    let left = match &result {
        Ok(_) => queue.count_pending().await.unwrap_or(1),
        Err(_) => 1,
    };
    if left > 0 {
        if let Err(e) = FileWakeRegistrar::new(paths.clone()).register(SYNC_TAG).await {
            warn!(error = %e, "Could not restore wake registration");
        }
    }

    Ok(result?)
}
