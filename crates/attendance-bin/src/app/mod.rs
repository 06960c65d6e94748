//! Application wiring for each command.

mod background;
mod commands;
mod daemon;

pub use background::background_sync;
pub use commands::{list, mark, notify, purge, status, sync};
pub use daemon::run_daemon;

use crate::wake::FileWakeRegistrar;
use attendance_config::{Config, Paths};
use attendance_protocol::ConnectivityState;
use attendance_queue::PendingQueue;
use attendance_remote::SupabaseAttendanceClient;
use attendance_sync::{OrchestratorConfig, SyncOrchestrator};
use std::sync::Arc;
use tracing::warn;

/// Build an orchestrator over the configured remote store.
fn build_orchestrator(
    config: &Config,
    paths: &Paths,
    queue: PendingQueue,
    initial_state: ConnectivityState,
) -> anyhow::Result<SyncOrchestrator> {
    let remote_url = config.remote_url()?;
    let client = SupabaseAttendanceClient::new(
        remote_url.as_str(),
        config.remote_api_key.as_str(),
        config.request_timeout(),
    )?;
    client.set_access_token(config.access_token.clone());
    if !client.has_access_token() {
        warn!("No access token configured; remote writes will fail and marks will queue");
    }

    Ok(SyncOrchestrator::builder(queue, Arc::new(client))
        .wake_registrar(Arc::new(FileWakeRegistrar::new(paths.clone())))
        .config(OrchestratorConfig {
            settle_delay: config.settle_delay(),
            ..Default::default()
        })
        .initial_state(initial_state)
        .build())
}
