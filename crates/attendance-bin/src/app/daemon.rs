//! The interactive sync daemon.

use super::build_orchestrator;
use attendance_config::{Config, Paths};
use attendance_protocol::ConnectivityState;
use attendance_queue::PendingQueue;
use attendance_sync::{SyncEvent, SyncSocketServer};
use std::sync::Arc;
use tracing::{info, warn};

/// Run the daemon until SIGINT or SIGTERM.
pub async fn run_daemon(
    config: Config,
    paths: Paths,
    initial_state: ConnectivityState,
) -> anyhow::Result<()> {
    info!(
        base_dir = %paths.base_dir().display(),
        remote_url = %config.remote_url,
        "Starting attendance sync daemon"
    );

    let queue = PendingQueue::open(&paths.queue_file()).await?;
    let orchestrator =
        build_orchestrator(&config, &paths, queue, ConnectivityState::Offline)?;

    orchestrator.subscribe(|event| match event {
        SyncEvent::SyncError { error } => warn!(error = %error, "Sync error"),
        SyncEvent::Rejected { event, reason } => warn!(
            event_id = event.id,
            session_id = %event.mark.session_id,
            reason = %reason,
            "Attendance dead-lettered"
        ),
        _ => {}
    });

    let server = Arc::new(SyncSocketServer::new(
        paths.socket_file(),
        orchestrator.clone(),
    ));
    let listener = server.bind()?;
    let serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await })
    };

    // Starting online drains whatever an earlier run left behind.
    orchestrator.handle_reachability(initial_state);

    let pending = orchestrator.queue().count_pending().await?;
    info!(
        pending,
        state = %initial_state,
        socket = %paths.socket_file().display(),
        "Daemon ready"
    );

    wait_for_shutdown().await?;

    info!("Shutting down");
    orchestrator.stop();
    server.shutdown();
    serving.await??;
    orchestrator.queue().clone().close().await?;
    info!("Daemon stopped");
    Ok(())
}

async fn wait_for_shutdown() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
