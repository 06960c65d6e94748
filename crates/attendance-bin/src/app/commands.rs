//! Operator commands.

use super::build_orchestrator;
use attendance_config::{Config, Paths};
use attendance_protocol::{ConnectivityState, DaemonConnection, Frame, LinkError};
use attendance_queue::{AttendanceMark, PendingQueue};
use attendance_sync::{DrainOutcome, RecordOutcome};
use chrono::Utc;

pub async fn mark(
    config: &Config,
    paths: &Paths,
    state: ConnectivityState,
    session: String,
    member: String,
    name: String,
    department: Option<String>,
) -> anyhow::Result<()> {
    let queue = PendingQueue::open(&paths.queue_file()).await?;
    let orchestrator = build_orchestrator(config, paths, queue, state)?;

    let mark = AttendanceMark::new(session, member, name, department, Utc::now());
    let event_key = mark.event_key;
    match orchestrator.record_attendance(mark).await? {
        RecordOutcome::Delivered => println!("Delivered {event_key}"),
        RecordOutcome::SavedOffline { id } => println!("Saved offline as #{id} ({event_key})"),
    }
    Ok(())
}

pub async fn status(paths: &Paths) -> anyhow::Result<()> {
    let queue = PendingQueue::open(&paths.queue_file()).await?;
    queue.health_check().await?;
    let pending = queue.count_pending().await?;
    let rejected = queue.count_rejected().await?;

    let daemon = match DaemonConnection::connect(&paths.socket_file()).await {
        Ok(_) => "running",
        Err(_) => "not running",
    };
    let wake = if crate::wake::is_registered(paths, attendance_sync::SYNC_TAG) {
        "pending"
    } else {
        "none"
    };

    println!("Queue:     {}", queue.path());
    println!("Pending:   {pending}");
    println!("Rejected:  {rejected}");
    println!("Daemon:    {daemon}");
    println!("Wake:      {wake}");
    Ok(())
}

pub async fn list(paths: &Paths, rejected: bool) -> anyhow::Result<()> {
    let queue = PendingQueue::open(&paths.queue_file()).await?;
    if rejected {
        for event in queue.list_rejected().await? {
            println!("{}", serde_json::to_string(&event)?);
        }
    } else {
        for event in queue.list_pending().await? {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}

pub async fn sync(config: &Config, paths: &Paths, local: bool) -> anyhow::Result<()> {
    if local {
        let queue = PendingQueue::open(&paths.queue_file()).await?;
        let orchestrator = build_orchestrator(config, paths, queue, ConnectivityState::Online)?;
        match orchestrator.sync_now().await? {
            DrainOutcome::Completed(report) => println!(
                "{} delivered, {} failed ({} rejected)",
                report.succeeded, report.failed, report.rejected
            ),
            DrainOutcome::Coalesced => println!("Skipped: drain already running"),
            DrainOutcome::Empty => println!("Skipped: nothing pending"),
        }
        return Ok(());
    }

    match call_daemon(paths, &Frame::TriggerSync).await? {
        Frame::SyncComplete { succeeded, failed } => {
            println!("{succeeded} delivered, {failed} failed")
        }
        Frame::SyncSkipped { reason } => println!("Skipped: {reason}"),
        Frame::Error { message } => anyhow::bail!("daemon error: {message}"),
        other => anyhow::bail!("unexpected reply: {other:?}"),
    }
    Ok(())
}

pub async fn notify(paths: &Paths, state: ConnectivityState) -> anyhow::Result<()> {
    match call_daemon(paths, &Frame::Reachability { state }).await? {
        Frame::Ack => println!("Daemon told: {state}"),
        Frame::Error { message } => anyhow::bail!("daemon error: {message}"),
        other => anyhow::bail!("unexpected reply: {other:?}"),
    }
    Ok(())
}

pub async fn purge(paths: &Paths, synced: bool, all: bool, rejected: bool) -> anyhow::Result<()> {
    let queue = PendingQueue::open(&paths.queue_file()).await?;
    if synced {
        println!("Purged {} synced events", queue.clear_synced().await?);
    }
    if all {
        println!("Purged {} events", queue.clear_all().await?);
    }
    if rejected {
        println!("Purged {} rejected events", queue.clear_rejected().await?);
    }
    Ok(())
}

async fn call_daemon(paths: &Paths, frame: &Frame) -> anyhow::Result<Frame> {
    let mut conn = match DaemonConnection::connect(&paths.socket_file()).await {
        Ok(conn) => conn,
        Err(LinkError::NoContext) => {
            anyhow::bail!("daemon is not running (start it with `attendance-syncd run`)")
        }
        Err(e) => return Err(e.into()),
    };
    Ok(conn.call(frame).await?)
}
