//! Background delegate passes answered by a live orchestrator.

mod common;

use attendance_delegate::{BackgroundSyncDelegate, PassReport};
use attendance_protocol::{ConnectivityState, ContextBus, SocketLink};
use attendance_queue::PendingQueue;
use attendance_remote::RemoteError;
use attendance_sync::{SyncEvent, SyncOrchestrator, SyncSocketServer};
use common::{mark, record_events, FakeRemote};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn delegate_drains_through_in_process_context() {
    let queue = PendingQueue::open_in_memory().await.unwrap();
    let remote = Arc::new(FakeRemote::default());
    remote.fail("M2", RemoteError::Transient("timeout".into()));
    queue.append(mark("M1")).await.unwrap();
    let kept = queue.append(mark("M2")).await.unwrap();

    let orchestrator = SyncOrchestrator::builder(queue.clone(), remote.clone())
        .initial_state(ConnectivityState::Online)
        .build();
    let seen = record_events(&orchestrator);

    let bus = ContextBus::new();
    let responder = orchestrator.serve(bus.attach());

    let delegate = BackgroundSyncDelegate::new(queue.clone(), Arc::new(bus.clone()));
    let report = delegate.run_pass().await.unwrap();

    assert_eq!(
        report,
        PassReport {
            total: 2,
            succeeded: 1,
            failed: 1
        }
    );
    let pending = queue.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, kept);
    assert_eq!(remote.committed_members(), vec!["M1"]);

    drop(delegate);
    drop(bus);
    tokio::time::timeout(Duration::from_secs(5), responder)
        .await
        .unwrap()
        .unwrap();

    let seen = seen.lock().clone();
    assert_eq!(seen.first(), Some(&SyncEvent::SyncStart { count: 2 }));
    assert_eq!(
        seen.last(),
        Some(&SyncEvent::SyncComplete {
            succeeded: 1,
            failed: 1
        })
    );
}

#[tokio::test]
async fn offline_context_declines_and_nothing_is_deleted() {
    let queue = PendingQueue::open_in_memory().await.unwrap();
    queue.append(mark("M1")).await.unwrap();
    let remote = Arc::new(FakeRemote::default());

    let orchestrator = SyncOrchestrator::builder(queue.clone(), remote.clone()).build();
    let bus = ContextBus::new();
    let _responder = orchestrator.serve(bus.attach());

    let delegate = BackgroundSyncDelegate::new(queue.clone(), Arc::new(bus));
    let report = delegate.run_pass().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(queue.count_pending().await.unwrap(), 1);
    assert!(remote.committed_members().is_empty());
}

#[tokio::test]
async fn delegate_rejection_moves_event_to_dead_letters() {
    let queue = PendingQueue::open_in_memory().await.unwrap();
    queue.append(mark("M1")).await.unwrap();
    let remote = Arc::new(FakeRemote::default());
    remote.fail("M1", RemoteError::Rejected("unknown member".into()));

    let orchestrator = SyncOrchestrator::builder(queue.clone(), remote)
        .initial_state(ConnectivityState::Online)
        .build();
    let bus = ContextBus::new();
    let _responder = orchestrator.serve(bus.attach());

    let report = BackgroundSyncDelegate::new(queue.clone(), Arc::new(bus))
        .run_pass()
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(queue.count_pending().await.unwrap(), 0);
    assert_eq!(queue.count_rejected().await.unwrap(), 1);
}

#[tokio::test]
async fn delegate_drains_through_daemon_socket() {
    let dir = tempdir().unwrap();
    let queue_path = dir.path().join("queue.sqlite");
    let socket_path = dir.path().join("syncd.sock");

    // Daemon side.
    let daemon_queue = PendingQueue::open(&queue_path).await.unwrap();
    let remote = Arc::new(FakeRemote::default());
    let orchestrator = SyncOrchestrator::builder(daemon_queue, remote.clone())
        .initial_state(ConnectivityState::Online)
        .build();
    let seen = record_events(&orchestrator);
    let server = SyncSocketServer::new(&socket_path, orchestrator);
    let listener = server.bind().unwrap();
    let shutdown = server.shutdown_sender();
    let server_task = tokio::spawn(async move { server.serve(listener).await });

    // Delegate side, its own handle on the same file.
    let delegate_queue = PendingQueue::open(&queue_path).await.unwrap();
    delegate_queue.append(mark("M1")).await.unwrap();
    delegate_queue.append(mark("M2")).await.unwrap();

    let delegate =
        BackgroundSyncDelegate::new(delegate_queue.clone(), Arc::new(SocketLink::new(&socket_path)));
    let report = delegate.run_pass().await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(delegate_queue.count_pending().await.unwrap(), 0);
    assert_eq!(remote.committed_members(), vec!["M1", "M2"]);

    // SYNC_COMPLETE has no reply; give the server a moment to relay it.
    drop(delegate);
    tokio::time::timeout(Duration::from_secs(5), async {
        while !seen
            .lock()
            .iter()
            .any(|e| matches!(e, SyncEvent::SyncComplete { .. }))
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown.send(()).unwrap();
    server_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn delegate_without_daemon_leaves_queue_intact() {
    let dir = tempdir().unwrap();
    let queue = PendingQueue::open(&dir.path().join("queue.sqlite"))
        .await
        .unwrap();
    queue.append(mark("M1")).await.unwrap();

    let link = Arc::new(SocketLink::new(dir.path().join("syncd.sock")));
    let report = BackgroundSyncDelegate::new(queue.clone(), link)
        .run_pass()
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(queue.count_pending().await.unwrap(), 1);
}
