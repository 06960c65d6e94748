//! Shared fakes for orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use attendance_queue::AttendanceMark;
use attendance_remote::{RemoteError, RemoteResult, RemoteWriteAdapter};
use attendance_sync::{SyncEvent, SyncOrchestrator};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

/// Remote store double: fails for scripted members, optionally blocks
/// every commit until released.
#[derive(Default)]
pub struct FakeRemote {
    failures: Mutex<HashMap<String, RemoteError>>,
    committed: Mutex<Vec<AttendanceMark>>,
    gate: Mutex<Option<Arc<Gate>>>,
}

pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl FakeRemote {
    pub fn fail(&self, member_id: &str, error: RemoteError) {
        self.failures.lock().insert(member_id.to_string(), error);
    }

    pub fn heal(&self, member_id: &str) {
        self.failures.lock().remove(member_id);
    }

    /// Block every commit until `release` is notified.
    pub fn gate(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn committed_members(&self) -> Vec<String> {
        self.committed
            .lock()
            .iter()
            .map(|m| m.member_id.clone())
            .collect()
    }

    pub fn committed_keys(&self) -> Vec<Uuid> {
        self.committed.lock().iter().map(|m| m.event_key).collect()
    }
}

#[async_trait]
impl RemoteWriteAdapter for FakeRemote {
    async fn commit(&self, mark: &AttendanceMark) -> RemoteResult<()> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if let Some(error) = self.failures.lock().get(&mark.member_id).cloned() {
            return Err(error);
        }
        self.committed.lock().push(mark.clone());
        Ok(())
    }
}

pub fn mark(member: &str) -> AttendanceMark {
    AttendanceMark::new("S1", member, format!("Member {member}"), None, Utc::now())
}

/// Record every event an orchestrator emits.
pub fn record_events(orchestrator: &SyncOrchestrator) -> Arc<Mutex<Vec<SyncEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    orchestrator.subscribe(move |event| sink.lock().push(event.clone()));
    seen
}

/// Wait for the next `SyncComplete`, failing the test after five seconds.
pub async fn next_complete(events: &mut broadcast::Receiver<SyncEvent>) -> (usize, usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(SyncEvent::SyncComplete { succeeded, failed }) => return (succeeded, failed),
                Ok(_) => continue,
                Err(e) => panic!("event stream ended: {e}"),
            }
        }
    })
    .await
    .expect("no SyncComplete within 5s")
}
