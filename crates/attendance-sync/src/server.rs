//! Unix socket server that puts the orchestrator behind the daemon socket.
//!
//! Each connection carries newline-delimited JSON [`Frame`]s. A connection
//! may be the background delegate running a pass, a platform hook
//! reporting reachability, or an operator asking for a drain:
//!
//! | inbound           | reply                                  |
//! |-------------------|----------------------------------------|
//! | `SYNC_START`      | none, relayed to observers             |
//! | `SYNC_RECORD`     | `SYNC_REPLY` with the same request id  |
//! | `SYNC_COMPLETE`   | none, relayed to observers             |
//! | `REACHABILITY`    | `ACK`                                  |
//! | `TRIGGER_SYNC`    | `SYNC_COMPLETE`, `SYNC_SKIPPED`, or `ERROR` |
//! | anything else     | `ERROR`                                |

use crate::{DrainOutcome, SyncOrchestrator};
use attendance_protocol::{read_frame, write_frame, Frame, LinkError, LinkResult, Notification};
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

pub struct SyncSocketServer {
    socket_path: PathBuf,
    orchestrator: SyncOrchestrator,
    shutdown_tx: broadcast::Sender<()>,
}

impl SyncSocketServer {
    pub fn new(socket_path: impl Into<PathBuf>, orchestrator: SyncOrchestrator) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            socket_path: socket_path.into(),
            orchestrator,
            shutdown_tx,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sender that stops [`run`](Self::run) when signalled.
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the socket, replacing a stale socket file.
    pub fn bind(&self) -> LinkResult<UnixListener> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "Sync socket listening");
        Ok(listener)
    }

    /// Bind and accept connections until shutdown.
    pub async fn run(&self) -> LinkResult<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until shutdown.
    /// The socket file is removed on the way out.
    pub async fn serve(&self, listener: UnixListener) -> LinkResult<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let orchestrator = self.orchestrator.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, orchestrator).await {
                                warn!(error = %e, "Sync socket connection error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Accept error");
                    }
                },
                _ = shutdown_rx.recv() => {
                    info!("Sync socket shutting down");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn handle_connection(stream: UnixStream, orchestrator: SyncOrchestrator) -> LinkResult<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    debug!("Client connected");

    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Client disconnected");
                return Ok(());
            }
            Err(LinkError::Json(e)) => {
                warn!(error = %e, "Failed to parse frame");
                write_frame(&mut writer, &Frame::error(format!("Parse error: {e}"))).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Some(reply) = dispatch(&orchestrator, frame).await {
            write_frame(&mut writer, &reply).await?;
        }
    }
}

/// Act on one inbound frame and produce its reply, if it has one.
async fn dispatch(orchestrator: &SyncOrchestrator, frame: Frame) -> Option<Frame> {
    match frame {
        Frame::SyncStart { count } => {
            orchestrator.relay_notification(Notification::SyncStart { count });
            None
        }
        Frame::SyncComplete { succeeded, failed } => {
            orchestrator.relay_notification(Notification::SyncComplete { succeeded, failed });
            None
        }
        Frame::SyncRecord { request_id, event } => {
            let success = orchestrator.handle_delegated_record(&event).await;
            Some(Frame::SyncReply {
                request_id,
                success,
            })
        }
        Frame::Reachability { state } => {
            orchestrator.handle_reachability(state);
            Some(Frame::Ack)
        }
        Frame::TriggerSync => Some(match orchestrator.sync_now().await {
            Ok(DrainOutcome::Completed(report)) => Frame::SyncComplete {
                succeeded: report.succeeded,
                failed: report.failed,
            },
            Ok(DrainOutcome::Coalesced) => Frame::SyncSkipped {
                reason: "drain already running".to_string(),
            },
            Ok(DrainOutcome::Empty) => Frame::SyncSkipped {
                reason: "nothing pending".to_string(),
            },
            Err(e) => Frame::error(e.to_string()),
        }),
        other => {
            warn!(frame = ?other, "Unexpected frame on sync socket");
            Some(Frame::error("unexpected frame"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use attendance_protocol::{ConnectivityState, DaemonConnection, SyncRequest};
    use attendance_queue::{AttendanceMark, PendingQueue};
    use attendance_remote::{RemoteResult, RemoteWriteAdapter};
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct AcceptAll;

    #[async_trait]
    impl RemoteWriteAdapter for AcceptAll {
        async fn commit(&self, _mark: &AttendanceMark) -> RemoteResult<()> {
            Ok(())
        }
    }

    async fn start_server(
        state: ConnectivityState,
    ) -> (tempfile::TempDir, PathBuf, SyncOrchestrator, SyncSocketServer) {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("syncd.sock");
        let queue = PendingQueue::open_in_memory().await.unwrap();
        let orchestrator = SyncOrchestrator::builder(queue, Arc::new(AcceptAll))
            .initial_state(state)
            .build();
        let server = SyncSocketServer::new(&socket, orchestrator.clone());
        (dir, socket, orchestrator, server)
    }

    fn mark(member: &str) -> AttendanceMark {
        AttendanceMark::new("S1", member, member, None, Utc::now())
    }

    #[tokio::test]
    async fn trigger_sync_reports_outcome() {
        let (_dir, socket, orchestrator, server) = start_server(ConnectivityState::Online).await;
        let listener = server.bind().unwrap();
        let shutdown = server.shutdown_sender();
        let task = tokio::spawn(async move { server.serve(listener).await });

        let mut conn = DaemonConnection::connect(&socket).await.unwrap();
        assert_eq!(
            conn.call(&Frame::TriggerSync).await.unwrap(),
            Frame::SyncSkipped {
                reason: "nothing pending".to_string()
            }
        );

        orchestrator.queue().append(mark("M1")).await.unwrap();
        assert_eq!(
            conn.call(&Frame::TriggerSync).await.unwrap(),
            Frame::SyncComplete {
                succeeded: 1,
                failed: 0
            }
        );

        shutdown.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn reachability_is_acknowledged() {
        let (_dir, socket, orchestrator, server) = start_server(ConnectivityState::Offline).await;
        let listener = server.bind().unwrap();
        tokio::spawn(async move { server.serve(listener).await });

        let mut conn = DaemonConnection::connect(&socket).await.unwrap();
        let reply = conn
            .call(&Frame::Reachability {
                state: ConnectivityState::Online,
            })
            .await
            .unwrap();

        assert_eq!(reply, Frame::Ack);
        assert!(orchestrator.is_online());
    }

    #[tokio::test]
    async fn sync_record_reply_echoes_request_id() {
        let (_dir, socket, orchestrator, server) = start_server(ConnectivityState::Online).await;
        let listener = server.bind().unwrap();
        tokio::spawn(async move { server.serve(listener).await });

        let event = orchestrator.queue().append_event(mark("M1")).await.unwrap();
        let request = SyncRequest::new(event);

        let mut conn = DaemonConnection::connect(&socket).await.unwrap();
        let reply = conn.call(&Frame::from(request.clone())).await.unwrap();

        assert_eq!(
            reply,
            Frame::SyncReply {
                request_id: request.request_id,
                success: true
            }
        );
    }

    #[tokio::test]
    async fn unexpected_frame_gets_error_and_connection_survives() {
        let (_dir, socket, _orchestrator, server) = start_server(ConnectivityState::Online).await;
        let listener = server.bind().unwrap();
        tokio::spawn(async move { server.serve(listener).await });

        let mut conn = DaemonConnection::connect(&socket).await.unwrap();
        let reply = conn.call(&Frame::Ack).await.unwrap();
        assert!(matches!(reply, Frame::Error { .. }));

        let reply = conn.call(&Frame::TriggerSync).await.unwrap();
        assert!(matches!(reply, Frame::SyncSkipped { .. }));
    }

    #[tokio::test]
    async fn bind_replaces_stale_socket_file() {
        let (_dir, socket, _orchestrator, server) = start_server(ConnectivityState::Online).await;
        std::fs::write(&socket, b"stale").unwrap();

        let _listener = server.bind().unwrap();
        assert!(socket.exists());
    }
}
