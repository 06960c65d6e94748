//! Newline-delimited JSON frames over the daemon's Unix socket.

use crate::{
    Frame, InteractiveLink, LinkError, LinkResult, Notification, SyncReply, SyncRequest,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Write one frame followed by a newline and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> LinkResult<()>
where
    W: AsyncWrite + Unpin,
{
    let json = frame.to_json()?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next frame. `None` on a clean end of stream; blank lines are
/// skipped.
pub async fn read_frame<R>(reader: &mut R) -> LinkResult<Option<Frame>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Ok(None);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return Ok(Some(Frame::from_json(trimmed)?));
    }
}

/// One open connection to the daemon.
pub struct DaemonConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl DaemonConnection {
    pub async fn connect(socket_path: &Path) -> LinkResult<Self> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            debug!(path = %socket_path.display(), error = %e, "Daemon socket not reachable");
            LinkError::NoContext
        })?;
        let (reader, writer) = stream.into_split();

        debug!(path = %socket_path.display(), "Connected to daemon");
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    pub async fn send(&mut self, frame: &Frame) -> LinkResult<()> {
        write_frame(&mut self.writer, frame).await
    }

    /// Read the next frame; a closed socket is an error here.
    pub async fn recv(&mut self) -> LinkResult<Frame> {
        read_frame(&mut self.reader)
            .await?
            .ok_or(LinkError::ConnectionClosed)
    }

    /// Send a command frame and wait for its single reply.
    pub async fn call(&mut self, frame: &Frame) -> LinkResult<Frame> {
        self.send(frame).await?;
        self.recv().await
    }
}

/// Delegate-side [`InteractiveLink`] over the daemon socket.
///
/// Connects on first use and reconnects after a failure, so a daemon that
/// starts mid-pass is picked up by the next request.
pub struct SocketLink {
    socket_path: PathBuf,
    conn: Mutex<Option<DaemonConnection>>,
}

impl SocketLink {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            conn: Mutex::new(None),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Take the cached connection out of the slot, connecting if empty.
    ///
    /// Callers put it back only after a clean exchange. A call cancelled
    /// mid-flight drops the connection with it, so a late reply is never
    /// read as the answer to the next request.
    async fn take_or_connect(
        &self,
        slot: &mut Option<DaemonConnection>,
    ) -> LinkResult<DaemonConnection> {
        match slot.take() {
            Some(conn) => Ok(conn),
            None => DaemonConnection::connect(&self.socket_path).await,
        }
    }
}

#[async_trait]
impl InteractiveLink for SocketLink {
    async fn broadcast(&self, notification: Notification) -> LinkResult<()> {
        let mut guard = self.conn.lock().await;
        let mut conn = self.take_or_connect(&mut guard).await?;

        conn.send(&Frame::from(notification)).await?;
        *guard = Some(conn);
        Ok(())
    }

    async fn request(&self, request: SyncRequest) -> LinkResult<SyncReply> {
        let mut guard = self.conn.lock().await;
        let mut conn = self.take_or_connect(&mut guard).await?;

        let request_id = request.request_id;
        let reply = match conn.call(&Frame::from(request)).await? {
            Frame::SyncReply {
                request_id: reply_id,
                success,
            } if reply_id == request_id => SyncReply {
                request_id,
                success,
            },
            Frame::Error { message } => return Err(LinkError::Protocol(message)),
            other => {
                warn!(request_id = %request_id, "Dropping daemon connection after unexpected reply");
                return Err(LinkError::Protocol(format!(
                    "unexpected reply to SYNC_RECORD: {other:?}"
                )));
            }
        };

        *guard = Some(conn);
        Ok(reply)
    }
}
