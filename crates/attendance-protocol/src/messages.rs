//! Message types exchanged between execution contexts.

use attendance_queue::PendingEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reachability as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl From<bool> for ConnectivityState {
    fn from(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget progress notice from the delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    SyncStart { count: usize },
    SyncComplete { succeeded: usize, failed: usize },
}

/// Ask an interactive context to commit one queued event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub request_id: Uuid,
    pub event: PendingEvent,
}

impl SyncRequest {
    pub fn new(event: PendingEvent) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            event,
        }
    }
}

/// Answer to a [`SyncRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReply {
    pub request_id: Uuid,
    pub success: bool,
}

/// One newline-delimited JSON frame on the daemon socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frame {
    SyncStart {
        count: usize,
    },
    SyncRecord {
        request_id: Uuid,
        event: PendingEvent,
    },
    SyncReply {
        request_id: Uuid,
        success: bool,
    },
    SyncComplete {
        succeeded: usize,
        failed: usize,
    },
    /// Platform reachability hook.
    Reachability {
        state: ConnectivityState,
    },
    /// Operator asks for a drain now.
    TriggerSync,
    /// A triggered drain did not run.
    SyncSkipped {
        reason: String,
    },
    Ack,
    Error {
        message: String,
    },
}

impl Frame {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

impl From<Notification> for Frame {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::SyncStart { count } => Self::SyncStart { count },
            Notification::SyncComplete { succeeded, failed } => {
                Self::SyncComplete { succeeded, failed }
            }
        }
    }
}

impl From<SyncRequest> for Frame {
    fn from(request: SyncRequest) -> Self {
        Self::SyncRecord {
            request_id: request.request_id,
            event: request.event,
        }
    }
}

impl From<SyncReply> for Frame {
    fn from(reply: SyncReply) -> Self {
        Self::SyncReply {
            request_id: reply.request_id,
            success: reply.success,
        }
    }
}
