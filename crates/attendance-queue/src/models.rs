//! Queue model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attendance mark as captured by the writer.
///
/// Member name and department are snapshotted at mark time so the remote
/// write never needs a fresh lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    /// Idempotency key generated once per mark; the remote store ignores
    /// a second insert with the same key.
    pub event_key: Uuid,
    pub session_id: String,
    pub member_id: String,
    pub member_name: String,
    pub member_department: Option<String>,
    pub marked_at: DateTime<Utc>,
}

impl AttendanceMark {
    /// Create a mark with a fresh event key.
    pub fn new(
        session_id: impl Into<String>,
        member_id: impl Into<String>,
        member_name: impl Into<String>,
        member_department: Option<String>,
        marked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_key: Uuid::new_v4(),
            session_id: session_id.into(),
            member_id: member_id.into(),
            member_name: member_name.into(),
            member_department,
            marked_at,
        }
    }
}

/// Delivery status of a queued event. Only ever moves `Pending -> Synced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Pending,
    Synced,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "synced" => Some(Self::Synced),
            _ => None,
        }
    }
}

/// A queued attendance mark awaiting confirmed delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEvent {
    /// Sequence id assigned by the queue; never reused.
    pub id: i64,
    #[serde(flatten)]
    pub mark: AttendanceMark,
    pub status: EventStatus,
    pub synced_at: Option<DateTime<Utc>>,
    pub queued_at: DateTime<Utc>,
}

/// An event the remote store permanently refused, kept for an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEvent {
    /// The id the event had while pending.
    pub id: i64,
    #[serde(flatten)]
    pub mark: AttendanceMark,
    pub reason: String,
    pub queued_at: DateTime<Utc>,
    pub rejected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_status_as_str_and_parse() {
        assert_eq!(EventStatus::Pending.as_str(), "pending");
        assert_eq!(EventStatus::Synced.as_str(), "synced");
        assert_eq!(EventStatus::parse("synced"), Some(EventStatus::Synced));
        assert_eq!(EventStatus::parse("acked"), None);
        assert_eq!(EventStatus::default(), EventStatus::Pending);
    }

    #[test]
    fn new_marks_get_distinct_event_keys() {
        let now = Utc::now();
        let a = AttendanceMark::new("S1", "M1", "Ada", None, now);
        let b = AttendanceMark::new("S1", "M1", "Ada", None, now);
        assert_ne!(a.event_key, b.event_key);
        assert_eq!(a.session_id, b.session_id);
    }

    #[test]
    fn pending_event_serializes_flat() {
        let mark = AttendanceMark::new("S1", "M2", "Grace", Some("Ops".into()), Utc::now());
        let event = PendingEvent {
            id: 7,
            mark,
            status: EventStatus::Pending,
            synced_at: None,
            queued_at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["session_id"], "S1");
        assert_eq!(json["member_department"], "Ops");
        assert_eq!(json["status"], "pending");

        let back: PendingEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
