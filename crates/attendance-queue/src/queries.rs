//! Standalone query functions over a queue connection.
//!
//! Each function takes a `&Connection` and completes its effect atomically:
//! a single statement, or one transaction for the reject move.

use crate::{AttendanceMark, EventStatus, PendingEvent, QueueError, QueueResult, RejectedEvent};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

const PENDING_COLUMNS: &str = "id, event_key, session_id, member_id, member_name, member_department, marked_at, status, synced_at, queued_at";

const REJECTED_COLUMNS: &str = "id, event_key, session_id, member_id, member_name, member_department, marked_at, queued_at, reason, rejected_at";

// ==========================================
// Pending events
// ==========================================

/// Insert a new pending event and return its sequence id.
pub fn insert_pending(
    conn: &Connection,
    mark: &AttendanceMark,
    queued_at: DateTime<Utc>,
) -> QueueResult<i64> {
    conn.execute(
        "INSERT INTO pending_attendance
            (event_key, session_id, member_id, member_name, member_department, marked_at, status, queued_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
        params![
            mark.event_key.to_string(),
            mark.session_id,
            mark.member_id,
            mark.member_name,
            mark.member_department,
            mark.marked_at.to_rfc3339(),
            queued_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All pending events, oldest first.
pub fn list_pending(conn: &Connection) -> QueueResult<Vec<PendingEvent>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {PENDING_COLUMNS} FROM pending_attendance
         WHERE status = 'pending'
         ORDER BY id ASC"
    ))?;

    let events = stmt
        .query_map([], row_to_pending)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

/// One event by id, whatever its status.
pub fn get_event(conn: &Connection, id: i64) -> QueueResult<Option<PendingEvent>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {PENDING_COLUMNS} FROM pending_attendance WHERE id = ?1"
    ))?;
    let event = stmt.query_row(params![id], row_to_pending).optional()?;
    Ok(event)
}

/// Move an event to `synced`. A second call is a no-op.
pub fn mark_synced(conn: &Connection, id: i64, synced_at: DateTime<Utc>) -> QueueResult<()> {
    let updated = conn.execute(
        "UPDATE pending_attendance
         SET status = 'synced', synced_at = ?2
         WHERE id = ?1 AND status = 'pending'",
        params![id, synced_at.to_rfc3339()],
    )?;

    if updated == 0 && !event_exists(conn, id)? {
        return Err(QueueError::NotFound(id));
    }
    Ok(())
}

/// Delete an event. Returns whether a row was removed.
pub fn delete_event(conn: &Connection, id: i64) -> QueueResult<bool> {
    let deleted = conn.execute("DELETE FROM pending_attendance WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

/// Number of pending events, answered from the status index.
pub fn count_pending(conn: &Connection) -> QueueResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pending_attendance WHERE status = 'pending'",
        [],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Remove every synced event.
pub fn clear_synced(conn: &Connection) -> QueueResult<usize> {
    let count = conn.execute("DELETE FROM pending_attendance WHERE status = 'synced'", [])?;
    debug!(count, "Cleared synced events");
    Ok(count)
}

/// Remove every queued event regardless of status.
pub fn clear_all(conn: &Connection) -> QueueResult<usize> {
    let count = conn.execute("DELETE FROM pending_attendance", [])?;
    debug!(count, "Cleared all queued events");
    Ok(count)
}

fn event_exists(conn: &Connection, id: i64) -> QueueResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pending_attendance WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

// ==========================================
// Rejected events
// ==========================================

/// Move a pending event into the dead-letter table in one transaction.
pub fn reject_event(
    conn: &Connection,
    id: i64,
    reason: &str,
    rejected_at: DateTime<Utc>,
) -> QueueResult<()> {
    let tx = conn.unchecked_transaction()?;

    let copied = tx.execute(
        "INSERT OR REPLACE INTO rejected_attendance
            (id, event_key, session_id, member_id, member_name, member_department, marked_at, queued_at, reason, rejected_at)
         SELECT id, event_key, session_id, member_id, member_name, member_department, marked_at, queued_at, ?2, ?3
         FROM pending_attendance
         WHERE id = ?1 AND status = 'pending'",
        params![id, reason, rejected_at.to_rfc3339()],
    )?;

    if copied == 0 {
        return Err(QueueError::NotFound(id));
    }

    tx.execute("DELETE FROM pending_attendance WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(())
}

/// All rejected events, oldest first.
pub fn list_rejected(conn: &Connection) -> QueueResult<Vec<RejectedEvent>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {REJECTED_COLUMNS} FROM rejected_attendance ORDER BY id ASC"
    ))?;

    let events = stmt
        .query_map([], row_to_rejected)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

pub fn count_rejected(conn: &Connection) -> QueueResult<usize> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM rejected_attendance", [], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn clear_rejected(conn: &Connection) -> QueueResult<usize> {
    let count = conn.execute("DELETE FROM rejected_attendance", [])?;
    debug!(count, "Cleared rejected events");
    Ok(count)
}

// ==========================================
// Row mapping
// ==========================================

fn row_to_mark(row: &Row<'_>) -> rusqlite::Result<AttendanceMark> {
    Ok(AttendanceMark {
        event_key: parse_uuid(1, row.get(1)?)?,
        session_id: row.get(2)?,
        member_id: row.get(3)?,
        member_name: row.get(4)?,
        member_department: row.get(5)?,
        marked_at: parse_datetime(6, row.get(6)?)?,
    })
}

fn row_to_pending(row: &Row<'_>) -> rusqlite::Result<PendingEvent> {
    let status: String = row.get(7)?;
    let status = EventStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            Type::Text,
            format!("unknown status '{status}'").into(),
        )
    })?;

    Ok(PendingEvent {
        id: row.get(0)?,
        mark: row_to_mark(row)?,
        status,
        synced_at: row
            .get::<_, Option<String>>(8)?
            .map(|s| parse_datetime(8, s))
            .transpose()?,
        queued_at: parse_datetime(9, row.get(9)?)?,
    })
}

fn row_to_rejected(row: &Row<'_>) -> rusqlite::Result<RejectedEvent> {
    Ok(RejectedEvent {
        id: row.get(0)?,
        mark: row_to_mark(row)?,
        queued_at: parse_datetime(7, row.get(7)?)?,
        reason: row.get(8)?,
        rejected_at: parse_datetime(9, row.get(9)?)?,
    })
}

fn parse_datetime(column: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn parse_uuid(column: usize, s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
