//! Queue schema migrations.
//!
//! Migrations run in order and are tracked in the `migrations` table.

use crate::QueueResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> QueueResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    if current_version >= CURRENT_VERSION {
        debug!(current_version, "Queue schema up to date");
        return Ok(());
    }

    info!(current_version, target_version = CURRENT_VERSION, "Running queue migrations");

    if current_version < 1 {
        migrate_v1_pending_attendance(conn)?;
    }
    if current_version < 2 {
        migrate_v2_rejected_attendance(conn)?;
    }

    info!("Queue migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> QueueResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: pending attendance log.
///
/// AUTOINCREMENT keeps ids monotonic even after the newest row is deleted.
fn migrate_v1_pending_attendance(conn: &Connection) -> QueueResult<()> {
    info!("Applying migration v1: pending attendance");

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pending_attendance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_key TEXT NOT NULL,
            session_id TEXT NOT NULL,
            member_id TEXT NOT NULL,
            member_name TEXT NOT NULL,
            member_department TEXT,
            marked_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'synced')),
            synced_at TEXT,
            queued_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_pending_attendance_status
            ON pending_attendance(status, id);
        CREATE INDEX IF NOT EXISTS idx_pending_attendance_event_key
            ON pending_attendance(event_key);
        ",
    )?;
    record_migration(&tx, 1, "pending_attendance")?;
    tx.commit()?;
    Ok(())
}

/// V2: dead letters for permanently rejected writes.
fn migrate_v2_rejected_attendance(conn: &Connection) -> QueueResult<()> {
    info!("Applying migration v2: rejected attendance");

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS rejected_attendance (
            id INTEGER PRIMARY KEY,
            event_key TEXT NOT NULL,
            session_id TEXT NOT NULL,
            member_id TEXT NOT NULL,
            member_name TEXT NOT NULL,
            member_department TEXT,
            marked_at TEXT NOT NULL,
            queued_at TEXT NOT NULL,
            reason TEXT NOT NULL,
            rejected_at TEXT NOT NULL
        );
        ",
    )?;
    record_migration(&tx, 2, "rejected_attendance")?;
    tx.commit()?;
    Ok(())
}
