//! Async SQLite executor using a dedicated background thread.
//!
//! All queue statements run on one thread owned by `tokio-rusqlite` and are
//! sent through a channel, so callers await results without blocking the
//! runtime. Statements execute in FIFO order.
//!
//! Only SQL belongs inside [`AsyncDatabase::call`]. Network calls and event
//! fan-out happen outside it.

use crate::{migrations, QueueError, QueueResult};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// Pragmas applied to every queue connection.
///
/// `synchronous = FULL` makes each committed write survive power loss, not
/// only a process crash.
const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = FULL;
    PRAGMA foreign_keys = ON;
    PRAGMA temp_store = MEMORY;
    PRAGMA busy_timeout = 5000;
";

fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> QueueError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => QueueError::from(e),
        tokio_rusqlite::Error::Close(_) => {
            QueueError::StorageUnavailable("connection closed".to_string())
        }
        other => QueueError::StorageUnavailable(other.to_string()),
    }
}

/// Async SQLite database with a dedicated executor thread.
#[derive(Clone)]
pub struct AsyncDatabase {
    conn: Connection,
    path: String,
}

impl AsyncDatabase {
    /// Open (or create) the queue database at `path`, apply pragmas, and run
    /// pending migrations.
    pub async fn open(path: &Path) -> QueueResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();
        info!(path = %path_str, "Opening queue database");

        let conn = Connection::open(path).await.map_err(from_tokio_rusqlite)?;
        let db = Self {
            conn,
            path: path_str,
        };
        db.initialize().await?;

        info!(path = %db.path, "Queue database initialized with WAL mode");
        Ok(db)
    }

    /// Open a private in-memory queue. Contents vanish with the handle.
    pub async fn open_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(from_tokio_rusqlite)?;
        let db = Self {
            conn,
            path: ":memory:".to_string(),
        };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> QueueResult<()> {
        self.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            migrations::run_migrations(conn)
        })
        .await
    }

    /// Execute a closure on the database connection.
    ///
    /// The closure runs on the dedicated SQLite thread; the caller's task is
    /// parked until the result is ready.
    pub async fn call<F, T>(&self, f: F) -> QueueResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> QueueResult<T> + Send + 'static,
        T: Send + 'static,
    {
        // The closure's own result rides inside tokio_rusqlite's Ok and is
        // flattened here.
        let outer = self.conn.call(move |conn| Ok(f(conn))).await;

        match outer {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Get the database file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check the database answers a trivial query.
    pub async fn health_check(&self) -> QueueResult<()> {
        self.call(|conn| {
            conn.execute_batch("SELECT 1")?;
            Ok(())
        })
        .await?;
        debug!("Queue health check passed");
        Ok(())
    }

    /// Close the connection after pending statements finish.
    pub async fn close(self) -> QueueResult<()> {
        self.conn.close().await.map_err(|e| {
            QueueError::StorageUnavailable(format!("failed to close queue database: {e}"))
        })?;
        info!(path = %self.path, "Queue database closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_parent_dirs_and_is_healthy() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("queue.sqlite");

        let db = AsyncDatabase::open(&db_path).await.unwrap();
        assert!(db.health_check().await.is_ok());
        assert!(db_path.exists());
        assert_eq!(db.path(), db_path.to_string_lossy());
    }

    #[tokio::test]
    async fn test_open_uses_wal_and_full_sync() {
        let dir = tempdir().unwrap();
        let db = AsyncDatabase::open(&dir.path().join("queue.sqlite"))
            .await
            .unwrap();

        let (journal, synchronous): (String, i64) = db
            .call(|conn| {
                let journal = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
                let sync = conn.query_row("PRAGMA synchronous", [], |row| row.get(0))?;
                Ok((journal, sync))
            })
            .await
            .unwrap();

        assert_eq!(journal.to_lowercase(), "wal");
        // FULL = 2
        assert_eq!(synchronous, 2);
    }

    #[tokio::test]
    async fn test_open_unwritable_path_is_storage_unavailable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a dir").unwrap();

        let err = AsyncDatabase::open(&blocker.join("queue.sqlite"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, QueueError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_concurrent_calls_serialize() {
        let db = AsyncDatabase::open_in_memory().await.unwrap();
        db.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE counter (id INTEGER PRIMARY KEY, val INTEGER);
                 INSERT INTO counter (val) VALUES (0);",
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let mut handles = vec![];
        for _ in 0..10 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.call(|conn| {
                    conn.execute("UPDATE counter SET val = val + 1 WHERE id = 1", [])?;
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let count: i64 = db
            .call(|conn| {
                Ok(conn.query_row("SELECT val FROM counter WHERE id = 1", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(count, 10);
    }
}
