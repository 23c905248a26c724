//! SQLite database handle with WAL mode and performance pragmas.
//!
//! Every tenant owns one database file. The [`Database`] struct wraps a
//! `rusqlite::Connection` behind an `Arc<Mutex<>>` and dispatches all work
//! onto the blocking thread pool via `tokio::task::spawn_blocking`, so the
//! async runtime is never blocked by disk I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// Thread-safe handle to one tenant's SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database at `path`, apply pragmas, and run all
    /// pending migrations.
    ///
    /// Blocks briefly on file I/O; callers on the async runtime should go
    /// through [`crate::StoreManager`] which wraps this in `spawn_blocking`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening tenant database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;
        migration::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a migrated in-memory database — used by tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;
        migration::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a closure against the connection on the blocking pool.
    ///
    /// This is the only way store modules interact with the database from
    /// async code.
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }

    /// Apply performance pragmas to a fresh connection.
    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        // WAL: concurrent readers, non-blocking writes. NORMAL sync is safe
        // with WAL — a power failure loses at most the last transaction.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_runs_migrations() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .execute(|conn| {
                let c: i64 = conn.query_row("SELECT count(*) FROM jobs", [], |row| row.get(0))?;
                Ok(c)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn foreign_keys_enabled() {
        let db = Database::open_in_memory().unwrap();
        let on: i64 = db
            .execute(|conn| {
                let v: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
                Ok(v)
            })
            .await
            .unwrap();
        assert_eq!(on, 1);
    }
}
