//! Schema migration system.
//!
//! Migrations are static SQL strings keyed by version number. The applied
//! version is tracked in a `_migrations` table, so running them is
//! idempotent. Every tenant database carries the same schema.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema — tool descriptors and jobs",
        sql: r#"
            CREATE TABLE tools (
                name        TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                parameters  TEXT NOT NULL,
                active      BOOLEAN NOT NULL DEFAULT 1,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );

            CREATE TABLE jobs (
                id           TEXT PRIMARY KEY,
                subject      TEXT NOT NULL,
                kind         TEXT NOT NULL,
                status       TEXT NOT NULL CHECK(status IN ('pending','processing','completed','failed')),
                payload      TEXT NOT NULL,
                result       TEXT,
                progress     INTEGER NOT NULL DEFAULT 0,
                total_steps  INTEGER NOT NULL DEFAULT 0,
                error        TEXT,
                created_at   INTEGER NOT NULL,
                started_at   INTEGER,
                completed_at INTEGER
            );
            CREATE INDEX idx_jobs_status ON jobs(status, created_at);
            CREATE INDEX idx_jobs_subject ON jobs(subject);
        "#,
    },
    Migration {
        version: 2,
        description: "key-value rows for the memory tool group",
        sql: r#"
            CREATE TABLE kv_entries (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
        "#,
    },
];

/// Run every migration that has not yet been applied.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| m.version > current)
        .collect();

    if pending.is_empty() {
        debug!(current_version = current, "schema up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Migration {
            version: 0,
            message: format!("failed to read current version: {e}"),
        })?;
    Ok(version)
}

// ── internals ────────────────────────────────────────────────────────

/// Create the `_migrations` bookkeeping table if it does not exist.
fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })?;
    Ok(())
}

/// Apply a single migration inside a transaction.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    // `conn.transaction()` needs `&mut Connection`, so the transaction is
    // managed manually.
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to begin transaction: {e}"),
        })?;

    let result = (|| -> StoreResult<()> {
        conn.execute_batch(migration.sql)
            .map_err(|e| StoreError::Migration {
                version: migration.version,
                message: format!("SQL execution failed: {e}"),
            })?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![migration.version, migration.description, now],
        )
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to record migration: {e}"),
        })?;

        Ok(())
    })();

    match &result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")
                .map_err(|e| StoreError::Migration {
                    version: migration.version,
                    message: format!("failed to commit: {e}"),
                })?;
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
        }
    }

    result
}

// ── tests ────────────────────────────────────────────────────────────
