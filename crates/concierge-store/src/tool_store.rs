//! Tool descriptor persistence.
//!
//! Stores the per-tenant catalog of tool descriptors the dispatcher consults
//! on every invocation. Policy (which tool may never be deactivated) lives
//! one layer up in the registry; this module is plain row CRUD.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// A persisted tool descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name (case-sensitive, globally unique across groups).
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,
    /// Whether the tool may currently be dispatched.
    pub active: bool,
    /// Unix timestamp when the descriptor was first registered.
    pub created_at: i64,
    /// Unix timestamp of the last update.
    pub updated_at: i64,
}

/// CRUD operations on the `tools` table of one tenant database.
#[derive(Clone)]
pub struct ToolStore {
    db: Database,
}

impl ToolStore {
    /// Create a tool store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a descriptor, or update description/parameters if the name
    /// already exists. The active flag is preserved on update.
    #[instrument(skip(self, description, parameters))]
    pub async fn register(
        &self,
        name: &str,
        description: &str,
        parameters: &serde_json::Value,
    ) -> StoreResult<ToolDescriptor> {
        let name = name.to_string();
        let description = description.to_string();
        let parameters_json = serde_json::to_string(parameters)?;
        let now = Utc::now().timestamp();

        let stored_name = name.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO tools (name, description, parameters, active, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, 1, ?4, ?4) \
                     ON CONFLICT(name) DO UPDATE SET \
                         description = excluded.description, \
                         parameters = excluded.parameters, \
                         updated_at = excluded.updated_at",
                    rusqlite::params![name, description, parameters_json, now],
                )?;
                Ok(())
            })
            .await?;

        debug!(tool = %stored_name, "tool descriptor registered");
        self.get(&stored_name).await?.ok_or(StoreError::NotFound {
            entity: "tool",
            id: stored_name,
        })
    }

    /// Fetch a descriptor by name, returning `None` if not registered.
    #[instrument(skip(self))]
    pub async fn get(&self, name: &str) -> StoreResult<Option<ToolDescriptor>> {
        let name = name.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT name, description, parameters, active, created_at, updated_at \
                     FROM tools WHERE name = ?1",
                    rusqlite::params![name],
                    row_to_descriptor,
                );
                match result {
                    Ok(row) => Ok(Some(decode(row)?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Flip the active flag. Returns the updated descriptor.
    #[instrument(skip(self))]
    pub async fn set_active(&self, name: &str, active: bool) -> StoreResult<ToolDescriptor> {
        let name_owned = name.to_string();
        let now = Utc::now().timestamp();

        let changed = self
            .db
            .execute(move |conn| {
                let n = conn.execute(
                    "UPDATE tools SET active = ?2, updated_at = ?3 WHERE name = ?1",
                    rusqlite::params![name_owned, active, now],
                )?;
                Ok(n)
            })
            .await?;

        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "tool",
                id: name.to_string(),
            });
        }

        debug!(tool = %name, active, "tool active flag updated");
        self.get(name).await?.ok_or(StoreError::NotFound {
            entity: "tool",
            id: name.to_string(),
        })
    }

    /// List descriptors ordered by name, optionally active-only.
    #[instrument(skip(self))]
    pub async fn list(&self, active_only: bool) -> StoreResult<Vec<ToolDescriptor>> {
        self.db
            .execute(move |conn| {
                let sql = if active_only {
                    "SELECT name, description, parameters, active, created_at, updated_at \
                     FROM tools WHERE active = 1 ORDER BY name"
                } else {
                    "SELECT name, description, parameters, active, created_at, updated_at \
                     FROM tools ORDER BY name"
                };
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt
                    .query_map([], row_to_descriptor)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(decode).collect()
            })
            .await
    }
}

/// Intermediate row with the parameters column still serialized.
struct RawRow {
    name: String,
    description: String,
    parameters: String,
    active: bool,
    created_at: i64,
    updated_at: i64,
}

fn row_to_descriptor(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        name: row.get(0)?,
        description: row.get(1)?,
        parameters: row.get(2)?,
        active: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn decode(row: RawRow) -> StoreResult<ToolDescriptor> {
    Ok(ToolDescriptor {
        name: row.name,
        description: row.description,
        parameters: serde_json::from_str(&row.parameters)?,
        active: row.active,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
