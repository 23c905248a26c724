//! Tenant identity and per-tenant database management.
//!
//! Every core operation is scoped to exactly one tenant. A tenant owns its
//! own SQLite file under the data root, and callers obtain a fresh
//! [`Database`] handle per call through [`StoreManager`] instead of holding
//! implicit "current tenant" state.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Identifies one isolated end-user data scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant id. Only `[a-zA-Z0-9_-]` is accepted so the id can
    /// double as a file name component.
    pub fn new(id: impl Into<String>) -> StoreResult<Self> {
        let id = id.into();
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(StoreError::InvalidArgument(format!(
                "invalid tenant id `{id}`"
            )));
        }
        Ok(Self(id))
    }

    /// The raw tenant identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How tenant databases are materialized.
enum Backing {
    /// One SQLite file per tenant under the data root.
    Disk { root: PathBuf },
    /// One in-memory database per tenant — used by tests.
    Memory,
}

/// Hands out tenant-scoped [`Database`] handles.
///
/// Handles are cached per tenant (the registry and job tables are the only
/// long-lived per-tenant state), but never shared across tenants. Cloning is
/// cheap; the manager is `Send + Sync`.
#[derive(Clone)]
pub struct StoreManager {
    backing: Arc<Backing>,
    open: Arc<DashMap<TenantId, Database>>,
}

impl StoreManager {
    /// Create a manager that stores each tenant at `<root>/<tenant>.db`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            backing: Arc::new(Backing::Disk { root: root.into() }),
            open: Arc::new(DashMap::new()),
        }
    }

    /// Create a manager backed by in-memory databases — used by tests.
    pub fn in_memory() -> Self {
        Self {
            backing: Arc::new(Backing::Memory),
            open: Arc::new(DashMap::new()),
        }
    }

    /// Obtain the database handle for `tenant`, opening it on first use.
    pub async fn database(&self, tenant: &TenantId) -> StoreResult<Database> {
        if let Some(db) = self.open.get(tenant) {
            return Ok(db.clone());
        }

        let db = match self.backing.as_ref() {
            Backing::Memory => Database::open_in_memory()?,
            Backing::Disk { root } => {
                let root = root.clone();
                let tenant_owned = tenant.clone();
                tokio::task::spawn_blocking(move || -> StoreResult<Database> {
                    std::fs::create_dir_all(&root).map_err(|e| {
                        StoreError::TenantUnavailable {
                            tenant: tenant_owned.to_string(),
                            reason: format!("cannot create data root: {e}"),
                        }
                    })?;
                    Database::open(root.join(format!("{tenant_owned}.db")))
                })
                .await??
            }
        };

        debug!(tenant = %tenant, "tenant database opened");
        self.open.insert(tenant.clone(), db.clone());
        Ok(db)
    }

    /// The per-tenant workspace directory used by the file tool group.
    ///
    /// In-memory managers place workspaces under the system temp directory.
    pub fn workspace_dir(&self, tenant: &TenantId) -> PathBuf {
        match self.backing.as_ref() {
            Backing::Disk { root } => root.join("workspaces").join(tenant.as_str()),
            Backing::Memory => std::env::temp_dir()
                .join("concierge-workspaces")
                .join(tenant.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_rejects_path_characters() {
        assert!(TenantId::new("alice").is_ok());
        assert!(TenantId::new("alice-2_b").is_ok());
        assert!(TenantId::new("").is_err());
        assert!(TenantId::new("../escape").is_err());
        assert!(TenantId::new("a/b").is_err());
    }

    #[tokio::test]
    async fn databases_are_isolated_per_tenant() {
        let manager = StoreManager::in_memory();
        let alice = TenantId::new("alice").unwrap();
        let bob = TenantId::new("bob").unwrap();

        let db_a = manager.database(&alice).await.unwrap();
        db_a.execute(|conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at) VALUES ('k', '1', 0)",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let db_b = manager.database(&bob).await.unwrap();
        let count: i64 = db_b
            .execute(|conn| {
                let c: i64 =
                    conn.query_row("SELECT count(*) FROM kv_entries", [], |row| row.get(0))?;
                Ok(c)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn handle_is_reused_for_same_tenant() {
        let manager = StoreManager::in_memory();
        let alice = TenantId::new("alice").unwrap();

        let db1 = manager.database(&alice).await.unwrap();
        db1.execute(|conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at) VALUES ('k', '1', 0)",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let db2 = manager.database(&alice).await.unwrap();
        let count: i64 = db2
            .execute(|conn| {
                let c: i64 =
                    conn.query_row("SELECT count(*) FROM kv_entries", [], |row| row.get(0))?;
                Ok(c)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
