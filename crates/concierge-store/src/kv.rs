//! Generic key-value rows.
//!
//! Backs the memory tool group. Values are arbitrary JSON; keys are plain
//! strings scoped by the tenant database they live in.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// One stored key-value row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvEntry {
    /// The entry key.
    pub key: String,
    /// The stored JSON value.
    pub value: serde_json::Value,
    /// Unix timestamp of the last write.
    pub updated_at: i64,
}

/// Row operations on the `kv_entries` table of one tenant database.
#[derive(Clone)]
pub struct KvStore {
    db: Database,
}

impl KvStore {
    /// Create a KV store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or overwrite the value for `key`.
    #[instrument(skip(self, value))]
    pub async fn put(&self, key: &str, value: &serde_json::Value) -> StoreResult<()> {
        let key = key.to_string();
        let value_json = serde_json::to_string(value)?;
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
                     updated_at = excluded.updated_at",
                    rusqlite::params![key, value_json, now],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    /// Fetch the value for `key`, returning `None` if absent.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> StoreResult<Option<KvEntry>> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT key, value, updated_at FROM kv_entries WHERE key = ?1",
                    rusqlite::params![key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                );
                match result {
                    Ok((key, value, updated_at)) => Ok(Some(KvEntry {
                        key,
                        value: serde_json::from_str(&value)?,
                        updated_at,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// List entries whose key starts with `prefix`, ordered by key.
    #[instrument(skip(self))]
    pub async fn list(&self, prefix: &str, limit: i64) -> StoreResult<Vec<KvEntry>> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT key, value, updated_at FROM kv_entries \
                     WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![pattern, limit], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(key, value, updated_at)| {
                        Ok(KvEntry {
                            key,
                            value: serde_json::from_str(&value)?,
                            updated_at,
                        })
                    })
                    .collect()
            })
            .await
    }

    /// Delete the entry for `key`. Returns whether a row existed.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        let key_owned = key.to_string();
        let removed = self
            .db
            .execute(move |conn| {
                let n = conn.execute(
                    "DELETE FROM kv_entries WHERE key = ?1",
                    rusqlite::params![key_owned],
                )?;
                Ok(n)
            })
            .await?;

        if removed > 0 {
            debug!(key, "kv entry deleted");
        }
        Ok(removed > 0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> KvStore {
        KvStore::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn put_get_overwrite() {
        let store = store().await;
        store.put("note:1", &json!({"text": "first"})).await.unwrap();
        store.put("note:1", &json!({"text": "second"})).await.unwrap();

        let entry = store.get("note:1").await.unwrap().unwrap();
        assert_eq!(entry.value["text"], "second");
        assert!(store.get("note:2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_prefix() {
        let store = store().await;
        store.put("note:b", &json!(2)).await.unwrap();
        store.put("note:a", &json!(1)).await.unwrap();
        store.put("other:z", &json!(3)).await.unwrap();

        let notes = store.list("note:", 10).await.unwrap();
        let keys: Vec<_> = notes.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["note:a", "note:b"]);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = store().await;
        store.put("k", &json!(null)).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
    }
}
