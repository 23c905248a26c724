//! Memory group — durable notes the model can write for itself.
//!
//! Entries live in the tenant's key-value table under a `memory:` key
//! prefix so other KV users never collide with them.

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use concierge_store::{KvStore, StoreManager, TenantId};

use crate::args;
use crate::definition::ToolDefinition;
use crate::error::{Result, ToolError};
use crate::groups::ToolGroup;
use crate::outcome::{ToolArguments, ToolOutcome};

const KEY_PREFIX: &str = "memory:";
const DEFAULT_LIST_LIMIT: i64 = 50;

/// Persistent memory tools over the tenant KV store.
pub struct MemoryGroup {
    stores: StoreManager,
}

impl MemoryGroup {
    /// Create the group over the given store manager.
    pub fn new(stores: StoreManager) -> Self {
        Self { stores }
    }

    async fn kv(&self, tenant: &TenantId) -> Result<KvStore> {
        Ok(KvStore::new(self.stores.database(tenant).await?))
    }

    async fn memory_save(&self, tenant: &TenantId, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let content = args::require_str(arguments, "content", "memory_save")?;
        // A caller-supplied key makes the entry addressable; otherwise one
        // is minted so repeated saves never overwrite each other.
        let key = match args::opt_str(arguments, "key") {
            Some(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => Uuid::now_v7().simple().to_string(),
        };

        self.kv(tenant)
            .await?
            .put(&format!("{KEY_PREFIX}{key}"), &json!({ "content": content }))
            .await?;

        Ok(ToolOutcome::success_json(json!({ "key": key })))
    }

    async fn memory_get(&self, tenant: &TenantId, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let key = args::require_str(arguments, "key", "memory_get")?;
        match self.kv(tenant).await?.get(&format!("{KEY_PREFIX}{key}")).await? {
            Some(entry) => Ok(ToolOutcome::success_json(json!({
                "key": key,
                "content": entry.value["content"],
                "updated_at": entry.updated_at,
            }))),
            None => Ok(ToolOutcome::failure(format!("no memory stored under `{key}`"))),
        }
    }

    async fn memory_list(&self, tenant: &TenantId, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let limit = args::opt_i64(arguments, "limit").unwrap_or(DEFAULT_LIST_LIMIT).max(1);
        let entries = self.kv(tenant).await?.list(KEY_PREFIX, limit).await?;

        let memories: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                json!({
                    "key": e.key.trim_start_matches(KEY_PREFIX),
                    "content": e.value["content"],
                    "updated_at": e.updated_at,
                })
            })
            .collect();

        Ok(ToolOutcome::success_json(json!({ "memories": memories })))
    }

    async fn memory_delete(&self, tenant: &TenantId, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let key = args::require_str(arguments, "key", "memory_delete")?;
        if self.kv(tenant).await?.delete(&format!("{KEY_PREFIX}{key}")).await? {
            Ok(ToolOutcome::success_json(json!({ "key": key, "deleted": true })))
        } else {
            Ok(ToolOutcome::failure(format!("no memory stored under `{key}`")))
        }
    }
}

#[async_trait]
impl ToolGroup for MemoryGroup {
    fn group_name(&self) -> &str {
        "memory"
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let key_schema = |desc: &str| {
            json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string", "description": desc }
                },
                "required": ["key"]
            })
        };

        vec![
            ToolDefinition::new(
                "memory_save",
                "Store a note for later conversations. Returns the key it was stored under.",
                json!({
                    "type": "object",
                    "properties": {
                        "content": { "type": "string", "description": "Text to remember" },
                        "key": { "type": "string", "description": "Optional key; generated when omitted" }
                    },
                    "required": ["content"]
                }),
            ),
            ToolDefinition::new(
                "memory_get",
                "Retrieve a stored note by key.",
                key_schema("Key returned by memory_save"),
            ),
            ToolDefinition::new(
                "memory_list",
                "List stored notes, oldest key first.",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": { "type": "integer", "description": "Maximum entries to return" }
                    }
                }),
            ),
            ToolDefinition::new(
                "memory_delete",
                "Delete a stored note by key.",
                key_schema("Key of the note to delete"),
            ),
        ]
    }

    async fn execute(
        &self,
        tenant: &TenantId,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome> {
        match name {
            "memory_save" => self.memory_save(tenant, arguments).await,
            "memory_get" => self.memory_get(tenant, arguments).await,
            "memory_list" => self.memory_list(tenant, arguments).await,
            "memory_delete" => self.memory_delete(tenant, arguments).await,
            other => Err(ToolError::ExecutionFailed {
                tool_name: other.to_string(),
                reason: "not a member of the memory group".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arguments(value: serde_json::Value) -> ToolArguments {
        value.as_object().unwrap().clone()
    }

    fn group() -> (MemoryGroup, TenantId) {
        (
            MemoryGroup::new(StoreManager::in_memory()),
            TenantId::new("alice").unwrap(),
        )
    }

    #[tokio::test]
    async fn save_without_key_generates_one() {
        let (group, tenant) = group();

        let saved = group
            .execute(&tenant, "memory_save", &arguments(json!({"content": "likes tea"})))
            .await
            .unwrap();
        let key = saved.to_wire()["key"].as_str().unwrap().to_string();
        assert!(!key.is_empty());

        let fetched = group
            .execute(&tenant, "memory_get", &arguments(json!({"key": key})))
            .await
            .unwrap();
        assert_eq!(fetched.to_wire()["content"], json!("likes tea"));
    }

    #[tokio::test]
    async fn save_with_key_overwrites() {
        let (group, tenant) = group();

        for content in ["v1", "v2"] {
            group
                .execute(
                    &tenant,
                    "memory_save",
                    &arguments(json!({"key": "prefs", "content": content})),
                )
                .await
                .unwrap();
        }

        let fetched = group
            .execute(&tenant, "memory_get", &arguments(json!({"key": "prefs"})))
            .await
            .unwrap();
        assert_eq!(fetched.to_wire()["content"], json!("v2"));
    }

    #[tokio::test]
    async fn list_and_delete() {
        let (group, tenant) = group();
        group
            .execute(
                &tenant,
                "memory_save",
                &arguments(json!({"key": "a", "content": "one"})),
            )
            .await
            .unwrap();

        let listed = group
            .execute(&tenant, "memory_list", &arguments(json!({})))
            .await
            .unwrap();
        assert_eq!(listed.to_wire()["memories"][0]["key"], json!("a"));

        let deleted = group
            .execute(&tenant, "memory_delete", &arguments(json!({"key": "a"})))
            .await
            .unwrap();
        assert!(deleted.is_success());

        let missing = group
            .execute(&tenant, "memory_delete", &arguments(json!({"key": "a"})))
            .await
            .unwrap();
        assert!(!missing.is_success());
    }
}
