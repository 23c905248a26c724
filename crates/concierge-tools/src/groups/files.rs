//! File operations group — read, write, list, and delete files inside the
//! tenant's workspace directory.
//!
//! All paths are resolved relative to the workspace and validated against
//! traversal (`../../etc/passwd` style) before any filesystem call.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use concierge_store::{StoreManager, TenantId};

use crate::args;
use crate::definition::ToolDefinition;
use crate::error::{Result, ToolError};
use crate::groups::ToolGroup;
use crate::outcome::{ToolArguments, ToolOutcome};

/// Maximum bytes returned per file read to limit token usage. Truncation
/// backs off to the nearest char boundary, so the cut is always valid UTF-8.
const MAX_READ_BYTES: usize = 16_000;

/// File tools scoped to per-tenant workspace directories.
pub struct FileGroup {
    stores: StoreManager,
}

impl FileGroup {
    /// Create the group over the given store manager (which knows where
    /// each tenant's workspace lives).
    pub fn new(stores: StoreManager) -> Self {
        Self { stores }
    }

    /// Resolve a user-supplied relative path inside the tenant workspace,
    /// rejecting absolute paths and any traversal outside the workspace.
    fn resolve(&self, tenant: &TenantId, raw: &str, tool_name: &str) -> Result<PathBuf> {
        let workspace = self.stores.workspace_dir(tenant);
        let candidate = Path::new(raw);

        if candidate.is_absolute() {
            return Err(ToolError::InvalidArguments {
                tool_name: tool_name.to_string(),
                reason: format!("path `{raw}` must be relative to the workspace"),
            });
        }

        // Normalize lexically — the target may not exist yet, so
        // canonicalize() is not an option.
        let mut normalized = workspace.clone();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(ToolError::InvalidArguments {
                        tool_name: tool_name.to_string(),
                        reason: format!("path `{raw}` escapes the workspace"),
                    });
                }
            }
        }

        Ok(normalized)
    }

    async fn file_write(&self, tenant: &TenantId, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let raw = args::require_str(arguments, "path", "file_write")?;
        let content = args::require_str(arguments, "content", "file_write")?;
        let path = self.resolve(tenant, raw, "file_write")?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!(tenant = %tenant, path = %path.display(), "file written");

        Ok(ToolOutcome::success_json(json!({
            "path": raw,
            "bytes_written": content.len(),
        })))
    }

    async fn file_read(&self, tenant: &TenantId, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let raw = args::require_str(arguments, "path", "file_read")?;
        let path = self.resolve(tenant, raw, "file_read")?;

        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ToolError::ExecutionFailed {
                tool_name: "file_read".into(),
                reason: format!("cannot read `{raw}`: {e}"),
            }
        })?;

        let size_bytes = text.len();
        let (content, truncated) = if size_bytes > MAX_READ_BYTES {
            let mut end = MAX_READ_BYTES;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            (text[..end].to_string(), true)
        } else {
            (text, false)
        };

        Ok(ToolOutcome::success_json(json!({
            "path": raw,
            "content": content,
            "size_bytes": size_bytes,
            "truncated": truncated,
        })))
    }

    async fn file_list(&self, tenant: &TenantId, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let raw = args::opt_str(arguments, "path").unwrap_or(".");
        let path = self.resolve(tenant, raw, "file_list")?;

        let mut entries = Vec::new();
        match tokio::fs::read_dir(&path).await {
            Ok(mut dir) => {
                while let Some(entry) = dir.next_entry().await? {
                    let meta = entry.metadata().await?;
                    entries.push(json!({
                        "name": entry.file_name().to_string_lossy(),
                        "is_dir": meta.is_dir(),
                        "size_bytes": meta.len(),
                    }));
                }
            }
            // An empty workspace has no directory yet; report it as empty.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        Ok(ToolOutcome::success_json(json!({
            "path": raw,
            "entries": entries,
        })))
    }

    async fn file_delete(&self, tenant: &TenantId, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let raw = args::require_str(arguments, "path", "file_delete")?;
        let path = self.resolve(tenant, raw, "file_delete")?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(tenant = %tenant, path = %path.display(), "file deleted");
                Ok(ToolOutcome::success_json(json!({ "path": raw, "deleted": true })))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(ToolOutcome::failure(format!("file `{raw}` does not exist")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ToolGroup for FileGroup {
    fn group_name(&self) -> &str {
        "files"
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let path_schema = |desc: &str| {
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": desc }
                },
                "required": ["path"]
            })
        };

        vec![
            ToolDefinition::new(
                "file_write",
                "Write text content to a file in the workspace, creating parent directories.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Workspace-relative path" },
                        "content": { "type": "string", "description": "Text content to write" }
                    },
                    "required": ["path", "content"]
                }),
            ),
            ToolDefinition::new(
                "file_read",
                "Read a text file from the workspace.",
                path_schema("Workspace-relative path to read"),
            ),
            ToolDefinition::new(
                "file_list",
                "List files in a workspace directory.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Directory, defaults to the workspace root" }
                    }
                }),
            ),
            ToolDefinition::new(
                "file_delete",
                "Delete a file from the workspace.",
                path_schema("Workspace-relative path to delete"),
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
            "file_write" => self.file_write(tenant, arguments).await,
            "file_read" => self.file_read(tenant, arguments).await,
            "file_list" => self.file_list(tenant, arguments).await,
            "file_delete" => self.file_delete(tenant, arguments).await,
            other => Err(ToolError::ExecutionFailed {
                tool_name: other.to_string(),
                reason: "not a member of the files group".into(),
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

    fn group() -> (FileGroup, TenantId) {
        (
            FileGroup::new(StoreManager::in_memory()),
            TenantId::new(format!("t{}", uuid::Uuid::now_v7().simple())).unwrap(),
        )
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let (group, tenant) = group();

        let written = group
            .execute(
                &tenant,
                "file_write",
                &arguments(json!({"path": "notes/todo.txt", "content": "buy milk"})),
            )
            .await
            .unwrap();
        assert!(written.is_success());

        let read = group
            .execute(&tenant, "file_read", &arguments(json!({"path": "notes/todo.txt"})))
            .await
            .unwrap();
        let wire = read.to_wire();
        assert_eq!(wire["content"], json!("buy milk"));
        assert_eq!(wire["truncated"], json!(false));
    }

    #[tokio::test]
    async fn read_truncates_at_byte_limit_on_char_boundary() {
        let (group, tenant) = group();

        // Multibyte content so the byte limit cannot fall on a char boundary
        // by accident.
        let content = "ü".repeat(MAX_READ_BYTES);
        group
            .execute(
                &tenant,
                "file_write",
                &arguments(json!({"path": "big.txt", "content": content})),
            )
            .await
            .unwrap();

        let read = group
            .execute(&tenant, "file_read", &arguments(json!({"path": "big.txt"})))
            .await
            .unwrap();
        let wire = read.to_wire();
        assert_eq!(wire["truncated"], json!(true));
        assert_eq!(wire["size_bytes"], json!(content.len()));
        let returned = wire["content"].as_str().unwrap();
        assert!(returned.len() <= MAX_READ_BYTES);
        assert!(returned.chars().all(|c| c == 'ü'));
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (group, tenant) = group();
        let err = group
            .execute(
                &tenant,
                "file_read",
                &arguments(json!({"path": "../outside.txt"})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("escapes the workspace"));

        let err = group
            .execute(
                &tenant,
                "file_read",
                &arguments(json!({"path": "/etc/passwd"})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("relative"));
    }

    #[tokio::test]
    async fn list_empty_workspace_is_empty_success() {
        let (group, tenant) = group();
        let outcome = group
            .execute(&tenant, "file_list", &arguments(json!({})))
            .await
            .unwrap();
        assert_eq!(outcome.to_wire()["entries"], json!([]));
    }

    #[tokio::test]
    async fn delete_missing_file_is_structured_failure() {
        let (group, tenant) = group();
        let outcome = group
            .execute(&tenant, "file_delete", &arguments(json!({"path": "nope.txt"})))
            .await
            .unwrap();
        assert!(!outcome.is_success());
    }
}
