//! Tool registry.
//!
//! Thin policy layer over [`concierge_store::ToolStore`]: register/update
//! descriptors, flip the active flag, and list the catalog. The one rule it
//! enforces is that the designated management tool can never be deactivated
//! — the same fixed error is returned regardless of the caller, including
//! the management tool itself.

use tracing::{info, warn};

use concierge_store::{StoreManager, TenantId, ToolDescriptor, ToolStore};

use crate::error::{Result, ToolError};

/// Name of the designated management tool. Must stay active at all times so
/// a tenant can never lock themselves out of tool administration.
pub const MANAGEMENT_TOOL: &str = "manage_tools";

/// Tenant-scoped tool catalog operations.
#[derive(Clone)]
pub struct ToolRegistry {
    stores: StoreManager,
}

impl ToolRegistry {
    /// Create a registry over the given store manager.
    pub fn new(stores: StoreManager) -> Self {
        Self { stores }
    }

    async fn store(&self, tenant: &TenantId) -> Result<ToolStore> {
        Ok(ToolStore::new(self.stores.database(tenant).await?))
    }

    /// Register a descriptor, or update description/parameters if the name
    /// is already known. Registration never flips the active flag.
    pub async fn register(
        &self,
        tenant: &TenantId,
        name: &str,
        description: &str,
        parameters: &serde_json::Value,
    ) -> Result<ToolDescriptor> {
        let descriptor = self
            .store(tenant)
            .await?
            .register(name, description, parameters)
            .await?;
        info!(tenant = %tenant, tool = %name, "tool registered");
        Ok(descriptor)
    }

    /// Fetch one descriptor.
    pub async fn get(&self, tenant: &TenantId, name: &str) -> Result<Option<ToolDescriptor>> {
        Ok(self.store(tenant).await?.get(name).await?)
    }

    /// List descriptors ordered by name.
    pub async fn list(&self, tenant: &TenantId, active_only: bool) -> Result<Vec<ToolDescriptor>> {
        Ok(self.store(tenant).await?.list(active_only).await?)
    }

    /// Activate a tool.
    pub async fn activate(&self, tenant: &TenantId, name: &str) -> Result<ToolDescriptor> {
        Ok(self.store(tenant).await?.set_active(name, true).await?)
    }

    /// Deactivate a tool.
    ///
    /// Deactivating [`MANAGEMENT_TOOL`] always fails with the same fixed
    /// error, no matter who asks.
    pub async fn deactivate(&self, tenant: &TenantId, name: &str) -> Result<ToolDescriptor> {
        if name == MANAGEMENT_TOOL {
            warn!(tenant = %tenant, "attempt to deactivate the management tool rejected");
            return Err(ToolError::ProtectedTool);
        }
        Ok(self.store(tenant).await?.set_active(name, false).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PROTECTED_TOOL_MESSAGE;
    use serde_json::json;

    fn tenant() -> TenantId {
        TenantId::new("alice").unwrap()
    }

    #[tokio::test]
    async fn deactivate_management_tool_always_fails() {
        let registry = ToolRegistry::new(StoreManager::in_memory());
        let tenant = tenant();
        registry
            .register(&tenant, MANAGEMENT_TOOL, "Manage tools", &json!({"type": "object"}))
            .await
            .unwrap();

        let err = registry.deactivate(&tenant, MANAGEMENT_TOOL).await.unwrap_err();
        assert_eq!(err.to_string(), PROTECTED_TOOL_MESSAGE);

        // Still active afterwards.
        let desc = registry.get(&tenant, MANAGEMENT_TOOL).await.unwrap().unwrap();
        assert!(desc.active);
    }

    #[tokio::test]
    async fn other_tools_can_be_toggled() {
        let registry = ToolRegistry::new(StoreManager::in_memory());
        let tenant = tenant();
        registry
            .register(&tenant, "web_fetch", "Fetch", &json!({"type": "object"}))
            .await
            .unwrap();

        let off = registry.deactivate(&tenant, "web_fetch").await.unwrap();
        assert!(!off.active);
        let on = registry.activate(&tenant, "web_fetch").await.unwrap();
        assert!(on.active);
    }
}
