//! Tool-management group.
//!
//! Exposes the registry to the model through a single `manage_tools` tool
//! with an `action` argument. `manage_tools` is itself the designated
//! management tool: asking it to disable itself returns the registry's
//! fixed protected-tool error like any other caller would get.

use async_trait::async_trait;
use serde_json::json;

use concierge_store::TenantId;

use crate::args;
use crate::definition::ToolDefinition;
use crate::error::{Result, ToolError};
use crate::groups::ToolGroup;
use crate::outcome::{ToolArguments, ToolOutcome};
use crate::registry::{MANAGEMENT_TOOL, ToolRegistry};

/// Registry administration behind the `manage_tools` tool.
pub struct ToolManagementGroup {
    registry: ToolRegistry,
}

impl ToolManagementGroup {
    /// Create the group over the given registry.
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    async fn action_list(&self, tenant: &TenantId, arguments: &ToolArguments) -> Result<ToolOutcome> {
        let active_only = arguments
            .get("active_only")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let descriptors = self.registry.list(tenant, active_only).await?;
        let tools: Vec<serde_json::Value> = descriptors
            .iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "description": d.description,
                    "active": d.active,
                })
            })
            .collect();

        Ok(ToolOutcome::success_json(json!({ "tools": tools })))
    }

    async fn action_describe(
        &self,
        tenant: &TenantId,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome> {
        let name = args::require_str(arguments, "name", MANAGEMENT_TOOL)?;
        match self.registry.get(tenant, name).await? {
            Some(d) => Ok(ToolOutcome::success_json(json!({
                "name": d.name,
                "description": d.description,
                "parameters": d.parameters,
                "active": d.active,
            }))),
            None => Ok(ToolOutcome::failure(format!("tool `{name}` is not registered"))),
        }
    }

    async fn action_enable(
        &self,
        tenant: &TenantId,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome> {
        let name = args::require_str(arguments, "name", MANAGEMENT_TOOL)?;
        let descriptor = self.registry.activate(tenant, name).await?;
        Ok(ToolOutcome::success_json(json!({
            "name": descriptor.name,
            "active": descriptor.active,
        })))
    }

    async fn action_disable(
        &self,
        tenant: &TenantId,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome> {
        let name = args::require_str(arguments, "name", MANAGEMENT_TOOL)?;
        let descriptor = self.registry.deactivate(tenant, name).await?;
        Ok(ToolOutcome::success_json(json!({
            "name": descriptor.name,
            "active": descriptor.active,
        })))
    }
}

#[async_trait]
impl ToolGroup for ToolManagementGroup {
    fn group_name(&self) -> &str {
        "tool-management"
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition::new(
            MANAGEMENT_TOOL,
            "List, inspect, enable, or disable the tools available in this workspace.",
            json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["list", "describe", "enable", "disable"],
                        "description": "What to do"
                    },
                    "name": {
                        "type": "string",
                        "description": "Tool name, required for describe/enable/disable"
                    },
                    "active_only": {
                        "type": "boolean",
                        "description": "For list: only show active tools"
                    }
                },
                "required": ["action"]
            }),
        )]
    }

    async fn execute(
        &self,
        tenant: &TenantId,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome> {
        if name != MANAGEMENT_TOOL {
            return Err(ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: "not a member of the tool-management group".into(),
            });
        }

        let action = args::require_str(arguments, "action", MANAGEMENT_TOOL)?;
        match action {
            "list" => self.action_list(tenant, arguments).await,
            "describe" => self.action_describe(tenant, arguments).await,
            "enable" => self.action_enable(tenant, arguments).await,
            "disable" => self.action_disable(tenant, arguments).await,
            other => Ok(ToolOutcome::failure(format!(
                "unknown action `{other}`: expected list, describe, enable, or disable"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
