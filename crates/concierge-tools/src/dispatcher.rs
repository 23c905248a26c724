//! Tool dispatcher.
//!
//! Routes tool calls from the conversation loop to handler groups. One
//! authoritative name-to-group table is built at startup; duplicate claims
//! are a configuration error and rejected immediately. Every execution path
//! ends in a [`ToolOutcome`] — errors never cross the dispatch boundary.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use concierge_store::{StoreManager, TenantId};

use crate::definition::ToolDefinition;
use crate::error::{Result, ToolError};
use crate::groups::diffusion::DiffusionGroup;
use crate::groups::files::FileGroup;
use crate::groups::image::ImageGroup;
use crate::groups::memory::MemoryGroup;
use crate::groups::tool_mgmt::ToolManagementGroup;
use crate::groups::web_fetch::WebFetchGroup;
use crate::groups::ToolGroup;
use crate::outcome::{ToolArguments, ToolOutcome};
use crate::qr;
use crate::registry::ToolRegistry;

/// Routes tool invocations to their owning group.
pub struct ToolDispatcher {
    registry: ToolRegistry,
    routes: HashMap<String, Arc<dyn ToolGroup>>,
    definitions: Vec<ToolDefinition>,
}

impl ToolDispatcher {
    /// Build the routing table from the given groups.
    ///
    /// Fails if two groups claim the same tool name or a group claims the
    /// built-in payment QR tool.
    pub fn new(stores: StoreManager, groups: Vec<Arc<dyn ToolGroup>>) -> Result<Self> {
        let mut routes: HashMap<String, Arc<dyn ToolGroup>> = HashMap::new();
        let mut definitions = vec![qr::definition()];

        for group in groups {
            for definition in group.tool_definitions() {
                if definition.name == qr::PAYMENT_QR_TOOL {
                    return Err(ToolError::InvalidArguments {
                        tool_name: definition.name,
                        reason: format!(
                            "group `{}` claims the built-in payment QR tool",
                            group.group_name()
                        ),
                    });
                }
                if routes.contains_key(&definition.name) {
                    return Err(ToolError::InvalidArguments {
                        tool_name: definition.name,
                        reason: format!(
                            "tool claimed by more than one group (last by `{}`)",
                            group.group_name()
                        ),
                    });
                }
                routes.insert(definition.name.clone(), Arc::clone(&group));
                definitions.push(definition);
            }
        }

        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self {
            registry: ToolRegistry::new(stores),
            routes,
            definitions,
        })
    }

    /// Build a dispatcher with the full standard group set.
    pub fn standard(stores: StoreManager) -> Result<Self> {
        let groups: Vec<Arc<dyn ToolGroup>> = vec![
            Arc::new(FileGroup::new(stores.clone())),
            Arc::new(ToolManagementGroup::new(ToolRegistry::new(stores.clone()))),
            Arc::new(ImageGroup::new()),
            Arc::new(DiffusionGroup::new(stores.clone())),
            Arc::new(WebFetchGroup::new()),
            Arc::new(MemoryGroup::new(stores.clone())),
        ];
        Self::new(stores, groups)
    }

    /// The registry this dispatcher consults for the active flag.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Definitions of every dispatchable tool, built-in included, ordered by
    /// name. This is the catalog advertised to the model.
    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Execute one tool call.
    ///
    /// The caller's arguments are never mutated; a copy with the injected
    /// `language` entry is handed to the handler. Every failure mode —
    /// unknown tool, deactivated tool, handler error — comes back as a
    /// structured failure outcome, so the conversation loop never has to
    /// branch on errors. Results are computed fresh on every call.
    #[instrument(skip(self, arguments), fields(tenant = %tenant, tool = %name))]
    pub async fn execute_tool(
        &self,
        tenant: &TenantId,
        name: &str,
        arguments: &ToolArguments,
        language: &str,
    ) -> ToolOutcome {
        let mut arguments = arguments.clone();
        arguments.insert("language".to_string(), Value::String(language.to_string()));

        match self.dispatch(tenant, name, &arguments).await {
            Ok(outcome) => {
                debug!(success = outcome.is_success(), "tool executed");
                outcome
            }
            Err(e) => {
                warn!(error = %e, "tool execution failed");
                ToolOutcome::failure(e.to_string())
            }
        }
    }

    async fn dispatch(
        &self,
        tenant: &TenantId,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome> {
        // A deactivated descriptor wins over every route, built-in included.
        if let Some(descriptor) = self.registry.get(tenant, name).await? {
            if !descriptor.active {
                return Ok(ToolOutcome::failure(format!(
                    "tool `{name}` is currently disabled"
                )));
            }
        }

        if name == qr::PAYMENT_QR_TOOL {
            return qr::execute(arguments);
        }

        if let Some(group) = self.routes.get(name) {
            return group.execute(tenant, name, arguments).await;
        }

        // Registered in the catalog but no group implements it.
        if self.registry.get(tenant, name).await?.is_some() {
            return Ok(ToolOutcome::failure(format!(
                "tool `{name}` is registered but has no handler"
            )));
        }

        Ok(ToolOutcome::failure(format!("unknown tool `{name}`")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PROTECTED_TOOL_MESSAGE;
    use crate::registry::MANAGEMENT_TOOL;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn arguments(value: serde_json::Value) -> ToolArguments {
        value.as_object().unwrap().clone()
    }

    fn tenant() -> TenantId {
        TenantId::new("alice").unwrap()
    }

    /// Group that counts executions and echoes its arguments.
    struct CountingGroup {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolGroup for CountingGroup {
        fn group_name(&self) -> &str {
            "counting"
        }

        fn tool_definitions(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition::new("echo", "Echo", json!({"type": "object"}))]
        }

        async fn execute(
            &self,
            _tenant: &TenantId,
            _name: &str,
            arguments: &ToolArguments,
        ) -> Result<ToolOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutcome::success_json(json!({
                "echoed": Value::Object(arguments.clone()),
            })))
        }
    }

    fn counting_dispatcher() -> (ToolDispatcher, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = Arc::new(CountingGroup { calls: Arc::clone(&calls) });
        let dispatcher =
            ToolDispatcher::new(StoreManager::in_memory(), vec![group]).unwrap();
        (dispatcher, calls)
    }

    #[tokio::test]
    async fn language_is_injected_without_mutating_caller_arguments() {
        let (dispatcher, _) = counting_dispatcher();
        let original = arguments(json!({"text": "hi"}));

        let outcome = dispatcher
            .execute_tool(&tenant(), "echo", &original, "de")
            .await;

        assert_eq!(outcome.to_wire()["echoed"]["language"], json!("de"));
        assert!(!original.contains_key("language"));
    }

    #[tokio::test]
    async fn results_are_computed_fresh_each_call() {
        let (dispatcher, calls) = counting_dispatcher();
        let args = arguments(json!({"text": "same"}));

        dispatcher.execute_tool(&tenant(), "echo", &args, "en").await;
        dispatcher.execute_tool(&tenant(), "echo", &args, "en").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_tool_failure_names_the_tool() {
        let dispatcher = ToolDispatcher::standard(StoreManager::in_memory()).unwrap();
        let outcome = dispatcher
            .execute_tool(&tenant(), "teleport", &arguments(json!({})), "en")
            .await;

        let wire = outcome.to_wire();
        assert_eq!(wire["success"], json!(false));
        assert!(wire["error"].as_str().unwrap().contains("teleport"));
    }

    #[tokio::test]
    async fn registered_but_unimplemented_tool_is_distinguished() {
        let dispatcher = ToolDispatcher::standard(StoreManager::in_memory()).unwrap();
        let tenant = tenant();
        dispatcher
            .registry()
            .register(&tenant, "crystal_ball", "Sees the future", &json!({"type": "object"}))
            .await
            .unwrap();

        let outcome = dispatcher
            .execute_tool(&tenant, "crystal_ball", &arguments(json!({})), "en")
            .await;
        assert!(outcome
            .to_wire()["error"]
            .as_str()
            .unwrap()
            .contains("no handler"));
    }

    #[tokio::test]
    async fn deactivated_tool_is_refused() {
        let dispatcher = ToolDispatcher::standard(StoreManager::in_memory()).unwrap();
        let tenant = tenant();
        dispatcher
            .registry()
            .register(&tenant, "web_fetch", "Fetch", &json!({"type": "object"}))
            .await
            .unwrap();
        dispatcher.registry().deactivate(&tenant, "web_fetch").await.unwrap();

        let outcome = dispatcher
            .execute_tool(
                &tenant,
                "web_fetch",
                &arguments(json!({"url": "http://example.com"})),
                "en",
            )
            .await;
        assert!(outcome
            .to_wire()["error"]
            .as_str()
            .unwrap()
            .contains("disabled"));
    }

    #[tokio::test]
    async fn payment_qr_is_always_routable() {
        let dispatcher = ToolDispatcher::standard(StoreManager::in_memory()).unwrap();
        let outcome = dispatcher
            .execute_tool(
                &tenant(),
                qr::PAYMENT_QR_TOOL,
                &arguments(json!({
                    "recipient": "Jane Doe",
                    "iban": "DE89370400440532013000",
                    "amount": 9.99
                })),
                "en",
            )
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.artifact().unwrap().kind, "qr");
    }

    #[tokio::test]
    async fn payment_qr_missing_field_is_wire_failure_without_artifact() {
        let dispatcher = ToolDispatcher::standard(StoreManager::in_memory()).unwrap();
        let outcome = dispatcher
            .execute_tool(
                &tenant(),
                qr::PAYMENT_QR_TOOL,
                &arguments(json!({
                    "recipient": "Jane Doe",
                    "amount": 9.99
                })),
                "en",
            )
            .await;

        let wire = outcome.to_wire();
        assert_eq!(wire["success"], json!(false));
        assert!(wire["error"].as_str().unwrap().contains("iban"));
        assert!(wire.get("artifact").is_none());
    }

    #[tokio::test]
    async fn protected_tool_error_surfaces_with_fixed_message() {
        let dispatcher = ToolDispatcher::standard(StoreManager::in_memory()).unwrap();
        let tenant = tenant();
        dispatcher
            .registry()
            .register(&tenant, MANAGEMENT_TOOL, "Manage tools", &json!({"type": "object"}))
            .await
            .unwrap();

        let outcome = dispatcher
            .execute_tool(
                &tenant,
                MANAGEMENT_TOOL,
                &arguments(json!({"action": "disable", "name": MANAGEMENT_TOOL})),
                "en",
            )
            .await;
        assert_eq!(outcome.to_wire()["error"], json!(PROTECTED_TOOL_MESSAGE));
    }

    #[test]
    fn duplicate_tool_names_are_rejected_at_startup() {
        struct DupGroup;

        #[async_trait]
        impl ToolGroup for DupGroup {
            fn group_name(&self) -> &str {
                "dup"
            }
            fn tool_definitions(&self) -> Vec<ToolDefinition> {
                vec![ToolDefinition::new("echo", "Echo", json!({"type": "object"}))]
            }
            async fn execute(
                &self,
                _tenant: &TenantId,
                _name: &str,
                _arguments: &ToolArguments,
            ) -> Result<ToolOutcome> {
                Ok(ToolOutcome::failure("unused"))
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let result = ToolDispatcher::new(
            StoreManager::in_memory(),
            vec![Arc::new(CountingGroup { calls }), Arc::new(DupGroup)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn catalog_includes_builtin_and_is_sorted() {
        let dispatcher = ToolDispatcher::standard(StoreManager::in_memory()).unwrap();
        let names: Vec<&str> = dispatcher
            .tool_definitions()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert!(names.contains(&qr::PAYMENT_QR_TOOL));
        assert!(names.contains(&MANAGEMENT_TOOL));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
