//! The conversation orchestrator.
//!
//! Drives the bounded round-trip loop between one gateway and the tool
//! dispatcher: send the history, execute any tool calls the model requests,
//! fold the results back into the history, repeat. The loop never errors —
//! gateway failures arrive as synthetic error responses and tool failures
//! are folded into the history as structured failure results.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use concierge_store::TenantId;
use concierge_tools::ToolDispatcher;

use crate::llm::gateway::Gateway;
use crate::llm::types::{ConversationRequest, ConversationResponse, Message};

/// Default ceiling on gateway round trips per conversation turn.
pub const DEFAULT_MAX_ROUNDS: usize = 8;

/// Runs one conversation turn to completion.
pub struct ConversationRunner {
    gateway: Arc<dyn Gateway>,
    dispatcher: Arc<ToolDispatcher>,
    max_rounds: usize,
}

impl ConversationRunner {
    /// Create a runner with the default round ceiling.
    pub fn new(gateway: Arc<dyn Gateway>, dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            gateway,
            dispatcher,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Override the round ceiling. A ceiling of zero still performs one
    /// round trip; the ceiling bounds tool execution, not conversation.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Run the loop until the model answers without tool calls or the round
    /// ceiling is hit. On a hit ceiling the last response is returned as-is,
    /// its pending tool calls unexecuted.
    #[instrument(skip(self, request), fields(tenant = %tenant, request_id = %request.id))]
    pub async fn run(
        &self,
        tenant: &TenantId,
        mut request: ConversationRequest,
        language: &str,
    ) -> ConversationResponse {
        let tools = self.dispatcher.tool_definitions().to_vec();
        let mut round = 0;

        loop {
            let response = self.gateway.send_request(&request, &tools).await;
            if !response.has_tool_calls() {
                debug!(rounds = round, "conversation turn finished");
                return response;
            }

            round += 1;
            if round >= self.max_rounds {
                info!(rounds = round, "round ceiling reached, returning last response");
                return response;
            }

            self.fold_tool_calls(tenant, &mut request, &response.message, language)
                .await;
        }
    }

    /// Execute every tool call in `message` and append the assistant message
    /// plus one tool result message per call to the request history.
    ///
    /// Each result is the serialized wire form of the outcome, keyed by the
    /// call id, so the model can correlate results with its requests.
    async fn fold_tool_calls(
        &self,
        tenant: &TenantId,
        request: &mut ConversationRequest,
        message: &Message,
        language: &str,
    ) {
        request.messages.push(message.clone());

        for call in &message.tool_calls {
            let outcome = self
                .dispatcher
                .execute_tool(tenant, &call.name, &call.arguments, language)
                .await;
            debug!(tool = %call.name, success = outcome.is_success(), "tool call folded");
            request
                .messages
                .push(Message::tool_result(&call.id, outcome.to_wire().to_string()));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::llm::gateway::ModelInfo;
    use crate::llm::types::{FinishReason, Role, ToolCall, Usage};
    use async_trait::async_trait;
    use concierge_store::StoreManager;
    use concierge_tools::ToolDefinition;
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Gateway that replays a scripted list of responses and records every
    /// request it receives.
    struct ScriptedGateway {
        script: Mutex<Vec<ConversationResponse>>,
        requests: Mutex<Vec<ConversationRequest>>,
    }

    impl ScriptedGateway {
        fn new(mut responses: Vec<ConversationResponse>) -> Self {
            responses.reverse();
            Self {
                script: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Gateway for ScriptedGateway {
        async fn send_request(
            &self,
            request: &ConversationRequest,
            _tools: &[ToolDefinition],
        ) -> ConversationResponse {
            self.requests.lock().unwrap().push(request.clone());
            let mut script = self.script.lock().unwrap();
            match script.pop() {
                Some(mut response) => {
                    response.request_id = request.id.clone();
                    response
                }
                // Script exhausted: keep asking for more tool calls so the
                // ceiling test cannot terminate early.
                None => tool_call_response(&request.id, "file_list", json!({})),
            }
        }

        async fn available_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    fn tool_call_response(
        request_id: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> ConversationResponse {
        ConversationResponse {
            id: Uuid::now_v7().to_string(),
            request_id: request_id.to_string(),
            message: Message::assistant_tool_calls(vec![ToolCall {
                id: format!("call_{tool}"),
                name: tool.to_string(),
                arguments: arguments.as_object().unwrap().clone(),
            }]),
            finish_reason: FinishReason::ToolCalls,
            usage: Usage::default(),
        }
    }

    fn text_response(text: &str) -> ConversationResponse {
        ConversationResponse {
            id: Uuid::now_v7().to_string(),
            request_id: String::new(),
            message: Message::assistant(text),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }

    fn runner(gateway: Arc<ScriptedGateway>) -> ConversationRunner {
        let dispatcher =
            Arc::new(ToolDispatcher::standard(StoreManager::in_memory()).unwrap());
        ConversationRunner::new(gateway, dispatcher)
    }

    fn request() -> ConversationRequest {
        ConversationRequest::new("test-model", vec![Message::user("hello")])
    }

    #[tokio::test]
    async fn text_answer_returns_immediately() {
        let gateway = Arc::new(ScriptedGateway::new(vec![text_response("hi there")]));
        let response = runner(Arc::clone(&gateway))
            .run(&TenantId::new("alice").unwrap(), request(), "en")
            .await;

        assert_eq!(response.message.content, "hi there");
        assert_eq!(gateway.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tool_results_are_folded_into_the_next_request() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            tool_call_response("", "file_list", json!({})),
            text_response("done"),
        ]));
        let response = runner(Arc::clone(&gateway))
            .run(&TenantId::new("alice").unwrap(), request(), "en")
            .await;
        assert_eq!(response.message.content, "done");

        let requests = gateway.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        // user, assistant tool call, tool result
        let folded = &requests[1].messages;
        assert_eq!(folded.len(), 3);
        assert_eq!(folded[1].role, Role::Assistant);
        assert_eq!(folded[2].role, Role::Tool);
        assert_eq!(folded[2].tool_call_id.as_deref(), Some("call_file_list"));
        let wire: serde_json::Value = serde_json::from_str(&folded[2].content).unwrap();
        assert_eq!(wire["success"], json!(true));
    }

    #[tokio::test]
    async fn tool_failure_is_folded_not_raised() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            tool_call_response("", "teleport", json!({})),
            text_response("sorry"),
        ]));
        let response = runner(Arc::clone(&gateway))
            .run(&TenantId::new("alice").unwrap(), request(), "en")
            .await;
        assert_eq!(response.message.content, "sorry");

        let requests = gateway.requests.lock().unwrap();
        let wire: serde_json::Value =
            serde_json::from_str(&requests[1].messages[2].content).unwrap();
        assert_eq!(wire["success"], json!(false));
        assert!(wire["error"].as_str().unwrap().contains("teleport"));
    }

    #[tokio::test]
    async fn round_ceiling_returns_last_response() {
        // Empty script: the gateway asks for tool calls forever.
        let gateway = Arc::new(ScriptedGateway::new(Vec::new()));
        let response = runner(Arc::clone(&gateway))
            .with_max_rounds(3)
            .run(&TenantId::new("alice").unwrap(), request(), "en")
            .await;

        // The final response still carries its unexecuted tool calls.
        assert!(response.has_tool_calls());
        assert_eq!(gateway.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn gateway_error_response_ends_the_loop() {
        let gateway = Arc::new(ScriptedGateway::new(vec![ConversationResponse::error(
            "",
            "connection refused",
        )]));
        let response = runner(Arc::clone(&gateway))
            .run(&TenantId::new("alice").unwrap(), request(), "en")
            .await;

        assert_eq!(response.finish_reason, FinishReason::Error);
        assert_eq!(gateway.requests.lock().unwrap().len(), 1);
    }
}
