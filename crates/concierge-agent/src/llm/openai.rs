//! OpenAI-compatible Chat Completions gateway.
//!
//! Targets the OpenAI API and compatible endpoints (Ollama, vLLM, Together).
//! Translation quirks live entirely in this module: assistant tool calls
//! become `function` entries with JSON-string arguments, tool results become
//! `tool`-role messages keyed by call id.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use concierge_tools::ToolDefinition;

use crate::error::{AgentError, Result};
use crate::llm::gateway::{Gateway, ModelInfo};
use crate::llm::types::{
    ConversationRequest, ConversationResponse, FinishReason, Message, Role, ToolCall, Usage,
};

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL including the version path (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
}

impl OpenAiConfig {
    /// Configuration for the hosted OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
        }
    }

    /// Configuration for a compatible endpoint at `base_url`.
    pub fn compatible(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

/// Gateway speaking the Chat Completions protocol.
pub struct OpenAiGateway {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiGateway {
    /// Create a gateway. Fails if no API key is configured.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: "openai".into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(AgentError::Http)?;

        Ok(Self { config, http })
    }

    fn encode_message(message: &Message) -> Value {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        let mut encoded = json!({ "role": role, "content": message.content });

        if !message.tool_calls.is_empty() {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            // The protocol wants arguments as a JSON string.
                            "arguments": Value::Object(call.arguments.clone()).to_string(),
                        }
                    })
                })
                .collect();
            encoded["tool_calls"] = Value::Array(calls);
        }
        if let Some(id) = &message.tool_call_id {
            encoded["tool_call_id"] = json!(id);
        }
        encoded
    }

    fn encode_tools(tools: &[ToolDefinition]) -> Value {
        Value::Array(
            tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect(),
        )
    }

    fn decode_tool_call(raw: &Value) -> Option<ToolCall> {
        let function = raw.get("function")?;
        let name = function.get("name")?.as_str()?.to_string();
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        // Arguments arrive as a JSON string; anything unparseable becomes an
        // empty map and the dispatcher reports the missing fields.
        let arguments = function
            .get("arguments")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_str::<Value>(s).ok())
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_else(Map::new);

        Some(ToolCall { id, name, arguments })
    }

    fn decode_response(
        request: &ConversationRequest,
        body: Value,
    ) -> Result<ConversationResponse> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| AgentError::InvalidResponse {
                reason: "no choices in completion".into(),
            })?;
        let raw_message = choice
            .get("message")
            .ok_or_else(|| AgentError::InvalidResponse {
                reason: "choice without message".into(),
            })?;

        let content = raw_message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let tool_calls: Vec<ToolCall> = raw_message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| calls.iter().filter_map(Self::decode_tool_call).collect())
            .unwrap_or_default();

        let finish_reason = match choice.get("finish_reason").and_then(Value::as_str) {
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("length") => FinishReason::Length,
            _ if !tool_calls.is_empty() => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        };

        let usage = body
            .get("usage")
            .map(|u| {
                let input = u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0);
                let output = u
                    .get("completion_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                Usage {
                    input,
                    output,
                    total: u
                        .get("total_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(input + output),
                }
            })
            .unwrap_or_default();

        let message = if tool_calls.is_empty() {
            Message::assistant(content)
        } else {
            let mut message = Message::assistant_tool_calls(tool_calls);
            message.content = content;
            message
        };

        Ok(ConversationResponse {
            id: body
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
            request_id: request.id.clone(),
            message,
            finish_reason,
            usage,
        })
    }

    async fn try_send(
        &self,
        request: &ConversationRequest,
        tools: &[ToolDefinition],
    ) -> Result<ConversationResponse> {
        let mut payload = json!({
            "model": request.model,
            "messages": request
                .messages
                .iter()
                .map(Self::encode_message)
                .collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            payload["tools"] = Self::encode_tools(tools);
        }
        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(stop) = &request.stop_sequence {
            payload["stop"] = json!([stop]);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::InvalidResponse {
                reason: format!("completion endpoint answered {status}: {body}"),
            });
        }

        let body: Value = response.json().await?;
        Self::decode_response(request, body)
    }
}

#[async_trait]
impl Gateway for OpenAiGateway {
    #[instrument(skip(self, request, tools), fields(request_id = %request.id, model = %request.model))]
    async fn send_request(
        &self,
        request: &ConversationRequest,
        tools: &[ToolDefinition],
    ) -> ConversationResponse {
        match self.try_send(request, tools).await {
            Ok(response) => {
                debug!(
                    finish_reason = ?response.finish_reason,
                    tool_calls = response.message.tool_calls.len(),
                    "completion received"
                );
                response
            }
            Err(e) => {
                warn!(error = %e, "completion failed");
                ConversationResponse::error(&request.id, e.to_string())
            }
        }
    }

    async fn available_models(&self) -> Result<Vec<ModelInfo>> {
        let body: Value = self
            .http
            .get(format!("{}/models", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let models = body
            .get("data")
            .and_then(Value::as_array)
            .map(|data| {
                data.iter()
                    .filter_map(|m| {
                        Some(ModelInfo {
                            id: m.get("id")?.as_str()?.to_string(),
                            owned_by: m
                                .get("owned_by")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
