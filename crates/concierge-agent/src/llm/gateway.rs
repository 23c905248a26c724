//! The gateway seam between the orchestrator and model providers.

use async_trait::async_trait;

use concierge_tools::ToolDefinition;

use crate::error::Result;
use crate::llm::types::{ConversationRequest, ConversationResponse};

/// A model available through a gateway.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    /// Provider-side model identifier.
    pub id: String,
    /// Owning organization, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

/// Transport to one model provider.
///
/// Gateways are transport only: they translate requests to the provider wire
/// format and back, and never interpret tool calls. [`send_request`] is
/// infallible by contract — a gateway that cannot complete a request answers
/// with a synthetic [`ConversationResponse::error`] so the conversation loop
/// has exactly one response shape to handle.
///
/// [`send_request`]: Gateway::send_request
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send one request, advertising `tools` to the model.
    async fn send_request(
        &self,
        request: &ConversationRequest,
        tools: &[ToolDefinition],
    ) -> ConversationResponse;

    /// List the models this gateway can reach.
    async fn available_models(&self) -> Result<Vec<ModelInfo>>;
}
