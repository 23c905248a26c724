//! Error types for the agent crate.

use thiserror::Error;

/// Alias for `Result<T, AgentError>`.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors raised by the conversation loop, gateways, and the job queue.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured for the given provider.
    #[error("no API key configured for provider `{provider}`")]
    MissingApiKey { provider: String },

    /// The gateway endpoint answered, but not with anything usable.
    #[error("gateway returned an invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// No processor is registered for a job kind.
    #[error("no processor registered for job kind `{kind}`")]
    UnknownJobKind { kind: String },

    /// Outbound HTTP request failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage layer failure.
    #[error("store error: {0}")]
    Store(#[from] concierge_store::StoreError),

    /// Tool layer failure.
    #[error("tool error: {0}")]
    Tool(#[from] concierge_tools::ToolError),
}
