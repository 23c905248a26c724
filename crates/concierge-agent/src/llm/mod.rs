//! Gateway integration layer.
//!
//! - [`types`] — provider-agnostic messages, requests, and responses.
//! - [`gateway`] — the [`Gateway`](gateway::Gateway) transport trait.
//! - [`openai`] — Chat Completions implementation for OpenAI-compatible
//!   endpoints.

pub mod gateway;
pub mod openai;
pub mod types;

pub use gateway::{Gateway, ModelInfo};
pub use openai::{OpenAiConfig, OpenAiGateway};
pub use types::{
    ConversationRequest, ConversationResponse, FinishReason, Message, Role, ToolCall, Usage,
};
