//! Conversation orchestration and asynchronous job handling.
//!
//! The crate has three pillars:
//!
//! - [`llm`] — gateway transports and the provider-agnostic message types.
//! - [`conversation`] — the bounded round-trip loop driving one turn.
//! - [`jobs`] — the job queue, processors, and the worker poll cycle.

pub mod conversation;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod notify;

pub use conversation::{ConversationRunner, DEFAULT_MAX_ROUNDS};
pub use error::{AgentError, Result};
pub use jobs::{run_poll_cycle, JobProcessor, JobQueue};
pub use llm::{
    ConversationRequest, ConversationResponse, FinishReason, Gateway, Message, ModelInfo,
    OpenAiConfig, OpenAiGateway, Role, ToolCall, Usage,
};
pub use notify::{NotificationSink, Severity, TracingSink};
