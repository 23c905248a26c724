//! Core types for gateway interaction.
//!
//! These types are provider-agnostic; the [`super::openai`] module translates
//! them into the provider wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use concierge_tools::ToolArguments;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the human user.
    User,
    /// Output from the model.
    Assistant,
    /// Result of a tool invocation, fed back to the model.
    Tool,
}

/// A single message in a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The textual content of the message.
    ///
    /// For [`Role::Tool`] messages this carries the serialized tool result.
    /// For [`Role::Assistant`] messages that only contain tool calls it may
    /// be empty.
    #[serde(default)]
    pub content: String,

    /// Tool calls requested by the assistant (only present when
    /// `role == Role::Assistant`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Identifies which tool call this message answers (only present when
    /// `role == Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Create a tool result message answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned by the model for correlating results.
    pub id: String,

    /// Name of the tool to invoke.
    pub name: String,

    /// Flat argument map, as the dispatcher expects it.
    pub arguments: ToolArguments,
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// A full conversation request to send through a gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRequest {
    /// Unique request identifier.
    pub id: String,

    /// The model identifier to use.
    pub model: String,

    /// The conversation history, oldest first.
    pub messages: Vec<Message>,

    /// Maximum tokens the model may generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Optional stop sequence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,

    /// When this request was created.
    pub created_at: DateTime<Utc>,
}

impl ConversationRequest {
    /// Create a request with a fresh id and the given history.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            stop_sequence: None,
            created_at: Utc::now(),
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model finished its answer.
    Stop,
    /// The model wants tool results before continuing.
    ToolCalls,
    /// The token budget was exhausted.
    Length,
    /// The gateway could not complete the request; the message content
    /// carries a human-readable explanation.
    Error,
}

/// Token accounting for one round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub input: u64,
    /// Tokens generated.
    pub output: u64,
    /// Input plus output.
    pub total: u64,
}

/// The gateway's answer to one [`ConversationRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    /// Unique response identifier.
    pub id: String,

    /// The [`ConversationRequest::id`] this answers.
    pub request_id: String,

    /// The assistant message produced by the model.
    pub message: Message,

    /// Why generation stopped.
    pub finish_reason: FinishReason,

    /// Token accounting, zeroed when the provider reports none.
    pub usage: Usage,
}

impl ConversationResponse {
    /// Synthetic response for a request the gateway could not complete.
    ///
    /// Transport and protocol failures are folded into the conversation this
    /// way instead of surfacing as errors, so the orchestrator has exactly
    /// one response shape to deal with.
    pub fn error(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            request_id: request_id.into(),
            message: Message::assistant(reason.into()),
            finish_reason: FinishReason::Error,
            usage: Usage::default(),
        }
    }

    /// Whether the model requested tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
