//! Error types for the tools crate.
//!
//! Handler groups surface failures as [`ToolError`]; the dispatcher converts
//! every variant into a structured [`crate::ToolOutcome::Failure`] before it
//! can cross the dispatch boundary.

use thiserror::Error;

/// Alias for `Result<T, ToolError>`.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Fixed error message for attempts to deactivate the management tool.
/// Caller-independent on purpose: the same text is returned no matter who
/// asks, including the management tool itself.
pub const PROTECTED_TOOL_MESSAGE: &str =
    "tool `manage_tools` is protected and cannot be deactivated";

/// Errors raised inside handler groups and the registry.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A required argument is missing or has the wrong shape.
    #[error("invalid arguments for `{tool_name}`: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    /// The handler started work but could not finish it.
    #[error("execution failed for `{tool_name}`: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    /// Attempt to deactivate the designated management tool.
    #[error("{PROTECTED_TOOL_MESSAGE}")]
    ProtectedTool,

    /// Storage layer failure.
    #[error("store error: {0}")]
    Store(#[from] concierge_store::StoreError),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Outbound HTTP request failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
