//! Tool definitions exposed to the model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes one tool to the model: what it is called, what it does, and
/// the JSON Schema of its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (case-sensitive, globally unique across groups).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
