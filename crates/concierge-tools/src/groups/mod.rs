//! Handler groups.
//!
//! Each group owns a disjoint, statically declared set of tool names and
//! shares the dispatcher's result contract. Groups may return [`ToolError`]
//! freely; the dispatcher converts every error into a structured failure
//! before it reaches the conversation.

use async_trait::async_trait;

use concierge_store::TenantId;

use crate::definition::ToolDefinition;
use crate::error::Result;
use crate::outcome::{ToolArguments, ToolOutcome};

pub mod diffusion;
pub mod files;
pub mod image;
pub mod memory;
pub mod tool_mgmt;
pub mod web_fetch;

/// A group of related tools behind one dispatcher route.
#[async_trait]
pub trait ToolGroup: Send + Sync {
    /// Short identifier for logging (e.g. `"files"`).
    fn group_name(&self) -> &str;

    /// Definitions of every tool this group owns. Names must be globally
    /// unique across all groups; the dispatcher rejects duplicates at
    /// startup.
    fn tool_definitions(&self) -> Vec<ToolDefinition>;

    /// Execute one of this group's tools. The dispatcher guarantees `name`
    /// is a member of [`tool_definitions`](Self::tool_definitions) and that
    /// `arguments` already carries the injected `language` entry.
    async fn execute(
        &self,
        tenant: &TenantId,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome>;
}
