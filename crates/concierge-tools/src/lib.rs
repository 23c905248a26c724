//! Tool registry, handler groups, and the dispatcher that routes model
//! tool calls to them.
//!
//! The conversation loop in `concierge-agent` only ever talks to
//! [`ToolDispatcher`]: it advertises the catalog via
//! [`ToolDispatcher::tool_definitions`] and executes calls via
//! [`ToolDispatcher::execute_tool`], which converts every error into a
//! structured failure outcome.

pub mod args;
pub mod definition;
pub mod dispatcher;
pub mod error;
pub mod groups;
pub mod outcome;
pub mod qr;
pub mod registry;

pub use definition::ToolDefinition;
pub use dispatcher::ToolDispatcher;
pub use error::{Result, ToolError, PROTECTED_TOOL_MESSAGE};
pub use groups::ToolGroup;
pub use outcome::{Artifact, ToolArguments, ToolOutcome};
pub use qr::PAYMENT_QR_TOOL;
pub use registry::{ToolRegistry, MANAGEMENT_TOOL};
