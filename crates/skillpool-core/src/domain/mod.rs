//! Domain types for skillpool.
//!
//! Pure data with serde support and no infrastructure dependencies.

pub mod mcp;
pub mod session;
pub mod skill;

pub use mcp::{
    ConnectionKey, McpCallInfo, McpPromptArgument, McpPromptInfo, McpResourceInfo,
    McpServerContext, McpTimeouts, McpToolInfo, ServerConfig,
};
pub use session::SessionId;
pub use skill::{Skill, SkillSource};
