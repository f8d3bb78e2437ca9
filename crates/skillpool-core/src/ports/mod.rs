//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the skill surface expects from the
//! connection manager and the skill registry. They contain no implementation
//! details and use only domain types.
//!
//! # Design Rules
//!
//! - No process handles, pipes or file paths in any signature
//! - Session identity is always passed explicitly, never read from ambient state

pub mod mcp_error;
pub mod mcp_gateway;
pub mod skill_catalog;

pub use mcp_error::{McpError, McpErrorCategory};
pub use mcp_gateway::McpGateway;
pub use skill_catalog::SkillCatalog;
