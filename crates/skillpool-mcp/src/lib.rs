#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod client;
pub mod command;
pub mod env;
pub mod manager;
pub(crate) mod path;
pub(crate) mod protocol;
pub mod session;
pub(crate) mod shutdown;

// Re-export domain types from core for convenience
pub use skillpool_core::{
    ConnectionKey, McpCallInfo, McpError, McpGateway, McpServerContext, McpTimeouts,
    ServerConfig, SessionId,
};

// Re-export this crate's public types
pub use client::{StdioConnection, StdioConnector};
pub use command::{CommandSpec, LaunchSpec, normalize_command};
pub use env::{EnvProvider, SystemEnv, expand_env, expand_env_with};
pub use manager::McpManager;
pub use session::{ConnectionState, Connector, ServerSession};

// Used by the integration tests only
#[cfg(test)]
use tempfile as _;
