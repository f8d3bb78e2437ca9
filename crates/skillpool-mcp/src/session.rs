//! The seam between the pool and a transport.
//!
//! The manager only sees [`ServerSession`] and [`Connector`], so pooling can
//! be tested with in-memory sessions and no processes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use skillpool_core::{McpError, McpPromptInfo, McpResourceInfo, McpToolInfo};

use crate::command::LaunchSpec;

/// Lifecycle of one server connection.
///
/// `Uninitialized → Connecting → Ready → Closing → Closed`. A failed connect
/// goes straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Ready,
    Closing,
    Closed,
}

impl ConnectionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One live server connection.
#[async_trait]
pub trait ServerSession: Send + Sync {
    fn state(&self) -> ConnectionState;

    fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpError>;

    async fn list_resources(&self) -> Result<Vec<McpResourceInfo>, McpError>;

    async fn list_prompts(&self) -> Result<Vec<McpPromptInfo>, McpError>;

    /// Returns the server's result payload verbatim.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError>;

    async fn read_resource(&self, uri: &str) -> Result<Value, McpError>;

    async fn get_prompt(
        &self,
        name: &str,
        arguments: BTreeMap<String, String>,
    ) -> Result<Value, McpError>;

    /// Shut the server down. Safe to call more than once.
    async fn close(&self);
}

/// Creates ready sessions from launch specs.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Spawn and handshake. The returned session is `Ready`.
    async fn connect(
        &self,
        server_name: &str,
        spec: LaunchSpec,
    ) -> Result<Arc<dyn ServerSession>, McpError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Ready.to_string(), "ready");
        assert_eq!(ConnectionState::Closing.as_str(), "closing");
    }
}
