//! MCP gateway trait definition.
//!
//! The gateway is the single entry point the skill surface uses to talk to
//! MCP servers. Implementations own connection pooling: callers never hold a
//! connection, they describe which one they want on every call.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use super::McpError;
use crate::domain::{
    McpCallInfo, McpPromptInfo, McpResourceInfo, McpServerContext, McpToolInfo, SessionId,
};

/// Session-scoped access to MCP server capabilities.
///
/// Every operation resolves the connection for
/// `(info.session_id, info.server_name)`, establishing it from
/// `context.config` on first use.
///
/// # Errors
///
/// Lazy-connect failures are returned as [`McpError::Connect`]. Failures of
/// the request itself are returned unchanged.
#[async_trait]
pub trait McpGateway: Send + Sync {
    /// List the server's tools.
    async fn list_tools(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
    ) -> Result<Vec<McpToolInfo>, McpError>;

    /// List the server's resources.
    async fn list_resources(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
    ) -> Result<Vec<McpResourceInfo>, McpError>;

    /// List the server's prompts.
    async fn list_prompts(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
    ) -> Result<Vec<McpPromptInfo>, McpError>;

    /// Invoke a tool. The result payload is returned verbatim.
    async fn call_tool(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
        name: &str,
        arguments: Value,
    ) -> Result<Value, McpError>;

    /// Read a resource by URI.
    async fn read_resource(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
        uri: &str,
    ) -> Result<Value, McpError>;

    /// Render a prompt with string arguments.
    async fn get_prompt(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
        name: &str,
        arguments: BTreeMap<String, String>,
    ) -> Result<Value, McpError>;

    /// Close and forget every connection of `session`. Never fails.
    async fn disconnect_session(&self, session: &SessionId);
}
