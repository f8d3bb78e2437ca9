//! MCP error taxonomy.
//!
//! Every variant carries plain strings so the error is `Clone`: one failed
//! lazy connect is observed by every caller that was waiting on it.

use thiserror::Error;

/// Failures surfaced by the connection manager and its connections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum McpError {
    /// Malformed `command`, `args` or transport. The message names the field.
    #[error("Invalid MCP server configuration: {0}")]
    InvalidConfiguration(String),

    /// Executable missing or not launchable.
    #[error("Failed to spawn MCP server process: {0}")]
    SpawnFailure(String),

    /// Process started but `initialize` did not complete.
    #[error("MCP handshake failed: {0}")]
    HandshakeFailure(String),

    /// A request exceeded its bound. The connection stays usable.
    #[error("Timeout waiting for MCP server response to '{method}' after {after_ms}ms")]
    Timeout { method: String, after_ms: u64 },

    /// Malformed or unexpected response framing.
    #[error("MCP protocol error: {0}")]
    ProtocolError(String),

    /// The server reported that the named tool, resource or prompt does not exist.
    #[error("Unknown MCP capability: {0}")]
    UnknownCapability(String),

    /// Any other server-reported failure, verbatim.
    #[error("MCP server returned error: code={code}, message={message}")]
    InvocationError { code: i64, message: String },

    /// The connection was closed before or while the request was in flight.
    #[error("MCP connection closed")]
    Closed,

    /// Lazy connect failed for `server` declared by `skill`.
    #[error("MCP server '{server}' from skill '{skill}' could not be started: {source}")]
    Connect {
        server: String,
        skill: String,
        source: Box<McpError>,
    },
}

/// Categories of MCP errors for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpErrorCategory {
    /// Configuration error.
    Configuration,
    /// Server process lifecycle error.
    Process,
    /// Protocol communication error, including timeouts.
    Protocol,
    /// Server-reported capability error.
    Capability,
}

impl McpError {
    /// Wrap a lazy-connect failure with the server and skill it belongs to.
    pub fn connect(server: impl Into<String>, skill: impl Into<String>, source: Self) -> Self {
        Self::Connect {
            server: server.into(),
            skill: skill.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through `Connect` wrappers.
    pub fn root(&self) -> &Self {
        match self {
            Self::Connect { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn category(&self) -> McpErrorCategory {
        match self.root() {
            Self::InvalidConfiguration(_) => McpErrorCategory::Configuration,
            Self::SpawnFailure(_)
            | Self::HandshakeFailure(_)
            | Self::Closed
            | Self::Connect { .. } => McpErrorCategory::Process,
            Self::Timeout { .. } | Self::ProtocolError(_) => McpErrorCategory::Protocol,
            Self::UnknownCapability(_) | Self::InvocationError { .. } => {
                McpErrorCategory::Capability
            }
        }
    }

    /// Whether a later call for the same key may succeed without a config change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Self::SpawnFailure(_)
                | Self::HandshakeFailure(_)
                | Self::Timeout { .. }
                | Self::ProtocolError(_)
                | Self::Closed
        )
    }

    /// Whether the connection that produced this error should be replaced.
    pub fn poisons_connection(&self) -> bool {
        matches!(self.root(), Self::ProtocolError(_) | Self::Closed)
    }
}
