//! Errors of the skill layer.

use std::path::PathBuf;

use skillpool_core::McpError;
use thiserror::Error;

/// Discovery, parsing and lookup failures.
#[derive(Debug, Clone, Error)]
pub enum SkillError {
    #[error("Skill '{name}' not found. Available skills: {available}")]
    NotFound { name: String, available: String },

    #[error("Failed to read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Invalid front matter in {}: {message}", path.display())]
    InvalidFrontMatter { path: PathBuf, message: String },

    #[error("Invalid MCP server config in {}: {message}", path.display())]
    InvalidServerConfig { path: PathBuf, message: String },

    #[error("Skill discovery task failed: {0}")]
    Discovery(String),
}

/// User-facing failures of the `invoke` operation.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("no operation specified: set exactly one of tool_name, resource_uri or prompt_name")]
    NoOperation,

    #[error("multiple operations specified: set exactly one of tool_name, resource_uri or prompt_name")]
    MultipleOperations,

    #[error("invalid JSON arguments: {text}")]
    InvalidArguments { text: String, message: String },

    #[error("invalid filter pattern '{pattern}': {message}")]
    InvalidFilter { pattern: String, message: String },

    #[error("MCP server '{server}' not found. Known servers: {known}")]
    UnknownServer { server: String, known: String },

    #[error("{kind} '{target}' not found on MCP server '{server}'. Available: {available}")]
    UnknownCapability {
        server: String,
        kind: &'static str,
        target: String,
        available: String,
    },

    #[error("{kind} '{target}' on MCP server '{server}' failed: {source}")]
    Operation {
        server: String,
        kind: &'static str,
        target: String,
        source: McpError,
    },
}

impl InvokeError {
    /// Whether the request itself was malformed, as opposed to a server failure.
    pub const fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::NoOperation
                | Self::MultipleOperations
                | Self::InvalidArguments { .. }
                | Self::InvalidFilter { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_names_everything() {
        let err = InvokeError::Operation {
            server: "github".to_string(),
            kind: "tool",
            target: "create_issue".to_string(),
            source: McpError::Closed,
        };
        let message = err.to_string();
        assert!(message.contains("tool 'create_issue'"));
        assert!(message.contains("'github'"));
        assert!(!err.is_usage_error());
    }

    #[test]
    fn test_argument_error_quotes_text() {
        let err = InvokeError::InvalidArguments {
            text: "{oops".to_string(),
            message: "EOF".to_string(),
        };
        assert_eq!(err.to_string(), "invalid JSON arguments: {oops");
        assert!(err.is_usage_error());
    }
}
