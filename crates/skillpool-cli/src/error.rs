//! CLI-specific error types and exit codes.

use skillpool_core::{McpErrorCategory, SettingsError};
use skillpool_skills::{InvokeError, SkillError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failure reported by a skill or MCP server.
    #[error("{0}")]
    Core(String),

    /// Malformed request.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (unreadable directory, missing working directory, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Settings or skill configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An MCP server could not be started or stopped responding.
    #[error("Process error: {0}")]
    Process(String),
}

impl CliError {
    /// Map error to an exit code (see sysexits.h).
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Core(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Process(_) => 71,  // EX_OSERR
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<SkillError> for CliError {
    fn from(err: SkillError) -> Self {
        match err {
            SkillError::NotFound { .. } => Self::Arguments(err.to_string()),
            SkillError::Io { .. } | SkillError::Discovery(_) => Self::Io(err.to_string()),
            SkillError::InvalidFrontMatter { .. } | SkillError::InvalidServerConfig { .. } => {
                Self::Config(err.to_string())
            }
        }
    }
}

impl From<InvokeError> for CliError {
    fn from(err: InvokeError) -> Self {
        if err.is_usage_error() {
            return Self::Arguments(err.to_string());
        }
        match &err {
            InvokeError::Operation { source, .. } => {
                let mut message = err.to_string();
                if source.is_retryable() {
                    message.push_str(" (the failure may be transient; retrying may succeed)");
                }
                match source.category() {
                    McpErrorCategory::Configuration => Self::Config(message),
                    McpErrorCategory::Process | McpErrorCategory::Protocol => {
                        Self::Process(message)
                    }
                    McpErrorCategory::Capability => Self::Core(message),
                }
            }
            _ => Self::Core(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
