//! MCP server domain types.
//!
//! `ServerConfig` mirrors what skill authors write, so `command` and `args`
//! stay as raw JSON until the command normalizer interprets them. Capability
//! descriptors are loosely typed: the fields used for rendering are typed,
//! everything else the server sends is kept in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::session::SessionId;

/// Transports accepted for a stdio server. Absent `type` means stdio.
const STDIO_TRANSPORTS: &[&str] = &["stdio", "local"];

/// Declarative description of one MCP server, as declared by a skill.
///
/// Two dialects are accepted for the launch command:
///
/// ```json
/// { "command": ["npx", "-y", "@x/y"] }
/// { "command": "npx", "args": ["-y", "@x/y"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Executable (string form) or full argv (array form).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub command: Value,

    /// Arguments for the string form. Ignored when `command` is an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,

    /// Environment for the child. Values may contain `${VAR}` placeholders.
    #[serde(default, alias = "env", skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    /// Transport name (`stdio` when absent).
    #[serde(
        default,
        rename = "type",
        alias = "transport",
        skip_serializing_if = "Option::is_none"
    )]
    pub transport: Option<String>,

    /// Working directory for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl ServerConfig {
    /// Array-form configuration: `argv[0]` is the executable.
    pub fn from_argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: Value::Array(argv.into_iter().map(|s| Value::String(s.into())).collect()),
            ..Self::default()
        }
    }

    /// String-form configuration with a separate argument list.
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: Value::String(command.into()),
            args: Some(Value::Array(args.into_iter().map(Value::String).collect())),
            ..Self::default()
        }
    }

    /// Add an environment entry.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Whether this config describes a stdio subprocess server.
    pub fn is_stdio(&self) -> bool {
        self.transport.as_deref().is_none_or(|t| {
            STDIO_TRANSPORTS
                .iter()
                .any(|accepted| t.eq_ignore_ascii_case(accepted))
        })
    }
}

/// Bounds applied to every suspension point of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McpTimeouts {
    /// Spawn through `initialize` response.
    pub handshake: Duration,
    /// One request/response round trip.
    pub request: Duration,
    /// Wait for voluntary exit before the process is killed.
    pub shutdown_grace: Duration,
}

impl Default for McpTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(30),
            request: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Pooling identity: one live connection per (session, server name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    pub session: SessionId,
    pub server: String,
}

impl ConnectionKey {
    pub fn new(session: SessionId, server: impl Into<String>) -> Self {
        Self {
            session,
            server: server.into(),
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session, self.server)
    }
}

/// Who is calling and for which server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpCallInfo {
    pub server_name: String,
    pub skill_name: String,
    pub session_id: SessionId,
}

impl McpCallInfo {
    pub fn new(
        server_name: impl Into<String>,
        skill_name: impl Into<String>,
        session_id: SessionId,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            skill_name: skill_name.into(),
            session_id,
        }
    }

    /// The pool key this call resolves to.
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey::new(self.session_id.clone(), self.server_name.clone())
    }
}

/// The declaring skill's view of a server.
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerContext {
    pub config: ServerConfig,
    pub skill_name: String,
}

impl McpServerContext {
    pub fn new(config: ServerConfig, skill_name: impl Into<String>) -> Self {
        Self {
            config,
            skill_name: skill_name.into(),
        }
    }
}

/// A tool from `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        rename = "inputSchema",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_schema: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A resource from `resources/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpResourceInfo {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A prompt from `prompts/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpPromptInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<McpPromptArgument>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One declared prompt argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpPromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}
