//! Command normalization.
//!
//! Turns a [`ServerConfig`] into the literal parameters used to spawn a
//! server: executable, argument list, environment and working directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;
use skillpool_core::{McpError, ServerConfig};

use crate::env::{EnvProvider, SystemEnv, expand_env_with};

/// Canonical `(executable, args)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub executable: String,
    pub args: Vec<String>,
}

/// Normalize the two accepted `command` dialects.
///
/// - Array form: `argv[0]` is the executable, the rest are arguments in
///   order. A co-present `args` field is ignored.
/// - String form: arguments come from `args` when present.
///
/// Non-string elements are stringified (`3000` becomes `"3000"`).
pub fn normalize_command(config: &ServerConfig) -> Result<CommandSpec, McpError> {
    match &config.command {
        Value::Array(argv) => {
            let mut parts = argv.iter().map(coerce);
            let executable = parts.next().ok_or_else(|| {
                McpError::InvalidConfiguration("command array must not be empty".to_string())
            })?;
            if executable.trim().is_empty() {
                return Err(McpError::InvalidConfiguration(
                    "command array must start with an executable".to_string(),
                ));
            }
            Ok(CommandSpec {
                executable,
                args: parts.collect(),
            })
        }
        Value::String(executable) if !executable.trim().is_empty() => {
            let args = match &config.args {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items.iter().map(coerce).collect(),
                Some(_) => {
                    return Err(McpError::InvalidConfiguration(
                        "args must be an array".to_string(),
                    ));
                }
            };
            Ok(CommandSpec {
                executable: executable.clone(),
                args,
            })
        }
        _ => Err(McpError::InvalidConfiguration(
            "command must be a string or array".to_string(),
        )),
    }
}

impl CommandSpec {
    /// Executable and arguments joined by spaces, for logs and listings.
    pub fn display(&self) -> String {
        join_command(&self.executable, &self.args)
    }
}

fn join_command(executable: &str, args: &[String]) -> String {
    std::iter::once(executable)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Everything needed to spawn one server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub executable: String,
    pub args: Vec<String>,
    /// Expanded environment, layered over the inherited one at spawn.
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl LaunchSpec {
    /// Build a launch spec, expanding placeholders against the process environment.
    pub fn from_config(config: &ServerConfig) -> Result<Self, McpError> {
        Self::from_config_with(config, &SystemEnv)
    }

    /// Build a launch spec with an injected environment.
    pub fn from_config_with(
        config: &ServerConfig,
        env: &dyn EnvProvider,
    ) -> Result<Self, McpError> {
        if !config.is_stdio() {
            return Err(McpError::InvalidConfiguration(format!(
                "unsupported transport '{}', only stdio servers can be launched",
                config.transport.as_deref().unwrap_or_default()
            )));
        }

        let CommandSpec { executable, args } = normalize_command(config)?;

        Ok(Self {
            executable,
            args,
            env: expand_env_with(&config.environment, env),
            cwd: config.cwd.as_ref().map(PathBuf::from),
        })
    }

    /// `executable arg1 arg2` for logs and diagnostics.
    pub fn display_command(&self) -> String {
        join_command(&self.executable, &self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MockEnv;
    use serde_json::json;

    fn config(value: Value) -> ServerConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_array_form_splits_executable() {
        let spec = normalize_command(&config(json!({"command": ["npx", "-y", "@x/y"]}))).unwrap();
        assert_eq!(spec.executable, "npx");
        assert_eq!(spec.args, vec!["-y", "@x/y"]);
    }

    #[test]
    fn test_array_form_ignores_args_field() {
        let spec = normalize_command(&config(json!({
            "command": ["node", "server.js"],
            "args": ["--ignored"]
        })))
        .unwrap();
        assert_eq!(spec.args, vec!["server.js"]);
    }

    #[test]
    fn test_array_form_keeps_duplicates_in_order() {
        let spec =
            normalize_command(&config(json!({"command": ["x", "-v", "-v", "a", "-v"]}))).unwrap();
        assert_eq!(spec.args, vec!["-v", "-v", "a", "-v"]);
    }

    #[test]
    fn test_display_joins_executable_and_args() {
        let spec = normalize_command(&config(json!({
            "command": "npx",
            "args": ["-y", "@x/y", 3000]
        })))
        .unwrap();
        assert_eq!(spec.display(), "npx -y @x/y 3000");
    }

    #[test]
    fn test_string_form_without_args_is_empty() {
        let spec = normalize_command(&config(json!({"command": "mcp-server"}))).unwrap();
        assert_eq!(spec.executable, "mcp-server");
        assert!(spec.args.is_empty());
    }

    #[test]
    fn test_non_string_elements_are_stringified() {
        let spec = normalize_command(&config(json!({
            "command": "serve",
            "args": ["--port", 3000, true]
        })))
        .unwrap();
        assert_eq!(spec.args, vec!["--port", "3000", "true"]);

        let spec = normalize_command(&config(json!({"command": ["serve", 8080]}))).unwrap();
        assert_eq!(spec.args, vec!["8080"]);
    }

    #[test]
    fn test_missing_or_wrong_command_is_invalid() {
        for bad in [
            json!({}),
            json!({"command": null}),
            json!({"command": 42}),
            json!({"command": {"bin": "x"}}),
            json!({"command": ""}),
            json!({"command": []}),
        ] {
            let err = normalize_command(&config(bad.clone())).unwrap_err();
            assert!(
                matches!(err, McpError::InvalidConfiguration(_)),
                "{bad} gave {err:?}"
            );
        }

        let err = normalize_command(&config(json!({"command": true}))).unwrap_err();
        assert!(err.to_string().contains("command must be a string or array"));
    }

    #[test]
    fn test_string_args_must_be_array() {
        let err =
            normalize_command(&config(json!({"command": "x", "args": "-y"}))).unwrap_err();
        assert!(err.to_string().contains("args"));
    }

    #[test]
    fn test_launch_spec_expands_env() {
        let env = MockEnv::new().with_var("TOKEN", "secret");
        let cfg = ServerConfig::from_argv(["srv"])
            .with_env("API_KEY", "${TOKEN}")
            .with_cwd("/tmp");
        let spec = LaunchSpec::from_config_with(&cfg, &env).unwrap();
        assert_eq!(spec.env["API_KEY"], "secret");
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(spec.display_command(), "srv");
    }

    #[test]
    fn test_launch_spec_rejects_remote_transport() {
        let cfg = config(json!({"command": "x", "type": "sse"}));
        let err = LaunchSpec::from_config_with(&cfg, &MockEnv::new()).unwrap_err();
        assert!(matches!(err, McpError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("sse"));
    }
}
