//! Sibling `mcp.json` server files.
//!
//! Three shapes are recognized:
//!
//! ```text
//! { "mcpServers": { "github": { "command": "npx", ... } } }
//! { "mcp":        { "github": { "command": "npx", ... } } }
//! { "github": { "command": "npx", ... } }
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use skillpool_core::ServerConfig;

const WRAPPER_KEYS: [&str; 2] = ["mcpServers", "mcp"];

/// Parse the contents of an `mcp.json` file into a server map.
pub fn parse_server_file(text: &str) -> Result<BTreeMap<String, ServerConfig>, String> {
    let root: Value = serde_json::from_str(text).map_err(|e| format!("Invalid JSON: {e}"))?;
    let Value::Object(root) = root else {
        return Err("expected a JSON object".to_string());
    };
    parse_server_map(&root)
}

/// Pick the server mapping out of a parsed file object.
pub fn parse_server_map(
    root: &Map<String, Value>,
) -> Result<BTreeMap<String, ServerConfig>, String> {
    if root.is_empty() {
        return Ok(BTreeMap::new());
    }

    for key in WRAPPER_KEYS {
        if let Some(inner) = root.get(key) {
            let Value::Object(servers) = inner else {
                return Err(format!("'{key}' must be an object"));
            };
            return servers_from(servers);
        }
    }

    let is_bare_map = root
        .values()
        .all(|value| value.as_object().is_some_and(|obj| obj.contains_key("command")));
    if is_bare_map {
        return servers_from(root);
    }

    Err("expected 'mcpServers', 'mcp', or a map of servers that each declare 'command'".to_string())
}

fn servers_from(servers: &Map<String, Value>) -> Result<BTreeMap<String, ServerConfig>, String> {
    servers
        .iter()
        .map(|(name, value)| {
            let config =
                ServerConfig::deserialize(value).map_err(|e| format!("server '{name}': {e}"))?;
            Ok((name.clone(), config))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mcp_servers_wrapper() {
        let servers = parse_server_file(
            r#"{"mcpServers": {"github": {"command": "npx", "args": ["-y", "gh"], "env": {"T": "${T}"}}}}"#,
        )
        .unwrap();
        let github = &servers["github"];
        assert_eq!(github.command, json!("npx"));
        assert_eq!(github.args, Some(json!(["-y", "gh"])));
        assert_eq!(github.environment["T"], "${T}");
    }

    #[test]
    fn test_mcp_wrapper_and_bare_map() {
        let wrapped = parse_server_file(r#"{"mcp": {"a": {"command": ["srv", "--stdio"]}}}"#)
            .unwrap();
        assert!(wrapped.contains_key("a"));

        let bare = parse_server_file(
            r#"{"a": {"command": "one"}, "b": {"command": ["two"], "type": "stdio"}}"#,
        )
        .unwrap();
        assert_eq!(bare.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_object_has_no_servers() {
        assert!(parse_server_file("{}").unwrap().is_empty());
    }

    #[test]
    fn test_unrecognized_shape() {
        let err = parse_server_file(r#"{"servers": {"a": {"command": "x"}}}"#).unwrap_err();
        assert!(err.contains("mcpServers"));

        assert!(parse_server_file("[1, 2]").is_err());
        assert!(parse_server_file("{not json").unwrap_err().starts_with("Invalid JSON"));
    }

    #[test]
    fn test_bad_server_entry_names_server() {
        let err =
            parse_server_file(r#"{"mcpServers": {"broken": {"env": "A=1"}}}"#).unwrap_err();
        assert!(err.contains("'broken'"), "{err}");
    }
}
