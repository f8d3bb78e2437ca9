//! JSON-RPC 2.0 framing for MCP over stdio.
//!
//! Messages are single-line JSON documents separated by `\n`.
//! Reference: <https://spec.modelcontextprotocol.io/>

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use skillpool_core::McpError;

pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
}

pub mod error_codes {
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// MCP: resource not found.
    pub const RESOURCE_NOT_FOUND: i64 = -32002;
}

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    pub const fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl JsonRpcResponse {
    /// The result payload, or the server error mapped onto [`McpError`].
    ///
    /// A response carrying neither a result nor an error is malformed.
    pub fn into_result(self) -> Result<Value, McpError> {
        match (self.error, self.result) {
            (Some(error), _) => Err(map_server_error(error)),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(McpError::ProtocolError(format!(
                "response {} has neither result nor error",
                self.id
            ))),
        }
    }
}

/// Classify a server-reported error.
///
/// "Does not exist" reports become `UnknownCapability`; everything else is
/// passed through as `InvocationError` with the server's code and message.
pub fn map_server_error(error: JsonRpcError) -> McpError {
    let lowered = error.message.to_lowercase();
    let not_found = error.code == error_codes::RESOURCE_NOT_FOUND
        || (error.code != error_codes::METHOD_NOT_FOUND
            && (lowered.contains("unknown") || lowered.contains("not found")));

    if not_found {
        McpError::UnknownCapability(error.message)
    } else {
        McpError::InvocationError {
            code: error.code,
            message: error.message,
        }
    }
}

/// One line read from the server.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Answer to one of our requests.
    Response(JsonRpcResponse),
    /// Server-initiated notification (no id).
    Notification { method: String },
    /// Server-initiated request that expects an answer.
    Request { id: Value, method: String },
}

impl ServerMessage {
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        let raw: Value = serde_json::from_str(line)?;
        let method = raw.get("method").and_then(Value::as_str).map(str::to_owned);
        let id = raw.get("id").filter(|id| !id.is_null()).cloned();

        Ok(match (method, id) {
            (Some(method), Some(id)) => Self::Request { id, method },
            (Some(method), None) => Self::Notification { method },
            (None, _) => Self::Response(serde_json::from_value(raw)?),
        })
    }
}

/// Our reply to a server-initiated request.
///
/// `ping` gets an empty result; anything else is not supported by this client.
pub fn reply_to_server_request(id: Value, method: &str) -> Value {
    if method == methods::PING {
        json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": {}})
    } else {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "error": {
                "code": error_codes::METHOD_NOT_FOUND,
                "message": format!("Method not supported by client: {method}")
            }
        })
    }
}

/// `initialize` params.
pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "skillpool",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Capabilities the server advertised in its `initialize` result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerCapabilities {
    pub tools: bool,
    pub resources: bool,
    pub prompts: bool,
}

impl ServerCapabilities {
    /// Read the `capabilities` object of an `initialize` result.
    ///
    /// A result without a `capabilities` object advertises everything, so
    /// discovery is attempted rather than silently skipped.
    pub fn from_initialize(result: &Value) -> Self {
        match result.get("capabilities").and_then(Value::as_object) {
            Some(caps) => Self {
                tools: caps.contains_key("tools"),
                resources: caps.contains_key("resources"),
                prompts: caps.contains_key("prompts"),
            },
            None => Self {
                tools: true,
                resources: true,
                prompts: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new(7, methods::TOOLS_LIST, None);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}));
    }

    #[test]
    fn test_notification_has_no_id() {
        let json = serde_json::to_value(JsonRpcNotification::new(methods::INITIALIZED, None))
            .unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["method"], "notifications/initialized");
    }

    #[test]
    fn test_classifies_incoming_lines() {
        let resp = ServerMessage::from_line(r#"{"jsonrpc":"2.0","id":3,"result":{}}"#).unwrap();
        assert!(matches!(resp, ServerMessage::Response(r) if r.id == json!(3)));

        let notif = ServerMessage::from_line(
            r#"{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}"#,
        )
        .unwrap();
        assert!(matches!(notif, ServerMessage::Notification { .. }));

        let ping = ServerMessage::from_line(r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#)
            .unwrap();
        assert!(matches!(ping, ServerMessage::Request { method, .. } if method == "ping"));

        assert!(ServerMessage::from_line("not json").is_err());
    }

    #[test]
    fn test_ping_reply_and_unsupported_request() {
        let pong = reply_to_server_request(json!(1), "ping");
        assert_eq!(pong["result"], json!({}));

        let refused = reply_to_server_request(json!(2), "sampling/createMessage");
        assert_eq!(refused["error"]["code"], json!(error_codes::METHOD_NOT_FOUND));
    }

    #[test]
    fn test_response_without_result_or_error_is_malformed() {
        let ServerMessage::Response(empty) =
            ServerMessage::from_line(r#"{"jsonrpc":"2.0","id":4}"#).unwrap()
        else {
            panic!("expected a response");
        };
        assert!(matches!(empty.into_result(), Err(McpError::ProtocolError(_))));

        let ServerMessage::Response(ok) =
            ServerMessage::from_line(r#"{"jsonrpc":"2.0","id":5,"result":{"tools":[]}}"#).unwrap()
        else {
            panic!("expected a response");
        };
        assert_eq!(ok.into_result().unwrap(), json!({"tools": []}));
    }

    #[test]
    fn test_error_mapping() {
        let unknown = map_server_error(JsonRpcError {
            code: -32602,
            message: "Unknown tool: nope".to_string(),
        });
        assert_eq!(unknown, McpError::UnknownCapability("Unknown tool: nope".to_string()));

        let missing = map_server_error(JsonRpcError {
            code: error_codes::RESOURCE_NOT_FOUND,
            message: "gone".to_string(),
        });
        assert!(matches!(missing, McpError::UnknownCapability(_)));

        let failure = map_server_error(JsonRpcError {
            code: -32000,
            message: "rate limited".to_string(),
        });
        assert_eq!(
            failure,
            McpError::InvocationError {
                code: -32000,
                message: "rate limited".to_string()
            }
        );

        let unsupported = map_server_error(JsonRpcError {
            code: error_codes::METHOD_NOT_FOUND,
            message: "Method not found".to_string(),
        });
        assert!(matches!(unsupported, McpError::InvocationError { .. }));
    }

    #[test]
    fn test_capabilities_from_initialize() {
        let caps =
            ServerCapabilities::from_initialize(&json!({"capabilities": {"tools": {}}}));
        assert!(caps.tools);
        assert!(!caps.resources);
        assert!(!caps.prompts);

        let all = ServerCapabilities::from_initialize(&json!({"protocolVersion": "x"}));
        assert!(all.tools && all.resources && all.prompts);
    }
}
