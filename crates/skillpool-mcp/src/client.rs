//! MCP client over stdio.
//!
//! One [`StdioConnection`] owns one child process. Requests are written as
//! JSON lines to the child's stdin; a reader task routes each response line
//! to the waiting caller by request id, so concurrent calls on the same
//! connection are multiplexed rather than serialized.
//!
//! Reference: <https://spec.modelcontextprotocol.io/>

use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use skillpool_core::{McpError, McpPromptInfo, McpResourceInfo, McpTimeouts, McpToolInfo};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::time::timeout;

use crate::command::LaunchSpec;
use crate::path::{build_effective_path, validate_working_dir};
use crate::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerMessage,
    initialize_params, methods, reply_to_server_request,
};
use crate::session::{ConnectionState, Connector, ServerSession};
use crate::shutdown::shutdown_child;

/// Upper bound on `nextCursor` pages followed for one list call.
const MAX_LIST_PAGES: usize = 64;

type ResponseSender = oneshot::Sender<Result<JsonRpcResponse, McpError>>;

/// State shared between the connection and its reader task.
struct Inner {
    name: String,
    writer: Mutex<Option<BufWriter<ChildStdin>>>,
    pending: StdMutex<HashMap<u64, ResponseSender>>,
    next_id: AtomicU64,
    state: StdMutex<ConnectionState>,
}

impl Inner {
    fn new(name: &str, stdin: ChildStdin) -> Self {
        Self {
            name: name.to_string(),
            writer: Mutex::new(Some(BufWriter::new(stdin))),
            pending: StdMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            state: StdMutex::new(ConnectionState::Uninitialized),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        tracing::trace!(server = %self.name, from = %previous, to = %next, "Connection state");
        *state = next;
    }

    fn is_accepting(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Ready
        )
    }

    /// Fail every in-flight request with `error`.
    fn fail_pending(&self, error: &McpError) {
        let drained: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, sender) in drained {
            let _ = sender.send(Err(error.clone()));
        }
    }

    fn complete(&self, response: JsonRpcResponse) {
        let Some(id) = response.id.as_u64() else {
            tracing::warn!(server = %self.name, id = %response.id, "Response with unexpected id");
            return;
        };
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match sender {
            Some(sender) => {
                let _ = sender.send(Ok(response));
            }
            // Caller timed out and stopped waiting.
            None => tracing::debug!(server = %self.name, id, "Discarding late response"),
        }
    }

    async fn write_line(&self, line: &str) -> Result<(), McpError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(McpError::Closed)?;

        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        result.map_err(|e| {
            tracing::debug!(server = %self.name, error = %e, "Write to MCP server failed");
            McpError::Closed
        })
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))
            .map_err(|e| McpError::ProtocolError(e.to_string()))?;
        self.write_line(&line).await
    }

    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        bound: Duration,
    ) -> Result<Value, McpError> {
        if !self.is_accepting() {
            return Err(McpError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))
            .map_err(|e| McpError::ProtocolError(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        let _guard = PendingGuard { inner: self, id };

        self.write_line(&line).await?;

        match timeout(bound, rx).await {
            Ok(Ok(response)) => response?.into_result(),
            Ok(Err(_)) => Err(McpError::Closed),
            Err(_) => Err(McpError::Timeout {
                method: method.to_string(),
                after_ms: u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

/// Removes a request id from the pending map when the caller stops waiting.
struct PendingGuard<'a> {
    inner: &'a Inner,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// A live connection to one stdio MCP server.
pub struct StdioConnection {
    inner: Arc<Inner>,
    child: Mutex<Option<Child>>,
    capabilities: ServerCapabilities,
    timeouts: McpTimeouts,
}

impl StdioConnection {
    /// Spawn the server and complete the `initialize` handshake.
    ///
    /// On handshake failure the child is shut down before returning.
    pub async fn connect(
        name: &str,
        spec: LaunchSpec,
        timeouts: McpTimeouts,
    ) -> Result<Self, McpError> {
        if let Some(cwd) = &spec.cwd {
            validate_working_dir(cwd)?;
        }

        let mut command = Command::new(&spec.executable);
        command
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = build_effective_path(&spec.executable) {
            command.env("PATH", path);
        }
        // Configured values win, including an explicit PATH.
        command.envs(&spec.env);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| {
            McpError::SpawnFailure(format!("'{}': {e}", spec.display_command()))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::SpawnFailure("failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::SpawnFailure("failed to capture stdout".to_string()))?;

        let inner = Arc::new(Inner::new(name, stdin));
        inner.set_state(ConnectionState::Connecting);
        spawn_reader(Arc::clone(&inner), stdout);
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_drain(name.to_string(), stderr);
        }

        tracing::debug!(
            server = name,
            pid = child.id(),
            command = %spec.display_command(),
            "Spawned MCP server"
        );

        let mut connection = Self {
            inner,
            child: Mutex::new(Some(child)),
            capabilities: ServerCapabilities::default(),
            timeouts,
        };

        let handshake = timeouts.handshake;
        let outcome = timeout(handshake, connection.initialize()).await;
        match outcome {
            Ok(Ok(capabilities)) => {
                connection.capabilities = capabilities;
                connection.inner.set_state(ConnectionState::Ready);
                tracing::info!(server = name, "MCP server ready");
                Ok(connection)
            }
            Ok(Err(e)) => {
                connection.close().await;
                Err(McpError::HandshakeFailure(e.to_string()))
            }
            Err(_) => {
                connection.close().await;
                Err(McpError::HandshakeFailure(format!(
                    "no initialize response within {}ms",
                    handshake.as_millis()
                )))
            }
        }
    }

    async fn initialize(&self) -> Result<ServerCapabilities, McpError> {
        let result = self
            .inner
            .request(
                methods::INITIALIZE,
                Some(initialize_params()),
                self.timeouts.handshake,
            )
            .await?;

        if !result.is_object() {
            return Err(McpError::ProtocolError(
                "initialize returned a non-object result".to_string(),
            ));
        }
        if let Some(version) = result.get("protocolVersion").and_then(Value::as_str) {
            tracing::debug!(server = %self.inner.name, version, "Negotiated protocol version");
        }

        self.inner.notify(methods::INITIALIZED, None).await?;
        Ok(ServerCapabilities::from_initialize(&result))
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        self.inner
            .request(method, params, self.timeouts.request)
            .await
    }

    /// Collect every page of a `*/list` method.
    async fn list_all<T: DeserializeOwned>(
        &self,
        method: &str,
        field: &str,
    ) -> Result<Vec<T>, McpError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.take().map(|c| json!({ "cursor": c }));
            let Value::Object(mut page) = self.request(method, params).await? else {
                return Err(McpError::ProtocolError(format!(
                    "{method} returned a non-object result"
                )));
            };

            match page.remove(field) {
                None | Some(Value::Null) => {}
                Some(list) => {
                    let batch: Vec<T> = serde_json::from_value(list).map_err(|e| {
                        McpError::ProtocolError(format!("malformed {method} result: {e}"))
                    })?;
                    items.extend(batch);
                }
            }

            cursor = page
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_owned);
            if cursor.is_none() {
                return Ok(items);
            }
        }

        tracing::warn!(
            server = %self.inner.name,
            method,
            "Stopped following list pages after {MAX_LIST_PAGES}"
        );
        Ok(items)
    }
}

#[async_trait]
impl ServerSession for StdioConnection {
    fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpError> {
        if !self.capabilities.tools {
            return Ok(Vec::new());
        }
        self.list_all(methods::TOOLS_LIST, "tools").await
    }

    async fn list_resources(&self) -> Result<Vec<McpResourceInfo>, McpError> {
        if !self.capabilities.resources {
            return Ok(Vec::new());
        }
        self.list_all(methods::RESOURCES_LIST, "resources").await
    }

    async fn list_prompts(&self) -> Result<Vec<McpPromptInfo>, McpError> {
        if !self.capabilities.prompts {
            return Ok(Vec::new());
        }
        self.list_all(methods::PROMPTS_LIST, "prompts").await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        self.request(
            methods::TOOLS_CALL,
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    async fn read_resource(&self, uri: &str) -> Result<Value, McpError> {
        self.request(methods::RESOURCES_READ, Some(json!({ "uri": uri })))
            .await
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: BTreeMap<String, String>,
    ) -> Result<Value, McpError> {
        self.request(
            methods::PROMPTS_GET,
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    async fn close(&self) {
        if self.inner.state() != ConnectionState::Closed {
            self.inner.set_state(ConnectionState::Closing);
        }

        // EOF on stdin is the polite shutdown request for stdio servers.
        drop(self.inner.writer.lock().await.take());

        let mut child = self.child.lock().await;
        if let Some(mut process) = child.take() {
            match shutdown_child(&mut process, self.timeouts.shutdown_grace).await {
                Ok(status) => {
                    tracing::debug!(server = %self.inner.name, %status, "MCP server exited");
                }
                Err(e) => {
                    tracing::warn!(server = %self.inner.name, error = %e, "Failed to stop MCP server");
                }
            }
        }
        drop(child);

        self.inner.fail_pending(&McpError::Closed);
        self.inner.set_state(ConnectionState::Closed);
    }
}

fn spawn_reader(inner: Arc<Inner>, stdout: ChildStdout) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let reason = loop {
            match lines.next_line().await {
                Ok(Some(line)) => handle_line(&inner, line.trim()).await,
                Ok(None) => break "server closed its output stream".to_string(),
                Err(e) => break format!("failed to read from server: {e}"),
            }
        };

        tracing::debug!(server = %inner.name, %reason, "MCP reader stopped");
        if inner.state() != ConnectionState::Closing {
            inner.set_state(ConnectionState::Closed);
        }
        inner.fail_pending(&McpError::ProtocolError(reason));
    });
}

async fn handle_line(inner: &Inner, line: &str) {
    if line.is_empty() {
        return;
    }
    match ServerMessage::from_line(line) {
        Ok(ServerMessage::Response(response)) => inner.complete(response),
        Ok(ServerMessage::Notification { method }) => {
            tracing::debug!(server = %inner.name, %method, "MCP notification");
        }
        Ok(ServerMessage::Request { id, method }) => {
            let reply = reply_to_server_request(id, &method).to_string();
            if let Err(e) = inner.write_line(&reply).await {
                tracing::debug!(server = %inner.name, %method, error = %e, "Could not answer server request");
            }
        }
        // Some servers print banners to stdout; skip anything that is not JSON-RPC.
        Err(e) => {
            tracing::warn!(server = %inner.name, error = %e, line, "Ignoring non-JSON-RPC output");
        }
    }
}

fn spawn_stderr_drain(name: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(server = %name, "{line}");
        }
    });
}

/// Production [`Connector`]: one child process per connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioConnector {
    timeouts: McpTimeouts,
}

impl StdioConnector {
    pub const fn new(timeouts: McpTimeouts) -> Self {
        Self { timeouts }
    }
}

#[async_trait]
impl Connector for StdioConnector {
    async fn connect(
        &self,
        server_name: &str,
        spec: LaunchSpec,
    ) -> Result<Arc<dyn ServerSession>, McpError> {
        let connection = StdioConnection::connect(server_name, spec, self.timeouts).await?;
        Ok(Arc::new(connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(executable: &str, args: &[&str]) -> LaunchSpec {
        LaunchSpec {
            executable: executable.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    fn short_timeouts() -> McpTimeouts {
        McpTimeouts {
            handshake: Duration::from_millis(300),
            request: Duration::from_millis(300),
            shutdown_grace: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_failure() {
        let err = StdioConnection::connect(
            "ghost",
            spec("skillpool-no-such-binary", &["--stdio"]),
            short_timeouts(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, McpError::SpawnFailure(_)), "{err:?}");
        assert!(err.to_string().contains("skillpool-no-such-binary --stdio"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_process_is_handshake_failure() {
        let started = std::time::Instant::now();
        let err = StdioConnection::connect("sleepy", spec("sleep", &["30"]), short_timeouts())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::HandshakeFailure(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exiting_process_is_handshake_failure() {
        let err = StdioConnection::connect("quitter", spec("true", &[]), short_timeouts())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::HandshakeFailure(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_missing_cwd_is_invalid_configuration() {
        let mut launch = spec("sleep", &["1"]);
        launch.cwd = Some(std::env::temp_dir().join("skillpool-no-such-cwd"));
        let err = StdioConnection::connect("nowhere", launch, short_timeouts())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::InvalidConfiguration(_)), "{err:?}");
    }
}
