//! Session-scoped MCP connection pool.
//!
//! Connections are keyed by `(session, server name)` and created lazily on
//! first use. Concurrent first calls for the same key share one connect
//! attempt, so at most one process is spawned per key. A session's
//! connections live until [`McpManager::disconnect_session`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared, join_all};
use serde_json::Value;
use skillpool_core::{
    ConnectionKey, McpCallInfo, McpError, McpGateway, McpPromptInfo, McpResourceInfo,
    McpServerContext, McpTimeouts, McpToolInfo, SessionId,
};
use tokio::time::timeout;

use crate::client::StdioConnector;
use crate::command::LaunchSpec;
use crate::session::{Connector, ServerSession};

type SessionHandle = Arc<dyn ServerSession>;
type PendingConnect = Shared<BoxFuture<'static, Result<SessionHandle, McpError>>>;
type Pool = Arc<Mutex<HashMap<ConnectionKey, Slot>>>;

/// Pool entry for one key.
#[derive(Clone)]
enum Slot {
    /// A connect attempt in flight. Every caller awaits the same attempt.
    Connecting { attempt: u64, pending: PendingConnect },
    Ready(SessionHandle),
}

/// Manager for MCP connections across sessions.
pub struct McpManager<C: Connector = StdioConnector> {
    connector: Arc<C>,
    pool: Pool,
    next_attempt: AtomicU64,
    shutdown_grace: Duration,
}

impl McpManager<StdioConnector> {
    /// Manager that spawns stdio servers with the given bounds.
    pub fn new(timeouts: McpTimeouts) -> Self {
        Self::with_connector(StdioConnector::new(timeouts), timeouts.shutdown_grace)
    }
}

impl Default for McpManager<StdioConnector> {
    fn default() -> Self {
        Self::new(McpTimeouts::default())
    }
}

fn lock_pool(pool: &Mutex<HashMap<ConnectionKey, Slot>>) -> MutexGuard<'_, HashMap<ConnectionKey, Slot>> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record the outcome of `attempt` in the pool.
///
/// Runs inside the connect task, so the pool is updated even when every
/// caller has stopped waiting. A session whose slot was removed in the
/// meantime (the session was disconnected) is closed and reported as
/// [`McpError::Closed`].
async fn settle(
    pool: &Mutex<HashMap<ConnectionKey, Slot>>,
    key: &ConnectionKey,
    attempt: u64,
    outcome: Result<SessionHandle, McpError>,
) -> Result<SessionHandle, McpError> {
    let pooled = {
        let mut pool = lock_pool(pool);
        let holds_attempt = matches!(
            pool.get(key),
            Some(Slot::Connecting { attempt: current, .. }) if *current == attempt
        );
        if holds_attempt {
            match &outcome {
                Ok(session) => {
                    tracing::info!(key = %key, "MCP connection ready");
                    pool.insert(key.clone(), Slot::Ready(Arc::clone(session)));
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "MCP connect failed");
                    pool.remove(key);
                }
            }
        }
        holds_attempt
    };

    match outcome {
        Ok(session) if !pooled => {
            tracing::debug!(key = %key, "Closing connection that finished after disconnect");
            session.close().await;
            Err(McpError::Closed)
        }
        outcome => outcome,
    }
}

impl<C: Connector> McpManager<C> {
    pub fn with_connector(connector: C, shutdown_grace: Duration) -> Self {
        Self {
            connector: Arc::new(connector),
            pool: Arc::new(Mutex::new(HashMap::new())),
            next_attempt: AtomicU64::new(0),
            shutdown_grace,
        }
    }

    fn lock_pool(&self) -> MutexGuard<'_, HashMap<ConnectionKey, Slot>> {
        lock_pool(&self.pool)
    }

    /// Longest a single close may take before it is abandoned.
    ///
    /// Covers the EOF and SIGTERM waits plus time to reap after SIGKILL.
    fn close_bound(&self) -> Duration {
        self.shutdown_grace * 2 + Duration::from_secs(1)
    }

    /// Resolve the live connection for `info`, connecting if needed.
    async fn session(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
    ) -> Result<SessionHandle, McpError> {
        let key = info.key();
        let wrap = |e: McpError| McpError::connect(&info.server_name, &context.skill_name, e);

        let pending = {
            let mut pool = self.lock_pool();
            match pool.get(&key).cloned() {
                Some(Slot::Ready(session)) if session.is_ready() => return Ok(session),
                Some(Slot::Connecting { pending, .. }) => pending,
                stale => {
                    if let Some(Slot::Ready(dead)) = stale {
                        pool.remove(&key);
                        tracing::info!(key = %key, state = %dead.state(), "Replacing dead MCP connection");
                        tokio::spawn(async move { dead.close().await });
                    }
                    let spec = LaunchSpec::from_config(&context.config).map_err(wrap)?;
                    let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed);
                    let pending = self.start_attempt(&key, attempt, spec);
                    pool.insert(
                        key.clone(),
                        Slot::Connecting {
                            attempt,
                            pending: pending.clone(),
                        },
                    );
                    pending
                }
            }
        };

        pending.await.map_err(wrap)
    }

    /// Spawn the connect task for `attempt`.
    ///
    /// The caller inserts the slot while still holding the pool lock, so the
    /// task cannot settle before its slot exists.
    fn start_attempt(&self, key: &ConnectionKey, attempt: u64, spec: LaunchSpec) -> PendingConnect {
        tracing::debug!(key = %key, command = %spec.display_command(), "Starting MCP server");

        let connector = Arc::clone(&self.connector);
        let pool = Arc::clone(&self.pool);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let outcome = connector.connect(&task_key.server, spec).await;
            settle(&pool, &task_key, attempt, outcome).await
        });

        let pool = Arc::clone(&self.pool);
        let key = key.clone();
        async move {
            task.await.unwrap_or_else(|e| {
                let mut pool = lock_pool(&pool);
                if matches!(
                    pool.get(&key),
                    Some(Slot::Connecting { attempt: current, .. }) if *current == attempt
                ) {
                    pool.remove(&key);
                }
                Err(McpError::SpawnFailure(format!("connect task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }

    /// Drop `session` from the pool after a failure that leaves it unusable.
    fn evict(&self, key: &ConnectionKey, session: &SessionHandle) {
        let mut pool = self.lock_pool();
        let pooled = matches!(
            pool.get(key),
            Some(Slot::Ready(current)) if Arc::ptr_eq(current, session)
        );
        if pooled {
            pool.remove(key);
            drop(pool);
            tracing::warn!(key = %key, "Evicting unhealthy MCP connection");
            let session = Arc::clone(session);
            tokio::spawn(async move { session.close().await });
        }
    }

    /// Run `op` on the connection for `info`.
    ///
    /// Request failures are returned unchanged; connect failures carry the
    /// server and skill names.
    async fn forward<T, F, Fut>(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
        op: F,
    ) -> Result<T, McpError>
    where
        F: FnOnce(SessionHandle) -> Fut + Send,
        Fut: Future<Output = Result<T, McpError>> + Send,
        T: Send,
    {
        let session = self.session(info, context).await?;
        let result = op(Arc::clone(&session)).await;
        if let Err(e) = &result {
            if e.poisons_connection() {
                self.evict(&info.key(), &session);
            }
        }
        result
    }

    /// Close every connection of `session` and forget them.
    ///
    /// Ready connections are closed concurrently, each bounded by the
    /// shutdown grace period. Attempts still connecting are closed as soon as
    /// they finish. Close failures are logged, never returned. Calling this
    /// for an unknown or already disconnected session does nothing.
    pub async fn disconnect_session(&self, session: &SessionId) {
        let removed: Vec<(ConnectionKey, Slot)> = {
            let mut pool = self.lock_pool();
            let keys: Vec<ConnectionKey> = pool
                .keys()
                .filter(|key| &key.session == session)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| pool.remove(&key).map(|slot| (key, slot)))
                .collect()
        };

        if removed.is_empty() {
            tracing::debug!(session = %session, "No MCP connections to disconnect");
            return;
        }

        let count = removed.len();
        self.close_slots(removed).await;
        tracing::info!(session = %session, count, "Disconnected MCP session");
    }

    /// Close every pooled connection of every session.
    pub async fn shutdown_all(&self) {
        let removed: Vec<(ConnectionKey, Slot)> = self.lock_pool().drain().collect();
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "Shutting down all MCP connections");
            self.close_slots(removed).await;
        }
    }

    async fn close_slots(&self, slots: Vec<(ConnectionKey, Slot)>) {
        let bound = self.close_bound();
        let closes = slots.into_iter().map(|(key, slot)| async move {
            match slot {
                Slot::Ready(session) => {
                    if timeout(bound, session.close()).await.is_err() {
                        tracing::warn!(key = %key, "Gave up waiting for MCP server to close");
                    }
                }
                Slot::Connecting { .. } => {
                    // The connect task closes its session once it sees the slot is gone.
                    tracing::debug!(key = %key, "Dropped MCP connect attempt in flight");
                }
            }
        });
        join_all(closes).await;
    }

    /// Number of pooled entries, including attempts in flight.
    pub fn connection_count(&self) -> usize {
        self.lock_pool().len()
    }

    /// Server names pooled for `session`, sorted.
    pub fn session_servers(&self, session: &SessionId) -> Vec<String> {
        let mut servers: Vec<String> = self
            .lock_pool()
            .keys()
            .filter(|key| &key.session == session)
            .map(|key| key.server.clone())
            .collect();
        servers.sort();
        servers
    }
}

#[async_trait]
impl<C: Connector> McpGateway for McpManager<C> {
    async fn list_tools(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
    ) -> Result<Vec<McpToolInfo>, McpError> {
        self.forward(info, context, |s| async move { s.list_tools().await })
            .await
    }

    async fn list_resources(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
    ) -> Result<Vec<McpResourceInfo>, McpError> {
        self.forward(info, context, |s| async move { s.list_resources().await })
            .await
    }

    async fn list_prompts(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
    ) -> Result<Vec<McpPromptInfo>, McpError> {
        self.forward(info, context, |s| async move { s.list_prompts().await })
            .await
    }

    async fn call_tool(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
        name: &str,
        arguments: Value,
    ) -> Result<Value, McpError> {
        let name = name.to_string();
        self.forward(info, context, move |s| async move {
            s.call_tool(&name, arguments).await
        })
        .await
    }

    async fn read_resource(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
        uri: &str,
    ) -> Result<Value, McpError> {
        let uri = uri.to_string();
        self.forward(info, context, move |s| async move {
            s.read_resource(&uri).await
        })
        .await
    }

    async fn get_prompt(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
        name: &str,
        arguments: BTreeMap<String, String>,
    ) -> Result<Value, McpError> {
        let name = name.to_string();
        self.forward(info, context, move |s| async move {
            s.get_prompt(&name, arguments).await
        })
        .await
    }

    async fn disconnect_session(&self, session: &SessionId) {
        Self::disconnect_session(self, session).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConnectionState;
    use serde_json::json;
    use skillpool_core::ServerConfig;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct FakeConnector {
        connects: AtomicUsize,
        fail_remaining: AtomicUsize,
        delay: Duration,
        sessions: Mutex<Vec<Arc<FakeSession>>>,
    }

    impl FakeConnector {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        fn sessions(&self) -> Vec<Arc<FakeSession>> {
            self.sessions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(
            &self,
            server_name: &str,
            spec: LaunchSpec,
        ) -> Result<Arc<dyn ServerSession>, McpError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;

            let failing = self
                .fail_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(McpError::SpawnFailure(format!(
                    "{}: command not found",
                    spec.executable
                )));
            }

            let session = Arc::new(FakeSession::new(server_name));
            self.sessions.lock().unwrap().push(Arc::clone(&session));
            Ok(session)
        }
    }

    struct FakeSession {
        server: String,
        state: Mutex<ConnectionState>,
        closes: AtomicUsize,
    }

    impl FakeSession {
        fn new(server: &str) -> Self {
            Self {
                server: server.to_string(),
                state: Mutex::new(ConnectionState::Ready),
                closes: AtomicUsize::new(0),
            }
        }

        fn kill(&self) {
            *self.state.lock().unwrap() = ConnectionState::Closed;
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ServerSession for FakeSession {
        fn state(&self) -> ConnectionState {
            *self.state.lock().unwrap()
        }

        async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpError> {
            Ok(vec![
                serde_json::from_value(json!({"name": format!("{}_echo", self.server)})).unwrap(),
            ])
        }

        async fn list_resources(&self) -> Result<Vec<McpResourceInfo>, McpError> {
            Ok(Vec::new())
        }

        async fn list_prompts(&self) -> Result<Vec<McpPromptInfo>, McpError> {
            Err(McpError::ProtocolError("garbled prompts/list".to_string()))
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
            if name == "missing" {
                return Err(McpError::UnknownCapability(format!("Unknown tool: {name}")));
            }
            Ok(json!({"server": self.server, "tool": name, "arguments": arguments}))
        }

        async fn read_resource(&self, uri: &str) -> Result<Value, McpError> {
            Ok(json!({"contents": [{"uri": uri, "text": "hello"}]}))
        }

        async fn get_prompt(
            &self,
            name: &str,
            arguments: BTreeMap<String, String>,
        ) -> Result<Value, McpError> {
            Ok(json!({"name": name, "arguments": arguments}))
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            *self.state.lock().unwrap() = ConnectionState::Closed;
        }
    }

    fn manager(connector: FakeConnector) -> McpManager<FakeConnector> {
        McpManager::with_connector(connector, Duration::from_millis(50))
    }

    fn info(server: &str, session: &str) -> McpCallInfo {
        McpCallInfo::new(server, "triage", SessionId::new(session))
    }

    fn context() -> McpServerContext {
        McpServerContext::new(ServerConfig::from_argv(["npx", "-y", "@x/y"]), "triage")
    }

    #[tokio::test]
    async fn test_same_key_reuses_connection() {
        let manager = manager(FakeConnector::default());
        let info = info("github", "s1");

        let tools = manager.list_tools(&info, &context()).await.unwrap();
        assert_eq!(tools[0].name, "github_echo");
        manager
            .call_tool(&info, &context(), "echo", json!({"text": "hi"}))
            .await
            .unwrap();

        assert_eq!(manager.connector.connects(), 1);
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_other_session_gets_own_connection() {
        let manager = manager(FakeConnector::default());
        manager.list_tools(&info("github", "s1"), &context()).await.unwrap();
        manager.list_tools(&info("github", "s2"), &context()).await.unwrap();

        assert_eq!(manager.connector.connects(), 2);
        assert_eq!(manager.session_servers(&SessionId::new("s1")), vec!["github"]);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_spawn_once() {
        let manager = manager(FakeConnector::slow(Duration::from_millis(50)));
        let info = info("github", "s1");
        let ctx = context();

        let (a, b, c) = tokio::join!(
            manager.list_tools(&info, &ctx),
            manager.list_resources(&info, &ctx),
            manager.call_tool(&info, &ctx, "echo", Value::Null),
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(manager.connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_failure() {
        let connector = FakeConnector::slow(Duration::from_millis(50));
        connector.fail_remaining.store(1, Ordering::SeqCst);
        let manager = manager(connector);
        let info = info("github", "s1");
        let ctx = context();

        let (a, b) = tokio::join!(manager.list_tools(&info, &ctx), manager.list_tools(&info, &ctx));

        let (a, b) = (a.unwrap_err(), b.unwrap_err());
        assert_eq!(a, b);
        assert!(matches!(a.root(), McpError::SpawnFailure(_)));
        assert!(a.to_string().contains("'github'"));
        assert!(a.to_string().contains("'triage'"));
        assert_eq!(manager.connector.connects(), 1);
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_poison_key() {
        let connector = FakeConnector::default();
        connector.fail_remaining.store(1, Ordering::SeqCst);
        let manager = manager(connector);
        let info = info("github", "s1");

        assert!(manager.list_tools(&info, &context()).await.is_err());
        assert!(manager.list_tools(&info, &context()).await.is_ok());
        assert_eq!(manager.connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_failed_attempt_is_retried() {
        let connector = FakeConnector::slow(Duration::from_millis(50));
        connector.fail_remaining.store(1, Ordering::SeqCst);
        let manager = Arc::new(manager(connector));
        let caller = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.list_tools(&info("github", "s1"), &context()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.connection_count(), 0);

        manager.list_tools(&info("github", "s1"), &context()).await.unwrap();
        assert_eq!(manager.connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_attempt_still_pools_connection() {
        let manager = Arc::new(manager(FakeConnector::slow(Duration::from_millis(50))));
        let caller = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.list_tools(&info("github", "s1"), &context()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;

        manager.list_tools(&info("github", "s1"), &context()).await.unwrap();
        assert_eq!(manager.connector.connects(), 1);
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_never_connects() {
        let manager = manager(FakeConnector::default());
        let ctx = McpServerContext::new(
            serde_json::from_value(json!({"command": 42})).unwrap(),
            "triage",
        );

        let err = manager.list_tools(&info("bad", "s1"), &ctx).await.unwrap_err();
        assert!(matches!(err.root(), McpError::InvalidConfiguration(_)));
        assert_eq!(manager.connector.connects(), 0);
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_is_scoped_and_idempotent() {
        let manager = manager(FakeConnector::default());
        manager.list_tools(&info("github", "s1"), &context()).await.unwrap();
        manager.list_tools(&info("jira", "s1"), &context()).await.unwrap();
        manager.list_tools(&info("github", "s2"), &context()).await.unwrap();

        manager.disconnect_session(&SessionId::new("s1")).await;

        assert!(manager.session_servers(&SessionId::new("s1")).is_empty());
        assert_eq!(manager.session_servers(&SessionId::new("s2")), vec!["github"]);
        let closes: Vec<usize> = manager.connector.sessions().iter().map(|s| s.closes()).collect();
        assert_eq!(closes, vec![1, 1, 0]);

        manager.disconnect_session(&SessionId::new("s1")).await;
        manager.disconnect_session(&SessionId::new("never-seen")).await;
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_dead_connection_is_replaced() {
        let manager = manager(FakeConnector::default());
        let info = info("github", "s1");
        manager.list_tools(&info, &context()).await.unwrap();

        manager.connector.sessions()[0].kill();
        manager.list_tools(&info, &context()).await.unwrap();

        assert_eq!(manager.connector.connects(), 2);
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_protocol_error_evicts_connection() {
        let manager = manager(FakeConnector::default());
        let info = info("github", "s1");

        let err = manager.list_prompts(&info, &context()).await.unwrap_err();
        assert!(matches!(err, McpError::ProtocolError(_)));
        assert_eq!(manager.connection_count(), 0);

        manager.list_tools(&info, &context()).await.unwrap();
        assert_eq!(manager.connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_capability_errors_pass_through() {
        let manager = manager(FakeConnector::default());
        let info = info("github", "s1");

        let err = manager
            .call_tool(&info, &context(), "missing", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, McpError::UnknownCapability("Unknown tool: missing".to_string()));
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_while_connecting() {
        let manager = Arc::new(manager(FakeConnector::slow(Duration::from_millis(200))));
        let caller = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.list_tools(&info("github", "s1"), &context()).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.connection_count(), 1);
        manager.disconnect_session(&SessionId::new("s1")).await;
        assert_eq!(manager.connection_count(), 0);

        let err = caller.await.unwrap().unwrap_err();
        assert_eq!(err.root(), &McpError::Closed);
        assert_eq!(manager.connection_count(), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let sessions = manager.connector.sessions();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].closes() >= 1);
    }

    #[tokio::test]
    async fn test_shutdown_all_closes_everything() {
        let manager = manager(FakeConnector::default());
        manager.list_tools(&info("github", "s1"), &context()).await.unwrap();
        manager.list_tools(&info("github", "s2"), &context()).await.unwrap();

        manager.shutdown_all().await;

        assert_eq!(manager.connection_count(), 0);
        assert!(manager.connector.sessions().iter().all(|s| s.closes() == 1));
    }
}
