//! Session lifecycle tracking.
//!
//! The host reports session start and end. On end, every MCP connection of
//! that session is torn down exactly once.

use std::sync::Arc;

use skillpool_core::{McpGateway, SessionId};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tracks the active session and disconnects it on end.
pub struct SessionLifecycle {
    gateway: Arc<dyn McpGateway>,
    current: Mutex<Option<SessionId>>,
}

impl SessionLifecycle {
    pub fn new(gateway: Arc<dyn McpGateway>) -> Self {
        Self {
            gateway,
            current: Mutex::new(None),
        }
    }

    /// Record `id` as the active session.
    pub async fn on_session_start(&self, id: SessionId) {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.as_ref().filter(|previous| **previous != id) {
            debug!(previous = %previous, session = %id, "Replacing active session");
        }
        info!(session = %id, "Session started");
        *current = Some(id);
    }

    /// Tear down `id` if it is the active session, then clear it.
    ///
    /// Returns whether a teardown happened. Ending an unknown or already
    /// ended session is a no-op.
    pub async fn on_session_end(&self, id: &SessionId) -> bool {
        let mut current = self.current.lock().await;
        if current.as_ref() != Some(id) {
            debug!(session = %id, "Session end for inactive session ignored");
            return false;
        }

        self.gateway.disconnect_session(id).await;
        *current = None;
        info!(session = %id, "Session ended");
        true
    }

    /// The active session, if any.
    pub async fn current(&self) -> Option<SessionId> {
        self.current.lock().await.clone()
    }
}
