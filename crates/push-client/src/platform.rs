//! Platform capabilities: delivery permission and the background agent.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::agent::{AgentClient, AgentConfig};
use crate::{Permission, PushError};

/// What the host platform offers the push client.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Whether a background agent can receive messages outside the UI.
    fn supports_background_messaging(&self) -> bool;

    /// Current permission without prompting.
    fn permission(&self) -> Permission;

    /// Ask for permission. Settled answers are returned without prompting.
    async fn request_permission(&self) -> Permission;

    /// Register the background agent; received envelopes go to `sink`.
    /// Registering while the agent is alive is a no-op; an agent that has
    /// exited is started again.
    async fn register_background_agent(&self, sink: mpsc::Sender<String>)
    -> Result<(), PushError>;

    /// Stop the background agent if one is running.
    async fn unregister_background_agent(&self);
}

/// Desktop/headless platform backed by the WebSocket [`AgentClient`].
///
/// Permission starts from configuration. A prompt resolves to `Granted`
/// when `auto_grant` is set and otherwise stays `Default` (dismissed).
pub struct DesktopPlatform {
    agent: Option<AgentConfig>,
    auto_grant: bool,
    permission: Mutex<Permission>,
    agent_shutdown: Mutex<Option<mpsc::Sender<()>>>,
}

impl DesktopPlatform {
    pub fn new(agent: Option<AgentConfig>, permission: Permission, auto_grant: bool) -> Self {
        Self {
            agent,
            auto_grant,
            permission: Mutex::new(permission),
            agent_shutdown: Mutex::new(None),
        }
    }

    /// Whether the agent loop is still alive. The loop owns the shutdown
    /// receiver, so the sender closes once it exits on its own.
    pub fn agent_running(&self) -> bool {
        self.agent_shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

#[async_trait]
impl PushPlatform for DesktopPlatform {
    fn supports_background_messaging(&self) -> bool {
        self.agent.is_some()
    }

    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request_permission(&self) -> Permission {
        let mut current = self.permission.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_settled() {
            return *current;
        }
        if self.auto_grant {
            *current = Permission::Granted;
        }
        tracing::info!(permission = ?*current, "Notification permission prompt resolved");
        *current
    }

    async fn register_background_agent(
        &self,
        sink: mpsc::Sender<String>,
    ) -> Result<(), PushError> {
        let Some(config) = self.agent.clone() else {
            return Err(PushError::UnsupportedPlatform);
        };
        let mut slot = self
            .agent_shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(tx) if !tx.is_closed() => return Ok(()),
            Some(_) => tracing::info!("Background push agent exited; respawning"),
            None => {}
        }
        *slot = Some(AgentClient::spawn(config, sink));
        tracing::info!("Background push agent registered");
        Ok(())
    }

    async fn unregister_background_agent(&self) {
        let tx = self
            .agent_shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            if tx.try_send(()).is_ok() {
                tracing::info!("Background push agent stop signal sent");
            }
        }
    }
}
