//! Application composition root.
//!
//! One bus, one store, one push client per running application, shared by
//! reference with every consumer (HTTP handlers, WebSocket clients, the
//! bridge and the monitor).

use std::sync::{Arc, Mutex, PoisonError};

use notification_core::{LocalEventBus, NotificationStore, Subscription};
use push_client::agent::AgentConfig;
use push_client::beams::BeamsClient;
use push_client::{
    DesktopPlatform, Permission, PushClientManager, PushError, PushPlatform, PushSdk, SdkFactory,
};
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::BackgroundMessageBridge;
use crate::config::AppConfig;
use crate::monitor::ConnectionMonitor;

const AGENT_CHANNEL_CAPACITY: usize = 64;
const WS_CHANNEL_CAPACITY: usize = 256;

/// Application state shared by all consumers. Clones are cheap.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<AppContextInner>,
}

struct AppContextInner {
    config: AppConfig,
    bus: LocalEventBus,
    store: NotificationStore,
    push: Arc<PushClientManager>,
    monitor: ConnectionMonitor,
    /// Serialized messages fanned out to WebSocket clients
    ws_tx: broadcast::Sender<String>,
    shutdown_token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl AppContext {
    /// Build the production context: Beams SDK and the desktop platform.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(config: AppConfig) -> Self {
        let platform = DesktopPlatform::new(
            config.push_agent_url.clone().map(AgentConfig::new),
            config.notification_permission,
            config.notification_auto_grant,
        );
        let factory = beams_factory(&config);
        Self::with_push(config, factory, Arc::new(platform))
    }

    /// Build a context around an arbitrary SDK and platform.
    pub fn with_push(
        config: AppConfig,
        factory: SdkFactory,
        platform: Arc<dyn PushPlatform>,
    ) -> Self {
        let shutdown_token = CancellationToken::new();
        let bus = LocalEventBus::new();
        let store = NotificationStore::new(config.store_config());
        store.attach(&bus);

        let (agent_tx, agent_rx) = mpsc::channel(AGENT_CHANNEL_CAPACITY);
        let mut push = PushClientManager::new(factory, platform, agent_tx);
        if let Some(url) = &config.push_token_provider_url {
            push = push.with_token_provider_url(url.clone());
        }
        let push = Arc::new(push);

        let bridge = BackgroundMessageBridge::new(bus.clone());
        let bridge_task = bridge.spawn(agent_rx, shutdown_token.child_token());
        let monitor = ConnectionMonitor::spawn(
            Arc::clone(&push),
            config.poll_interval(),
            &shutdown_token,
        );

        let (ws_tx, _) = broadcast::channel(WS_CHANNEL_CAPACITY);
        let subscriptions = vec![
            bus.subscribe_all(|event| {
                tracing::debug!(event_type = %event.kind(), ?event, "Local event");
            }),
            {
                let ws_tx = ws_tx.clone();
                store.subscribe(move |snapshot| {
                    let msg = json!({ "type": "notifications", "data": snapshot });
                    // No receivers is fine.
                    let _ = ws_tx.send(msg.to_string());
                })
            },
        ];
        let connection_task = tokio::spawn(forward_connection(
            monitor.subscribe(),
            ws_tx.clone(),
            shutdown_token.child_token(),
        ));

        tracing::info!(
            capacity = config.notification_capacity,
            push_configured = config.push_agent_url.is_some(),
            "Application context ready"
        );

        Self {
            inner: Arc::new(AppContextInner {
                config,
                bus,
                store,
                push,
                monitor,
                ws_tx,
                shutdown_token,
                tasks: Mutex::new(vec![bridge_task, connection_task]),
                subscriptions: Mutex::new(subscriptions),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn server_port(&self) -> u16 {
        self.inner.config.server_port
    }

    pub fn bus(&self) -> &LocalEventBus {
        &self.inner.bus
    }

    pub fn store(&self) -> &NotificationStore {
        &self.inner.store
    }

    pub fn push(&self) -> &Arc<PushClientManager> {
        &self.inner.push
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.inner.monitor
    }

    pub fn subscribe_ws(&self) -> broadcast::Receiver<String> {
        self.inner.ws_tx.subscribe()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown_token
    }

    /// Permission prompt, start and interest registration.
    ///
    /// Every failure is logged and leaves the local event path untouched.
    pub async fn connect_push(&self) {
        let push = &self.inner.push;
        let config = &self.inner.config;

        let permission = push.request_notification_permission().await;
        if permission != Permission::Granted {
            tracing::info!(?permission, "Push delivery disabled; local events only");
            return;
        }

        if let Err(e) = push.start(config.push_user_id.as_deref(), None).await {
            tracing::warn!(error = %e, "Push client failed to start");
            return;
        }

        for interest in &config.push_interests {
            if let Err(e) = push.subscribe_to_interest(interest).await {
                tracing::warn!(interest = %interest, error = %e, "Push interest subscription failed");
            }
        }
    }

    /// Teardown: stop background loops, the push client and the store.
    pub async fn shutdown(&self) {
        if self.inner.shutdown_token.is_cancelled() {
            return;
        }
        self.inner.shutdown_token.cancel();
        tracing::info!("Shutdown: background loops cancelled");

        self.inner.monitor.stop();
        let tasks: Vec<JoinHandle<()>> = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            task.abort();
        }

        self.inner.push.shutdown().await;
        tracing::info!("Shutdown: push client stopped");

        for sub in self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            sub.unsubscribe();
        }
        self.inner.store.shutdown();
        tracing::info!("Shutdown: notification store closed");
    }
}

fn beams_factory(config: &AppConfig) -> SdkFactory {
    let instance_id = config.push_instance_id.clone();
    let api_url = config.push_api_url.clone();
    Box::new(move || -> Result<Arc<dyn PushSdk>, PushError> {
        let client = BeamsClient::new(&instance_id, api_url.as_deref())?;
        Ok(Arc::new(client) as Arc<dyn PushSdk>)
    })
}

async fn forward_connection(
    mut rx: tokio::sync::watch::Receiver<bool>,
    ws_tx: broadcast::Sender<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            changed = rx.changed() => {
                if changed.is_err() {
                    return;
                }
                let connected = *rx.borrow_and_update();
                let msg = json!({ "type": "connection", "data": { "isConnected": connected } });
                let _ = ws_tx.send(msg.to_string());
            }
        }
    }
}
