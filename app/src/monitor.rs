//! Connection monitor.
//!
//! Samples the push client's registration status on a fixed interval and
//! also wakes on every registration state transition, so `is_connected`
//! converges no slower than one poll interval.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use push_client::PushClientManager;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct ConnectionMonitor {
    connected: watch::Receiver<bool>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionMonitor {
    /// Start polling `push`. The loop stops when `parent` or
    /// [`stop`](Self::stop) cancels it.
    pub fn spawn(
        push: Arc<PushClientManager>,
        interval: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let initial = push.get_registration_status();
        let (tx, connected) = watch::channel(initial);
        let cancel = parent.child_token();
        let handle = tokio::spawn(poll_loop(push, interval, tx, cancel.clone()));
        Self {
            connected,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Receiver holding the latest sample.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    push: Arc<PushClientManager>,
    interval: Duration,
    tx: watch::Sender<bool>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut state_rx = push.watch_state();
    let mut state_events = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Connection monitor stopped");
                return;
            }
            _ = ticker.tick() => {}
            changed = state_rx.changed(), if state_events => {
                if changed.is_err() {
                    state_events = false;
                }
            }
        }

        let connected = push.get_registration_status();
        let changed = tx.send_if_modified(|current| {
            if *current == connected {
                return false;
            }
            *current = connected;
            true
        });
        if changed {
            tracing::info!(connected, state = push.state().as_str(), "Push connection changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use push_client::testing::{FakePlatform, FakeSdk, manager};
    use push_client::Permission;

    #[tokio::test(start_paused = true)]
    async fn reports_connection_after_start_and_stop() {
        let (push, _sdk, _agent_rx) =
            manager(Arc::new(FakePlatform::new(Permission::Granted)), FakeSdk::default());
        let root = CancellationToken::new();
        let monitor = ConnectionMonitor::spawn(Arc::clone(&push), Duration::from_secs(5), &root);
        let mut rx = monitor.subscribe();
        assert!(!monitor.is_connected());

        push.start(None, None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(6), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(monitor.is_connected());

        push.stop().await;
        tokio::time::timeout(Duration::from_secs(6), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!monitor.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn denied_permission_stays_disconnected() {
        let (push, _sdk, _agent_rx) =
            manager(Arc::new(FakePlatform::new(Permission::Denied)), FakeSdk::default());
        let root = CancellationToken::new();
        let monitor = ConnectionMonitor::spawn(Arc::clone(&push), Duration::from_secs(5), &root);

        assert!(push.start(None, None).await.is_err());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!monitor.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_polling() {
        let (push, _sdk, _agent_rx) =
            manager(Arc::new(FakePlatform::new(Permission::Granted)), FakeSdk::default());
        let root = CancellationToken::new();
        let monitor = ConnectionMonitor::spawn(push, Duration::from_secs(5), &root);
        assert!(monitor.is_running());

        root.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!monitor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let (push, _sdk, _agent_rx) =
            manager(Arc::new(FakePlatform::new(Permission::Granted)), FakeSdk::default());
        let monitor = ConnectionMonitor::spawn(push, Duration::from_secs(5), &CancellationToken::new());
        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_running());
    }
}
