//! Background delivery agent.
//!
//! Holds a WebSocket open to the push-delivery relay independently of any
//! UI window, forwards every notification frame as a raw envelope string,
//! and reconnects with exponential backoff when the relay drops.

mod connection;

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::PushError;

const DEFAULT_KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(30);
const BASE_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const FAILURE_RESET_WINDOW: Duration = Duration::from_secs(5 * 60);
const MAX_CONSECUTIVE_FAILURES: u32 = 8;

/// Control frame the relay sends to keep an idle connection alive.
pub const FRAME_KEEPALIVE: &str = "keepalive";
/// Control frame asking the agent to move to another relay URL.
pub const FRAME_RECONNECT: &str = "reconnect";

/// Background agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub url: String,
    pub keepalive_timeout: Duration,
}

impl AgentConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            keepalive_timeout: DEFAULT_KEEPALIVE_TIMEOUT,
        }
    }
}

/// WebSocket agent with auto-reconnect.
///
/// Envelopes are delivered through the `mpsc::Sender<String>` passed to
/// [`AgentClient::spawn`]; validation is left to the receiving side.
pub struct AgentClient;

impl AgentClient {
    /// Start the agent loop. Returns the shutdown sender.
    pub fn spawn(config: AgentConfig, sink: mpsc::Sender<String>) -> mpsc::Sender<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(Self::run_loop(config, sink, shutdown_rx));
        shutdown_tx
    }

    async fn run_loop(
        config: AgentConfig,
        sink: mpsc::Sender<String>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut failures: u32 = 0;
        let mut last_failure_at: Option<Instant> = None;
        let mut ws_url = config.url.clone();
        loop {
            if shutdown_rx.try_recv().is_ok() {
                tracing::info!("Push agent shutdown requested");
                return;
            }
            if sink.is_closed() {
                tracing::info!("Push agent sink closed, stopping");
                return;
            }
            if let Some(last_failure) = last_failure_at {
                if last_failure.elapsed() >= FAILURE_RESET_WINDOW {
                    if failures > 0 {
                        tracing::info!(failures, "Push agent failures reset after stable interval");
                    }
                    failures = 0;
                    last_failure_at = None;
                }
            }
            match Self::connect_once(&config, &ws_url, &sink, &mut shutdown_rx).await {
                Ok(Some(next_url)) => {
                    failures = 0;
                    ws_url = next_url;
                    tracing::info!(ws_url = %ws_url, "Push agent moving to relay URL");
                }
                Ok(None) => {
                    tracing::info!("Push agent connection closed cleanly");
                    return;
                }
                Err(e) => {
                    if e.is_auth_error() {
                        tracing::warn!(
                            error = %e,
                            "Push agent rejected by relay; stopping until the client restarts"
                        );
                        return;
                    }
                    failures += 1;
                    last_failure_at = Some(Instant::now());
                    if ws_url != config.url {
                        tracing::warn!("Push agent relay URL failed, falling back to configured URL");
                        ws_url = config.url.clone();
                    }
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        tracing::warn!(failures, "Push agent failures exceeded threshold; giving up");
                        return;
                    }
                    let backoff = Self::backoff_duration(failures);
                    tracing::warn!(
                        error = %e, attempt = failures,
                        backoff_secs = backoff.as_secs(),
                        "Push agent connection failed, will reconnect"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            tracing::info!("Push agent shutdown requested during backoff");
                            return;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    fn backoff_duration(failures: u32) -> Duration {
        let d = BASE_BACKOFF * 2u32.saturating_pow(failures.saturating_sub(1));
        d.min(MAX_BACKOFF)
    }
}

/// What the connection loop should do after a frame.
#[derive(Debug, PartialEq, Eq)]
enum FrameAction {
    Forward,
    Skip,
    Reconnect(String),
}

impl FrameAction {
    fn classify(text: &str) -> Result<Self, PushError> {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
            // Not ours to judge; the bridge logs and drops it.
            return Ok(Self::Forward);
        };
        match value.get("type").and_then(|t| t.as_str()) {
            Some(FRAME_KEEPALIVE) => Ok(Self::Skip),
            Some(FRAME_RECONNECT) => value
                .get("url")
                .and_then(|u| u.as_str())
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(|u| Self::Reconnect(u.to_string()))
                .ok_or_else(|| PushError::Agent("reconnect frame missing url".into())),
            _ => Ok(Self::Forward),
        }
    }
}
