//! Background message bridge.
//!
//! Receives raw envelopes forwarded by the background push agent and
//! republishes them on the local event bus as system events. Malformed
//! envelopes are logged and dropped here; nothing from the remote side is
//! allowed to reach a bus subscriber unvalidated.

use notification_core::events::Announcement;
use notification_core::{DomainEvent, LocalEventBus, NotificationType};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Envelope `type` the agent uses for delivered notifications.
pub const PUSH_NOTIFICATION_RECEIVED: &str = "PUSH_NOTIFICATION_RECEIVED";

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected envelope type {0:?}")]
    UnexpectedType(String),

    #[error("missing or empty field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeData {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    notification_type: Option<String>,
}

/// Parse an agent envelope into the event it should publish.
pub fn parse_envelope(raw: &str) -> Result<DomainEvent, EnvelopeError> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    if envelope.kind != PUSH_NOTIFICATION_RECEIVED {
        return Err(EnvelopeError::UnexpectedType(envelope.kind));
    }
    let data = envelope.data.ok_or(EnvelopeError::MissingField("data"))?;
    let title = non_blank(data.title).ok_or(EnvelopeError::MissingField("data.title"))?;
    let body = non_blank(data.body).ok_or(EnvelopeError::MissingField("data.body"))?;

    let level = match data.notification_type.as_deref() {
        None => NotificationType::Info,
        Some(s) => NotificationType::parse(s).unwrap_or_else(|| {
            tracing::debug!(notification_type = s, "Unknown notification type, using info");
            NotificationType::Info
        }),
    };
    Ok(DomainEvent::system(level, Announcement::new(title, body)))
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Forwards agent envelopes onto a [`LocalEventBus`].
#[derive(Clone)]
pub struct BackgroundMessageBridge {
    bus: LocalEventBus,
}

impl BackgroundMessageBridge {
    pub fn new(bus: LocalEventBus) -> Self {
        Self { bus }
    }

    /// Validate and publish one envelope. Returns whether it was published.
    pub fn handle_raw(&self, raw: &str) -> bool {
        match parse_envelope(raw) {
            Ok(event) => {
                tracing::debug!(event_type = %event.kind(), "Bridging background push message");
                self.bus.publish(event);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropped malformed background message");
                false
            }
        }
    }

    /// Run until the channel closes or `cancel` fires.
    pub fn spawn(self, mut rx: mpsc::Receiver<String>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Background message bridge stopped (shutdown)");
                        return;
                    }
                    msg = rx.recv() => match msg {
                        Some(raw) => {
                            self.handle_raw(&raw);
                        }
                        None => {
                            tracing::info!("Background message bridge stopped (agent channel closed)");
                            return;
                        }
                    }
                }
            }
        })
    }
}
