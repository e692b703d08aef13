//! In-process notification core.
//!
//! Typed domain events, the local publish/subscribe bus both producers
//! publish onto, and the notification store the UI renders from.

pub mod bus;
pub mod events;
pub mod listeners;
pub mod store;
pub mod types;

pub use bus::LocalEventBus;
pub use events::{DomainEvent, EventKind};
pub use listeners::{ListenerSet, Subscription};
pub use store::{NotificationStore, StoreConfig};
pub use types::{Notification, NotificationSnapshot, NotificationSpec, NotificationType};

/// Errors raised synchronously by store mutations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid notification: {0}")]
    InvalidSpec(String),

    #[error("Auto-hide requires a running Tokio runtime")]
    NoRuntime,
}

/// Errors raised when a raw event is rejected at the bus boundary.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("Invalid payload for {event_type}: {reason}")]
    InvalidPayload { event_type: String, reason: String },
}
