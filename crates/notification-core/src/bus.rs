//! Local publish/subscribe bus.
//!
//! The single point where locally simulated events and forwarded push
//! messages converge. Publishing is synchronous: every handler registered
//! for the event's kind runs, in subscription order, before `publish`
//! returns. There is no buffering and no retry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::EventError;
use crate::events::{DomainEvent, EventKind};
use crate::listeners::{ListenerSet, Subscription};

struct BusInner {
    by_kind: HashMap<EventKind, ListenerSet<DomainEvent>>,
    all: ListenerSet<DomainEvent>,
}

/// Process-wide event bus. Clones share the same handlers.
#[derive(Clone)]
pub struct LocalEventBus {
    inner: Arc<BusInner>,
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEventBus {
    pub fn new() -> Self {
        let by_kind = EventKind::ALL
            .into_iter()
            .map(|kind| (kind, ListenerSet::new()))
            .collect();
        Self {
            inner: Arc::new(BusInner {
                by_kind,
                all: ListenerSet::new(),
            }),
        }
    }

    /// Deliver `event` to its kind's handlers, then to catch-all handlers.
    pub fn publish(&self, event: DomainEvent) {
        let kind = event.kind();
        tracing::trace!(event_type = %kind, "Publishing local event");
        if let Some(handlers) = self.inner.by_kind.get(&kind) {
            handlers.notify(&event);
        }
        self.inner.all.notify(&event);
    }

    /// Validate an untyped event and publish it.
    pub fn publish_raw(&self, event_type: &str, payload: Value) -> Result<(), EventError> {
        let event = DomainEvent::from_raw(event_type, payload).inspect_err(|e| {
            tracing::warn!(event_type, error = %e, "Rejected local event");
        })?;
        self.publish(event);
        Ok(())
    }

    /// Register `handler` for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        match self.inner.by_kind.get(&kind) {
            Some(handlers) => handlers.add(handler),
            // Every kind is registered in `new`.
            None => unreachable!("no handler set for {kind}"),
        }
    }

    /// Register `handler` for every event.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.inner.all.add(handler)
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner.by_kind.get(&kind).map_or(0, ListenerSet::len)
    }
}
