//! Notification store.
//!
//! Holds the ordered (most recent first) notification list the UI renders.
//! Mutations are synchronous and complete under one lock; listeners run
//! afterwards with the resulting snapshot. Snapshots are numbered under that
//! lock and delivered one at a time, newest last, so a listener's final view
//! always matches the store even when several threads mutate it. Auto-hide
//! timers are Tokio tasks
//! keyed by notification id and are aborted whenever their notification
//! leaves the store by any other path.

mod templates;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::StoreError;
use crate::bus::LocalEventBus;
use crate::events::{DomainEvent, EventKind};
use crate::listeners::{ListenerSet, Subscription};
use crate::types::{DEFAULT_DURATION_MS, Notification, NotificationSnapshot, NotificationSpec};

pub use templates::render;

const DEFAULT_CAPACITY: usize = 50;
const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(1_500);

/// Store tuning.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum retained notifications; oldest read entries go first.
    pub capacity: usize,
    /// Auto-hide applied to notifications derived from bus events.
    pub event_auto_hide: bool,
    pub event_duration: Duration,
    /// Identical unread notifications inside this window collapse into one.
    pub dedup_window: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            event_auto_hide: true,
            event_duration: Duration::from_millis(DEFAULT_DURATION_MS),
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

struct Entry {
    notification: Notification,
    created: Instant,
}

#[derive(Default)]
struct StoreState {
    entries: VecDeque<Entry>,
    timers: HashMap<String, JoinHandle<()>>,
    generation: u64,
}

/// Snapshot tagged with the generation of the mutation that produced it.
struct Stamped {
    generation: u64,
    snapshot: NotificationSnapshot,
}

impl StoreState {
    /// Bump the generation and capture the state for listeners.
    fn stamp(&mut self) -> Stamped {
        self.generation += 1;
        Stamped {
            generation: self.generation,
            snapshot: self.snapshot(),
        }
    }

    fn snapshot(&self) -> NotificationSnapshot {
        let notifications: Vec<Notification> = self
            .entries
            .iter()
            .map(|e| e.notification.clone())
            .collect();
        let unread_count = notifications.iter().filter(|n| !n.is_read).count();
        NotificationSnapshot {
            notifications,
            unread_count,
        }
    }

    fn find_duplicate(&self, spec: &NotificationSpec, now: Instant, window: Duration) -> Option<String> {
        if window.is_zero() {
            return None;
        }
        self.entries
            .iter()
            .take_while(|e| now.saturating_duration_since(e.created) <= window)
            .find(|e| {
                let n = &e.notification;
                !n.is_read && n.kind == spec.kind && n.title == spec.title && n.message == spec.message
            })
            .map(|e| e.notification.id.clone())
    }

    fn remove(&mut self, id: &str) -> bool {
        if let Some(handle) = self.timers.remove(id) {
            handle.abort();
        }
        match self.entries.iter().position(|e| e.notification.id == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Evict until within `capacity`: oldest read entry first, else oldest.
    fn enforce_capacity(&mut self, capacity: usize) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.entries.len() > capacity.max(1) {
            let pos = self
                .entries
                .iter()
                .rposition(|e| e.notification.is_read)
                .unwrap_or(self.entries.len() - 1);
            if let Some(entry) = self.entries.remove(pos) {
                if let Some(handle) = self.timers.remove(&entry.notification.id) {
                    handle.abort();
                }
                evicted.push(entry.notification.id);
            }
        }
        evicted
    }

    fn abort_timers(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

impl Drop for StoreState {
    fn drop(&mut self) {
        self.abort_timers();
    }
}

/// Listener delivery queue. Holds at most the newest undelivered snapshot.
#[derive(Default)]
struct Delivery {
    pending: Option<Stamped>,
    delivered: u64,
    running: bool,
}

struct StoreInner {
    config: StoreConfig,
    state: Mutex<StoreState>,
    listeners: ListenerSet<NotificationSnapshot>,
    delivery: Mutex<Delivery>,
    bus_subscriptions: Mutex<Vec<Subscription>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let subs = self
            .bus_subscriptions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for sub in subs.drain(..) {
            sub.unsubscribe();
        }
    }
}

/// Shared notification store. Clones refer to the same collection.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<StoreInner>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl NotificationStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                state: Mutex::new(StoreState::default()),
                listeners: ListenerSet::new(),
                delivery: Mutex::new(Delivery::default()),
                bus_subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Insert a notification at the front and return its id.
    ///
    /// An identical unread notification created within the dedup window
    /// is returned instead of inserting a second copy.
    pub fn show_notification(&self, spec: NotificationSpec) -> Result<String, StoreError> {
        validate_spec(&spec)?;
        let runtime = if spec.auto_hide {
            Some(tokio::runtime::Handle::try_current().map_err(|_| StoreError::NoRuntime)?)
        } else {
            None
        };

        let now = Instant::now();
        let (id, evicted, stamped) = {
            let mut state = self.state();
            if let Some(existing) = state.find_duplicate(&spec, now, self.inner.config.dedup_window)
            {
                tracing::debug!(id = %existing, title = %spec.title, "Duplicate notification collapsed");
                return Ok(existing);
            }

            let notification = Notification::from_spec(spec);
            let id = notification.id.clone();
            if let Some(runtime) = runtime {
                let delay = Duration::from_millis(notification.duration);
                let handle = runtime.spawn(expire_after(
                    Arc::downgrade(&self.inner),
                    id.clone(),
                    delay,
                ));
                state.timers.insert(id.clone(), handle);
            }
            state.entries.push_front(Entry {
                notification,
                created: now,
            });
            let evicted = state.enforce_capacity(self.inner.config.capacity);
            (id, evicted, state.stamp())
        };

        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "Evicted notifications over capacity");
        }
        tracing::debug!(id = %id, unread = stamped.snapshot.unread_count, "Notification added");
        self.deliver(stamped);
        Ok(id)
    }

    pub fn mark_as_read(&self, id: &str) {
        self.mutate(|state| {
            match state
                .entries
                .iter_mut()
                .find(|e| e.notification.id == id && !e.notification.is_read)
            {
                Some(entry) => {
                    entry.notification.is_read = true;
                    true
                }
                None => false,
            }
        });
    }

    pub fn mark_all_as_read(&self) {
        self.mutate(|state| {
            let mut changed = false;
            for entry in state.entries.iter_mut().filter(|e| !e.notification.is_read) {
                entry.notification.is_read = true;
                changed = true;
            }
            changed
        });
    }

    /// Remove `id` and cancel its timer. Unknown ids are a no-op.
    pub fn remove_notification(&self, id: &str) {
        self.mutate(|state| state.remove(id));
    }

    /// Remove everything and cancel every pending timer.
    pub fn clear_all_notifications(&self) {
        self.mutate(|state| {
            state.abort_timers();
            let changed = !state.entries.is_empty();
            state.entries.clear();
            changed
        });
    }

    /// Register a listener called with the latest snapshot after each mutation.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NotificationSnapshot) + Send + Sync + 'static,
    {
        self.inner.listeners.add(listener)
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.state().snapshot()
    }

    pub fn unread_count(&self) -> usize {
        self.state()
            .entries
            .iter()
            .filter(|e| !e.notification.is_read)
            .count()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.state()
            .entries
            .iter()
            .find(|e| e.notification.id == id)
            .map(|e| e.notification.clone())
    }

    pub fn pending_timers(&self) -> usize {
        self.state().timers.len()
    }

    /// Register one bus handler per domain event kind.
    ///
    /// Handlers hold a weak reference, so the bus never keeps the store alive.
    pub fn attach(&self, bus: &LocalEventBus) {
        let mut subs = self.bus_subscriptions();
        if !subs.is_empty() {
            tracing::warn!("Notification store already attached to a bus");
            return;
        }
        for kind in EventKind::ALL {
            let weak = Arc::downgrade(&self.inner);
            subs.push(bus.subscribe(kind, move |event| {
                if let Some(inner) = weak.upgrade() {
                    NotificationStore { inner }.handle_event(event);
                }
            }));
        }
        tracing::debug!(handlers = subs.len(), "Notification store attached to event bus");
    }

    /// Remove the bus handlers registered by [`attach`](Self::attach).
    pub fn detach(&self) {
        for sub in self.bus_subscriptions().drain(..) {
            sub.unsubscribe();
        }
    }

    /// Teardown: detach from the bus, cancel timers, drop listeners.
    pub fn shutdown(&self) {
        self.detach();
        self.state().abort_timers();
        self.inner.listeners.clear();
        tracing::info!("Notification store shut down");
    }

    fn handle_event(&self, event: &DomainEvent) {
        let mut spec = render(event);
        if self.inner.config.event_auto_hide {
            spec = spec.auto_hide(self.inner.config.event_duration);
        }
        if let Err(e) = self.show_notification(spec) {
            tracing::warn!(event_type = %event.kind(), error = %e, "Failed to show notification for event");
        }
    }

    /// Timer path: drop the handle (the task is finishing) and remove the entry.
    fn expire(&self, id: &str) {
        let stamped = {
            let mut state = self.state();
            state.timers.remove(id);
            match state.entries.iter().position(|e| e.notification.id == id) {
                Some(pos) => {
                    state.entries.remove(pos);
                    state.stamp()
                }
                None => return,
            }
        };
        tracing::debug!(id, "Notification auto-hidden");
        self.deliver(stamped);
    }

    fn mutate(&self, f: impl FnOnce(&mut StoreState) -> bool) {
        let stamped = {
            let mut state = self.state();
            if !f(&mut state) {
                return;
            }
            state.stamp()
        };
        self.deliver(stamped);
    }

    /// Queue `stamped` and, unless another call is already delivering,
    /// drain the queue to the listeners.
    ///
    /// Snapshots older than one already queued or delivered are dropped.
    /// A listener that mutates the store has its snapshot delivered after it
    /// returns, by the same loop.
    fn deliver(&self, stamped: Stamped) {
        {
            let mut delivery = self.delivery();
            let superseded = stamped.generation <= delivery.delivered
                || delivery
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.generation >= stamped.generation);
            if superseded {
                return;
            }
            delivery.pending = Some(stamped);
            if delivery.running {
                return;
            }
            delivery.running = true;
        }

        let mut guard = DeliveryGuard {
            delivery: &self.inner.delivery,
            armed: true,
        };
        loop {
            let next = {
                let mut delivery = self.delivery();
                match delivery.pending.take() {
                    Some(next) => {
                        delivery.delivered = next.generation;
                        next
                    }
                    None => {
                        delivery.running = false;
                        guard.armed = false;
                        return;
                    }
                }
            };
            self.inner.listeners.notify(&next.snapshot);
        }
    }

    fn delivery(&self) -> MutexGuard<'_, Delivery> {
        self.inner
            .delivery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn bus_subscriptions(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.inner
            .bus_subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the delivery loop if a listener panics.
struct DeliveryGuard<'a> {
    delivery: &'a Mutex<Delivery>,
    armed: bool,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
            delivery.running = false;
            delivery.pending = None;
        }
    }
}

async fn expire_after(store: Weak<StoreInner>, id: String, delay: Duration) {
    tokio::time::sleep(delay).await;
    if let Some(inner) = store.upgrade() {
        NotificationStore { inner }.expire(&id);
    }
}

fn validate_spec(spec: &NotificationSpec) -> Result<(), StoreError> {
    if spec.title.trim().is_empty() && spec.message.trim().is_empty() {
        return Err(StoreError::InvalidSpec(
            "title and message are both empty".into(),
        ));
    }
    if spec.auto_hide && spec.duration == 0 {
        return Err(StoreError::InvalidSpec(
            "auto-hide requires a positive duration".into(),
        ));
    }
    Ok(())
}
