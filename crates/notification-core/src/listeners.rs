//! Callback registries with explicit unsubscribe handles.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// Ordered set of listeners for values of type `T`.
///
/// Listeners run in registration order, outside the internal lock, so a
/// listener may register or unsubscribe other listeners while running.
pub struct ListenerSet<T> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T> Clone for ListenerSet<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T: 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register `listener` and return its removal handle.
    pub fn add<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut slots = lock(&self.slots);
            let id = slots.next_id;
            slots.next_id += 1;
            slots.entries.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = weak.upgrade() {
                lock(&slots).entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Invoke every listener registered at the time of the call.
    pub fn notify(&self, value: &T) {
        let current: Vec<Listener<T>> = lock(&self.slots)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in current {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.slots).entries.clear();
    }
}

fn lock<T>(slots: &Mutex<Slots<T>>) -> MutexGuard<'_, Slots<T>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned by `subscribe`-style calls.
///
/// Dropping it keeps the listener registered; call [`Subscription::unsubscribe`]
/// to remove it. Unsubscribing twice is a no-op.
pub struct Subscription {
    remove: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Mutex::new(Some(Box::new(remove))),
        }
    }

    pub fn unsubscribe(&self) {
        let remove = self
            .remove
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(remove) = remove {
            remove();
        }
    }

    pub fn is_active(&self) -> bool {
        self.remove
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
