//! One-to-many event hooks
//!
//! Listeners are registered with [`EventHook::on`] and removed through the
//! returned [`HookHandle`]. Triggering snapshots the listener list first, so
//! a listener may unsubscribe itself (or others) while being called.

use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// Typed observer registry for one kind of event
pub struct EventHook<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> EventHook<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener
    pub fn on<F>(&self, listener: F) -> HookHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
        T: 'static,
    {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        HookHandle {
            unsubscribe: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .listeners
                        .retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Call every registered listener, returning how many were called
    pub fn trigger(&self, event: &T) -> usize {
        let listeners: Vec<Listener<T>> = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }
}

impl<T> Default for EventHook<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Unsubscribe handle returned by [`EventHook::on`]
///
/// Dropping the handle keeps the listener registered.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct HookHandle {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl HookHandle {
    /// Remove the listener
    pub fn off(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for HookHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookHandle")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
