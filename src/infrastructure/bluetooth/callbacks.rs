//! State change observers.

use crate::domain::state::MugState;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

/// Receives the full current state after any change.
pub type MugCallback = Arc<dyn Fn(&MugState) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: BTreeMap<u64, MugCallback>,
}

/// Ordered set of callbacks, fired in registration order.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`. Registering the same `Arc` again returns the
    /// handle of the existing entry.
    pub fn register(&self, callback: MugCallback) -> CallbackHandle {
        let mut registry = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let ptr = Arc::as_ptr(&callback) as *const ();
        let existing = registry
            .entries
            .iter()
            .find(|(_, cb)| Arc::as_ptr(cb) as *const () == ptr)
            .map(|(id, _)| *id);

        let id = match existing {
            Some(id) => {
                debug!("Callback already registered as #{}", id);
                id
            }
            None => {
                let id = registry.next_id;
                registry.next_id += 1;
                registry.entries.insert(id, callback);
                id
            }
        };
        CallbackHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback with `state`.
    ///
    /// The list is copied first so callbacks can register or unregister
    /// without deadlocking.
    pub fn fire(&self, state: &MugState) {
        for callback in self.snapshot() {
            callback(state);
        }
    }

    fn snapshot(&self) -> Vec<MugCallback> {
        match self.inner.lock() {
            Ok(registry) => registry.entries.values().cloned().collect(),
            Err(poisoned) => {
                warn!("Callback registry lock poisoned, recovering");
                poisoned.into_inner().entries.values().cloned().collect()
            }
        }
    }
}

/// Token returned from [`CallbackRegistry::register`].
#[derive(Clone)]
pub struct CallbackHandle {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl CallbackHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the callback. Safe to call more than once, and after the
    /// owning engine is gone.
    pub fn unregister(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = match registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if registry.entries.remove(&self.id).is_some() {
            debug!("Callback #{} unregistered", self.id);
        }
    }
}

impl PartialEq for CallbackHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.registry, &other.registry)
    }
}

impl Eq for CallbackHandle {}

impl std::fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (MugCallback, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback: MugCallback = Arc::new(move |_state: &MugState| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (callback, calls)
    }

    #[test]
    fn test_same_callback_registers_once() {
        let registry = CallbackRegistry::new();
        let (callback, calls) = counting();

        let first = registry.register(callback.clone());
        let second = registry.register(callback);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);

        registry.fire(&MugState::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        first.unregister();
        registry.fire(&MugState::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = CallbackRegistry::new();
        let (a, _) = counting();
        let (b, b_calls) = counting();
        let handle = registry.register(a);
        registry.register(b);

        handle.unregister();
        handle.unregister();
        assert_eq!(registry.len(), 1);

        registry.fire(&MugState::default());
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fires_in_registration_order() {
        let registry = CallbackRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            registry.register(Arc::new(move |_: &MugState| {
                order.lock().unwrap().push(n);
            }));
        }
        registry.fire(&MugState::default());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_callback_may_unregister_itself() {
        let registry = CallbackRegistry::new();
        let slot: Arc<Mutex<Option<CallbackHandle>>> = Arc::new(Mutex::new(None));
        let inner = slot.clone();
        let handle = registry.register(Arc::new(move |_: &MugState| {
            if let Some(handle) = inner.lock().unwrap().as_ref() {
                handle.unregister();
            }
        }));
        *slot.lock().unwrap() = Some(handle);

        registry.fire(&MugState::default());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handle_outlives_registry() {
        let registry = CallbackRegistry::new();
        let (callback, _) = counting();
        let handle = registry.register(callback);
        drop(registry);
        handle.unregister();
    }
}
