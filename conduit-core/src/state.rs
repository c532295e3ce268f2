//! Interceptor identity and keyed per-session state.
//!
//! Interceptor instances are singletons shared by every request and every
//! session, so anything they need to remember about a session lives here,
//! keyed by the interceptor's own [`InterceptorKey`], instead of in instance
//! fields.

use parking_lot::Mutex;
use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// The identity of one interceptor instance.
///
/// Two interceptors built from the same configuration entry name still get
/// distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterceptorKey {
    name: Arc<str>,
    instance: u64,
}

impl InterceptorKey {
    /// Allocate a fresh key for an interceptor named `name`.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The configured name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for InterceptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.instance)
    }
}

type Slot = Arc<dyn Any + Send + Sync>;

/// Session-scoped storage for interceptor state.
///
/// The map lock is only held while a slot is looked up or created. Callers
/// synchronize access to the slot contents themselves (typically the slot
/// type is a `Mutex`).
#[derive(Default)]
pub struct InterceptorState {
    slots: Mutex<HashMap<InterceptorKey, Slot>>,
}

impl InterceptorState {
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the slot for `key`, creating it with `T::default()` on first use.
    ///
    /// A slot previously stored with a different type is replaced.
    pub fn slot<T>(&self, key: &InterceptorKey) -> Arc<T>
    where
        T: Default + Send + Sync + 'static,
    {
        let mut slots = self.slots.lock();
        if let Some(existing) = slots.get(key)
            && let Ok(typed) = Arc::clone(existing).downcast::<T>()
        {
            return typed;
        }
        let fresh = Arc::new(T::default());
        slots.insert(key.clone(), Arc::clone(&fresh) as Slot);
        fresh
    }

    /// Drop the slot for `key`.
    pub fn clear(&self, key: &InterceptorKey) -> bool {
        self.slots.lock().remove(key).is_some()
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no slot has been populated.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl fmt::Debug for InterceptorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorState")
            .field("slots", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct_per_instance() {
        let a = InterceptorKey::new("token");
        let b = InterceptorKey::new("token");
        assert_ne!(a, b);
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn test_slot_is_shared_for_same_key() {
        let state = InterceptorState::new();
        let key = InterceptorKey::new("counter");

        let first = state.slot::<Mutex<u32>>(&key);
        *first.lock() += 1;
        let second = state.slot::<Mutex<u32>>(&key);

        assert_eq!(*second.lock(), 1);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_slots_isolated_by_key() {
        let state = InterceptorState::new();
        let a = InterceptorKey::new("a");
        let b = InterceptorKey::new("b");

        *state.slot::<Mutex<u32>>(&a).lock() = 7;
        assert_eq!(*state.slot::<Mutex<u32>>(&b).lock(), 0);
        assert!(state.clear(&a));
        assert_eq!(*state.slot::<Mutex<u32>>(&a).lock(), 0);
    }
}
