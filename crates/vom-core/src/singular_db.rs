//! Per-type stores of canonical instances.
//!
//! A store maps a domain key to a weak reference on the one live instance
//! for that key. It never keeps an instance alive: holders of the strong
//! references decide its lifetime, and the instance removes itself on drop
//! via [`SingularDb::release`].
//!
//! Strong references are never dropped while the store's lock is held,
//! since dropping the last one re-enters the store through `release`.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::ptr;
use std::sync::{Arc, Weak};

use crate::object::Object;

/// Store of canonical instances of `T` keyed by `K`.
pub struct SingularDb<K, T> {
    map: Mutex<BTreeMap<K, Weak<T>>>,
}

impl<K: Ord + Clone, T> Default for SingularDb<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, T> SingularDb<K, T> {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the live instance for `key`, or stores and returns a copy of
    /// `prototype` if there is none.
    pub fn find_or_add(&self, key: K, prototype: &T) -> Arc<T>
    where
        T: Clone,
    {
        let mut map = self.map.lock();
        if let Some(existing) = map.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        let instance = Arc::new(prototype.clone());
        map.insert(key, Arc::downgrade(&instance));
        instance
    }

    /// Returns the live instance for `key`, if any.
    pub fn find(&self, key: &K) -> Option<Arc<T>> {
        self.map.lock().get(key).and_then(Weak::upgrade)
    }

    /// Forgets `key` if its entry is dead or refers to `instance`. An entry
    /// already replaced by a newer instance is left alone.
    pub fn release(&self, key: &K, instance: *const T) {
        let mut map = self.map.lock();
        let stale = match map.get(key) {
            Some(weak) => weak.strong_count() == 0 || ptr::eq(weak.as_ptr(), instance),
            None => false,
        };
        if stale {
            map.remove(key);
        }
    }

    /// Number of keys with an entry, live or not yet released.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Returns strong references to every live instance, in key order.
    pub fn instances(&self) -> Vec<Arc<T>> {
        self.map.lock().values().filter_map(Weak::upgrade).collect()
    }

    /// Returns the keys with a live instance.
    pub fn keys(&self) -> Vec<K> {
        self.map
            .lock()
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl<K: Ord + Clone + fmt::Display, T: fmt::Display> SingularDb<K, T> {
    /// One line per live instance: `key -> instance`.
    pub fn dump(&self) -> String {
        let entries: Vec<(K, Arc<T>)> = {
            let map = self.map.lock();
            map.iter()
                .filter_map(|(k, w)| w.upgrade().map(|s| (k.clone(), s)))
                .collect()
        };
        let mut out = String::new();
        for (key, instance) in &entries {
            let _ = writeln!(out, "  {} -> {}", key, instance);
        }
        out
    }
}

impl<K: Ord + Clone, T: Object> SingularDb<K, T> {
    /// Calls `replay()` on every live instance, in key order.
    pub fn replay(&self) {
        for instance in self.instances() {
            instance.replay();
        }
    }
}
