use dashmap::DashSet;
use std::hash::Hash;
use std::sync::Arc;

/// Tracks which keys have an operation running, allowing at most one per key.
///
/// Unlike a keyed mutex a second caller does not wait: `try_begin` returns
/// `None` and the caller reports the slot as busy.
#[derive(Debug)]
pub struct InFlight<K: Eq + Hash + Clone> {
    active: Arc<DashSet<K>>,
}

impl<K: Eq + Hash + Clone> Clone for InFlight<K> {
    fn clone(&self) -> Self {
        Self {
            active: Arc::clone(&self.active),
        }
    }
}

impl<K: Eq + Hash + Clone> InFlight<K> {
    pub fn new() -> Self {
        Self {
            active: Arc::new(DashSet::new()),
        }
    }

    /// Marks `key` busy. The mark is cleared when the guard is dropped.
    pub fn try_begin(&self, key: K) -> Option<InFlightGuard<K>> {
        if self.active.insert(key.clone()) {
            Some(InFlightGuard {
                active: Arc::clone(&self.active),
                key,
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, key: &K) -> bool {
        self.active.contains(key)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl<K: Eq + Hash + Clone> Default for InFlight<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct InFlightGuard<K: Eq + Hash + Clone> {
    active: Arc<DashSet<K>>,
    key: K,
}

impl<K: Eq + Hash + Clone> InFlightGuard<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Clone> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        self.active.remove(&self.key);
    }
}
