//! Key Lock Module
//!
//! Per-key mutual exclusion for compound operations, without allocating a
//! lock object per key.

use std::collections::HashSet;
use std::hash::Hash;

use parking_lot::{Condvar, Mutex};

// == Key Lock Registry ==
/// A shared wait-set of keys that currently have an operation in flight.
///
/// One mutex guards the set of held keys; waiters sleep on a single
/// condition variable and recheck membership when woken. Memory use is
/// bounded by the number of keys held at once, not the number ever seen.
#[derive(Debug)]
pub(crate) struct KeyLockRegistry<K> {
    held: Mutex<HashSet<K>>,
    released: Condvar,
}

impl<K: Eq + Hash + Clone> KeyLockRegistry<K> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    // == Acquire ==
    /// Blocks until no other thread holds `key`, then holds it until the
    /// returned guard is dropped.
    ///
    /// Not reentrant: acquiring a key the current thread already holds
    /// deadlocks.
    pub fn acquire(&self, key: &K) -> KeyGuard<'_, K> {
        let mut held = self.held.lock();
        while held.contains(key) {
            self.released.wait(&mut held);
        }
        held.insert(key.clone());
        KeyGuard {
            registry: self,
            key: key.clone(),
        }
    }

    /// Whether some thread currently holds `key`.
    #[cfg(test)]
    pub fn is_held(&self, key: &K) -> bool {
        self.held.lock().contains(key)
    }

    /// Number of keys currently held.
    #[cfg(test)]
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    fn release(&self, key: &K) {
        let mut held = self.held.lock();
        held.remove(key);
        drop(held);
        // Waiters for other keys wake too and go back to sleep.
        self.released.notify_all();
    }
}

// == Key Guard ==
/// Proof that the current thread holds a key; releases it on drop.
#[must_use = "the key is released as soon as the guard is dropped"]
pub(crate) struct KeyGuard<'a, K: Eq + Hash + Clone> {
    registry: &'a KeyLockRegistry<K>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}
