//! Cache Facade Module
//!
//! The public operation set. Each compound operation runs under the key
//! lock for its key, so check-then-act sequences on one key never
//! interleave, while operations on different keys proceed in parallel.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::parameters::{CacheParameters, ParameterSettings};
use crate::cache::store::{CacheStore, Lookup};
use crate::cache::{CacheStats, CacheView, Clock, SystemClock};

// == Cache ==
/// A concurrent key/value cache bounded by entry age and entry count.
///
/// `Cache` is a handle: clones share the same entries and parameters.
/// Entries removed by expiry or eviction disappear without a trace; no
/// later read can observe them.
///
/// # Example
/// ```
/// use agecache::Cache;
/// use std::time::Duration;
///
/// let cache: Cache<String, u32> = Cache::new();
/// cache.parameters().set_max_update_age(Some(Duration::from_secs(60)));
/// cache.parameters().set_maximum_size(1000);
///
/// cache.put("answer".to_string(), 42);
/// assert_eq!(cache.get(&"answer".to_string()), Some(42));
/// assert!(!cache.put_if_absent("answer".to_string(), 7));
/// ```
pub struct Cache<K, V> {
    store: Arc<CacheStore<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<K, V> fmt::Debug for Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.store.len())
            .field("parameters", &self.store.params().settings())
            .finish()
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates an unbounded, enabled cache on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an unbounded, enabled cache reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_settings(clock, ParameterSettings::default())
    }

    /// Creates a cache with initial parameter values.
    pub fn with_settings(clock: Arc<dyn Clock>, settings: ParameterSettings) -> Self {
        Self {
            store: CacheStore::new(clock, settings),
        }
    }

    // == Parameters ==
    /// The live parameters of this cache. Changes apply immediately.
    pub fn parameters(&self) -> Arc<CacheParameters> {
        Arc::clone(self.store.params())
    }

    fn is_disabled(&self) -> bool {
        self.store.params().is_disabled()
    }

    // == Size ==
    /// Number of entries, after expiring stale ones.
    pub fn len(&self) -> usize {
        self.store.sweep();
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is present. Does not count as a read.
    pub fn contains_key(&self, key: &K) -> bool {
        if self.is_disabled() {
            return false;
        }
        self.store.sweep();
        self.store.lookup(key).is_some()
    }

    // == Get ==
    /// Returns the value for `key`, refreshing its access time.
    pub fn get(&self, key: &K) -> Option<V> {
        if self.is_disabled() {
            return None;
        }
        self.store.sweep();
        let value = {
            let _guard = self.store.lock_key(key);
            self.store
                .lookup(key)
                .and_then(|entry| self.store.read_entry(&entry))
        };
        self.store.record_read(value.is_some());
        value
    }

    /// Returns the value for `key`, or `default` when absent.
    pub fn get_or_default(&self, key: &K, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    // == Put ==
    /// Stores `value` under `key`, creating or overwriting.
    pub fn put(&self, key: K, value: V) {
        self.get_and_put(key, value);
    }

    /// Stores `value` under `key` and returns the previous value.
    pub fn get_and_put(&self, key: K, value: V) -> Option<V> {
        if self.is_disabled() {
            return None;
        }
        self.store.sweep();
        let _guard = self.store.lock_key(&key);
        self.store.upsert(&key, value).previous()
    }

    /// Stores `value` only if `key` is absent. Returns whether it did.
    pub fn put_if_absent(&self, key: K, value: V) -> bool {
        if self.is_disabled() {
            return false;
        }
        self.store.sweep();
        let _guard = self.store.lock_key(&key);
        matches!(self.store.lookup_or_create(&key, value), Lookup::Created)
    }

    // == Remove ==
    /// Removes `key`. Returns whether anything was removed.
    pub fn remove(&self, key: &K) -> bool {
        self.get_and_remove(key).is_some()
    }

    /// Removes `key` and returns the value it held.
    pub fn get_and_remove(&self, key: &K) -> Option<V> {
        if self.is_disabled() {
            return None;
        }
        self.store.sweep();
        let _guard = self.store.lock_key(key);
        let entry = self.store.lookup(key)?;
        let value = entry.peek()?;
        self.store.delete(key, &entry).then_some(value)
    }

    // == Replace ==
    /// Overwrites the value of an existing `key`. Returns whether it did.
    pub fn replace(&self, key: &K, value: V) -> bool {
        self.get_and_replace(key, value).is_some()
    }

    /// Overwrites the value of an existing `key` and returns the old one.
    pub fn get_and_replace(&self, key: &K, value: V) -> Option<V> {
        if self.is_disabled() {
            return None;
        }
        self.store.sweep();
        let _guard = self.store.lock_key(key);
        let entry = self.store.lookup(key)?;
        self.store.write_entry(&entry, value).ok()
    }

    // == Compute ==
    /// Replaces the mapping for `key` with `f(key, current)`.
    ///
    /// `None` from `f` removes the mapping. Returns the value now stored,
    /// which is `None` if the cache was disabled before it could be
    /// written. Runs under the key lock, so `f` must not call back into
    /// this cache for the same key.
    pub fn compute<F>(&self, key: K, f: F) -> Option<V>
    where
        F: FnOnce(&K, Option<&V>) -> Option<V>,
    {
        if self.is_disabled() {
            return None;
        }
        self.store.sweep();
        let _guard = self.store.lock_key(&key);
        let entry = self.store.lookup(&key);
        let current = entry.as_ref().and_then(|e| e.peek());

        match (f(&key, current.as_ref()), entry) {
            (Some(value), _) => self.store.upsert(&key, value.clone()).landed().then_some(value),
            (None, Some(entry)) => {
                self.store.delete(&key, &entry);
                None
            }
            (None, None) => None,
        }
    }

    /// Stores `f(key)` if `key` is absent.
    ///
    /// Returns the value now mapped to `key`: the existing one, the newly
    /// computed one, or `None` if `f` produced nothing.
    pub fn compute_if_absent<F>(&self, key: K, f: F) -> Option<V>
    where
        F: FnOnce(&K) -> Option<V>,
    {
        if self.is_disabled() {
            return None;
        }
        self.store.sweep();
        let _guard = self.store.lock_key(&key);
        if let Some(existing) = self.store.lookup(&key).and_then(|e| e.peek()) {
            return Some(existing);
        }

        let value = f(&key)?;
        match self.store.lookup_or_create(&key, value.clone()) {
            Lookup::Created => Some(value),
            Lookup::Found(entry, _) => entry.peek(),
            Lookup::Refused => None,
        }
    }

    /// Replaces the value of an existing `key` with `f(key, current)`.
    ///
    /// `None` from `f` removes the mapping. Returns the new value if it
    /// was stored.
    pub fn compute_if_present<F>(&self, key: &K, f: F) -> Option<V>
    where
        F: FnOnce(&K, &V) -> Option<V>,
    {
        if self.is_disabled() {
            return None;
        }
        self.store.sweep();
        let _guard = self.store.lock_key(key);
        let entry = self.store.lookup(key)?;
        let current = entry.peek()?;

        match f(key, &current) {
            Some(value) => self.store.upsert(key, value.clone()).landed().then_some(value),
            None => {
                self.store.delete(key, &entry);
                None
            }
        }
    }

    // == Bulk ==
    /// Removes every entry.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Runs the expiry sweep now. Returns how many entries it removed.
    pub fn clear_expired(&self) -> usize {
        self.store.sweep()
    }

    /// Point-in-time copies of every entry; not a live view.
    pub fn cache_views(&self) -> Vec<CacheView<K, V>> {
        if self.is_disabled() {
            return Vec::new();
        }
        self.store.sweep();
        self.store.views()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    // == Value-Conditioned Operations ==
    /// Removes `key` only if it currently maps to `expected`.
    pub fn remove_if_eq(&self, key: &K, expected: &V) -> bool {
        if self.is_disabled() {
            return false;
        }
        self.store.sweep();
        let _guard = self.store.lock_key(key);
        let Some(entry) = self.store.lookup(key) else {
            return false;
        };
        if entry.peek().as_ref() != Some(expected) {
            return false;
        }
        self.store.delete(key, &entry)
    }

    /// Overwrites `key` with `value` only if it currently maps to
    /// `expected`.
    pub fn replace_if_eq(&self, key: &K, expected: &V, value: V) -> bool {
        if self.is_disabled() {
            return false;
        }
        self.store.sweep();
        let _guard = self.store.lock_key(key);
        let Some(entry) = self.store.lookup(key) else {
            return false;
        };
        if entry.peek().as_ref() != Some(expected) {
            return false;
        }
        self.store.write_entry(&entry, value).is_ok()
    }
}
