//! Cache Store Module
//!
//! The structural map, the two timestamp indices, and the expiry sweep.
//!
//! Lock order is key lock, then structural lock, then an entry's own
//! mutex. The sweep never takes key locks; it relies on each entry's
//! `live` flag and timestamp re-check instead.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, info};

use crate::cache::entry::{CacheEntry, Stamps, TimestampKind};
use crate::cache::index::TimestampIndex;
use crate::cache::key_lock::{KeyGuard, KeyLockRegistry};
use crate::cache::parameters::{CacheParameters, ParameterListener, ParameterSettings};
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::{CacheView, Clock};

type EntryRef<K, V> = Arc<CacheEntry<K, V>>;

// == Structure ==
/// Everything guarded by the structural lock. A key is in `map` iff its
/// entry is in both indices.
struct Structure<K, V> {
    map: HashMap<K, EntryRef<K, V>>,
    by_access: TimestampIndex<CacheEntry<K, V>>,
    by_update: TimestampIndex<CacheEntry<K, V>>,
}

impl<K: Eq + Hash, V> Structure<K, V> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            by_access: TimestampIndex::new(),
            by_update: TimestampIndex::new(),
        }
    }

    fn index_mut(&mut self, kind: TimestampKind) -> &mut TimestampIndex<CacheEntry<K, V>> {
        match kind {
            TimestampKind::Access => &mut self.by_access,
            TimestampKind::Update => &mut self.by_update,
        }
    }

    fn index(&self, kind: TimestampKind) -> &TimestampIndex<CacheEntry<K, V>> {
        match kind {
            TimestampKind::Access => &self.by_access,
            TimestampKind::Update => &self.by_update,
        }
    }

    /// Drops a retired entry from the map and from both indices.
    fn unlink(&mut self, entry: &EntryRef<K, V>, stamps: Stamps) {
        let key = entry.key();
        if self.map.get(key).is_some_and(|e| Arc::ptr_eq(e, entry)) {
            self.map.remove(key);
        }
        self.by_access.relocate(entry, Some(stamps.access), None);
        self.by_update.relocate(entry, Some(stamps.update), None);
    }
}

// == Lookup ==
/// Result of [`CacheStore::lookup_or_create`].
pub(crate) enum Lookup<K, V> {
    /// The key was present; the offered value is handed back unused.
    Found(EntryRef<K, V>, V),
    /// A new entry holding the offered value was inserted.
    Created,
    /// The key was absent and the cache is disabled.
    Refused,
}

/// Result of [`CacheStore::upsert`].
pub(crate) enum Upsert<V> {
    /// An existing entry was overwritten; holds the value it had.
    Replaced(V),
    Created,
    /// The key was absent and the cache is disabled; nothing was written.
    Refused,
}

impl<V> Upsert<V> {
    pub fn landed(&self) -> bool {
        !matches!(self, Upsert::Refused)
    }

    pub fn previous(self) -> Option<V> {
        match self {
            Upsert::Replaced(previous) => Some(previous),
            Upsert::Created | Upsert::Refused => None,
        }
    }
}

// == Cache Store ==
/// Shared state behind every [`Cache`](crate::cache::Cache) handle.
pub(crate) struct CacheStore<K, V> {
    structure: RwLock<Structure<K, V>>,
    key_locks: KeyLockRegistry<K>,
    params: Arc<CacheParameters>,
    clock: Arc<dyn Clock>,
    stats: StatsRecorder,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a store whose parameters report changes back to it.
    pub fn new(clock: Arc<dyn Clock>, settings: ParameterSettings) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let owner: Weak<dyn ParameterListener> = weak.clone();
            Self {
                structure: RwLock::new(Structure::new()),
                key_locks: KeyLockRegistry::new(),
                params: Arc::new(CacheParameters::attached(settings, owner)),
                clock,
                stats: StatsRecorder::new(),
            }
        })
    }

    pub fn params(&self) -> &Arc<CacheParameters> {
        &self.params
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }

    pub fn record_read(&self, hit: bool) {
        self.stats.record_read(hit);
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn len(&self) -> usize {
        self.structure.read().map.len()
    }

    // == Key Lock ==
    /// Serializes compound operations on `key`.
    pub fn lock_key(&self, key: &K) -> KeyGuard<'_, K> {
        self.key_locks.acquire(key)
    }

    // == Lookup ==
    /// Returns the live entry for `key`.
    ///
    /// An entry already past an age limit is removed on the spot rather
    /// than returned, even if no sweep has reached it yet.
    pub fn lookup(&self, key: &K) -> Option<EntryRef<K, V>> {
        let entry = self.structure.read().map.get(key).cloned()?;
        if self.is_stale(&entry) {
            if self.delete(key, &entry) {
                self.stats.record_expirations(1);
            }
            return None;
        }
        Some(entry)
    }

    // == Lookup Or Create ==
    /// Returns the entry for `key`, inserting one holding `value` if absent.
    ///
    /// Must be called with the key lock for `key` held.
    pub fn lookup_or_create(&self, key: &K, value: V) -> Lookup<K, V> {
        if let Some(entry) = self.lookup(key) {
            return Lookup::Found(entry, value);
        }

        let structure = self.structure.upgradable_read();
        if let Some(entry) = structure.map.get(key) {
            return Lookup::Found(Arc::clone(entry), value);
        }
        // Checked under the structural lock so creation cannot slip in
        // after a concurrent disable has cleared the map.
        if self.params.is_disabled() {
            return Lookup::Refused;
        }

        let mut structure = RwLockUpgradableReadGuard::upgrade(structure);
        let now = self.now();
        let entry = Arc::new(CacheEntry::new(key.clone(), value, now));
        structure.by_access.relocate(&entry, None, Some(now));
        structure.by_update.relocate(&entry, None, Some(now));
        structure.map.insert(key.clone(), entry);
        drop(structure);

        self.enforce_capacity();
        Lookup::Created
    }

    // == Upsert ==
    /// Writes `value` under `key`, creating the entry if needed.
    ///
    /// Must be called with the key lock for `key` held.
    pub fn upsert(&self, key: &K, value: V) -> Upsert<V> {
        let mut value = value;
        loop {
            match self.lookup_or_create(key, value) {
                Lookup::Found(entry, offered) => match self.write_entry(&entry, offered) {
                    Ok(previous) => return Upsert::Replaced(previous),
                    // Swept between lookup and write; it is gone from the
                    // map now, so the next pass creates a fresh entry.
                    Err(returned) => value = returned,
                },
                Lookup::Created => return Upsert::Created,
                Lookup::Refused => return Upsert::Refused,
            }
        }
    }

    // == Entry Access ==
    /// Reads an entry and moves it to its new access bucket.
    pub fn read_entry(&self, entry: &EntryRef<K, V>) -> Option<V> {
        let now = self.now();
        let (value, previous) = entry.read(now)?;
        self.relocate(entry, TimestampKind::Access, previous, now);
        Some(value)
    }

    /// Writes an entry and moves it to its new update bucket.
    pub fn write_entry(&self, entry: &EntryRef<K, V>, value: V) -> Result<V, V> {
        let now = self.now();
        let (previous, stamp) = entry.write(value, now)?;
        self.relocate(entry, TimestampKind::Update, stamp, now);
        Ok(previous)
    }

    fn relocate(&self, entry: &EntryRef<K, V>, kind: TimestampKind, old: DateTime<Utc>, new: DateTime<Utc>) {
        let mut structure = self.structure.write();
        // A sweep may have retired the entry since its timestamp moved; it
        // still has to leave the old bucket but must not enter the new one.
        let new = entry.is_live().then_some(new);
        structure.index_mut(kind).relocate(entry, Some(old), new);
    }

    // == Delete ==
    /// Removes `key` only if it still maps to `expected`.
    ///
    /// Returns whether this call removed it; removing an entry that is
    /// already gone is a silent no-op.
    pub fn delete(&self, key: &K, expected: &EntryRef<K, V>) -> bool {
        let mut structure = self.structure.write();
        let current = structure.map.get(key).is_some_and(|e| Arc::ptr_eq(e, expected));
        if !current {
            return false;
        }
        match expected.retire() {
            Some(stamps) => {
                structure.unlink(expected, stamps);
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Removes every entry. Returns how many there were.
    pub fn clear(&self) -> usize {
        let mut structure = self.structure.write();
        for entry in structure.map.values() {
            entry.retire();
        }
        let count = structure.map.len();
        structure.map.clear();
        structure.by_access.clear();
        structure.by_update.clear();
        count
    }

    // == Views ==
    /// Point-in-time copies of every entry.
    pub fn views(&self) -> Vec<CacheView<K, V>> {
        let entries: Vec<EntryRef<K, V>> = self.structure.read().map.values().cloned().collect();
        entries.iter().filter_map(|entry| entry.snapshot()).collect()
    }

    // == Sweep ==
    /// Runs the expiry sweep: age-based removal, then capacity eviction.
    ///
    /// Returns the number of entries removed. A disabled cache is emptied.
    pub fn sweep(&self) -> usize {
        let settings = self.params.settings();
        if settings.disabled {
            return self.clear();
        }

        let now = self.now();
        let mut expired = 0;
        for (kind, age) in [
            (TimestampKind::Update, settings.max_update_age),
            (TimestampKind::Access, settings.max_access_age),
        ] {
            if let Some(threshold) = age.and_then(|age| expiry_threshold(now, age)) {
                expired += self.expire_before(kind, threshold);
            }
        }
        if expired > 0 {
            self.stats.record_expirations(expired);
        }

        let evicted = self.evict_over(settings.maximum_size, eviction_kind(&settings));
        if expired + evicted > 0 {
            debug!(expired, evicted, "Cache sweep removed entries");
        }
        expired + evicted
    }

    /// Capacity pass alone, run right after an insert.
    fn enforce_capacity(&self) {
        let settings = self.params.settings();
        let evicted = self.evict_over(settings.maximum_size, eviction_kind(&settings));
        if evicted > 0 {
            debug!(evicted, "Cache insert evicted entries");
        }
    }

    /// Removes entries whose `kind` timestamp is strictly before `threshold`.
    fn expire_before(&self, kind: TimestampKind, threshold: DateTime<Utc>) -> usize {
        let has_candidates = self
            .structure
            .read()
            .index(kind)
            .oldest()
            .is_some_and(|oldest| oldest < threshold);
        if !has_candidates {
            return 0;
        }

        let mut structure = self.structure.write();
        let candidates = structure.index_mut(kind).sweep_before(threshold);
        let mut removed = 0;
        for (seen, entry) in candidates {
            // Entries whose timestamp moved are re-bucketed by whoever moved it.
            if let Some(stamps) = entry.retire_if_unchanged(kind, seen) {
                structure.unlink(&entry, stamps);
                removed += 1;
            }
        }
        removed
    }

    /// Evicts the oldest entries by `kind` until at most `maximum` remain.
    fn evict_over(&self, maximum: usize, kind: TimestampKind) -> usize {
        if self.len() <= maximum {
            return 0;
        }

        let mut removed = 0;
        let mut structure = self.structure.write();
        while structure.map.len() > maximum {
            let Some((seen, entry)) = structure.index_mut(kind).pop_oldest() else {
                break;
            };
            // Same rule as the age pass: a moved timestamp saves the entry.
            if let Some(stamps) = entry.retire_if_unchanged(kind, seen) {
                structure.unlink(&entry, stamps);
                removed += 1;
            }
        }
        drop(structure);

        self.stats.record_evictions(removed);
        removed
    }

    fn is_stale(&self, entry: &EntryRef<K, V>) -> bool {
        let settings = self.params.settings();
        let now = self.now();
        let stamps = entry.stamps();
        is_older(stamps.update, settings.max_update_age, now)
            || is_older(stamps.access, settings.max_access_age, now)
    }

    #[cfg(test)]
    fn index_len(&self, kind: TimestampKind) -> usize {
        self.structure.read().index(kind).len()
    }
}

impl<K, V> ParameterListener for CacheStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn parameters_changed(&self) {
        let removed = self.sweep();
        if self.params.is_disabled() && removed > 0 {
            info!(removed, "Cache disabled, entries cleared");
        }
    }
}

// == Helpers ==
/// The instant before which a timestamp is older than `age`, if
/// representable.
fn expiry_threshold(now: DateTime<Utc>, age: Duration) -> Option<DateTime<Utc>> {
    let age = chrono::Duration::from_std(age).ok()?;
    now.checked_sub_signed(age)
}

fn is_older(stamp: DateTime<Utc>, age: Option<Duration>, now: DateTime<Utc>) -> bool {
    age.and_then(|age| expiry_threshold(now, age))
        .is_some_and(|threshold| stamp < threshold)
}

fn eviction_kind(settings: &ParameterSettings) -> TimestampKind {
    if settings.access_priority_eviction {
        TimestampKind::Access
    } else {
        TimestampKind::Update
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    fn store_with(settings: ParameterSettings) -> (Arc<ManualClock>, Arc<CacheStore<String, String>>) {
        let clock = Arc::new(ManualClock::new());
        let store = CacheStore::new(clock.clone(), settings);
        (clock, store)
    }

    fn insert(store: &CacheStore<String, String>, key: &str, value: &str) {
        let key = key.to_string();
        let _guard = store.lock_key(&key);
        assert!(matches!(store.lookup_or_create(&key, value.to_string()), Lookup::Created));
    }

    fn assert_consistent(store: &CacheStore<String, String>) {
        let len = store.len();
        assert_eq!(store.index_len(TimestampKind::Access), len, "access index out of step");
        assert_eq!(store.index_len(TimestampKind::Update), len, "update index out of step");
    }

    #[test]
    fn test_store_new() {
        let (_, store) = store_with(ParameterSettings::default());
        assert_eq!(store.len(), 0);
        assert!(store.views().is_empty());
        assert_consistent(&store);
    }

    #[test]
    fn test_lookup_or_create_then_found() {
        let (_, store) = store_with(ParameterSettings::default());
        insert(&store, "k", "v1");

        let key = "k".to_string();
        match store.lookup_or_create(&key, "v2".to_string()) {
            Lookup::Found(entry, unused) => {
                assert_eq!(unused, "v2");
                assert_eq!(entry.peek().as_deref(), Some("v1"));
            }
            _ => panic!("expected existing entry"),
        }
        assert_eq!(store.len(), 1);
        assert_consistent(&store);
    }

    #[test]
    fn test_create_refused_when_disabled() {
        let (_, store) = store_with(ParameterSettings {
            disabled: true,
            ..Default::default()
        });

        let key = "k".to_string();
        assert!(matches!(store.lookup_or_create(&key, "v".to_string()), Lookup::Refused));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_delete_compares_entry() {
        let (_, store) = store_with(ParameterSettings::default());
        insert(&store, "k", "v");
        let key = "k".to_string();
        let first = store.lookup(&key).unwrap();

        assert!(store.delete(&key, &first));
        insert(&store, "k", "v2");

        // The stale handle no longer matches the current mapping
        assert!(!store.delete(&key, &first));
        assert_eq!(store.len(), 1);
        assert_consistent(&store);
    }

    #[test]
    fn test_upsert_replaces_value_and_bumps_update_bucket() {
        let (clock, store) = store_with(ParameterSettings::default());
        insert(&store, "k", "v1");
        clock.advance(Duration::from_secs(1));

        let key = "k".to_string();
        assert_eq!(store.upsert(&key, "v2".to_string()).previous().as_deref(), Some("v1"));

        let view = &store.views()[0];
        assert_eq!(view.value, "v2");
        assert_eq!((view.last_update - view.last_access).num_seconds(), 1);
        assert_consistent(&store);
    }

    #[test]
    fn test_upsert_after_entry_retired_creates_fresh() {
        let (_, store) = store_with(ParameterSettings::default());
        insert(&store, "k", "v1");
        let key = "k".to_string();
        let entry = store.lookup(&key).unwrap();

        // Simulate a sweep retiring the entry behind the writer's back
        assert!(store.delete(&key, &entry));
        assert!(store.write_entry(&entry, "lost".to_string()).is_err());

        assert!(matches!(store.upsert(&key, "v2".to_string()), Upsert::Created));
        assert_eq!(store.lookup(&key).unwrap().peek().as_deref(), Some("v2"));
        assert_consistent(&store);
    }

    #[test]
    fn test_upsert_refused_when_disabled() {
        let (_, store) = store_with(ParameterSettings {
            disabled: true,
            ..Default::default()
        });
        let key = "k".to_string();

        let outcome = store.upsert(&key, "v".to_string());

        assert!(!outcome.landed());
        assert_eq!(outcome.previous(), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_unlink_needs_no_clone_value() {
        struct Opaque;

        let mut structure: Structure<String, Opaque> = Structure::new();
        let now = ManualClock::new().now();
        let entry = Arc::new(CacheEntry::new("k".to_string(), Opaque, now));
        structure.by_access.relocate(&entry, None, Some(now));
        structure.by_update.relocate(&entry, None, Some(now));
        structure.map.insert("k".to_string(), Arc::clone(&entry));

        let stamps = entry.retire().unwrap();
        structure.unlink(&entry, stamps);

        assert!(structure.map.is_empty());
        assert_eq!(structure.by_access.len(), 0);
        assert_eq!(structure.by_update.len(), 0);
    }

    #[test]
    fn test_sweep_by_update_age() {
        let (clock, store) = store_with(ParameterSettings {
            max_update_age: Some(Duration::from_secs(3)),
            ..Default::default()
        });
        insert(&store, "a", "A");
        clock.advance(Duration::from_secs(1));
        insert(&store, "b", "B");
        clock.advance(Duration::from_secs(3));

        // a is 4s old, b exactly 3s old and still inside the limit
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.lookup(&"b".to_string()).is_some());
        assert_eq!(store.stats().expirations, 1);
        assert_consistent(&store);
    }

    #[test]
    fn test_lookup_hides_stale_entry_before_sweep() {
        let (clock, store) = store_with(ParameterSettings {
            max_update_age: Some(Duration::from_secs(1)),
            ..Default::default()
        });
        insert(&store, "a", "A");
        clock.advance(Duration::from_secs(2));

        assert!(store.lookup(&"a".to_string()).is_none());
        assert_eq!(store.len(), 0);
        assert_consistent(&store);
    }

    #[test]
    fn test_sweep_skips_entry_with_moved_stamp() {
        let (clock, store) = store_with(ParameterSettings::default());
        insert(&store, "a", "A");
        let entry = store.lookup(&"a".to_string()).unwrap();
        let (_, seen) = entry.read(store.now()).unwrap();

        // Read moved the access stamp but the relocation has not run yet
        clock.advance(Duration::from_secs(5));
        entry.read(store.now()).unwrap();

        let swept = store.structure.write().by_access.sweep_before(store.now());
        assert_eq!(swept.len(), 1);
        assert!(entry.retire_if_unchanged(TimestampKind::Access, seen).is_none());
        assert!(entry.is_live());
    }

    #[test]
    fn test_evict_over_capacity_drops_oldest_update() {
        let (clock, store) = store_with(ParameterSettings {
            maximum_size: 2,
            ..Default::default()
        });
        insert(&store, "a", "A");
        clock.advance(Duration::from_secs(1));
        insert(&store, "b", "B");
        clock.advance(Duration::from_secs(1));
        insert(&store, "c", "C");

        assert_eq!(store.len(), 2);
        assert!(store.lookup(&"a".to_string()).is_none());
        assert_eq!(store.stats().evictions, 1);
        assert_consistent(&store);
    }

    #[test]
    fn test_evict_keeps_unneeded_part_of_bucket() {
        let (clock, store) = store_with(ParameterSettings::default());
        // Three entries share one timestamp
        insert(&store, "a", "A");
        insert(&store, "b", "B");
        insert(&store, "c", "C");
        clock.advance(Duration::from_secs(1));

        store.params().set_maximum_size(2);

        assert_eq!(store.len(), 2);
        assert_consistent(&store);
    }

    #[test]
    fn test_eviction_with_frozen_clock_stays_consistent() {
        let (_, store) = store_with(ParameterSettings {
            maximum_size: 1_000,
            ..Default::default()
        });

        // Every entry lands in the same bucket of both indices
        for n in 0..20_000 {
            insert(&store, &format!("k{n}"), "v");
        }

        assert_eq!(store.len(), 1_000);
        assert_eq!(store.stats().evictions, 19_000);
        // Ties leave in arrival order
        assert!(store.lookup(&"k18999".to_string()).is_none());
        assert!(store.lookup(&"k19000".to_string()).is_some());
        assert!(store.lookup(&"k19999".to_string()).is_some());
        assert_consistent(&store);
    }

    #[test]
    fn test_age_pass_runs_before_capacity_pass() {
        let (clock, store) = store_with(ParameterSettings::default());
        insert(&store, "old1", "A");
        insert(&store, "old2", "B");
        clock.advance(Duration::from_secs(10));
        insert(&store, "new1", "C");
        insert(&store, "new2", "D");

        store.params().apply(&ParameterSettings {
            max_update_age: Some(Duration::from_secs(5)),
            maximum_size: 2,
            ..Default::default()
        });

        let stats = store.stats();
        assert_eq!(stats.expirations, 2);
        assert_eq!(stats.evictions, 0);
        assert!(store.lookup(&"new1".to_string()).is_some());
        assert!(store.lookup(&"new2".to_string()).is_some());
        assert_consistent(&store);
    }

    #[test]
    fn test_access_priority_eviction() {
        let (clock, store) = store_with(ParameterSettings {
            access_priority_eviction: true,
            ..Default::default()
        });
        insert(&store, "a", "A");
        clock.advance(Duration::from_secs(1));
        insert(&store, "b", "B");
        clock.advance(Duration::from_secs(1));

        let a = store.lookup(&"a".to_string()).unwrap();
        store.read_entry(&a).unwrap();

        store.params().set_maximum_size(1);

        assert!(store.lookup(&"a".to_string()).is_some());
        assert!(store.lookup(&"b".to_string()).is_none());
        assert_consistent(&store);
    }

    #[test]
    fn test_clear_retires_everything() {
        let (_, store) = store_with(ParameterSettings::default());
        insert(&store, "a", "A");
        insert(&store, "b", "B");
        let a = store.lookup(&"a".to_string()).unwrap();

        assert_eq!(store.clear(), 2);

        assert!(!a.is_live());
        assert_eq!(store.len(), 0);
        assert_consistent(&store);
    }

    #[test]
    fn test_disable_clears_through_listener() {
        let (_, store) = store_with(ParameterSettings::default());
        insert(&store, "a", "A");

        store.params().set_disabled(true);

        assert_eq!(store.len(), 0);
        assert_consistent(&store);
    }

    #[test]
    fn test_expiry_threshold_unbounded_age() {
        let now = Utc::now();
        assert!(expiry_threshold(now, Duration::MAX).is_none());
        assert!(!is_older(now, Some(Duration::MAX), now));
        assert!(!is_older(now, None, now));
    }
}
