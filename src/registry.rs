//! Cache Registry Module
//!
//! Looks up or creates named cache instances by key/value type and hands
//! out their live parameter objects.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::cache::{Cache, CacheParameters, CacheStats, Clock, ParameterSettings, SystemClock};
use crate::error::{CacheError, Result};

// == Managed Cache ==
/// Type-erased maintenance surface of a registered cache.
trait ManagedCache: Send + Sync {
    fn parameters(&self) -> Arc<CacheParameters>;
    fn clear_expired(&self) -> usize;
    fn clear(&self);
    fn stats(&self) -> CacheStats;
}

impl<K, V> ManagedCache for Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn parameters(&self) -> Arc<CacheParameters> {
        Cache::parameters(self)
    }

    fn clear_expired(&self) -> usize {
        Cache::clear_expired(self)
    }

    fn clear(&self) {
        Cache::clear(self)
    }

    fn stats(&self) -> CacheStats {
        Cache::stats(self)
    }
}

struct CacheRecord {
    /// The typed `Cache<K, V>` handle
    typed: Box<dyn Any + Send + Sync>,
    managed: Arc<dyn ManagedCache>,
    types: (TypeId, TypeId),
    type_names: String,
}

impl CacheRecord {
    fn new<K, V>(cache: Cache<K, V>) -> Self
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        Self {
            typed: Box::new(cache.clone()),
            managed: Arc::new(cache),
            types: (TypeId::of::<K>(), TypeId::of::<V>()),
            type_names: type_names::<K, V>(),
        }
    }
}

fn type_names<K, V>() -> String {
    format!("{}, {}", type_name::<K>(), type_name::<V>())
}

#[derive(Default)]
struct Registry {
    caches: BTreeMap<String, CacheRecord>,
    /// Parameters handed out for names with no cache yet
    pending: HashMap<String, Arc<CacheParameters>>,
}

// == Cache Manager ==
/// A named collection of caches of any key/value types.
///
/// A name is bound to the key/value types it was first created with;
/// asking for it with other types is a configuration error.
pub struct CacheManager {
    registry: RwLock<Registry>,
    clock: Arc<dyn Clock>,
    defaults: ParameterSettings,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("caches", &self.cache_names())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(ParameterSettings::default())
    }
}

impl CacheManager {
    // == Constructors ==
    /// Creates a manager whose new caches start from `defaults`.
    pub fn new(defaults: ParameterSettings) -> Self {
        Self::with_clock(Arc::new(SystemClock), defaults)
    }

    /// Creates a manager whose caches all read time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>, defaults: ParameterSettings) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            clock,
            defaults,
        }
    }

    pub fn defaults(&self) -> ParameterSettings {
        self.defaults
    }

    // == Get Cache ==
    /// Returns the cache registered as `name`, creating it if needed.
    ///
    /// A new cache takes its settings from parameters handed out earlier
    /// for `name`, or from the manager defaults.
    pub fn get_cache<K, V>(&self, name: &str) -> Result<Cache<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if let Some(record) = self.registry.read().caches.get(name) {
            return downcast(name, record);
        }

        let mut registry = self.registry.write();
        if let Some(record) = registry.caches.get(name) {
            return downcast(name, record);
        }

        let settings = registry
            .pending
            .remove(name)
            .map(|params| params.settings())
            .unwrap_or(self.defaults);
        let cache: Cache<K, V> = Cache::with_settings(Arc::clone(&self.clock), settings);
        registry.caches.insert(name.to_string(), CacheRecord::new(cache.clone()));

        info!(cache = name, types = %type_names::<K, V>(), "Cache created");
        Ok(cache)
    }

    /// Returns the cache registered as `name` without creating one.
    pub fn existing_cache<K, V>(&self, name: &str) -> Result<Cache<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let registry = self.registry.read();
        let record = registry
            .caches
            .get(name)
            .ok_or_else(|| CacheError::NotFound(format!("cache '{name}'")))?;
        downcast(name, record)
    }

    // == Names ==
    /// Names of every registered cache, sorted.
    pub fn cache_names(&self) -> Vec<String> {
        self.registry.read().caches.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.read().caches.contains_key(name)
    }

    // == Parameters ==
    /// The parameters for `name`.
    ///
    /// For a registered cache this is the live object the cache consults.
    /// Otherwise it is a pending holder; its values at creation time seed
    /// the cache, and later changes to it have no effect.
    pub fn parameters(&self, name: &str) -> Arc<CacheParameters> {
        if let Some(record) = self.registry.read().caches.get(name) {
            return record.managed.parameters();
        }

        let mut registry = self.registry.write();
        if let Some(record) = registry.caches.get(name) {
            return record.managed.parameters();
        }
        let defaults = self.defaults;
        Arc::clone(
            registry
                .pending
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CacheParameters::detached(defaults))),
        )
    }

    /// The parameters for `name` if a cache or a pending holder already
    /// exists. Never registers anything.
    pub fn find_parameters(&self, name: &str) -> Option<Arc<CacheParameters>> {
        let registry = self.registry.read();
        match registry.caches.get(name) {
            Some(record) => Some(record.managed.parameters()),
            None => registry.pending.get(name).cloned(),
        }
    }

    // == Stats ==
    pub fn stats(&self, name: &str) -> Result<CacheStats> {
        self.registry
            .read()
            .caches
            .get(name)
            .map(|record| record.managed.stats())
            .ok_or_else(|| CacheError::NotFound(format!("cache '{name}'")))
    }

    // == Maintenance ==
    /// Unregisters `name` and empties it. Returns whether it existed.
    ///
    /// Handles obtained earlier keep working on the emptied instance; a
    /// later `get_cache` creates a fresh one.
    pub fn remove_cache(&self, name: &str) -> bool {
        let removed = self.registry.write().caches.remove(name);
        match removed {
            Some(record) => {
                record.managed.clear();
                info!(cache = name, "Cache removed");
                true
            }
            None => false,
        }
    }

    /// Sweeps `name`. Returns the number of entries removed.
    pub fn clear_expired(&self, name: &str) -> Result<usize> {
        let managed = self.managed(name)?;
        Ok(managed.clear_expired())
    }

    /// Sweeps every registered cache. Returns the total removed.
    pub fn clear_expired_all(&self) -> usize {
        let caches: Vec<Arc<dyn ManagedCache>> = self
            .registry
            .read()
            .caches
            .values()
            .map(|record| Arc::clone(&record.managed))
            .collect();
        caches.iter().map(|cache| cache.clear_expired()).sum()
    }

    fn managed(&self, name: &str) -> Result<Arc<dyn ManagedCache>> {
        self.registry
            .read()
            .caches
            .get(name)
            .map(|record| Arc::clone(&record.managed))
            .ok_or_else(|| CacheError::NotFound(format!("cache '{name}'")))
    }
}

fn downcast<K, V>(name: &str, record: &CacheRecord) -> Result<Cache<K, V>>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    if record.types != (TypeId::of::<K>(), TypeId::of::<V>()) {
        return Err(CacheError::TypeMismatch {
            name: name.to_string(),
            expected: type_names::<K, V>(),
            found: record.type_names.clone(),
        });
    }
    record
        .typed
        .downcast_ref::<Cache<K, V>>()
        .cloned()
        .ok_or_else(|| CacheError::Internal(format!("cache '{name}' has an unexpected handle type")))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::time::Duration;

    fn manager() -> (Arc<ManualClock>, CacheManager) {
        let clock = Arc::new(ManualClock::new());
        let manager = CacheManager::with_clock(clock.clone(), ParameterSettings::default());
        (clock, manager)
    }

    #[test]
    fn test_get_cache_returns_same_instance() {
        let (_, manager) = manager();

        let first: Cache<String, String> = manager.get_cache("sessions").unwrap();
        first.put("k".into(), "v".into());

        let second: Cache<String, String> = manager.get_cache("sessions").unwrap();
        assert_eq!(second.get(&"k".to_string()).as_deref(), Some("v"));
        assert!(Arc::ptr_eq(&first.parameters(), &second.parameters()));
    }

    #[test]
    fn test_type_mismatch() {
        let (_, manager) = manager();
        let _: Cache<String, String> = manager.get_cache("sessions").unwrap();

        let result = manager.get_cache::<String, u64>("sessions");

        assert!(matches!(result, Err(CacheError::TypeMismatch { .. })));
    }

    #[test]
    fn test_existing_cache_not_found() {
        let (_, manager) = manager();
        let result = manager.existing_cache::<String, String>("missing");
        assert!(matches!(result, Err(CacheError::NotFound(_))));
        assert!(!manager.contains("missing"));
    }

    #[test]
    fn test_cache_names_sorted() {
        let (_, manager) = manager();
        let _: Cache<String, String> = manager.get_cache("zeta").unwrap();
        let _: Cache<u64, String> = manager.get_cache("alpha").unwrap();

        assert_eq!(manager.cache_names(), vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_parameters_are_live_for_existing_cache() {
        let (_, manager) = manager();
        let cache: Cache<String, String> = manager.get_cache("c").unwrap();
        cache.put("a".into(), "A".into());
        cache.put("b".into(), "B".into());

        manager.parameters("c").set_maximum_size(1);

        assert_eq!(cache.len(), 1);
        assert!(manager.parameters("c").is_attached());
    }

    #[test]
    fn test_pending_parameters_seed_new_cache() {
        let (_, manager) = manager();
        let pending = manager.parameters("later");
        assert!(!pending.is_attached());
        pending.set_maximum_size(7);
        pending.set_max_update_age(Some(Duration::from_secs(9)));

        let cache: Cache<String, String> = manager.get_cache("later").unwrap();

        assert_eq!(cache.parameters().maximum_size(), 7);
        assert_eq!(cache.parameters().max_update_age(), Some(Duration::from_secs(9)));
        assert!(cache.parameters().is_attached());
    }

    #[test]
    fn test_find_parameters_registers_nothing() {
        let (_, manager) = manager();

        for n in 0..1_000 {
            assert!(manager.find_parameters(&format!("unknown-{n}")).is_none());
        }

        assert!(manager.registry.read().pending.is_empty());
        assert!(manager.cache_names().is_empty());
    }

    #[test]
    fn test_find_parameters_sees_live_and_pending() {
        let (_, manager) = manager();
        let _: Cache<String, String> = manager.get_cache("live").unwrap();
        manager.parameters("later").set_maximum_size(4);

        let live = manager.find_parameters("live").unwrap();
        assert!(live.is_attached());

        let pending = manager.find_parameters("later").unwrap();
        assert!(!pending.is_attached());
        assert_eq!(pending.maximum_size(), 4);
        assert_eq!(manager.registry.read().pending.len(), 1);
    }

    #[test]
    fn test_defaults_apply_to_new_caches() {
        let defaults = ParameterSettings {
            maximum_size: 3,
            ..Default::default()
        };
        let manager = CacheManager::new(defaults);
        let cache: Cache<String, String> = manager.get_cache("c").unwrap();
        assert_eq!(cache.parameters().maximum_size(), 3);
        assert_eq!(manager.defaults(), defaults);
    }

    #[test]
    fn test_remove_cache() {
        let (_, manager) = manager();
        let cache: Cache<String, String> = manager.get_cache("c").unwrap();
        cache.put("k".into(), "v".into());

        assert!(manager.remove_cache("c"));
        assert!(!manager.remove_cache("c"));
        assert!(cache.is_empty());

        let fresh: Cache<u64, u64> = manager.get_cache("c").unwrap();
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_clear_expired_all() {
        let (clock, manager) = manager();
        let a: Cache<String, String> = manager.get_cache("a").unwrap();
        let b: Cache<u64, u64> = manager.get_cache("b").unwrap();
        a.put("k".into(), "v".into());
        b.put(1, 1);
        a.parameters().set_max_update_age(Some(Duration::from_secs(1)));
        b.parameters().set_max_update_age(Some(Duration::from_secs(1)));
        clock.advance(Duration::from_secs(2));

        assert_eq!(manager.clear_expired_all(), 2);
        assert_eq!(manager.clear_expired("a").unwrap(), 0);
        assert!(manager.clear_expired("missing").is_err());
    }

    #[test]
    fn test_stats_by_name() {
        let (_, manager) = manager();
        let cache: Cache<String, String> = manager.get_cache("c").unwrap();
        cache.put("k".into(), "v".into());
        cache.get(&"k".to_string());

        let stats = manager.stats("c").unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.total_entries, 1);
        assert!(manager.stats("missing").is_err());
    }
}
