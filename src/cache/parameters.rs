//! Cache Parameters Module
//!
//! The live, mutable limits a cache enforces. A parameters object is shared
//! by handle: whoever holds it changes the running cache directly.

use std::sync::Weak;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

// == Parameter Settings ==
/// A plain copy of every parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSettings {
    /// A disabled cache holds no entries and accepts none
    pub disabled: bool,
    /// Entries not written for longer than this expire; `None` = never
    pub max_update_age: Option<Duration>,
    /// Entries not read for longer than this expire; `None` = never
    pub max_access_age: Option<Duration>,
    /// Entry count above which the oldest entries are evicted
    pub maximum_size: usize,
    /// Evict least recently read first instead of least recently written
    pub access_priority_eviction: bool,
}

impl Default for ParameterSettings {
    fn default() -> Self {
        Self {
            disabled: false,
            max_update_age: None,
            max_access_age: None,
            maximum_size: usize::MAX,
            access_priority_eviction: false,
        }
    }
}

// == Parameter Update ==
/// A partial change to a cache's parameters, as pushed by a configuration
/// feed. Absent fields are left alone; an age of `0` seconds means no limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default)]
    pub max_update_age_secs: Option<u64>,
    #[serde(default)]
    pub max_access_age_secs: Option<u64>,
    #[serde(default)]
    pub maximum_size: Option<usize>,
    #[serde(default)]
    pub access_priority_eviction: Option<bool>,
}

impl ParameterUpdate {
    /// Whether applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Converts whole seconds to an age limit, `0` meaning unbounded.
pub fn age_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

// == Parameter Listener ==
/// Receives notice that parameters changed. Implemented by the cache core,
/// which sweeps (or clears, when disabled) in response.
pub(crate) trait ParameterListener: Send + Sync {
    fn parameters_changed(&self);
}

// == Cache Parameters ==
/// Thread-safe parameter record owned by one cache.
///
/// Every setter triggers an immediate sweep of the owning cache, so a
/// tightened limit takes effect before the setter returns. A detached
/// record has no cache yet; it only stores values.
pub struct CacheParameters {
    settings: RwLock<ParameterSettings>,
    owner: Option<Weak<dyn ParameterListener>>,
}

impl std::fmt::Debug for CacheParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheParameters")
            .field("settings", &*self.settings.read())
            .field("attached", &self.owner.is_some())
            .finish()
    }
}

impl CacheParameters {
    // == Constructors ==
    pub(crate) fn attached(settings: ParameterSettings, owner: Weak<dyn ParameterListener>) -> Self {
        Self {
            settings: RwLock::new(settings),
            owner: Some(owner),
        }
    }

    /// Creates a record not yet bound to any cache.
    pub fn detached(settings: ParameterSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            owner: None,
        }
    }

    /// Whether a cache consults this record.
    pub fn is_attached(&self) -> bool {
        self.owner.is_some()
    }

    // == Snapshot ==
    pub fn settings(&self) -> ParameterSettings {
        *self.settings.read()
    }

    // == Getters ==
    pub fn is_disabled(&self) -> bool {
        self.settings.read().disabled
    }

    pub fn is_enabled(&self) -> bool {
        !self.is_disabled()
    }

    pub fn max_update_age(&self) -> Option<Duration> {
        self.settings.read().max_update_age
    }

    pub fn max_access_age(&self) -> Option<Duration> {
        self.settings.read().max_access_age
    }

    pub fn maximum_size(&self) -> usize {
        self.settings.read().maximum_size
    }

    pub fn is_access_priority_eviction(&self) -> bool {
        self.settings.read().access_priority_eviction
    }

    // == Setters ==
    /// Disabling a cache also empties it.
    pub fn set_disabled(&self, disabled: bool) {
        self.update(|s| s.disabled = disabled);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.set_disabled(!enabled);
    }

    pub fn set_max_update_age(&self, age: Option<Duration>) {
        self.update(|s| s.max_update_age = age);
    }

    pub fn set_max_access_age(&self, age: Option<Duration>) {
        self.update(|s| s.max_access_age = age);
    }

    pub fn set_maximum_size(&self, size: usize) {
        self.update(|s| s.maximum_size = size);
    }

    pub fn set_access_priority_eviction(&self, access_priority: bool) {
        self.update(|s| s.access_priority_eviction = access_priority);
    }

    // == Bulk Changes ==
    /// Replaces every value at once, sweeping a single time.
    pub fn apply(&self, settings: &ParameterSettings) {
        self.update(|s| *s = *settings);
    }

    /// Applies the fields present in `change`, sweeping a single time.
    pub fn apply_update(&self, change: &ParameterUpdate) {
        if change.is_empty() {
            return;
        }
        self.update(|s| {
            if let Some(disabled) = change.disabled {
                s.disabled = disabled;
            }
            if let Some(secs) = change.max_update_age_secs {
                s.max_update_age = age_from_secs(secs);
            }
            if let Some(secs) = change.max_access_age_secs {
                s.max_access_age = age_from_secs(secs);
            }
            if let Some(size) = change.maximum_size {
                s.maximum_size = size;
            }
            if let Some(access_priority) = change.access_priority_eviction {
                s.access_priority_eviction = access_priority;
            }
        });
    }

    fn update(&self, change: impl FnOnce(&mut ParameterSettings)) {
        let current = {
            let mut settings = self.settings.write();
            change(&mut settings);
            *settings
        };
        debug!(?current, "Cache parameters changed");

        if let Some(owner) = self.owner.as_ref().and_then(Weak::upgrade) {
            owner.parameters_changed();
        }
    }
}
