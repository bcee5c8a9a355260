//! Response DTOs for the management API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheParameters, CacheStats, CacheView, ParameterSettings};

/// Response body for `GET /caches/:name/entries/:key`
#[derive(Debug, Clone, Serialize)]
pub struct EntryResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: String,
}

impl EntryResponse {
    /// Creates a new EntryResponse
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for `GET /caches/:name/entries`
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub cache: String,
    pub count: usize,
    /// Point-in-time copies, oldest write first
    pub entries: Vec<CacheView<String, String>>,
}

impl EntriesResponse {
    pub fn new(cache: impl Into<String>, mut entries: Vec<CacheView<String, String>>) -> Self {
        entries.sort_by(|a, b| a.last_update.cmp(&b.last_update).then_with(|| a.key.cmp(&b.key)));
        Self {
            cache: cache.into(),
            count: entries.len(),
            entries,
        }
    }
}

/// Response body for `PUT /caches/:name/entries`
#[derive(Debug, Clone, Serialize)]
pub struct PutEntryResponse {
    /// Outcome message
    pub message: String,
    /// The key that was written
    pub key: String,
    /// Whether the value was stored
    pub stored: bool,
    /// The value the write replaced, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

impl PutEntryResponse {
    /// A write that stored the value
    pub fn stored(key: impl Into<String>, previous: Option<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            stored: true,
            previous,
        }
    }

    /// A conditional write that found the key already present
    pub fn kept(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' already present", key),
            key,
            stored: false,
            previous: None,
        }
    }

    /// A write dropped because the cache is disabled
    pub fn disabled(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Cache disabled, key '{}' not stored", key),
            key,
            stored: false,
            previous: None,
        }
    }
}

/// Response body for `DELETE /caches/:name/entries/:key`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteEntryResponse {
    /// The key that was targeted
    pub key: String,
    /// Whether an entry was removed; removing an absent key is not an error
    pub removed: bool,
}

impl DeleteEntryResponse {
    pub fn new(key: impl Into<String>, removed: bool) -> Self {
        Self {
            key: key.into(),
            removed,
        }
    }
}

/// Response body for `DELETE /caches/:name/entries`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub cache: String,
    pub message: String,
}

impl ClearResponse {
    pub fn new(cache: impl Into<String>) -> Self {
        let cache = cache.into();
        Self {
            message: format!("Cache '{}' cleared", cache),
            cache,
        }
    }
}

/// Response body for `POST /caches/:name/sweep`
#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    pub cache: String,
    /// Entries removed by this sweep
    pub removed: usize,
}

/// Response body for `GET /caches`
#[derive(Debug, Clone, Serialize)]
pub struct CachesResponse {
    pub caches: Vec<String>,
}

/// Response body for the parameters endpoints.
///
/// Ages are whole seconds, `0` meaning unbounded, matching what
/// `PUT /caches/:name/parameters` accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParametersResponse {
    pub cache: String,
    /// False while no cache exists under this name yet
    pub attached: bool,
    pub disabled: bool,
    pub max_update_age_secs: u64,
    pub max_access_age_secs: u64,
    pub maximum_size: usize,
    pub access_priority_eviction: bool,
}

impl ParametersResponse {
    pub fn new(cache: impl Into<String>, params: &CacheParameters) -> Self {
        Self::from_settings(cache, &params.settings(), params.is_attached())
    }

    /// Reports values that no parameter record holds yet, such as the
    /// defaults a new cache would start from.
    pub fn from_settings(cache: impl Into<String>, settings: &ParameterSettings, attached: bool) -> Self {
        Self {
            cache: cache.into(),
            attached,
            disabled: settings.disabled,
            max_update_age_secs: age_to_secs(settings.max_update_age),
            max_access_age_secs: age_to_secs(settings.max_access_age),
            maximum_size: settings.maximum_size,
            access_priority_eviction: settings.access_priority_eviction,
        }
    }
}

/// Rounds up so a sub-second limit never reads as unbounded.
fn age_to_secs(age: Option<Duration>) -> u64 {
    age.map_or(0, |age| age.as_secs() + u64::from(age.subsec_nanos() > 0))
}

/// Response body for `GET /caches/:name/stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: String,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Entries dropped by the size limit
    pub evictions: u64,
    /// Entries dropped by an age limit
    pub expirations: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(cache: impl Into<String>, stats: &CacheStats) -> Self {
        Self {
            cache: cache.into(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Number of registered caches
    pub caches: usize,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(caches: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            caches,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
