//! Configuration Module
//!
//! Handles loading the service configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::{age_from_secs, ParameterSettings};

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Interval in seconds between background sweeps of every cache
    pub sweep_interval: u64,
    /// Maximum entry count for newly created caches
    pub default_max_size: usize,
    /// Maximum seconds since last write for new caches; 0 = unbounded
    pub default_max_update_age: u64,
    /// Maximum seconds since last read for new caches; 0 = unbounded
    pub default_max_access_age: u64,
    /// Evict least recently read entries first in new caches
    pub access_priority_eviction: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `DEFAULT_MAX_SIZE` - Entry limit for new caches (default: 10000)
    /// - `DEFAULT_MAX_UPDATE_AGE` - Write age limit in seconds (default: 300)
    /// - `DEFAULT_MAX_ACCESS_AGE` - Read age limit in seconds (default: 0)
    /// - `ACCESS_PRIORITY_EVICTION` - Evict by last read (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            default_max_size: env_or("DEFAULT_MAX_SIZE", defaults.default_max_size),
            default_max_update_age: env_or("DEFAULT_MAX_UPDATE_AGE", defaults.default_max_update_age),
            default_max_access_age: env_or("DEFAULT_MAX_ACCESS_AGE", defaults.default_max_access_age),
            access_priority_eviction: env_or(
                "ACCESS_PRIORITY_EVICTION",
                defaults.access_priority_eviction,
            ),
        }
    }

    /// Parameter values every new cache starts from.
    pub fn default_settings(&self) -> ParameterSettings {
        ParameterSettings {
            disabled: false,
            max_update_age: age_from_secs(self.default_max_update_age),
            max_access_age: age_from_secs(self.default_max_access_age),
            maximum_size: self.default_max_size,
            access_priority_eviction: self.access_priority_eviction,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            sweep_interval: 1,
            default_max_size: 10_000,
            default_max_update_age: 300,
            default_max_access_age: 0,
            access_priority_eviction: false,
        }
    }
}
