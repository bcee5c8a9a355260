//! agecache - A concurrent in-process key/value cache
//!
//! Entries are bounded by age since last write, age since last read and
//! total count. Limits are live: changing a parameter sweeps the cache
//! before the setter returns. A registry of named caches and an HTTP
//! management server sit on top of the core.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod tasks;

pub use api::AppState;
pub use cache::{
    Cache, CacheParameters, CacheStats, CacheView, Clock, ManualClock, ParameterSettings,
    ParameterUpdate, SystemClock,
};
pub use config::Config;
pub use error::{CacheError, Result};
pub use registry::CacheManager;
pub use tasks::spawn_sweep_task;
