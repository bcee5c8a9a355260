//! Cache Module
//!
//! Provides a concurrent in-memory cache bounded by entry age (since last
//! write and since last read) and by entry count.

mod clock;
mod entry;
mod facade;
mod index;
mod key_lock;
mod parameters;
mod stats;
mod store;
mod view;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::TimestampKind;
pub use facade::Cache;
pub use parameters::{age_from_secs, CacheParameters, ParameterSettings, ParameterUpdate};
pub use stats::CacheStats;
pub use view::CacheView;
