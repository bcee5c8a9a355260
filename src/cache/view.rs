//! Cache View Module
//!
//! Point-in-time copies of cache entries.

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Cache View ==
/// A snapshot of one entry's key, value and timestamps.
///
/// Views are copies; later changes to the cache do not show up in them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheView<K, V> {
    pub key: K,
    pub value: V,
    /// When the value was last read
    pub last_access: DateTime<Utc>,
    /// When the value was last written
    pub last_update: DateTime<Utc>,
}
