//! Cache Entry Module
//!
//! Defines the unit of cached state: a key, its value, and the two
//! timestamps the expiry indices track.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::cache::CacheView;

// == Timestamp Kind ==
/// Selects one of the two timestamps an entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKind {
    /// Last time the value was read.
    Access,
    /// Last time the value was written.
    Update,
}

// == Stamps ==
/// Both timestamps of an entry, read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stamps {
    pub access: DateTime<Utc>,
    pub update: DateTime<Utc>,
}

impl Stamps {
    pub fn get(&self, kind: TimestampKind) -> DateTime<Utc> {
        match kind {
            TimestampKind::Access => self.access,
            TimestampKind::Update => self.update,
        }
    }
}

#[derive(Debug)]
struct EntryState<V> {
    value: V,
    stamps: Stamps,
    /// Cleared exactly once, while the structural lock is held, when the
    /// entry leaves the map.
    live: bool,
}

// == Cache Entry ==
/// A single cache entry.
///
/// The value and timestamps sit behind the entry's own mutex, so a reader
/// never sees a value paired with a timestamp from a different write. The
/// entry never refers back to its cache: callers hand in "now" and receive
/// the previous timestamp so they can move the entry between index buckets.
#[derive(Debug)]
pub(crate) struct CacheEntry<K, V> {
    key: K,
    state: Mutex<EntryState<V>>,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a live entry with both timestamps set to `now`.
    pub fn new(key: K, value: V, now: DateTime<Utc>) -> Self {
        Self {
            key,
            state: Mutex::new(EntryState {
                value,
                stamps: Stamps {
                    access: now,
                    update: now,
                },
                live: true,
            }),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    // == Write ==
    /// Replaces the value and advances the update timestamp to `now`.
    ///
    /// Returns the previous value and update timestamp. A removed entry
    /// refuses the write and hands the value back.
    pub fn write(&self, value: V, now: DateTime<Utc>) -> Result<(V, DateTime<Utc>), V> {
        let mut state = self.state.lock();
        if !state.live {
            return Err(value);
        }
        let previous = std::mem::replace(&mut state.value, value);
        let stamp = state.stamps.update;
        state.stamps.update = now;
        Ok((previous, stamp))
    }

    pub fn stamps(&self) -> Stamps {
        self.state.lock().stamps
    }

    pub fn is_live(&self) -> bool {
        self.state.lock().live
    }

    // == Retire ==
    /// Marks the entry removed and returns the timestamps it was indexed
    /// under. Returns `None` if it was already removed.
    ///
    /// Callers must hold the structural write lock.
    pub fn retire(&self) -> Option<Stamps> {
        let mut state = self.state.lock();
        if !state.live {
            return None;
        }
        state.live = false;
        Some(state.stamps)
    }

    /// Retires the entry only if its `kind` timestamp still equals `seen`.
    ///
    /// A sweep reads a bucket, then calls this: a concurrent read or write
    /// that moved the timestamp wins and the entry survives.
    pub fn retire_if_unchanged(&self, kind: TimestampKind, seen: DateTime<Utc>) -> Option<Stamps> {
        let mut state = self.state.lock();
        if !state.live || state.stamps.get(kind) != seen {
            return None;
        }
        state.live = false;
        Some(state.stamps)
    }
}

impl<K, V: Clone> CacheEntry<K, V> {
    // == Read ==
    /// Returns the value and advances the access timestamp to `now`.
    ///
    /// Also returns the previous access timestamp. Returns `None` once the
    /// entry has been removed from its cache.
    pub fn read(&self, now: DateTime<Utc>) -> Option<(V, DateTime<Utc>)> {
        let mut state = self.state.lock();
        if !state.live {
            return None;
        }
        let previous = state.stamps.access;
        state.stamps.access = now;
        Some((state.value.clone(), previous))
    }

    // == Peek ==
    /// Returns the value without touching either timestamp.
    pub fn peek(&self) -> Option<V> {
        let state = self.state.lock();
        state.live.then(|| state.value.clone())
    }

    // == Snapshot ==
    /// Point-in-time copy of the entry, without an access bump.
    pub fn snapshot(&self) -> Option<CacheView<K, V>>
    where
        K: Clone,
    {
        let state = self.state.lock();
        state.live.then(|| CacheView {
            key: self.key.clone(),
            value: state.value.clone(),
            last_access: state.stamps.access,
            last_update: state.stamps.update,
        })
    }
}
