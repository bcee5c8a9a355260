//! Timestamp Index Module
//!
//! Sorted timestamp -> entry-set mapping that lets an expiry sweep visit
//! only the entries that are provably old, oldest first.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Position of an entry: its timestamp, then its arrival order among
/// entries sharing that timestamp.
type Position = (DateTime<Utc>, u64);

fn slot<T>(entry: &Arc<T>) -> usize {
    Arc::as_ptr(entry) as usize
}

// == Timestamp Index ==
/// Entries ordered by one of their timestamps.
///
/// Entries sharing a timestamp form that timestamp's bucket and leave it
/// in arrival order. Entries are identified by pointer, so the same `Arc`
/// must be used to move or remove an entry that was used to insert it.
/// Every operation is logarithmic in the number of entries, however many
/// share a timestamp.
#[derive(Debug)]
pub(crate) struct TimestampIndex<T> {
    order: BTreeMap<Position, Arc<T>>,
    positions: HashMap<usize, Position>,
    next_seq: u64,
}

impl<T> Default for TimestampIndex<T> {
    fn default() -> Self {
        Self {
            order: BTreeMap::new(),
            positions: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimestampIndex<T> {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Relocate ==
    /// Moves `entry` from the bucket at `old` to the bucket at `new`.
    ///
    /// `old = None` inserts (creation) and `new = None` removes (deletion).
    /// Removing an entry that is not in the `old` bucket is a no-op.
    pub fn relocate(&mut self, entry: &Arc<T>, old: Option<DateTime<Utc>>, new: Option<DateTime<Utc>>) {
        if let Some(old) = old {
            self.remove_at(entry, old);
        }
        if let Some(new) = new {
            let position = (new, self.next_seq);
            self.next_seq += 1;
            if let Some(stale) = self.positions.insert(slot(entry), position) {
                self.order.remove(&stale);
            }
            self.order.insert(position, Arc::clone(entry));
        }
    }

    fn remove_at(&mut self, entry: &Arc<T>, at: DateTime<Utc>) {
        let key = slot(entry);
        let Some(&position) = self.positions.get(&key) else {
            return;
        };
        if position.0 == at {
            self.positions.remove(&key);
            self.order.remove(&position);
        }
    }

    // == Sweep Before ==
    /// Removes and returns every entry whose bucket is strictly before
    /// `threshold`, in ascending timestamp order.
    ///
    /// Buckets at or after `threshold` are never visited.
    pub fn sweep_before(&mut self, threshold: DateTime<Utc>) -> Vec<(DateTime<Utc>, Arc<T>)> {
        let keep = self.order.split_off(&(threshold, 0));
        let expired = std::mem::replace(&mut self.order, keep);

        expired
            .into_iter()
            .map(|((at, _), entry)| {
                self.positions.remove(&slot(&entry));
                (at, entry)
            })
            .collect()
    }

    // == Pop Oldest ==
    /// Removes and returns the earliest-arrived entry of the oldest bucket.
    pub fn pop_oldest(&mut self) -> Option<(DateTime<Utc>, Arc<T>)> {
        let ((at, _), entry) = self.order.pop_first()?;
        self.positions.remove(&slot(&entry));
        Some((at, entry))
    }

    // == Peek Oldest ==
    /// Timestamp of the oldest bucket.
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.order.keys().next().map(|(at, _)| *at)
    }

    /// Number of entries across all buckets.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Number of distinct timestamps.
    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        let mut stamps: Vec<DateTime<Utc>> = self.order.keys().map(|(at, _)| *at).collect();
        stamps.dedup();
        stamps.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.positions.clear();
    }

    /// Whether `entry` sits in the bucket at `at`.
    #[cfg(test)]
    pub fn contains(&self, entry: &Arc<T>, at: DateTime<Utc>) -> bool {
        self.positions
            .get(&slot(entry))
            .is_some_and(|(stamp, _)| *stamp == at)
    }
}
