//! Idle time between consecutive trips of the same group.
//!
//! Idle time is the gap between a trip's pickup and the previous dropoff
//! seen for its group. Records must already be ordered by
//! `(group, pickup_datetime)`; this module does not sort.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;

use crate::record::TripRecord;

/// Last dropoff seen per group during one pass.
#[derive(Debug)]
pub struct IdleTimeTracker<K> {
    last_dropoff: HashMap<K, DateTime<Utc>>,
}

impl<K: Hash + Eq> Default for IdleTimeTracker<K> {
    fn default() -> Self {
        Self {
            last_dropoff: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq> IdleTimeTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the idle gap for this trip and records its dropoff for the
    /// next trip of the group.
    ///
    /// The gap is `None` for the first trip of a group, when pickup is
    /// missing, or when it would be negative. A missing dropoff leaves the
    /// stored value as it was, so the following trip measures its gap from
    /// the last known dropoff.
    pub fn observe(
        &mut self,
        key: K,
        pickup: Option<DateTime<Utc>>,
        dropoff: Option<DateTime<Utc>>,
    ) -> Option<f64> {
        let idle = match (self.last_dropoff.get(&key), pickup) {
            (Some(previous), Some(pickup)) => {
                let secs = (pickup - *previous).num_milliseconds() as f64 / 1000.0;
                (secs >= 0.0).then_some(secs)
            }
            _ => None,
        };

        if let Some(dropoff) = dropoff {
            self.last_dropoff.insert(key, dropoff);
        }

        idle
    }

    pub fn last_dropoff(&self, key: &K) -> Option<DateTime<Utc>> {
        self.last_dropoff.get(key).copied()
    }
}

/// Idle time for every record, folded over the sequence with a fresh
/// tracker as state.
pub fn idle_times<K, F>(records: &[TripRecord], key_fn: F) -> Vec<Option<f64>>
where
    K: Hash + Eq,
    F: Fn(&TripRecord) -> K,
{
    records
        .iter()
        .scan(IdleTimeTracker::new(), |tracker, record| {
            Some(tracker.observe(
                key_fn(record),
                record.pickup_datetime,
                record.dropoff_datetime,
            ))
        })
        .collect()
}

/// Writes [`idle_times`] back onto the records.
pub fn assign_idle_times<K, F>(records: &mut [TripRecord], key_fn: F)
where
    K: Hash + Eq,
    F: Fn(&TripRecord) -> K,
{
    let idle = idle_times(records, key_fn);
    for (record, idle) in records.iter_mut().zip(idle) {
        record.idle_time_sec = idle;
    }
}
