//! Version vectors: per-device logical clocks used to detect conflicting
//! concurrent edits to the same file.

use serde::{Deserialize, Serialize};

use crate::device_id::ShortID;

/// A single device's contribution to a [`Vector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Counter {
    /// The device this counter belongs to.
    pub id: ShortID,
    /// The device's logical clock value.
    pub value: u64,
}

/// Result of comparing two [`Vector`]s.
///
/// The two "Concurrent" variants distinguish which side carries the most
/// recently diverging counter, which the conflict-resolution cascade uses
/// as the last tie-break (see [`crate::file_info`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorOrdering {
    /// Identical on every device.
    Equal,
    /// `self` dominates `other` on every device where they differ.
    Greater,
    /// `other` dominates `self` on every device where they differ.
    Lesser,
    /// Neither dominates; `self` has the most recently diverging counter.
    ConcurrentGreater,
    /// Neither dominates; `other` has the most recently diverging counter.
    ConcurrentLesser,
}

/// A version vector: a sorted, deduplicated list of per-device [`Counter`]s.
///
/// Devices absent from the vector implicitly have counter value zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vector {
    counters: Vec<Counter>,
}

impl Vector {
    /// An empty vector (all counters implicitly zero).
    #[must_use]
    pub fn new() -> Self {
        Self { counters: Vec::new() }
    }

    /// Build a vector from an iterator of counters, sorting and deduplicating
    /// by device ID (last write for a given ID wins, mirroring a reduce).
    pub fn from_counters<I: IntoIterator<Item = Counter>>(counters: I) -> Self {
        let mut v: Vec<Counter> = counters.into_iter().collect();
        v.sort_by_key(|c| c.id);
        // Keep the last occurrence of each id.
        let mut deduped: Vec<Counter> = Vec::with_capacity(v.len());
        for counter in v.drain(..) {
            if let Some(last) = deduped.last_mut() {
                if last.id == counter.id {
                    *last = counter;
                    continue;
                }
            }
            deduped.push(counter);
        }
        Self { counters: deduped }
    }

    /// Read-only access to the sorted counters.
    #[must_use]
    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    /// The counter value for `id`, or zero if `id` is absent.
    #[must_use]
    pub fn counter(&self, id: ShortID) -> u64 {
        self.counters
            .binary_search_by_key(&id, |c| c.id)
            .map(|idx| self.counters[idx].value)
            .unwrap_or(0)
    }

    /// Advance `id`'s counter, mixing in wall-clock time so that counters
    /// climbing only by one-per-edit don't lag far behind real time on a
    /// device that edits rarely.
    ///
    /// `now_unix_secs` should be the current Unix time in seconds. The new
    /// value is `max(existing + 1, now_unix_secs)`, which also covers the
    /// "fresh counter" case (`existing == 0` reduces to `max(1, now)`).
    #[must_use]
    pub fn update(&self, id: ShortID, now_unix_secs: u64) -> Self {
        let existing = self.counter(id);
        let new_value = (existing + 1).max(now_unix_secs);

        let mut counters = self.counters.clone();
        match counters.binary_search_by_key(&id, |c| c.id) {
            Ok(idx) => counters[idx].value = new_value,
            Err(idx) => counters.insert(idx, Counter { id, value: new_value }),
        }
        Self { counters }
    }

    /// Merge with `other`, taking the per-device maximum of each counter.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.counters.clone();
        for other_counter in &other.counters {
            match merged.binary_search_by_key(&other_counter.id, |c| c.id) {
                Ok(idx) => {
                    merged[idx].value = merged[idx].value.max(other_counter.value);
                },
                Err(idx) => merged.insert(idx, *other_counter),
            }
        }
        Self { counters: merged }
    }

    /// Compare `self` against `other`.
    ///
    /// Walks both sorted counter lists in a single ascending pass, tracking
    /// whether `self` has been strictly greater (`gt`) or strictly lesser
    /// (`lt`) than `other` at any compared device, and which device ID was
    /// the most recent (highest-ID) point of divergence along with its
    /// direction — that direction breaks the tie when both `gt` and `lt`
    /// are set.
    #[must_use]
    pub fn compare(&self, other: &Self) -> VectorOrdering {
        let mut gt = false;
        let mut lt = false;
        let mut last_divergence_is_gt = false;

        let mut i = 0;
        let mut j = 0;
        while i < self.counters.len() || j < other.counters.len() {
            let a = self.counters.get(i);
            let b = other.counters.get(j);

            let (av, bv) = match (a, b) {
                (Some(a), Some(b)) if a.id == b.id => {
                    i += 1;
                    j += 1;
                    (a.value, b.value)
                },
                (Some(a), Some(b)) if a.id < b.id => {
                    i += 1;
                    (a.value, 0)
                },
                (Some(_), Some(b)) => {
                    j += 1;
                    (0, b.value)
                },
                (Some(a), None) => {
                    i += 1;
                    (a.value, 0)
                },
                (None, Some(b)) => {
                    j += 1;
                    (0, b.value)
                },
                (None, None) => unreachable!("loop condition guarantees at least one side"),
            };

            match av.cmp(&bv) {
                std::cmp::Ordering::Greater => {
                    gt = true;
                    last_divergence_is_gt = true;
                },
                std::cmp::Ordering::Less => {
                    lt = true;
                    last_divergence_is_gt = false;
                },
                std::cmp::Ordering::Equal => {},
            }
        }

        match (gt, lt) {
            (false, false) => VectorOrdering::Equal,
            (true, false) => VectorOrdering::Greater,
            (false, true) => VectorOrdering::Lesser,
            (true, true) => {
                if last_divergence_is_gt {
                    VectorOrdering::ConcurrentGreater
                } else {
                    VectorOrdering::ConcurrentLesser
                }
            },
        }
    }
}
