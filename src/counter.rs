//! A striped, per-thread approximate counter.
//!
//! Used by [`crate::set_d::SetD`] to track the number of live inserts and
//! tombstones in a table version without contending on a single shared
//! integer. Each thread owns one cache-line-padded lane; writers never
//! synchronize with each other, only with readers of the aggregate sum.

use crate::sync::{AtomicUsize, Ordering};
use crossbeam_utils::CachePadded;

pub(crate) struct StripedCounter {
    lanes: Vec<CachePadded<AtomicUsize>>,
}

impl StripedCounter {
    pub(crate) fn new(num_threads: usize) -> Self {
        Self {
            lanes: (0..num_threads.max(1))
                .map(|_| CachePadded::new(AtomicUsize::new(0)))
                .collect(),
        }
    }

    /// Relaxed per-lane increment. `tid` must be a valid dense thread id for
    /// this counter (checked with `debug_assert!`; out of range is a
    /// programmer error, not a recoverable condition).
    pub(crate) fn inc(&self, tid: usize) {
        debug_assert!(tid < self.lanes.len(), "tid {tid} out of range");
        self.lanes[tid].fetch_add(1, Ordering::Relaxed);
    }

    /// Sum of all lanes. Not synchronized with any particular slot write;
    /// advisory for the resize trigger, per the table-version invariants.
    pub(crate) fn get(&self) -> i64 {
        self.lanes
            .iter()
            .map(|lane| lane.load(Ordering::Relaxed) as i64)
            .sum()
    }
}
