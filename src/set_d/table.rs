//! One generation of variant D's backing array.

use crate::counter::StripedCounter;
use crate::sync::{atomic::AtomicU32, Arc, AtomicUsize};

pub(crate) const EMPTY: u32 = 0;
pub(crate) const TOMBSTONE: u32 = 0x7FFF_FFFF;
pub(crate) const MARKED_MASK: u32 = 0x8000_0000;

/// The largest and smallest legal user keys in variant D: the high bit must
/// be clear (reserved for [`MARKED_MASK`]) and the value must not collide
/// with [`TOMBSTONE`] or [`EMPTY`].
pub(crate) const MIN_KEY: i32 = 1;
pub(crate) const MAX_KEY: i32 = 0x7FFF_FFFE;

static_assertions::const_assert!(EMPTY != TOMBSTONE);
static_assertions::const_assert!(MARKED_MASK & TOMBSTONE == 0);
static_assertions::const_assert!((MAX_KEY as u32) < TOMBSTONE);
static_assertions::const_assert!(MIN_KEY > 0);

/// A single generation of variant D's table.
///
/// At most two of these are reachable at once: the active `currentTable` and,
/// while migration drains, the predecessor it's migrating out of (reachable
/// here via `old`).
pub(crate) struct TableVersion {
    pub data: Arc<[AtomicU32]>,
    pub old: Option<Arc<[AtomicU32]>>,
    pub old_capacity: usize,
    pub partition_size: usize,
    pub approx_size: StripedCounter,
    pub tombstone_size: StripedCounter,
    pub chunks_claimed: AtomicUsize,
    pub chunks_done: AtomicUsize,
}

impl TableVersion {
    pub fn new_initial(num_threads: usize, capacity: usize) -> Self {
        Self {
            data: fresh_data(capacity),
            old: None,
            old_capacity: 0,
            partition_size: (capacity / num_threads.max(1)).max(1),
            approx_size: StripedCounter::new(num_threads),
            tombstone_size: StripedCounter::new(num_threads),
            chunks_claimed: AtomicUsize::new(0),
            chunks_done: AtomicUsize::new(0),
        }
    }

    pub fn new_expanded(
        num_threads: usize,
        capacity: usize,
        old: Arc<[AtomicU32]>,
        old_capacity: usize,
    ) -> Self {
        Self {
            data: fresh_data(capacity),
            old: Some(old),
            old_capacity,
            partition_size: (capacity / num_threads.max(1)).max(1),
            approx_size: StripedCounter::new(num_threads),
            tombstone_size: StripedCounter::new(num_threads),
            chunks_claimed: AtomicUsize::new(0),
            chunks_done: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of chunks the old table is partitioned into for migration.
    /// Zero for the initial version, which has no predecessor to migrate.
    pub fn total_chunks(&self) -> usize {
        if self.old_capacity == 0 {
            0
        } else {
            self.old_capacity.div_ceil(self.partition_size)
        }
    }
}

fn fresh_data(capacity: usize) -> Arc<[AtomicU32]> {
    (0..capacity)
        .map(|_| AtomicU32::new(EMPTY))
        .collect::<Vec<_>>()
        .into()
}
