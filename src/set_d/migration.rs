//! Expansion triggering and cooperative migration.
//!
//! Any thread that finds the table too full helps finish migrating it before
//! retrying its own operation — there is no dedicated "resizer" thread. This
//! file is the part of variant D with no counterpart in A/B/C.

use super::table::{TableVersion, EMPTY, MARKED_MASK, TOMBSTONE};
use super::{SetD, EXPANSION_RATE, LOAD_FACTOR};
use crate::sync::{Arc, Ordering};

impl SetD {
    /// Helps drain any migration already in progress for `t`, then starts a
    /// new one if `t` has crossed the load factor (counting both live keys
    /// and tombstones). Returns whether a new expansion was triggered.
    pub(super) fn expand_as_needed(
        &self,
        tid: usize,
        t_ptr: *mut TableVersion,
        t: &TableVersion,
    ) -> bool {
        self.help_expansion(tid, t);

        let occupied = (t.approx_size.get() + t.tombstone_size.get()).max(0) as u64;
        if occupied as f64 >= t.capacity() as f64 * LOAD_FACTOR {
            self.start_expansion(tid, t_ptr, t);
            true
        } else {
            false
        }
    }

    /// Publishes a new, larger table version if `t` is still current, then
    /// helps migrate into whichever version ends up current (ours, or
    /// another thread's if we lost the publish race).
    pub(super) fn start_expansion(&self, tid: usize, t_ptr: *mut TableVersion, t: &TableVersion) {
        if self.current.load(Ordering::Acquire) == t_ptr {
            let live = (t.approx_size.get() - t.tombstone_size.get()).max(0) as u64;
            let new_capacity = (live * EXPANSION_RATE).max(t.capacity() as u64) as usize;

            log::debug!(
                "expanding table: {} -> {} slots (live={}, tombstones={})",
                t.capacity(),
                new_capacity,
                t.approx_size.get(),
                t.tombstone_size.get(),
            );

            let new_table = Box::new(TableVersion::new_expanded(
                self.num_threads,
                new_capacity,
                Arc::clone(&t.data),
                t.capacity(),
            ));
            let new_ptr = Box::into_raw(new_table);

            match self.current.compare_exchange(
                t_ptr,
                new_ptr,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    log::trace!("published new table version ({new_capacity} slots)");
                    self.retired.lock().unwrap().push(t_ptr);
                }
                Err(_) => {
                    log::trace!("lost the race to publish a new table version; discarding ours");
                    // SAFETY: `new_ptr` was never published to `current`, so
                    // no other thread can have observed or is dereferencing
                    // it; we still uniquely own it.
                    unsafe { drop(Box::from_raw(new_ptr)) };
                }
            }
        }

        let (_, current) = self.current_version();
        self.help_expansion(tid, current);
    }

    /// Claims and migrates chunks of `t`'s predecessor until none remain,
    /// then waits for every other helper to finish theirs. Returns only once
    /// `t` is fully populated from its predecessor (or `t` has no
    /// predecessor at all, i.e. the initial table).
    pub(super) fn help_expansion(&self, tid: usize, t: &TableVersion) {
        let total = t.total_chunks();
        while t.chunks_claimed.load(Ordering::Relaxed) < total {
            let my_chunk = t.chunks_claimed.fetch_add(1, Ordering::AcqRel) + 1;
            if my_chunk <= total {
                self.migrate(tid, t, my_chunk);
                t.chunks_done.fetch_add(1, Ordering::AcqRel);
            }
        }
        while t.chunks_done.load(Ordering::Acquire) < total {
            core::hint::spin_loop();
        }
    }

    /// Freezes and migrates one chunk of the old table into `t`.
    fn migrate(&self, tid: usize, t: &TableVersion, my_chunk: usize) {
        let old = t
            .old
            .as_ref()
            .expect("migrate called on a table version with no predecessor");
        let start = (my_chunk - 1) * t.partition_size;
        let end = (start + t.partition_size).min(t.old_capacity);

        for slot in &old[start..end] {
            loop {
                let key = slot.load(Ordering::Acquire);
                if key == TOMBSTONE {
                    break;
                }
                match slot.compare_exchange(
                    key,
                    key | MARKED_MASK,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        if key != EMPTY {
                            let migrated = self.insert_core(tid, key, true);
                            assert!(
                                migrated,
                                "migration invariant violated: new table (capacity {}) \
                                 had no room for key {key} migrated from the old one",
                                t.capacity(),
                            );
                        }
                        break;
                    }
                    // The slot changed under us — another migrator can only
                    // have been racing to mark this exact same cell, so
                    // re-read and retry it; never advance past an unmarked
                    // slot.
                    Err(_) => continue,
                }
            }
        }
    }
}
