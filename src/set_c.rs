//! Variant C: lock-free, fixed-capacity, single CAS per slot.
//!
//! Every slot is its own atomic integer; there is no auxiliary lock. A probe
//! resolves with at most one compare-and-swap, falling back to a re-read only
//! when the CAS loses a race.

use crate::hash::mix;
use crate::sync::{atomic::AtomicI32, Ordering};
use crate::IntSet;

const EMPTY: i32 = -2;
const TOMBSTONE: i32 = -1;

/// Lock-free fixed-capacity set; one CAS resolves each successful probe.
pub struct SetC {
    num_threads: usize,
    slots: Vec<AtomicI32>,
}

impl SetC {
    /// Creates a set with the given thread-pool size and initial (and only)
    /// capacity.
    pub fn new(num_threads: usize, capacity: usize) -> Self {
        assert!(num_threads >= 1);
        assert!(capacity >= 1);
        Self {
            num_threads,
            slots: (0..capacity).map(|_| AtomicI32::new(EMPTY)).collect(),
        }
    }

    /// The fixed capacity this set was constructed with.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl IntSet for SetC {
    fn insert_if_absent(&self, tid: usize, key: i32) -> bool {
        debug_assert!(tid < self.num_threads, "tid {tid} out of range");
        debug_assert!(key != EMPTY && key != TOMBSTONE, "key {key} is a sentinel");

        let capacity = self.slots.len();
        let h = mix(key as u32);
        for i in 0..capacity {
            let index = (h.wrapping_add(i as u32)) as usize % capacity;
            let slot = &self.slots[index];
            let found = slot.load(Ordering::Acquire);
            if found == key {
                return false;
            } else if found == EMPTY {
                match slot.compare_exchange(EMPTY, key, Ordering::AcqRel, Ordering::Acquire) {
                    Ok(_) => return true,
                    Err(actual) => {
                        if actual == key {
                            return false;
                        }
                        // Someone else's key landed here first; keep probing.
                    }
                }
            }
        }
        false
    }

    fn erase(&self, tid: usize, key: i32) -> bool {
        debug_assert!(tid < self.num_threads, "tid {tid} out of range");
        debug_assert!(key != EMPTY && key != TOMBSTONE, "key {key} is a sentinel");

        let capacity = self.slots.len();
        let h = mix(key as u32);
        for i in 0..capacity {
            let index = (h.wrapping_add(i as u32)) as usize % capacity;
            let slot = &self.slots[index];
            let found = slot.load(Ordering::Acquire);
            if found == EMPTY {
                return false;
            } else if found == key {
                return slot
                    .compare_exchange(key, TOMBSTONE, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
            }
        }
        false
    }

    fn sum_of_keys(&self) -> i64 {
        self.slots
            .iter()
            .map(|slot| {
                let v = slot.load(Ordering::Relaxed);
                if v != EMPTY && v != TOMBSTONE {
                    v as i64
                } else {
                    0
                }
            })
            .sum()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn insert_then_duplicate_insert_fails() {
        let set = SetC::new(1, 64);
        assert!(set.insert_if_absent(0, 42));
        assert!(!set.insert_if_absent(0, 42));
        assert_eq!(set.sum_of_keys(), 42);
    }

    #[test]
    fn erase_is_not_confused_with_already_present() {
        let set = SetC::new(1, 64);
        assert!(!set.erase(0, 99));
        assert!(set.insert_if_absent(0, 99));
        assert!(set.erase(0, 99));
        assert!(!set.erase(0, 99));
    }

    #[test]
    fn racing_inserts_of_the_same_key_have_exactly_one_winner() {
        use std::sync::{atomic::AtomicUsize, Arc};
        use std::thread;

        let set = Arc::new(SetC::new(16, 4096));
        let successes = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|tid| {
                let set = Arc::clone(&set);
                let successes = Arc::clone(&successes);
                thread::spawn(move || {
                    if set.insert_if_absent(tid, 31415) {
                        successes.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(successes.load(Ordering::Relaxed), 1);
        assert_eq!(set.sum_of_keys(), 31415);
    }
}
