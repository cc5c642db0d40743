//! Variant A: a fixed-capacity set that locks on every probe.
//!
//! The simplest and most serialized of the four. Every probed slot is
//! acquired, inspected, acted on, and released in turn — a baseline the
//! other three variants are measured against.

use crate::hash::mix;
use crate::sync::Mutex;
use crate::IntSet;

const EMPTY: i32 = -2;
const TOMBSTONE: i32 = -1;

/// Lock-on-every-probe fixed-capacity set.
pub struct SetA {
    num_threads: usize,
    slots: Vec<Mutex<i32>>,
}

impl SetA {
    /// Creates a set with the given thread-pool size and initial (and only)
    /// capacity.
    pub fn new(num_threads: usize, capacity: usize) -> Self {
        assert!(num_threads >= 1);
        assert!(capacity >= 1);
        Self {
            num_threads,
            slots: (0..capacity).map(|_| Mutex::new(EMPTY)).collect(),
        }
    }

    /// The fixed capacity this set was constructed with.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl IntSet for SetA {
    fn insert_if_absent(&self, tid: usize, key: i32) -> bool {
        debug_assert!(tid < self.num_threads, "tid {tid} out of range");
        debug_assert!(key != EMPTY && key != TOMBSTONE, "key {key} is a sentinel");

        let capacity = self.slots.len();
        let h = mix(key as u32);
        for i in 0..capacity {
            let index = (h.wrapping_add(i as u32)) as usize % capacity;
            let mut slot = self.slots[index].lock().unwrap();
            if *slot == key {
                return false;
            } else if *slot == EMPTY {
                *slot = key;
                return true;
            }
            // Tombstone, or someone else's key: the chain continues.
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
            let mut slot = self.slots[index].lock().unwrap();
            if *slot == EMPTY {
                return false;
            } else if *slot == key {
                *slot = TOMBSTONE;
                return true;
            }
        }
        false
    }

    fn sum_of_keys(&self) -> i64 {
        let mut sum = 0i64;
        for slot in &self.slots {
            let v = *slot.lock().unwrap();
            if v != EMPTY && v != TOMBSTONE {
                sum += v as i64;
            }
        }
        sum
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn insert_then_duplicate_insert_fails() {
        let set = SetA::new(1, 64);
        assert!(set.insert_if_absent(0, 42));
        assert!(!set.insert_if_absent(0, 42));
        assert_eq!(set.sum_of_keys(), 42);
    }

    #[test]
    fn erase_then_reinsert() {
        let set = SetA::new(1, 64);
        assert!(set.insert_if_absent(0, 7));
        assert!(set.erase(0, 7));
        assert!(!set.erase(0, 7));
        assert!(set.insert_if_absent(0, 7));
        assert_eq!(set.sum_of_keys(), 7);
    }

    #[test]
    fn tombstone_preserves_probe_chain() {
        // Force a collision: capacity 1 means every key hashes to slot 0.
        let set = SetA::new(1, 1);
        assert!(set.insert_if_absent(0, 5));
        assert!(!set.insert_if_absent(0, 9)); // table full along the only chain
        assert!(set.erase(0, 5));
        assert!(set.insert_if_absent(0, 9));
        assert_eq!(set.sum_of_keys(), 9);
    }

    #[test]
    fn concurrent_disjoint_inserts_and_erases() {
        use std::sync::Arc;
        use std::thread;

        let set = Arc::new(SetA::new(8, 1024));
        let handles: Vec<_> = (0..8)
            .map(|tid| {
                let set = Arc::clone(&set);
                thread::spawn(move || {
                    let base = tid * 128;
                    for k in 0..128 {
                        assert!(set.insert_if_absent(tid, (base + k) as i32 + 1));
                    }
                    for k in 0..64 {
                        assert!(set.erase(tid, (base + k) as i32 + 1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let expected: i64 = (0..8)
            .flat_map(|tid| (64..128).map(move |k| (tid * 128 + k) as i64 + 1))
            .sum();
        assert_eq!(set.sum_of_keys(), expected);
    }
}
