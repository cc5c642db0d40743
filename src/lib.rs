//! A family of concurrent, open-addressed hash sets over 32-bit integer keys.
//!
//! Four variants implement the same [`IntSet`] contract, each with a
//! different concurrency protocol, ordered roughly by increasing engineering
//! effort and decreasing synchronization overhead:
//!
//! - [`SetA`]: a per-slot mutex, held across every probed slot.
//! - [`SetB`]: an optimistic read of each slot, with the mutex taken only to
//!   publish a write.
//! - [`SetC`]: lock-free, resolving each successful probe with one CAS.
//! - [`SetD`]: lock-free and resizable, with cooperative chunked migration —
//!   any thread that finds the table too full helps finish the resize before
//!   retrying its own operation.
//!
//! All four are callable from a fixed, known-in-advance pool of worker
//! threads, each identified by a dense `tid` in `[0, num_threads)`. None of
//! them support iteration, persistence, or keys outside `i32`; that's by
//! design, not an oversight — see each variant's module docs for its exact
//! sentinel reservations.

#![cfg_attr(loom, allow(dead_code))]

pub mod hash;
pub mod set_a;
pub mod set_b;
pub mod set_c;
pub mod set_d;

mod counter;
mod sync;

pub use set_a::SetA;
pub use set_b::SetB;
pub use set_c::SetC;
pub use set_d::SetD;

/// The shared contract implemented by all four set variants.
///
/// There is deliberately no inheritance here, only a common operation
/// signature: each variant is an independent type with its own storage
/// layout and synchronization strategy, not a specialization of a shared
/// base.
pub trait IntSet: Send + Sync {
    /// Inserts `key` if it isn't already present. Returns `true` iff this
    /// call was the one that inserted it.
    ///
    /// `tid` must be a dense thread id in `[0, num_threads)` for this set
    /// instance; out-of-range ids are a programmer error.
    fn insert_if_absent(&self, tid: usize, key: i32) -> bool;

    /// Removes `key` if present. Returns `true` iff this call was the one
    /// that removed it.
    fn erase(&self, tid: usize, key: i32) -> bool;

    /// Sums every key currently present. Linearizable only when the caller
    /// is the sole active thread; under concurrent mutation this is a
    /// best-effort snapshot across cells, not a synchronized read.
    fn sum_of_keys(&self) -> i64;
}
