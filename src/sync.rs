//! Indirection over `std::sync` vs `loom::sync`.
//!
//! Everything the probing/CAS core touches — atomics, `Mutex`, `Arc`, and
//! thread spawning — goes through this module so that building with
//! `--cfg loom` replaces them with loom's instrumented equivalents and lets
//! `loom::model` exhaustively explore thread interleavings instead of running
//! the code natively. See the loom tests under `tests/` for how this is
//! exercised; outside of `cfg(loom)` builds this module is a transparent
//! re-export of `std`.

#[cfg(not(loom))]
pub use std::sync::{
    atomic::{self, AtomicI32, AtomicPtr, AtomicU32, AtomicUsize, Ordering},
    Arc, Mutex,
};
#[cfg(not(loom))]
pub use std::thread;

#[cfg(loom)]
pub use loom::sync::{
    atomic::{self, AtomicI32, AtomicPtr, AtomicU32, AtomicUsize, Ordering},
    Arc, Mutex,
};
#[cfg(loom)]
pub use loom::thread;
