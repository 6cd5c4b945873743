//! Synchronization primitives.
//!
//! Only the atomic layer lives here. Everything the queue builds on top of
//! it is in [`utils`](crate::utils).
//!
//! ## atomic
//!
//! We detect whether atomic operations are available on the target platform.
//! If supported, we prioritize using `core::sync::atomic`; otherwise,
//! we fall back to `portable_atomic`.
//!
//! Atomic pointers are required. The queue is a linked list of atomic
//! pointers and has no meaningful fallback without them.

pub mod atomic;
