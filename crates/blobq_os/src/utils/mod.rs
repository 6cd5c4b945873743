//! Low-level building blocks for lock-free data structures.
//!
//! - [`Backoff`] : Exponential backoff for spin loops. The queue's consumer uses it
//!   while waiting for a producer to publish a forward link.
//! - [`CachePadded`] : Aligns a value to a cache line, keeping the producer-side
//!   and consumer-side atomics out of each other's way.
//! - [`Futex`] : A resource-free spin flag, the most basic synchronization primitive.
//!   It guards the single-consumer role of the queue.

// -----------------------------------------------------------------------------
// Modules

mod backoff;
mod cache_padded;
mod futex;

// -----------------------------------------------------------------------------
// Exports

pub use backoff::Backoff;
pub use cache_padded::CachePadded;
pub use futex::{Futex, FutexGuard};
