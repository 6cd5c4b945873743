//! Provide atomic types
//!
//! If the target platform does not have a native `AtomicBool`,
//! this will switch to `portable_atomic`.
//!
//! Pointer-width atomics are always taken from `core`.
//!
//! See the [standard library] for further details.
//!
//! [standard library]: https://doc.rust-lang.org/core/sync/atomic

pub use atomic_8::AtomicBool;
pub use core::sync::atomic::{AtomicPtr, AtomicUsize};
pub use core::sync::atomic::{Ordering, fence};

#[cfg(target_has_atomic = "8")]
use core::sync::atomic as atomic_8;

#[cfg(not(target_has_atomic = "8"))]
use portable_atomic as atomic_8;

#[cfg(not(target_has_atomic = "ptr"))]
compile_error!("Platforms without atomic pointers are currently not supported.");
