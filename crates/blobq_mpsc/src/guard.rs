#![expect(unsafe_code, reason = "the guard word is read with a volatile load")]

use core::ops::Deref;
use core::ptr;

/// Value of an intact guard word.
pub(crate) const SENTINEL: usize = 0xdead_c0de;

// -----------------------------------------------------------------------------
// Guarded

/// A value preceded in memory by a guard word.
///
/// The word is written once on creation and only read afterwards.
/// Finding anything but [`SENTINEL`] there means the memory was overwritten
/// or the handle does not point at a live control block.
#[repr(C)]
pub(crate) struct Guarded<T> {
    guard: usize,
    value: T,
}

impl<T> Guarded<T> {
    #[inline]
    pub const fn new(value: T) -> Self {
        Self {
            guard: SENTINEL,
            value,
        }
    }

    /// Returns `true` if the guard word still holds [`SENTINEL`].
    #[inline]
    pub fn is_intact(&self) -> bool {
        // Volatile, so the check cannot be folded into the constant
        // written by `new`.
        // SAFETY: `self.guard` is a valid, aligned `usize`.
        unsafe { ptr::read_volatile(&self.guard) == SENTINEL }
    }

    /// Stops the process if the guard word was overwritten.
    #[inline]
    pub fn verify(&self) {
        if !self.is_intact() {
            corrupted(self as *const Self as *const ());
        }
    }
}

impl<T> Deref for Guarded<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.value
    }
}

#[cold]
#[inline(never)]
fn corrupted(addr: *const ()) -> ! {
    log::error!("queue control block at {addr:p} failed its guard check");
    abort(addr)
}

#[cfg(feature = "std")]
fn abort(addr: *const ()) -> ! {
    ::std::eprintln!("Aborting due to corrupted queue control block at {addr:p}.");
    ::std::process::abort()
}

#[cfg(not(feature = "std"))]
fn abort(addr: *const ()) -> ! {
    panic!("Aborting due to corrupted queue control block at {addr:p}.")
}

// -----------------------------------------------------------------------------
// Tests
