//! Exponential backoff, after `crossbeam-utils`' `Backoff`.
//!
//! See <https://docs.rs/crossbeam-utils/latest/crossbeam_utils/struct.Backoff.html>

use core::cell::Cell;
use core::fmt;

/// The maximum exponent of pure spinning.
const SPIN_LIMIT: u32 = 6;

/// The exponent after which [`Backoff::is_completed`] reports `true`.
const YIELD_LIMIT: u32 = 10;

/// Performs exponential backoff in spin loops.
///
/// Each step busy-waits roughly twice as long as the previous one, which
/// keeps a waiting thread from hammering a contended cache line.
///
/// There are two flavors:
/// - [`spin`](Backoff::spin): retry after *another* thread made progress (a failed CAS).
/// - [`snooze`](Backoff::snooze): wait *for* another thread to make progress.
///   Past the spin limit this yields the time slice to the OS scheduler
///   (only with the `std` feature).
///
/// `Backoff` never blocks on anything but time, so a loop built from it
/// stays non-blocking.
///
/// # Examples
///
/// ```
/// use blobq_os::sync::atomic::{AtomicBool, Ordering};
/// use blobq_os::utils::Backoff;
///
/// let ready = AtomicBool::new(true);
/// let backoff = Backoff::new();
/// while !ready.load(Ordering::Acquire) {
///     backoff.snooze();
/// }
/// ```
pub struct Backoff {
    step: Cell<u32>,
}

impl Backoff {
    /// Creates a new `Backoff`.
    #[inline(always)]
    pub const fn new() -> Self {
        Self { step: Cell::new(0) }
    }

    /// Resets the `Backoff` to its initial step.
    #[inline]
    pub fn reset(&self) {
        self.step.set(0);
    }

    /// Backs off in a lock-free loop.
    ///
    /// This method should be used when we need to retry an operation because another thread made
    /// progress.
    ///
    /// The processor may yield using the *YIELD* or *PAUSE* instruction.
    #[inline]
    pub fn spin(&self) {
        let step = self.step.get().min(SPIN_LIMIT);
        for _ in 0..(1_u32 << step) {
            core::hint::spin_loop();
        }

        if self.step.get() <= SPIN_LIMIT {
            self.step.set(self.step.get() + 1);
        }
    }

    /// Backs off in a blocking loop.
    ///
    /// This method should be used when we need to wait for another thread to make progress.
    ///
    /// The processor may yield using the *YIELD* or *PAUSE* instruction and the current thread
    /// may yield by giving up a timeslice to the OS scheduler.
    ///
    /// In `#[no_std]` environments, this method keeps spinning with the longest step.
    #[inline]
    pub fn snooze(&self) {
        if self.step.get() <= SPIN_LIMIT {
            for _ in 0..(1_u32 << self.step.get()) {
                core::hint::spin_loop();
            }
        } else {
            #[cfg(not(feature = "std"))]
            for _ in 0..(1_u32 << SPIN_LIMIT) {
                core::hint::spin_loop();
            }

            #[cfg(feature = "std")]
            ::std::thread::yield_now();
        }

        if self.step.get() <= YIELD_LIMIT {
            self.step.set(self.step.get() + 1);
        }
    }

    /// Returns `true` once backing off has gone on long enough that
    /// switching to a blocking mechanism would be advised.
    ///
    /// Purely informational. Callers that must stay non-blocking
    /// simply keep snoozing.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.step.get() > YIELD_LIMIT
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff")
            .field("step", &self.step)
            .field("is_completed", &self.is_completed())
            .finish()
    }
}

impl Default for Backoff {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::{Backoff, YIELD_LIMIT};

    #[test]
    fn snooze_completes() {
        let backoff = Backoff::new();
        assert!(!backoff.is_completed());

        for _ in 0..=YIELD_LIMIT {
            backoff.snooze();
        }
        assert!(backoff.is_completed());

        backoff.reset();
        assert!(!backoff.is_completed());
    }

    #[test]
    fn spin_never_completes() {
        let backoff = Backoff::new();
        for _ in 0..64 {
            backoff.spin();
        }
        assert!(!backoff.is_completed());
    }
}
