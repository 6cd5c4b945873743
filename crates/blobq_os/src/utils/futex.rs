use crate::sync::atomic::AtomicBool;
use crate::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use crate::utils::Backoff;

// -----------------------------------------------------------------------------
// Futex

/// A user level spin flag without any resources.
///
/// Holding the flag grants a *role* rather than access to data: the queue
/// uses it to make sure at most one consumer exists at a time.
///
/// # Examples
///
/// ```
/// use blobq_os::utils::Futex;
///
/// let futex = Futex::new();
/// assert!(futex.try_lock());
/// assert!(!futex.try_lock());
///
/// futex.unlock();
/// assert!(!futex.is_locked());
/// ```
pub struct Futex {
    state: AtomicBool,
}

impl Futex {
    /// Create a unlocked `Futex`.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            state: AtomicBool::new(false),
        }
    }

    /// Return `true` if futex is locked.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.state.load(Acquire)
    }

    /// Try to lock self.
    ///
    /// - Return `true` if lock self successfully.
    /// - Return `false` if this futex has already been locked by other.
    ///
    /// This function never waits.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(false, true, Acquire, Relaxed)
            .is_ok()
    }

    /// Lock self, busy waiting until it's successful.
    ///
    /// While the flag is held by someone else, this only reads the state
    /// and backs off between reads.
    ///
    /// # Examples
    ///
    /// ```
    /// # use blobq_os::utils::Futex;
    /// let futex = Futex::new();
    ///
    /// futex.lock();
    /// assert!(futex.is_locked());
    /// futex.unlock();
    /// ```
    #[inline]
    pub fn lock(&self) {
        let backoff = Backoff::new();
        loop {
            if self.try_lock() {
                return;
            }

            while self.state.load(Relaxed) {
                backoff.snooze();
            }
        }
    }

    /// Force unlock a futex.
    ///
    /// This function will not block the thread, regardless of its state before unlocking.
    #[inline(always)]
    pub fn unlock(&self) {
        self.state.store(false, Release);
    }
}

impl Default for Futex {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Futex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Futex")
            .field("locked", &self.is_locked())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// FutexGuard

/// An RAII implementation of a "scoped lock" of futex.
///
/// When this structure is dropped (falls out of scope),
/// the futex will be unlocked.
///
/// # Examples
///
/// ```
/// use blobq_os::utils::{Futex, FutexGuard};
///
/// let futex = Futex::new();
/// {
///     let _guard = FutexGuard::try_new(&futex).unwrap();
///     assert!(futex.is_locked());
///     assert!(FutexGuard::try_new(&futex).is_none());
/// }
/// assert!(!futex.is_locked());
/// ```
#[derive(Debug)]
pub struct FutexGuard<'a> {
    futex: &'a Futex,
}

impl<'a> FutexGuard<'a> {
    /// Lock `futex` and wrap it, waiting until it's available.
    #[inline]
    pub fn new(futex: &'a Futex) -> Self {
        futex.lock();
        FutexGuard { futex }
    }

    /// Lock `futex` and wrap it, or return `None` if it's already locked.
    #[inline]
    pub fn try_new(futex: &'a Futex) -> Option<Self> {
        futex.try_lock().then_some(FutexGuard { futex })
    }
}

impl Drop for FutexGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.futex.unlock();
    }
}

// -----------------------------------------------------------------------------
// Tests
