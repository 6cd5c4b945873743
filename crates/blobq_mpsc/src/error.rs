use thiserror::Error;

// -----------------------------------------------------------------------------
// QueueError

/// Recoverable failures of queue operations.
///
/// Only [`OutOfMemory`](QueueError::OutOfMemory) can happen to a correct
/// caller. The other variants report misuse that the raw design would leave
/// undefined, and leave the queue untouched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueueError {
    #[error("Out of memory while allocating a queue node")]
    OutOfMemory,

    #[error("The queue has no front item")]
    Empty,

    #[error("Item size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Item size {0} cannot be represented as a node layout")]
    InvalidItemSize(usize),
}

impl QueueError {
    /// Returns `Ok(())` if `actual` equals `expected`.
    #[inline]
    pub(crate) const fn check_size(expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::SizeMismatch { expected, actual })
        }
    }
}
