#![expect(unsafe_code, reason = "consumer operations rely on holding the consumer role")]

use core::fmt;

use blobq_os::utils::FutexGuard;

use crate::queue::Shared;
use crate::{Global, NodeAlloc, QueueError};

// -----------------------------------------------------------------------------
// Consumer

/// The consumer role of a [`MpscQueue`](crate::MpscQueue).
///
/// At most one `Consumer` exists per queue; the role is given back on drop.
/// Every operation that reads or removes the front takes `&mut self`, so
/// a `Consumer` can be moved to another thread but never shared.
///
/// # Examples
///
/// ```
/// use blobq_mpsc::{MpscQueue, QueueError};
///
/// let q = MpscQueue::new(1).unwrap();
/// let mut consumer = q.consumer();
/// assert_eq!(consumer.pop(), Err(QueueError::Empty));
///
/// q.push(&[9]).unwrap();
///
/// let mut out = [0_u8];
/// consumer.front(&mut out).unwrap();
/// assert_eq!(out, [9]);
/// consumer.pop().unwrap();
/// assert!(!consumer.has_front());
/// ```
pub struct Consumer<'q, A: NodeAlloc = Global> {
    shared: &'q Shared<A>,
    _role: FutexGuard<'q>,
}

impl<'q, A: NodeAlloc> Consumer<'q, A> {
    #[inline]
    pub(crate) fn new(shared: &'q Shared<A>, role: FutexGuard<'q>) -> Self {
        Self {
            shared,
            _role: role,
        }
    }

    /// Size in bytes of every item in the queue.
    #[inline]
    pub fn item_size(&self) -> usize {
        self.shared.item_size()
    }

    /// Returns `true` if the queue has a front item.
    ///
    /// Once `true`, it stays `true` until this consumer pops.
    #[inline]
    pub fn has_front(&self) -> bool {
        self.shared.has_front()
    }

    /// Copy the front item into `out` without removing it.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Empty`] if there is no front item.
    /// - [`QueueError::SizeMismatch`] if `out.len() != item_size`.
    #[inline]
    pub fn front(&mut self, out: &mut [u8]) -> Result<(), QueueError> {
        // SAFETY: we hold the consumer role.
        unsafe { self.shared.front(out) }
    }

    /// Remove the front item and free its node.
    ///
    /// If a producer is halfway through linking the next item, this
    /// busy-waits until the link is published.
    ///
    /// # Errors
    ///
    /// [`QueueError::Empty`] if there is no front item.
    #[inline]
    pub fn pop(&mut self) -> Result<(), QueueError> {
        // SAFETY: we hold the consumer role.
        unsafe { self.shared.pop() }
    }

    /// Copy the front item into `out`, then remove it.
    ///
    /// Nothing is removed on error.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobq_mpsc::MpscQueue;
    ///
    /// let q = MpscQueue::new(2).unwrap();
    /// q.push(&[1, 2]).unwrap();
    /// q.push(&[3, 4]).unwrap();
    ///
    /// let mut consumer = q.consumer();
    /// let mut out = [0_u8; 2];
    /// consumer.pop_into(&mut out).unwrap();
    /// assert_eq!(out, [1, 2]);
    /// consumer.pop_into(&mut out).unwrap();
    /// assert_eq!(out, [3, 4]);
    /// assert!(consumer.pop_into(&mut out).is_err());
    /// ```
    #[inline]
    pub fn pop_into(&mut self, out: &mut [u8]) -> Result<(), QueueError> {
        self.front(out)?;
        self.pop()
    }

    /// Pop while the queue has a front item. Returns the number of items removed.
    ///
    /// This is not a snapshot: items pushed concurrently may or may not
    /// be removed, depending on whether they are linked before the last check.
    #[inline]
    pub fn clear(&mut self) -> usize {
        // SAFETY: we hold the consumer role.
        unsafe { self.shared.clear() }
    }
}

impl<A: NodeAlloc> fmt::Debug for Consumer<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("item_size", &self.item_size())
            .field("has_front", &self.has_front())
            .finish_non_exhaustive()
    }
}
