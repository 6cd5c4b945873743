#![expect(unsafe_code, reason = "allocators hand out raw memory")]

use alloc::alloc as malloc;
use core::alloc::Layout;
use core::ptr::NonNull;

// -----------------------------------------------------------------------------
// NodeAlloc

/// Source of node memory for a [`MpscQueue`](crate::MpscQueue).
///
/// Producers call [`allocate`](NodeAlloc::allocate) concurrently, the
/// consumer calls [`deallocate`](NodeAlloc::deallocate). A `None` from
/// `allocate` makes `push` fail with
/// [`QueueError::OutOfMemory`](crate::QueueError::OutOfMemory) and leaves
/// the queue unchanged.
///
/// # Safety
///
/// - A returned pointer must be valid for reads and writes of
///   `layout.size()` bytes and aligned to `layout.align()`.
/// - Memory must stay valid until passed back to `deallocate`
///   with the same layout.
///
/// The queue only requests layouts with a non-zero size.
pub unsafe trait NodeAlloc: Send + Sync {
    /// Allocate a block for `layout`, or `None` if memory is exhausted.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Release a block previously returned by [`allocate`](NodeAlloc::allocate).
    ///
    /// # Safety
    /// - `ptr` must come from `self.allocate(layout)` and not have been released.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

// -----------------------------------------------------------------------------
// Global

/// The global allocator, the default [`NodeAlloc`].
///
/// Unlike `Box`, allocation failure is reported instead of
/// calling `handle_alloc_error`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

unsafe impl NodeAlloc for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() != 0);
        // SAFETY: the queue never requests zero-sized layouts.
        NonNull::new(unsafe { malloc::alloc(layout) })
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: guaranteed by the caller.
        unsafe { malloc::dealloc(ptr.as_ptr(), layout) }
    }
}
