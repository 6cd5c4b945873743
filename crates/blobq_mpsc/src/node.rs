#![expect(unsafe_code, reason = "nodes are raw allocations with an inline payload")]

use core::alloc::Layout;
use core::ptr::{self, NonNull};

use blobq_os::sync::atomic::AtomicPtr;

use crate::NodeAlloc;

// -----------------------------------------------------------------------------
// NodeLayout

/// Memory layout of a node for one fixed item size.
///
/// ```text
/// +-----------+---------------------+---------+
/// | next: ptr | payload: item_size  | padding |
/// +-----------+---------------------+---------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeLayout {
    layout: Layout,
    payload: usize,
    item_size: usize,
}

impl NodeLayout {
    /// Returns `None` if a node holding `item_size` bytes would
    /// exceed `isize::MAX`.
    pub fn new(item_size: usize) -> Option<Self> {
        let payload = Layout::array::<u8>(item_size).ok()?;
        let (layout, offset) = Layout::new::<Node>().extend(payload).ok()?;
        Some(Self {
            layout: layout.pad_to_align(),
            payload: offset,
            item_size,
        })
    }

    #[inline(always)]
    pub const fn item_size(&self) -> usize {
        self.item_size
    }

    #[inline(always)]
    pub const fn layout(&self) -> Layout {
        self.layout
    }
}

// -----------------------------------------------------------------------------
// Node

/// Header of an intrusive list cell, followed in memory by its payload.
///
/// A node is only ever handled through the raw pointer its allocator
/// returned, so the payload can be reached by offsetting that pointer.
#[repr(C)]
pub(crate) struct Node {
    /// The following node, null while this node is the tail
    /// or its successor has not been linked yet.
    pub next: AtomicPtr<Node>,
}

impl Node {
    /// Allocate an unlinked node holding a copy of `data`.
    ///
    /// Returns `None` if `alloc` is exhausted.
    pub fn create<A: NodeAlloc>(
        alloc: &A,
        layout: &NodeLayout,
        data: &[u8],
    ) -> Option<NonNull<Node>> {
        debug_assert_eq!(data.len(), layout.item_size);

        let raw = alloc.allocate(layout.layout)?;
        let node = raw.cast::<Node>();

        // SAFETY: `raw` is valid for `layout.layout`, which holds the header
        // at offset 0 and `item_size` payload bytes at `layout.payload`.
        unsafe {
            node.write(Node {
                next: AtomicPtr::new(ptr::null_mut()),
            });
            ptr::copy_nonoverlapping(
                data.as_ptr(),
                raw.as_ptr().add(layout.payload),
                layout.item_size,
            );
        }

        Some(node)
    }

    /// Returns a reference to the forward link of `node`.
    ///
    /// # Safety
    /// - `node` must be live for `'a`.
    #[inline(always)]
    pub unsafe fn next<'a>(node: NonNull<Node>) -> &'a AtomicPtr<Node> {
        // SAFETY: guaranteed by the caller.
        unsafe { &(*node.as_ptr()).next }
    }

    /// Copy the payload of `node` into `out`.
    ///
    /// # Safety
    /// - `node` must be live and created with `layout`.
    /// - `out.len()` must equal `layout.item_size()`.
    #[inline]
    pub unsafe fn read(node: NonNull<Node>, layout: &NodeLayout, out: &mut [u8]) {
        debug_assert_eq!(out.len(), layout.item_size);

        // SAFETY: guaranteed by the caller. The payload is never written
        // after `create`, so reading it concurrently with producers is fine.
        unsafe {
            ptr::copy_nonoverlapping(
                node.as_ptr().cast::<u8>().add(layout.payload),
                out.as_mut_ptr(),
                layout.item_size,
            );
        }
    }

    /// Release the memory of `node`.
    ///
    /// # Safety
    /// - `node` must come from `Node::create(alloc, layout, _)`.
    /// - No pointer to `node` may be dereferenced afterwards.
    #[inline]
    pub unsafe fn destroy<A: NodeAlloc>(node: NonNull<Node>, alloc: &A, layout: &NodeLayout) {
        // SAFETY: guaranteed by the caller.
        unsafe { alloc.deallocate(node.cast::<u8>(), layout.layout) }
    }
}

// -----------------------------------------------------------------------------
// Tests
