#![expect(unsafe_code, reason = "lock-free linked list over raw node pointers")]

use alloc::boxed::Box;
use core::fmt;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ptr::{self, NonNull};

use blobq_os::sync::atomic::AtomicPtr;
use blobq_os::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use blobq_os::utils::{Backoff, CachePadded, Futex, FutexGuard};

use crate::guard::Guarded;
use crate::node::{Node, NodeLayout};
use crate::{Consumer, Global, NodeAlloc, QueueError};

// -----------------------------------------------------------------------------
// Shared

/// The control block shared by all producers and the consumer.
///
/// Invariant: `head` is null iff `tail` is null, outside of the short
/// windows inside `push` and `pop`.
pub(crate) struct Shared<A: NodeAlloc> {
    /// Oldest node. Written by the consumer, and by a producer that
    /// turns an empty queue non-empty.
    head: CachePadded<AtomicPtr<Node>>,
    /// Newest node. Exchanged by every producer.
    tail: CachePadded<AtomicPtr<Node>>,
    layout: NodeLayout,
    /// Held by the single live [`Consumer`].
    pub(crate) consumer: Futex,
    alloc: A,
}

impl<A: NodeAlloc> Shared<A> {
    #[inline(always)]
    pub fn item_size(&self) -> usize {
        self.layout.item_size()
    }

    #[inline]
    pub fn has_front(&self) -> bool {
        !self.head.load(Acquire).is_null()
    }

    /// Wait-free enqueue.
    fn push(&self, data: &[u8]) -> Result<(), QueueError> {
        QueueError::check_size(self.item_size(), data.len())?;

        let Some(node) = Node::create(&self.alloc, &self.layout, data) else {
            log::debug!("failed to allocate a {} byte queue node", self.layout.layout().size());
            return Err(QueueError::OutOfMemory);
        };

        // Linearization point. Acquire pairs with the exchange that
        // published `old_tail`, so its header is initialized.
        let old_tail = self.tail.swap(node.as_ptr(), AcqRel);

        match NonNull::new(old_tail) {
            // Until this store the chain is broken: `tail` is `node` but
            // nothing points at it yet. `pop` waits for it.
            //
            // SAFETY: the consumer frees `old_tail` only after either clearing
            // `tail` from it (then our exchange would have returned null) or
            // observing the `next` we store here. Either way it is still live.
            Some(old_tail) => unsafe { Node::next(old_tail).store(node.as_ptr(), Release) },
            None => self.head.store(node.as_ptr(), Release),
        }

        Ok(())
    }

    /// Copy the oldest item into `out`.
    ///
    /// # Safety
    /// - The caller must be the only consumer.
    pub unsafe fn front(&self, out: &mut [u8]) -> Result<(), QueueError> {
        QueueError::check_size(self.item_size(), out.len())?;

        let head = NonNull::new(self.head.load(Acquire)).ok_or(QueueError::Empty)?;
        // SAFETY: only the consumer frees nodes, and `head` is live
        // until it pops it.
        unsafe { Node::read(head, &self.layout, out) };
        Ok(())
    }

    /// Unlink and free the oldest node.
    ///
    /// Only the consumer clears `head`; producers only ever set it.
    /// So a non-null `head` seen here stays valid for the whole call.
    ///
    /// # Safety
    /// - The caller must be the only consumer.
    pub unsafe fn pop(&self) -> Result<(), QueueError> {
        let popped = NonNull::new(self.head.load(Acquire)).ok_or(QueueError::Empty)?;

        if self
            .tail
            .compare_exchange(popped.as_ptr(), ptr::null_mut(), AcqRel, Acquire)
            .is_ok()
        {
            // `popped` was the only node. A producer may already have pushed
            // into the now-empty queue and set `head` itself, in which case
            // this fails and `head` is already right.
            let _ = self
                .head
                .compare_exchange(popped.as_ptr(), ptr::null_mut(), AcqRel, Relaxed);
        } else {
            // Some producer replaced `popped` as tail, and will link it to
            // the new node. Wait until the link is published.
            //
            // SAFETY: `popped` is live, we have not freed it yet.
            let next = unsafe { Node::next(popped) };
            let backoff = Backoff::new();
            let new_head = loop {
                if let Some(new_head) = NonNull::new(next.load(Acquire)) {
                    break new_head;
                }
                backoff.snooze();
            };
            self.head.store(new_head.as_ptr(), Release);
        }

        // SAFETY: neither `head`, `tail` nor any `next` designates `popped`
        // anymore, and producers never touch a node after it stops being tail.
        unsafe { Node::destroy(popped, &self.alloc, &self.layout) };
        Ok(())
    }

    /// Pop until the queue reports no front. Returns the number of nodes freed.
    ///
    /// # Safety
    /// - The caller must be the only consumer.
    pub unsafe fn clear(&self) -> usize {
        let mut count = 0;
        // SAFETY: guaranteed by the caller.
        while unsafe { self.pop() }.is_ok() {
            count += 1;
        }
        count
    }

    /// Count the nodes reachable from `head`.
    ///
    /// # Safety
    /// - The caller must have exclusive access to the queue, so that
    ///   every push has completed and the chain is fully linked.
    unsafe fn count_linked(&self) -> usize {
        let mut count = 0;
        let mut cursor = NonNull::new(self.head.load(Relaxed));
        while let Some(node) = cursor {
            count += 1;
            // SAFETY: nodes reachable from `head` are live.
            cursor = NonNull::new(unsafe { Node::next(node) }.load(Relaxed));
        }
        count
    }
}

// -----------------------------------------------------------------------------
// MpscQueue

/// An unbounded lock-free FIFO queue of fixed-size byte items, supporting
/// any number of concurrent producers and one consumer at a time.
///
/// Items are opaque blobs of [`item_size`](MpscQueue::item_size) bytes,
/// copied in on [`push`](MpscQueue::push) and copied out through a
/// [`Consumer`]. Every item lives in its own heap node, linked from the
/// oldest (`head`) to the newest (`tail`).
///
/// # Progress
///
/// - `push` is wait-free: one allocation, one atomic exchange and one store.
/// - `has_front` and `front` are a single atomic load.
/// - `pop` is lock-free. If a producer has swapped itself in as tail but not
///   yet linked the previous tail forward, `pop` busy-waits for that link.
///   The wait is bounded by the producer's own progress, nothing else.
///
/// # Ordering
///
/// Items are consumed in the order their producers exchanged `tail`.
/// Items pushed by one thread keep their relative order.
///
/// # Single consumer
///
/// Consumer operations live on [`Consumer`], and at most one `Consumer` exists
/// per queue at any time. This is what makes freeing popped nodes
/// immediately, without hazard pointers or epochs, sound.
///
/// # Examples
///
/// ```
/// use blobq_mpsc::MpscQueue;
/// use std::thread;
///
/// const COUNT: u32 = 1_000;
/// const THREADS: u32 = 4;
///
/// let q = MpscQueue::new(size_of::<u32>()).unwrap();
///
/// thread::scope(|scope| {
///     for t in 0..THREADS {
///         let q = &q;
///         scope.spawn(move || {
///             for i in 0..COUNT {
///                 q.push(&(t * COUNT + i).to_ne_bytes()).unwrap();
///             }
///         });
///     }
///
///     scope.spawn(|| {
///         let mut consumer = q.consumer();
///         let mut sum = 0_u64;
///         let mut buf = [0_u8; 4];
///         for _ in 0..COUNT * THREADS {
///             while consumer.pop_into(&mut buf).is_err() {}
///             sum += u32::from_ne_bytes(buf) as u64;
///         }
///         let n = (COUNT * THREADS) as u64;
///         assert_eq!(sum, n * (n - 1) / 2);
///     });
/// });
///
/// assert!(!q.has_front());
/// q.destroy();
/// ```
pub struct MpscQueue<A: NodeAlloc = Global> {
    block: NonNull<Guarded<Shared<A>>>,
    _marker: PhantomData<Guarded<Shared<A>>>,
}

// SAFETY: producers only touch `tail` and the previous tail's `next`,
// the consumer role is handed out through `Futex`.
unsafe impl<A: NodeAlloc> Send for MpscQueue<A> {}
unsafe impl<A: NodeAlloc> Sync for MpscQueue<A> {}

/// How the remaining nodes are handled when the control block is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// Free them through `clear`.
    Drain,
    /// Leave them allocated.
    Leak,
}

impl MpscQueue<Global> {
    /// Create an empty queue for items of `item_size` bytes,
    /// using the global allocator.
    ///
    /// `item_size` is fixed for the lifetime of the queue. Zero is valid.
    ///
    /// # Errors
    ///
    /// [`QueueError::InvalidItemSize`] if a node holding `item_size` bytes
    /// cannot be laid out.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobq_mpsc::MpscQueue;
    ///
    /// let q = MpscQueue::new(8).unwrap();
    /// assert_eq!(q.item_size(), 8);
    /// assert!(!q.has_front());
    /// ```
    #[inline]
    pub fn new(item_size: usize) -> Result<Self, QueueError> {
        Self::new_in(item_size, Global)
    }
}

impl<A: NodeAlloc> MpscQueue<A> {
    /// Create an empty queue whose nodes come from `alloc`.
    ///
    /// The control block itself is allocated with the global allocator.
    pub fn new_in(item_size: usize, alloc: A) -> Result<Self, QueueError> {
        let layout = NodeLayout::new(item_size).ok_or(QueueError::InvalidItemSize(item_size))?;

        let block = Box::new(Guarded::new(Shared {
            head: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            tail: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            layout,
            consumer: Futex::new(),
            alloc,
        }));
        let block = NonNull::from(Box::leak(block));
        log::trace!("created queue {block:p} with item size {item_size}");

        Ok(Self {
            block,
            _marker: PhantomData,
        })
    }

    #[inline(always)]
    fn guarded(&self) -> &Guarded<Shared<A>> {
        // SAFETY: `block` is live until `release`.
        unsafe { self.block.as_ref() }
    }

    #[inline(always)]
    pub(crate) fn shared(&self) -> &Shared<A> {
        self.guarded()
    }

    /// Size in bytes of every item in this queue.
    #[inline]
    pub fn item_size(&self) -> usize {
        self.shared().item_size()
    }

    /// Push a copy of `data` to the back of the queue.
    ///
    /// Any number of threads may push concurrently, alongside the consumer.
    ///
    /// # Errors
    ///
    /// - [`QueueError::OutOfMemory`] if no node could be allocated.
    /// - [`QueueError::SizeMismatch`] if `data.len() != item_size`.
    ///
    /// The queue is left unchanged on error.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobq_mpsc::{MpscQueue, QueueError};
    ///
    /// let q = MpscQueue::new(2).unwrap();
    /// q.push(&[1, 2]).unwrap();
    /// assert!(matches!(q.push(&[1, 2, 3]), Err(QueueError::SizeMismatch { .. })));
    /// assert!(q.has_front());
    /// ```
    #[inline]
    pub fn push(&self, data: &[u8]) -> Result<(), QueueError> {
        self.shared().push(data)
    }

    /// Returns `true` if the queue currently has a front item.
    ///
    /// Safe from any thread. Seen from the consumer, `true` stays `true`
    /// until it pops. Seen from elsewhere, the answer may be stale immediately.
    #[inline]
    pub fn has_front(&self) -> bool {
        self.shared().has_front()
    }

    /// Take the consumer role, or `None` if another [`Consumer`] is alive.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobq_mpsc::MpscQueue;
    ///
    /// let q = MpscQueue::new(1).unwrap();
    /// let consumer = q.try_consumer().unwrap();
    /// assert!(q.try_consumer().is_none());
    /// drop(consumer);
    /// assert!(q.try_consumer().is_some());
    /// ```
    #[inline]
    pub fn try_consumer(&self) -> Option<Consumer<'_, A>> {
        let shared = self.shared();
        FutexGuard::try_new(&shared.consumer).map(|role| Consumer::new(shared, role))
    }

    /// Take the consumer role, busy-waiting while another [`Consumer`] is alive.
    #[inline]
    pub fn consumer(&self) -> Consumer<'_, A> {
        let shared = self.shared();
        Consumer::new(shared, FutexGuard::new(&shared.consumer))
    }

    /// Pop every item. Returns the number of items removed.
    ///
    /// Exclusive access means no producer is running,
    /// so this drains the queue completely.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobq_mpsc::MpscQueue;
    ///
    /// let mut q = MpscQueue::new(1).unwrap();
    /// q.push(&[1]).unwrap();
    /// q.push(&[2]).unwrap();
    /// assert_eq!(q.clear(), 2);
    /// assert_eq!(q.clear(), 0);
    /// ```
    #[inline]
    pub fn clear(&mut self) -> usize {
        // SAFETY: `&mut self` rules out a running consumer.
        unsafe { self.shared().clear() }
    }

    /// Destroy the queue after verifying its control block.
    ///
    /// A corrupted guard word aborts the process.
    ///
    /// The queue must be empty before destruction; destroying a non-empty
    /// queue leaks its remaining nodes. Call [`clear`](MpscQueue::clear)
    /// first to avoid that. Dropping the queue instead clears it.
    pub fn destroy(self) {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `this` is never used or dropped again.
        unsafe { this.release(Teardown::Leak) };
    }

    /// Free the control block.
    ///
    /// # Safety
    /// - Must be called at most once, and `self` must not be used afterwards.
    unsafe fn release(&mut self, teardown: Teardown) {
        let guarded = self.guarded();
        if teardown == Teardown::Leak || cfg!(any(feature = "debug", debug_assertions)) {
            guarded.verify();
        }

        match teardown {
            Teardown::Drain => {
                self.clear();
            }
            Teardown::Leak => {
                // SAFETY: `&mut self` gives exclusive access to the queue.
                let leaked = unsafe { self.shared().count_linked() };
                if leaked != 0 {
                    log::warn!("destroying queue {:p} leaks {leaked} nodes", self.block);
                }
            }
        }

        log::trace!("destroyed queue {:p}", self.block);
        // SAFETY: `block` came from `Box::leak` in `new_in`.
        drop(unsafe { Box::from_raw(self.block.as_ptr()) });
    }
}

impl<A: NodeAlloc> Drop for MpscQueue<A> {
    fn drop(&mut self) {
        // SAFETY: called once, from `drop`.
        unsafe { self.release(Teardown::Drain) };
    }
}

impl<A: NodeAlloc> fmt::Debug for MpscQueue<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpscQueue")
            .field("item_size", &self.item_size())
            .field("has_front", &self.has_front())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(all(test, feature = "std"))]
mod tests {
    use core::alloc::Layout;
    use core::ptr::NonNull;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread::scope;
    use std::vec;

    use super::MpscQueue;
    use crate::{Global, NodeAlloc, QueueError};

    /// Global allocator that counts live nodes and can be told to fail.
    #[derive(Clone, Default)]
    struct TestAlloc(Arc<TestAllocState>);

    #[derive(Default)]
    struct TestAllocState {
        fail: AtomicBool,
        live: AtomicUsize,
    }

    impl TestAlloc {
        fn set_fail(&self, fail: bool) {
            self.0.fail.store(fail, Ordering::SeqCst);
        }

        fn live(&self) -> usize {
            self.0.live.load(Ordering::SeqCst)
        }
    }

    unsafe impl NodeAlloc for TestAlloc {
        fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
            if self.0.fail.load(Ordering::SeqCst) {
                return None;
            }
            let ptr = Global.allocate(layout)?;
            self.0.live.fetch_add(1, Ordering::SeqCst);
            Some(ptr)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            self.0.live.fetch_sub(1, Ordering::SeqCst);
            unsafe { Global.deallocate(ptr, layout) }
        }
    }

    fn push_u32<A: NodeAlloc>(q: &MpscQueue<A>, value: u32) {
        q.push(&value.to_ne_bytes()).unwrap();
    }

    fn front_u32<A: NodeAlloc>(q: &MpscQueue<A>) -> u32 {
        let mut out = [0_u8; 4];
        q.consumer().front(&mut out).unwrap();
        u32::from_ne_bytes(out)
    }

    #[test]
    fn empty_initially() {
        let q = MpscQueue::new(4).unwrap();
        assert!(!q.has_front());
        assert!(!q.consumer().has_front());
        q.destroy();
    }

    #[test]
    fn single_round_trip() {
        let q = MpscQueue::new(4).unwrap();
        push_u32(&q, 1);
        assert!(q.has_front());
        assert_eq!(front_u32(&q), 1);

        q.consumer().pop().unwrap();
        assert!(!q.has_front());
        q.destroy();
    }

    #[test]
    fn fifo_order() {
        let mut q = MpscQueue::new(4).unwrap();

        for i in 0..64 {
            push_u32(&q, i);
            assert!(q.has_front());
            // The front never changes until popped.
            assert_eq!(front_u32(&q), 0);
        }

        let mut consumer = q.consumer();
        let mut out = [0_u8; 4];
        for i in 0..32 {
            consumer.front(&mut out).unwrap();
            assert_eq!(u32::from_ne_bytes(out), i);
            consumer.pop().unwrap();
        }
        assert!(consumer.has_front());
        drop(consumer);

        assert_eq!(q.clear(), 32);
        assert!(!q.has_front());
        q.destroy();
    }

    #[test]
    fn clear_empties_fully() {
        let q = MpscQueue::new(4).unwrap();
        for i in 0..10 {
            push_u32(&q, i);
        }

        let mut consumer = q.consumer();
        assert_eq!(consumer.clear(), 10);
        assert!(!consumer.has_front());
        assert_eq!(consumer.clear(), 0);
        assert!(!consumer.has_front());
        drop(consumer);

        // Still usable after a clear.
        push_u32(&q, 99);
        assert_eq!(front_u32(&q), 99);
    }

    #[test]
    fn empty_consumer_operations_fail() {
        let q = MpscQueue::new(4).unwrap();
        let mut consumer = q.consumer();
        let mut out = [0_u8; 4];
        assert_eq!(consumer.front(&mut out), Err(QueueError::Empty));
        assert_eq!(consumer.pop(), Err(QueueError::Empty));
        assert_eq!(consumer.pop_into(&mut out), Err(QueueError::Empty));
    }

    #[test]
    fn size_mismatch() {
        let q = MpscQueue::new(4).unwrap();
        assert_eq!(
            q.push(&[0; 3]),
            Err(QueueError::SizeMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert!(!q.has_front());

        push_u32(&q, 5);
        let mut consumer = q.consumer();
        let mut out = [0_u8; 8];
        assert_eq!(
            consumer.pop_into(&mut out),
            Err(QueueError::SizeMismatch {
                expected: 4,
                actual: 8
            })
        );
        // Nothing was removed.
        assert!(consumer.has_front());
    }

    #[test]
    fn invalid_item_size() {
        assert_eq!(
            MpscQueue::new(usize::MAX).map(|_| ()),
            Err(QueueError::InvalidItemSize(usize::MAX))
        );
    }

    #[test]
    fn zero_sized_items() {
        let q = MpscQueue::new(0).unwrap();
        for _ in 0..3 {
            q.push(&[]).unwrap();
        }

        let mut consumer = q.consumer();
        let mut count = 0;
        while consumer.pop_into(&mut []).is_ok() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn out_of_memory_leaves_queue_unchanged() {
        let alloc = TestAlloc::default();
        let q = MpscQueue::new_in(4, alloc.clone()).unwrap();

        alloc.set_fail(true);
        assert_eq!(q.push(&[1; 4]), Err(QueueError::OutOfMemory));
        assert!(q.shared().head.load(Ordering::SeqCst).is_null());
        assert!(q.shared().tail.load(Ordering::SeqCst).is_null());
        assert_eq!(q.item_size(), 4);
        assert!(!q.has_front());

        alloc.set_fail(false);
        push_u32(&q, 7);
        let head = q.shared().head.load(Ordering::SeqCst);
        let tail = q.shared().tail.load(Ordering::SeqCst);

        alloc.set_fail(true);
        assert_eq!(q.push(&[2; 4]), Err(QueueError::OutOfMemory));
        assert_eq!(q.shared().head.load(Ordering::SeqCst), head);
        assert_eq!(q.shared().tail.load(Ordering::SeqCst), tail);
        assert_eq!(front_u32(&q), 7);
        assert_eq!(alloc.live(), 1);

        let mut consumer = q.consumer();
        consumer.pop().unwrap();
        assert!(!consumer.has_front());
        drop(consumer);
        assert_eq!(alloc.live(), 0);
    }

    #[test]
    fn consumer_role_is_exclusive() {
        let q = MpscQueue::new(1).unwrap();
        let consumer = q.try_consumer().unwrap();
        assert!(q.try_consumer().is_none());

        // Producers are not affected by the role.
        q.push(&[1]).unwrap();

        scope(|scope| {
            let waiter = scope.spawn(|| {
                let mut consumer = q.consumer();
                let mut out = [0_u8];
                consumer.pop_into(&mut out).unwrap();
                out[0]
            });
            drop(consumer);
            assert_eq!(waiter.join().unwrap(), 1);
        });

        assert!(q.try_consumer().is_some());
    }

    #[test]
    fn drop_drains_nodes() {
        let alloc = TestAlloc::default();
        let q = MpscQueue::new_in(16, alloc.clone()).unwrap();
        for i in 0..20_u8 {
            q.push(&[i; 16]).unwrap();
        }
        assert_eq!(alloc.live(), 20);

        drop(q);
        assert_eq!(alloc.live(), 0);
    }

    #[test]
    #[cfg_attr(miri, ignore = "leaks nodes on purpose")]
    fn destroy_leaks_remaining_nodes() {
        let alloc = TestAlloc::default();
        let q = MpscQueue::new_in(1, alloc.clone()).unwrap();
        q.push(&[1]).unwrap();
        q.push(&[2]).unwrap();

        q.destroy();
        assert_eq!(alloc.live(), 2);
    }

    #[test]
    fn spsc() {
        #[cfg(miri)]
        const COUNT: u32 = 50;
        #[cfg(not(miri))]
        const COUNT: u32 = 100_000;

        let q = MpscQueue::new(4).unwrap();

        scope(|scope| {
            scope.spawn(|| {
                let mut consumer = q.consumer();
                let mut out = [0_u8; 4];
                for i in 0..COUNT {
                    while consumer.pop_into(&mut out).is_err() {}
                    assert_eq!(u32::from_ne_bytes(out), i);
                }
                assert!(!consumer.has_front());
            });
            scope.spawn(|| {
                for i in 0..COUNT {
                    push_u32(&q, i);
                }
            });
        });

        q.destroy();
    }

    #[test]
    fn per_producer_order() {
        #[cfg(miri)]
        const COUNT: u32 = 30;
        #[cfg(not(miri))]
        const COUNT: u32 = 20_000;
        const THREADS: u32 = 4;

        let q = MpscQueue::new(8).unwrap();

        scope(|scope| {
            for t in 0..THREADS {
                let q = &q;
                scope.spawn(move || {
                    for i in 0..COUNT {
                        let mut item = [0_u8; 8];
                        item[..4].copy_from_slice(&t.to_ne_bytes());
                        item[4..].copy_from_slice(&i.to_ne_bytes());
                        q.push(&item).unwrap();
                    }
                });
            }

            scope.spawn(|| {
                let mut consumer = q.consumer();
                let mut next = vec![0_u32; THREADS as usize];
                let mut out = [0_u8; 8];
                for _ in 0..COUNT * THREADS {
                    while consumer.pop_into(&mut out).is_err() {}
                    let t = u32::from_ne_bytes(out[..4].try_into().unwrap()) as usize;
                    let i = u32::from_ne_bytes(out[4..].try_into().unwrap());
                    assert_eq!(next[t], i);
                    next[t] += 1;
                }
                assert!(next.iter().all(|&n| n == COUNT));
            });
        });

        assert!(!q.has_front());
    }

    #[test]
    fn mpsc_no_loss_no_duplication() {
        #[cfg(miri)]
        const COUNT: usize = 100;
        #[cfg(not(miri))]
        const COUNT: usize = 1_500_000;
        const PRODUCERS: usize = 7;

        let q = MpscQueue::new(size_of::<usize>()).unwrap();
        let claimed = AtomicUsize::new(0);
        let consumed = AtomicUsize::new(0);

        let seen = scope(|scope| {
            let consumer = scope.spawn(|| {
                let mut consumer = q.consumer();
                let mut seen = vec![false; COUNT];
                let mut out = [0_u8; size_of::<usize>()];
                while consumed.load(Ordering::SeqCst) < COUNT {
                    if consumer.has_front() {
                        consumer.pop_into(&mut out).unwrap();
                        let value = usize::from_ne_bytes(out);
                        assert!(!seen[value], "{value} consumed twice");
                        seen[value] = true;
                        consumed.fetch_add(1, Ordering::SeqCst);
                    }
                }
                seen
            });

            for _ in 0..PRODUCERS {
                scope.spawn(|| {
                    loop {
                        let value = claimed.fetch_add(1, Ordering::SeqCst);
                        if value >= COUNT {
                            break;
                        }
                        q.push(&value.to_ne_bytes()).unwrap();
                    }
                });
            }

            consumer.join().unwrap()
        });

        assert_eq!(consumed.load(Ordering::SeqCst), COUNT);
        assert!(seen.into_iter().all(|s| s));
        assert!(!q.has_front());
        q.destroy();
    }

    #[test]
    fn concurrent_clear_drains_what_it_sees() {
        #[cfg(miri)]
        const COUNT: usize = 40;
        #[cfg(not(miri))]
        const COUNT: usize = 50_000;

        let alloc = TestAlloc::default();
        let mut q = MpscQueue::new_in(1, alloc.clone()).unwrap();
        let done = AtomicBool::new(false);

        let cleared = scope(|scope| {
            scope.spawn(|| {
                for i in 0..COUNT {
                    q.push(&[i as u8]).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            });

            let mut consumer = q.consumer();
            let mut cleared = 0;
            while !done.load(Ordering::SeqCst) {
                cleared += consumer.clear();
            }
            cleared + consumer.clear()
        });

        assert_eq!(cleared, COUNT);
        assert_eq!(q.clear(), 0);
        assert_eq!(alloc.live(), 0);
    }
}
