use core::alloc::Layout;
use core::ptr::NonNull;
use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering;

use crate::trace::trace;

/// The error type for allocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl core::error::Error for AllocError {}

/// A source of raw memory for the buffers of a [`FlatTable`].
///
/// Tables own every block they request and hand each one back exactly once,
/// with the layout it was allocated with. The same trait covers plain and
/// over-aligned requests, since [`Layout`] carries both the size and the
/// alignment.
///
/// Allocators shared between tables that live on different threads must be
/// `Sync`; the tables themselves never synchronize.
///
/// # Safety
///
/// A successful `allocate` must return a pointer to a block that is valid
/// for reads and writes of `layout.size()` bytes, aligned to
/// `layout.align()`, and that stays valid until it is passed to
/// `deallocate`.
///
/// [`FlatTable`]: crate::FlatTable
pub unsafe trait Allocator {
    /// Allocates a block of memory described by `layout`.
    ///
    /// Callers never request zero-sized blocks.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the memory could not be provided.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must denote a block currently allocated by this allocator, and
    /// `layout` must be the layout that block was allocated with.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

// SAFETY: Forwards to `A`, which upholds the contract.
unsafe impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarded caller contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

/// The process heap, reached through the global allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Global;

// SAFETY: `alloc::alloc::alloc` returns blocks matching the layout or null,
// and null is mapped to an error.
unsafe impl Allocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(layout.size() != 0);
        // SAFETY: Callers never request zero-sized blocks.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: The caller guarantees `ptr` came from `allocate` with
        // `layout`.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

/// A point-in-time copy of the counters kept by a [`TrackingAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// Number of successful allocations.
    pub allocations: usize,
    /// Number of deallocations.
    pub deallocations: usize,
    /// Total bytes handed out.
    pub allocated_bytes: usize,
    /// Total bytes returned.
    pub deallocated_bytes: usize,
}

impl AllocationStats {
    /// Bytes currently outstanding.
    pub fn live_bytes(&self) -> usize {
        self.allocated_bytes - self.deallocated_bytes
    }

    /// Blocks currently outstanding.
    pub fn live_allocations(&self) -> usize {
        self.allocations - self.deallocations
    }
}

/// An allocator adapter that counts blocks and bytes flowing through it.
///
/// Every call is also reported as a `tracing` event when the `tracing`
/// feature is enabled, which makes this the hook point for allocation
/// profilers. Counters use relaxed atomics so one instance can be shared by
/// tables on several threads.
///
/// # Examples
///
/// ```rust
/// use flat_hash::allocator::Global;
/// use flat_hash::allocator::TrackingAllocator;
/// use flat_hash::DefaultHashBuilder;
/// use flat_hash::FlatHashMap;
///
/// let tracker = TrackingAllocator::new(Global);
/// {
///     let mut map: FlatHashMap<u32, u32, _, _> =
///         FlatHashMap::with_capacity_and_hasher_in(0, DefaultHashBuilder::default(), &tracker);
///     map.emplace(1, 2);
///     assert!(tracker.live_bytes() > 0);
/// }
/// assert_eq!(tracker.live_bytes(), 0);
/// ```
#[derive(Debug, Default)]
pub struct TrackingAllocator<A = Global> {
    inner: A,
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    allocated_bytes: AtomicUsize,
    deallocated_bytes: AtomicUsize,
}

impl<A> TrackingAllocator<A> {
    /// Wraps `inner`, starting with all counters at zero.
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            allocations: AtomicUsize::new(0),
            deallocations: AtomicUsize::new(0),
            allocated_bytes: AtomicUsize::new(0),
            deallocated_bytes: AtomicUsize::new(0),
        }
    }

    /// Returns the wrapped allocator.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> AllocationStats {
        AllocationStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            deallocations: self.deallocations.load(Ordering::Relaxed),
            allocated_bytes: self.allocated_bytes.load(Ordering::Relaxed),
            deallocated_bytes: self.deallocated_bytes.load(Ordering::Relaxed),
        }
    }

    /// Bytes currently outstanding.
    pub fn live_bytes(&self) -> usize {
        self.stats().live_bytes()
    }
}

// SAFETY: Forwards to `A`, which upholds the contract; bookkeeping does not
// touch the returned memory.
unsafe impl<A: Allocator> Allocator for TrackingAllocator<A> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = self.inner.allocate(layout)?;
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.allocated_bytes
            .fetch_add(layout.size(), Ordering::Relaxed);
        trace!(
            size = layout.size(),
            align = layout.align(),
            ptr = ?ptr,
            "allocate"
        );
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        trace!(
            size = layout.size(),
            align = layout.align(),
            ptr = ?ptr,
            "deallocate"
        );
        self.deallocations.fetch_add(1, Ordering::Relaxed);
        self.deallocated_bytes
            .fetch_add(layout.size(), Ordering::Relaxed);
        // SAFETY: Forwarded caller contract.
        unsafe { self.inner.deallocate(ptr, layout) }
    }
}
