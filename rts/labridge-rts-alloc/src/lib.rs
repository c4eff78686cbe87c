//! Memory allocation primitives for the labridge runtime.
//!
//! Every native call made by the bridge needs two kinds of memory that the
//! caller never sees:
//!
//! 1. **Pinned copies** of managed arrays that the host runtime is allowed
//!    to move, so native code gets a stable address for the whole call.
//! 2. **Scratch blocks** for routine workspaces (`WORK`, `IWORK`, pivot and
//!    support arrays), sized right before the call and freed right after.
//!
//! Both are handed out as [`ScratchBlock`]s tagged with a [`MemoryRegion`].
//!
//! # Accounting
//!
//! Dispatchers run synchronously on the calling thread, so allocation
//! statistics are kept per thread and per region. After any dispatcher call
//! returns, the outstanding byte count of this thread is back to where it
//! was before the call. Tests rely on that to check that every exit path
//! releases its memory.
//!
//! A per-thread byte limit ([`with_alloc_limit`]) turns oversized requests
//! into [`AllocError::OutOfMemory`], which is how the fatal allocation path
//! is exercised without exhausting the machine.

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

use std::alloc::{Layout, LayoutError};
use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Alignment of a block's first element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Whatever the element type requires.
    Natural,
    /// 64-byte boundary, for workspaces that native kernels stream over.
    CacheLine,
}

impl Alignment {
    /// Get the alignment value in bytes for elements of type `T`.
    #[inline]
    #[must_use]
    pub const fn bytes_for<T>(self) -> usize {
        let natural = std::mem::align_of::<T>();
        let requested = match self {
            Self::Natural => natural,
            Self::CacheLine => 64,
        };
        if requested > natural {
            requested
        } else {
            natural
        }
    }
}

/// Memory region classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryRegion {
    /// Pinned copies of managed arrays; never moved while a native call
    /// holds their address.
    PinnedHeap,
    /// Call-local routine workspaces.
    Scratch,
}

impl MemoryRegion {
    const fn slot(self) -> usize {
        match self {
            Self::PinnedHeap => 0,
            Self::Scratch => 1,
        }
    }
}

/// Result type for allocation operations.
pub type AllocResult<T> = Result<T, AllocError>;

/// Errors that can occur during allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Out of memory, or the thread's allocation limit would be exceeded.
    OutOfMemory {
        /// Requested allocation size in bytes.
        requested: usize,
    },
    /// Invalid layout (size overflow or bad alignment).
    InvalidLayout(String),
}

impl std::fmt::Display for AllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: failed to allocate {requested} bytes")
            }
            Self::InvalidLayout(msg) => write!(f, "invalid layout: {msg}"),
        }
    }
}

impl std::error::Error for AllocError {}

impl From<LayoutError> for AllocError {
    fn from(e: LayoutError) -> Self {
        Self::InvalidLayout(e.to_string())
    }
}

/// Statistics for memory allocation tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Total bytes currently allocated.
    pub bytes_allocated: usize,
    /// Total number of allocations performed.
    pub allocation_count: usize,
    /// Total number of deallocations performed.
    pub deallocation_count: usize,
    /// Peak memory usage in bytes.
    pub peak_bytes: usize,
    /// Number of failed allocations.
    pub failed_allocations: usize,
}

impl AllocStats {
    /// Create new empty statistics.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes_allocated: 0,
            allocation_count: 0,
            deallocation_count: 0,
            peak_bytes: 0,
            failed_allocations: 0,
        }
    }

    /// Record an allocation.
    pub fn record_alloc(&mut self, size: usize) {
        self.bytes_allocated += size;
        self.allocation_count += 1;
        self.peak_bytes = self.peak_bytes.max(self.bytes_allocated);
    }

    /// Record a deallocation.
    pub fn record_dealloc(&mut self, size: usize) {
        self.bytes_allocated = self.bytes_allocated.saturating_sub(size);
        self.deallocation_count += 1;
    }

    /// Record a failed allocation.
    pub fn record_failure(&mut self) {
        self.failed_allocations += 1;
    }

    /// Number of allocations not yet released.
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.allocation_count - self.deallocation_count
    }
}

thread_local! {
    static STATS: Cell<[AllocStats; 2]> = const { Cell::new([AllocStats::new(); 2]) };
    static LIMIT: Cell<Option<usize>> = const { Cell::new(None) };
}

fn update_stats(region: MemoryRegion, f: impl FnOnce(&mut AllocStats)) {
    STATS.with(|cell| {
        let mut all = cell.get();
        f(&mut all[region.slot()]);
        cell.set(all);
    });
}

/// Allocation statistics of the current thread for one region.
#[must_use]
pub fn thread_stats(region: MemoryRegion) -> AllocStats {
    STATS.with(|cell| cell.get()[region.slot()])
}

/// Bytes currently allocated by this thread across all regions.
#[must_use]
pub fn thread_outstanding_bytes() -> usize {
    STATS.with(|cell| cell.get().iter().map(|s| s.bytes_allocated).sum())
}

/// Run `f` with a cap on the bytes this thread may hold outstanding.
///
/// Any allocation that would push the thread past `limit` fails with
/// [`AllocError::OutOfMemory`]. The previous limit is restored afterwards,
/// including when `f` panics.
pub fn with_alloc_limit<R>(limit: usize, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<usize>);

    impl Drop for Restore {
        fn drop(&mut self) {
            LIMIT.with(|cell| cell.set(self.0));
        }
    }

    let _restore = Restore(LIMIT.with(|cell| cell.replace(Some(limit))));
    f()
}

/// Trait for memory allocators in the runtime.
pub trait Allocator {
    /// Allocate uninitialised memory for `layout`.
    ///
    /// # Safety
    ///
    /// The block must be returned through [`Allocator::deallocate`] with
    /// the same layout and must not be used afterwards.
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<u8>>;

    /// Return a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator with the same `layout`, must
    /// not have been freed already, and must not be referenced afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Allocate memory for `layout` with every byte zero.
    ///
    /// # Safety
    ///
    /// As for [`Allocator::allocate`].
    unsafe fn allocate_zeroed(&self, layout: Layout) -> AllocResult<NonNull<u8>> {
        let ptr = unsafe { self.allocate(layout)? };
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, layout.size());
        }
        Ok(ptr)
    }
}

/// System-allocator backed allocator that accounts into one region.
#[derive(Debug, Clone, Copy)]
pub struct RegionAllocator {
    region: MemoryRegion,
}

impl RegionAllocator {
    /// Create an allocator for the given region.
    #[must_use]
    pub const fn new(region: MemoryRegion) -> Self {
        Self { region }
    }

    /// The region this allocator accounts into.
    #[must_use]
    pub const fn region(&self) -> MemoryRegion {
        self.region
    }

    fn check_limit(&self, size: usize) -> AllocResult<()> {
        let Some(limit) = LIMIT.with(Cell::get) else {
            return Ok(());
        };
        if thread_outstanding_bytes().saturating_add(size) > limit {
            update_stats(self.region, AllocStats::record_failure);
            return Err(AllocError::OutOfMemory { requested: size });
        }
        Ok(())
    }
}

impl Allocator for RegionAllocator {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<u8>> {
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        self.check_limit(layout.size())?;

        let ptr = unsafe { std::alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            update_stats(self.region, AllocStats::record_failure);
            return Err(AllocError::OutOfMemory {
                requested: layout.size(),
            });
        };

        update_stats(self.region, |s| s.record_alloc(layout.size()));
        Ok(ptr)
    }

    unsafe fn allocate_zeroed(&self, layout: Layout) -> AllocResult<NonNull<u8>> {
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        self.check_limit(layout.size())?;

        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            update_stats(self.region, AllocStats::record_failure);
            return Err(AllocError::OutOfMemory {
                requested: layout.size(),
            });
        };

        update_stats(self.region, |s| s.record_alloc(layout.size()));
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        update_stats(self.region, |s| s.record_dealloc(layout.size()));
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

/// Element types for which the all-zero bit pattern is a valid value.
///
/// # Safety
///
/// Implementors must be plain-old-data: `Copy`, no drop glue, and valid
/// when every byte is zero.
pub unsafe trait ZeroInit: Copy + 'static {}

unsafe impl ZeroInit for f32 {}
unsafe impl ZeroInit for f64 {}
unsafe impl ZeroInit for i32 {}
unsafe impl ZeroInit for i64 {}

/// A zero-initialised, fixed-address block of `T` freed on drop.
///
/// Blocks are accounted to the thread that allocated them and are
/// deliberately `!Send`, so they are also released on that thread.
pub struct ScratchBlock<T: ZeroInit> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
    allocator: RegionAllocator,
    _not_send: PhantomData<*mut T>,
}

impl<T: ZeroInit> ScratchBlock<T> {
    /// Allocate `len` zeroed elements in `region`.
    ///
    /// A zero-length block holds a dangling, well-aligned pointer and
    /// performs no allocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout overflows or the allocation fails.
    pub fn zeroed(len: usize, region: MemoryRegion) -> AllocResult<Self> {
        Self::zeroed_aligned(len, region, Alignment::Natural)
    }

    /// Allocate `len` zeroed elements with an explicit alignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout overflows or the allocation fails.
    pub fn zeroed_aligned(len: usize, region: MemoryRegion, alignment: Alignment) -> AllocResult<Self> {
        let size = std::mem::size_of::<T>()
            .checked_mul(len)
            .ok_or_else(|| AllocError::InvalidLayout("size overflow".to_string()))?;
        let layout = Layout::from_size_align(size, alignment.bytes_for::<T>())?;
        let allocator = RegionAllocator::new(region);

        // Safety: the layout is valid; zero-sized layouts yield a dangling pointer
        let raw = unsafe { allocator.allocate_zeroed(layout)? };
        let ptr = if size == 0 {
            NonNull::dangling()
        } else {
            raw.cast()
        };

        Ok(Self {
            ptr,
            len,
            layout,
            allocator,
            _not_send: PhantomData,
        })
    }

    /// Allocate a block holding a copy of `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocation fails.
    pub fn from_slice(data: &[T], region: MemoryRegion) -> AllocResult<Self> {
        let mut block = Self::zeroed(data.len(), region)?;
        block.as_mut_slice().copy_from_slice(data);
        Ok(block)
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the block is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the block in bytes.
    #[inline]
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.layout.size()
    }

    /// The region this block was allocated in.
    #[inline]
    #[must_use]
    pub const fn region(&self) -> MemoryRegion {
        self.allocator.region()
    }

    /// Raw pointer to the first element.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Mutable raw pointer to the first element.
    #[inline]
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// The block's elements.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // Safety: the block is zero-initialised and `T: ZeroInit`
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The block's elements, mutably.
    #[inline]
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // Safety: the block is zero-initialised, `T: ZeroInit`, and `&mut self` is exclusive
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Address of the block, for pinning checks.
    #[must_use]
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }
}

impl<T: ZeroInit> Drop for ScratchBlock<T> {
    fn drop(&mut self) {
        if self.layout.size() > 0 {
            // Safety: allocated by this allocator with this layout, freed once
            unsafe {
                self.allocator.deallocate(self.ptr.cast(), self.layout);
            }
        }
    }
}

impl<T: ZeroInit + std::fmt::Debug> std::fmt::Debug for ScratchBlock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBlock")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("region", &self.region())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_values() {
        assert_eq!(Alignment::Natural.bytes_for::<f64>(), 8);
        assert_eq!(Alignment::Natural.bytes_for::<i32>(), 4);
        assert_eq!(Alignment::CacheLine.bytes_for::<f64>(), 64);
        assert_eq!(Alignment::CacheLine.bytes_for::<u8>(), 64);
    }

    #[test]
    fn test_alloc_stats() {
        let mut stats = AllocStats::new();
        stats.record_alloc(100);
        stats.record_alloc(50);
        assert_eq!(stats.bytes_allocated, 150);
        assert_eq!(stats.peak_bytes, 150);
        assert_eq!(stats.outstanding(), 2);

        stats.record_dealloc(100);
        assert_eq!(stats.bytes_allocated, 50);
        assert_eq!(stats.peak_bytes, 150);
        assert_eq!(stats.outstanding(), 1);

        stats.record_failure();
        assert_eq!(stats.failed_allocations, 1);
    }

    #[test]
    fn test_alloc_error_display() {
        let err = AllocError::OutOfMemory { requested: 1024 };
        assert_eq!(err.to_string(), "out of memory: failed to allocate 1024 bytes");

        let err = AllocError::InvalidLayout("size overflow".to_string());
        assert_eq!(err.to_string(), "invalid layout: size overflow");
    }

    #[test]
    fn test_scratch_block_is_zeroed() {
        let block = ScratchBlock::<f64>::zeroed(64, MemoryRegion::Scratch).unwrap();
        assert_eq!(block.len(), 64);
        assert_eq!(block.size_bytes(), 64 * 8);
        assert!(block.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_scratch_block_from_slice() {
        let block = ScratchBlock::from_slice(&[1i32, 2, 3], MemoryRegion::PinnedHeap).unwrap();
        assert_eq!(block.as_slice(), &[1, 2, 3]);
        assert_eq!(block.region(), MemoryRegion::PinnedHeap);
    }

    #[test]
    fn test_scratch_block_empty() {
        let before = thread_stats(MemoryRegion::Scratch);
        let mut block = ScratchBlock::<f64>::zeroed(0, MemoryRegion::Scratch).unwrap();
        assert!(block.is_empty());
        assert!(block.as_mut_slice().is_empty());
        assert!(!block.as_ptr().is_null());
        drop(block);
        assert_eq!(thread_stats(MemoryRegion::Scratch), before);
    }

    #[test]
    fn test_scratch_block_aligned() {
        let block =
            ScratchBlock::<f64>::zeroed_aligned(10, MemoryRegion::Scratch, Alignment::CacheLine)
                .unwrap();
        assert_eq!(block.address() % 64, 0);
    }

    #[test]
    fn test_drop_releases_accounting() {
        let before = thread_stats(MemoryRegion::Scratch);
        {
            let _a = ScratchBlock::<f64>::zeroed(100, MemoryRegion::Scratch).unwrap();
            let _b = ScratchBlock::<i32>::zeroed(10, MemoryRegion::Scratch).unwrap();
            let during = thread_stats(MemoryRegion::Scratch);
            assert_eq!(during.bytes_allocated, before.bytes_allocated + 840);
            assert_eq!(during.outstanding(), before.outstanding() + 2);
        }
        let after = thread_stats(MemoryRegion::Scratch);
        assert_eq!(after.bytes_allocated, before.bytes_allocated);
        assert_eq!(after.outstanding(), before.outstanding());
    }

    #[test]
    fn test_alloc_limit_fails_loudly() {
        let result = with_alloc_limit(1024, || ScratchBlock::<f64>::zeroed(1000, MemoryRegion::Scratch));
        assert_eq!(result.unwrap_err(), AllocError::OutOfMemory { requested: 8000 });

        // limit is lifted again
        assert!(ScratchBlock::<f64>::zeroed(1000, MemoryRegion::Scratch).is_ok());
    }

    #[test]
    fn test_alloc_limit_counts_outstanding_blocks() {
        with_alloc_limit(thread_outstanding_bytes() + 800, || {
            let first = ScratchBlock::<f64>::zeroed(60, MemoryRegion::Scratch).unwrap();
            assert!(ScratchBlock::<f64>::zeroed(60, MemoryRegion::PinnedHeap).is_err());
            drop(first);
            assert!(ScratchBlock::<f64>::zeroed(60, MemoryRegion::PinnedHeap).is_ok());
        });
    }

    #[test]
    fn test_size_overflow_is_invalid_layout() {
        let err = ScratchBlock::<f64>::zeroed(usize::MAX, MemoryRegion::Scratch).unwrap_err();
        assert!(matches!(err, AllocError::InvalidLayout(_)));
    }
}
