//! Pinned memory and scoped native views of managed arrays.
//!
//! Native routines receive raw pointers and keep using them for the whole
//! call, so every operand must stay at a fixed address until the routine
//! returns. A managed array either guarantees that itself
//! ([`PinPolicy::Alias`]) or has to be copied into a [`PinnedBuffer`]
//! first ([`PinPolicy::Copy`]).
//!
//! ## Release Guarantee
//!
//! A [`NativeView`] releases its array exactly once, when it is dropped or
//! explicitly committed or discarded:
//! 1. With [`ReleaseMode::Commit`], a pinned copy is written back to the
//!    managed array. Aliased storage already holds the native writes.
//! 2. With [`ReleaseMode::Discard`], a pinned copy is dropped unread.
//! 3. The array's [`ManagedArray::on_release`] hook runs in both cases.
//!
//! Because release is tied to `Drop`, early returns on a native error
//! status or a bridge error still release every view that was acquired.

use crate::{FfiResult, FfiSafe};
use labridge_rts_alloc::{MemoryRegion, ScratchBlock};

/// A buffer that is guaranteed to remain at a fixed memory address.
///
/// Used as the native-side copy of arrays that may move. Allocated in the
/// pinned heap region and freed on drop.
///
/// # Example
///
/// ```rust,ignore
/// let mut buffer = PinnedBuffer::from_slice(&[1.0, 2.0, 3.0])?;
///
/// // Pass to C function - pointer is stable
/// unsafe {
///     c_process_array(buffer.as_mut_ptr(), buffer.len());
/// }
/// ```
#[derive(Debug)]
pub struct PinnedBuffer<T: FfiSafe> {
    block: ScratchBlock<T>,
}

impl<T: FfiSafe> PinnedBuffer<T> {
    /// Create a zero-initialised pinned buffer of `len` elements.
    ///
    /// A zero-length buffer performs no allocation.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn zeroed(len: usize) -> FfiResult<Self> {
        Ok(Self {
            block: ScratchBlock::zeroed(len, MemoryRegion::PinnedHeap)?,
        })
    }

    /// Create a pinned buffer from existing data by copying.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn from_slice(data: &[T]) -> FfiResult<Self> {
        Ok(Self {
            block: ScratchBlock::from_slice(data, MemoryRegion::PinnedHeap)?,
        })
    }

    /// Get the raw pointer to the buffer.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.block.as_ptr()
    }

    /// Get a mutable raw pointer to the buffer.
    #[inline]
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.block.as_mut_ptr()
    }

    /// Get the number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.block.len()
    }

    /// Check if the buffer is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    /// Get the size in bytes.
    #[inline]
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.block.size_bytes()
    }

    /// Get the memory region (always pinned heap).
    #[inline]
    #[must_use]
    pub const fn region(&self) -> MemoryRegion {
        MemoryRegion::PinnedHeap
    }

    /// Get a slice of the elements.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        self.block.as_slice()
    }

    /// Get a mutable slice of the elements.
    #[inline]
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.block.as_mut_slice()
    }

    /// Address of the first element, used to verify the pinning guarantee.
    #[must_use]
    pub fn address(&self) -> usize {
        self.block.address()
    }
}

// ============================================================================
// Managed arrays
// ============================================================================

/// How a managed array may be exposed to native code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinPolicy {
    /// The storage address may be handed to native code directly.
    Alias,
    /// The runtime may relocate the storage; native code gets a pinned copy.
    Copy,
}

/// What happens to native writes when a view is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseMode {
    /// Copy native writes back into the managed array.
    Commit,
    /// Drop a pinned copy without writing back.
    Discard,
}

/// An array owned by the managed caller.
///
/// The bridge only ever holds a scoped `&mut` borrow of it, so the same
/// array cannot be acquired twice within one call.
pub trait ManagedArray<T: FfiSafe> {
    /// Whether the storage may be aliased or must be copied.
    fn pin_policy(&self) -> PinPolicy;

    /// Current contents.
    fn elements(&self) -> &[T];

    /// Current contents, mutably.
    fn elements_mut(&mut self) -> &mut [T];

    /// Number of elements.
    fn len(&self) -> usize {
        self.elements().len()
    }

    /// Whether the array has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Called once when a native view is acquired.
    fn on_pin(&mut self) {}

    /// Called once when that view is released.
    fn on_release(&mut self, _mode: ReleaseMode) {}
}

impl<T: FfiSafe> ManagedArray<T> for Vec<T> {
    fn pin_policy(&self) -> PinPolicy {
        PinPolicy::Alias
    }

    fn elements(&self) -> &[T] {
        self
    }

    fn elements_mut(&mut self) -> &mut [T] {
        self
    }
}

impl<T: FfiSafe, const N: usize> ManagedArray<T> for [T; N] {
    fn pin_policy(&self) -> PinPolicy {
        PinPolicy::Alias
    }

    fn elements(&self) -> &[T] {
        self
    }

    fn elements_mut(&mut self) -> &mut [T] {
        self
    }
}

/// A managed array the runtime is free to relocate.
///
/// Always copied across the boundary. Pin and release notifications are
/// counted, so a host (or a test) can check that every acquisition was
/// released exactly once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MovableArray<T: FfiSafe> {
    data: Vec<T>,
    pins: usize,
    commits: usize,
    discards: usize,
}

impl<T: FfiSafe> MovableArray<T> {
    /// Wrap `data` as a relocatable managed array.
    #[must_use]
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            pins: 0,
            commits: 0,
            discards: 0,
        }
    }

    /// Current contents.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Unwrap the contents.
    #[must_use]
    pub fn into_inner(self) -> Vec<T> {
        self.data
    }

    /// Number of views acquired over this array.
    #[must_use]
    pub const fn pins(&self) -> usize {
        self.pins
    }

    /// Number of views released, in either mode.
    #[must_use]
    pub const fn releases(&self) -> usize {
        self.commits + self.discards
    }

    /// Number of views released with write-back.
    #[must_use]
    pub const fn commits(&self) -> usize {
        self.commits
    }

    /// Number of views released without write-back.
    #[must_use]
    pub const fn discards(&self) -> usize {
        self.discards
    }

    /// True when every acquisition has been released.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.pins == self.commits + self.discards
    }
}

impl<T: FfiSafe> From<Vec<T>> for MovableArray<T> {
    fn from(data: Vec<T>) -> Self {
        Self::new(data)
    }
}

impl<T: FfiSafe> ManagedArray<T> for MovableArray<T> {
    fn pin_policy(&self) -> PinPolicy {
        PinPolicy::Copy
    }

    fn elements(&self) -> &[T] {
        &self.data
    }

    fn elements_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    fn on_pin(&mut self) {
        self.pins += 1;
    }

    fn on_release(&mut self, mode: ReleaseMode) {
        match mode {
            ReleaseMode::Commit => self.commits += 1,
            ReleaseMode::Discard => self.discards += 1,
        }
    }
}

// ============================================================================
// Native views
// ============================================================================

/// Native-memory view of a managed array, valid for one call.
///
/// Created by [`NativeView::acquire`]; released on drop according to its
/// [`ReleaseMode`].
pub struct NativeView<'a, T: FfiSafe> {
    array: &'a mut dyn ManagedArray<T>,
    pinned: Option<PinnedBuffer<T>>,
    mode: ReleaseMode,
    released: bool,
}

impl<'a, T: FfiSafe> NativeView<'a, T> {
    /// Acquire a native view of `array`.
    ///
    /// The array is notified through [`ManagedArray::on_pin`] only once the
    /// view exists, so a failed acquisition leaves nothing to release.
    ///
    /// # Errors
    ///
    /// Returns an error if the pinned copy cannot be allocated.
    pub fn acquire(array: &'a mut dyn ManagedArray<T>, mode: ReleaseMode) -> FfiResult<Self> {
        let pinned = match array.pin_policy() {
            PinPolicy::Alias => None,
            PinPolicy::Copy => Some(PinnedBuffer::from_slice(array.elements())?),
        };
        array.on_pin();

        tracing::trace!(
            len = array.len(),
            copied = pinned.is_some(),
            "acquired native view"
        );

        Ok(Self {
            array,
            pinned,
            mode,
            released: false,
        })
    }

    /// Number of elements visible to native code.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the view has no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether native code sees a pinned copy rather than the array itself.
    #[inline]
    #[must_use]
    pub fn is_copy(&self) -> bool {
        self.pinned.is_some()
    }

    /// The release mode that will apply on drop.
    #[inline]
    #[must_use]
    pub const fn mode(&self) -> ReleaseMode {
        self.mode
    }

    /// The native-side elements.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match &self.pinned {
            Some(buffer) => buffer.as_slice(),
            None => self.array.elements(),
        }
    }

    /// The native-side elements, mutably.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.pinned {
            Some(buffer) => buffer.as_mut_slice(),
            None => self.array.elements_mut(),
        }
    }

    /// Raw pointer handed to native code.
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.as_slice().as_ptr()
    }

    /// Mutable raw pointer handed to native code.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.as_mut_slice().as_mut_ptr()
    }

    /// Release with write-back.
    pub fn commit(mut self) {
        self.mode = ReleaseMode::Commit;
        self.release();
    }

    /// Release without write-back.
    ///
    /// Aliased storage has already observed any native writes.
    pub fn discard(mut self) {
        self.mode = ReleaseMode::Discard;
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(buffer) = self.pinned.take() {
            if self.mode == ReleaseMode::Commit {
                self.array.elements_mut().copy_from_slice(buffer.as_slice());
            }
        }
        self.array.on_release(self.mode);

        tracing::trace!(mode = ?self.mode, "released native view");
    }
}

impl<T: FfiSafe> Drop for NativeView<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: FfiSafe> std::fmt::Debug for NativeView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeView")
            .field("len", &self.len())
            .field("copied", &self.is_copy())
            .field("mode", &self.mode)
            .finish()
    }
}
