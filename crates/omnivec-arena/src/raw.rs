//! Low-level primitives for container storage.
//!
//! [`RawBuffer`] owns one allocation sized for `capacity` elements of a
//! runtime-supplied [`Layout`]. It knows nothing about what the bytes
//! mean: it never reads, drops, or releases elements. Every `unsafe`
//! block in the crate that touches the global allocator lives here, each
//! with a `// SAFETY:` comment.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

/// Why a reallocation could not be performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AllocFailure {
    /// `element.size() * capacity` does not fit in `isize`.
    Overflow {
        /// Requested capacity in elements.
        requested: usize,
    },
    /// The global allocator returned null.
    OutOfMemory {
        /// The layout that was requested.
        layout: Layout,
    },
}

/// Untyped, exclusively owned element storage.
///
/// The buffer is lazily allocated: a fresh buffer reports its reserved
/// `capacity` but holds no memory until the first [`reallocate`]. Once
/// allocated, the memory spans exactly `capacity` slots of `element`.
///
/// [`reallocate`]: RawBuffer::reallocate
pub(crate) struct RawBuffer {
    ptr: Option<NonNull<u8>>,
    capacity: usize,
    element: Layout,
}

impl RawBuffer {
    /// Create an unallocated buffer reporting `capacity` reserved slots.
    pub(crate) const fn unallocated(element: Layout, capacity: usize) -> Self {
        Self {
            ptr: None,
            capacity,
            element,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn element(&self) -> Layout {
        self.element
    }

    pub(crate) fn is_allocated(&self) -> bool {
        self.ptr.is_some()
    }

    /// Total bytes currently held from the allocator.
    pub(crate) fn allocated_bytes(&self) -> usize {
        match self.ptr {
            Some(_) => self.element.size() * self.capacity,
            None => 0,
        }
    }

    fn array_layout(&self, count: usize) -> Result<Layout, AllocFailure> {
        self.element
            .size()
            .checked_mul(count)
            .and_then(|bytes| Layout::from_size_align(bytes, self.element.align()).ok())
            .ok_or(AllocFailure::Overflow { requested: count })
    }

    fn dangling(&self) -> NonNull<u8> {
        NonNull::new(ptr::without_provenance_mut(self.element.align())).unwrap_or(NonNull::dangling())
    }

    /// Resize the allocation to exactly `new_capacity` slots.
    ///
    /// Slots `[0, min(old, new))` keep their bytes. On failure the buffer
    /// is left exactly as it was.
    pub(crate) fn reallocate(&mut self, new_capacity: usize) -> Result<(), AllocFailure> {
        let new_layout = self.array_layout(new_capacity)?;
        let old_bytes = self.allocated_bytes();

        if new_layout.size() == 0 {
            self.free();
            self.ptr = (new_capacity > 0).then(|| self.dangling());
            self.capacity = new_capacity;
            return Ok(());
        }

        let raw = match self.ptr {
            Some(old) if old_bytes > 0 => {
                let old_layout = self.array_layout(self.capacity)?;
                // SAFETY: `old` was returned by the global allocator for
                // `old_layout` (allocated_bytes > 0 means it is a real
                // allocation of `capacity` slots), and `new_layout.size()`
                // is non-zero and was validated by `Layout::from_size_align`.
                unsafe { alloc::realloc(old.as_ptr(), old_layout, new_layout.size()) }
            }
            // SAFETY: `new_layout` has non-zero size.
            _ => unsafe { alloc::alloc(new_layout) },
        };

        let ptr = NonNull::new(raw).ok_or(AllocFailure::OutOfMemory { layout: new_layout })?;
        self.ptr = Some(ptr);
        self.capacity = new_capacity;
        Ok(())
    }

    /// Return the memory to the allocator, keeping `capacity` as the
    /// reserved count for the next allocation.
    pub(crate) fn release(&mut self, reserved: usize) {
        self.free();
        self.ptr = None;
        self.capacity = reserved;
    }

    fn free(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            let bytes = self.element.size() * self.capacity;
            if bytes > 0 {
                // SAFETY: a non-zero-sized allocation of `capacity` slots
                // was made with exactly this size and alignment, which
                // `reallocate` validated when it was created.
                unsafe {
                    alloc::dealloc(
                        ptr.as_ptr(),
                        Layout::from_size_align_unchecked(bytes, self.element.align()),
                    )
                }
            }
        }
    }

    /// Pointer to slot `index`.
    ///
    /// The buffer must be allocated and `index <= capacity` (one past the
    /// end is allowed for pointer arithmetic only).
    pub(crate) fn slot(&self, index: usize) -> NonNull<u8> {
        debug_assert!(index <= self.capacity, "slot {index} beyond capacity {}", self.capacity);
        let base = self.ptr.unwrap_or_else(|| self.dangling());
        // SAFETY: `index <= capacity` and the allocation spans
        // `capacity * size` bytes, so the offset stays in bounds (or one
        // past the end). For zero-sized elements the offset is zero.
        unsafe { base.add(index * self.element.size()) }
    }

    /// Move `count` slots starting at `from` so they start at `to`.
    ///
    /// # Safety
    ///
    /// Both ranges must lie within `[0, capacity)` of an allocated buffer.
    /// Overlap is permitted. The slots left behind are logically
    /// uninitialised afterwards; the caller owns that bookkeeping.
    pub(crate) unsafe fn shift(&self, from: usize, to: usize, count: usize) {
        if count == 0 || from == to {
            return;
        }
        let size = self.element.size();
        // SAFETY: upheld by the caller; `ptr::copy` handles overlap.
        unsafe { ptr::copy(self.slot(from).as_ptr(), self.slot(to).as_ptr(), count * size) }
    }

    /// Copy one element's bytes from `src` into slot `index`.
    ///
    /// # Safety
    ///
    /// `src` must be valid for reads of `element.size()` bytes and must not
    /// overlap slot `index`, which must lie within `[0, capacity)` of an
    /// allocated buffer.
    pub(crate) unsafe fn write_bytes(&self, index: usize, src: *const u8) {
        // SAFETY: upheld by the caller.
        unsafe { ptr::copy_nonoverlapping(src, self.slot(index).as_ptr(), self.element.size()) }
    }

    /// Copy `count` elements from `src` (another buffer of the same
    /// layout) into this buffer starting at slot `index`.
    ///
    /// # Safety
    ///
    /// `src` must be valid for reads of `count` elements, and the
    /// destination range `[index, index + count)` must lie within this
    /// allocated buffer without overlapping the source.
    pub(crate) unsafe fn write_run(&self, index: usize, src: NonNull<u8>, count: usize) {
        if count == 0 {
            return;
        }
        let bytes = count * self.element.size();
        // SAFETY: upheld by the caller.
        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), self.slot(index).as_ptr(), bytes) }
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        self.free();
    }
}
