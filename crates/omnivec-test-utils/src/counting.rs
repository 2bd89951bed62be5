//! Per-thread allocation accounting.
//!
//! Install [`CountingAllocator`] as the global allocator of a test binary:
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: omnivec_test_utils::CountingAllocator = omnivec_test_utils::CountingAllocator;
//! ```
//!
//! Counters are thread-local, so tests running in parallel do not see
//! each other's traffic.

#![allow(unsafe_code)]

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::thread::LocalKey;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    static DEALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    static REALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    static LIVE_BYTES: Cell<isize> = const { Cell::new(0) };
}

fn bump(counter: &'static LocalKey<Cell<usize>>) {
    let _ = counter.try_with(|c| c.set(c.get() + 1));
}

fn adjust_live(delta: isize) {
    let _ = LIVE_BYTES.try_with(|c| c.set(c.get() + delta));
}

fn read(counter: &'static LocalKey<Cell<usize>>) -> usize {
    counter.try_with(Cell::get).unwrap_or(0)
}

/// [`System`] wrapper that counts allocator calls on the calling thread.
pub struct CountingAllocator;

// SAFETY: every method forwards to `System` unchanged; the bookkeeping
// touches only const-initialised thread-locals, which never allocate.
unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded contract.
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            bump(&ALLOCATIONS);
            adjust_live(layout.size() as isize);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded contract.
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            bump(&ALLOCATIONS);
            adjust_live(layout.size() as isize);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: forwarded contract.
        unsafe { System.dealloc(ptr, layout) };
        bump(&DEALLOCATIONS);
        adjust_live(-(layout.size() as isize));
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: forwarded contract.
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            bump(&REALLOCATIONS);
            adjust_live(new_size as isize - layout.size() as isize);
        }
        new_ptr
    }
}

/// Snapshot of this thread's allocator counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub allocations: usize,
    pub deallocations: usize,
    pub reallocations: usize,
    pub live_bytes: isize,
}

impl AllocStats {
    /// Counters for the calling thread.
    ///
    /// All zero unless [`CountingAllocator`] is the global allocator.
    pub fn current() -> Self {
        Self {
            allocations: read(&ALLOCATIONS),
            deallocations: read(&DEALLOCATIONS),
            reallocations: read(&REALLOCATIONS),
            live_bytes: LIVE_BYTES.try_with(Cell::get).unwrap_or(0),
        }
    }

    /// Traffic between `earlier` and `self`.
    pub fn since(&self, earlier: &AllocStats) -> AllocStats {
        AllocStats {
            allocations: self.allocations - earlier.allocations,
            deallocations: self.deallocations - earlier.deallocations,
            reallocations: self.reallocations - earlier.reallocations,
            live_bytes: self.live_bytes - earlier.live_bytes,
        }
    }
}
