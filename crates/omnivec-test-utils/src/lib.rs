//! Test utilities for omnivec development.
//!
//! - [`CountingAllocator`]: a global allocator wrapper that counts
//!   allocations per thread, so tests can assert that buffers are freed.
//! - [`DropCounter`] and [`Tracked`]: an element type that records how
//!   many times it has been released.
//! - [`fixtures`]: registries and containers preloaded for common tests.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod counting;
pub mod fixtures;

use std::cell::Cell;
use std::rc::Rc;

pub use counting::{AllocStats, CountingAllocator};

/// Shared counter incremented every time a [`Tracked`] value is dropped.
#[derive(Clone, Debug, Default)]
pub struct DropCounter {
    drops: Rc<Cell<usize>>,
}

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracked value reporting to this counter.
    pub fn track(&self, value: i64) -> Tracked {
        Tracked {
            value,
            drops: Rc::clone(&self.drops),
        }
    }

    /// Drops observed since creation or the last [`reset`](DropCounter::reset).
    pub fn count(&self) -> usize {
        self.drops.get()
    }

    pub fn reset(&self) {
        self.drops.set(0);
    }
}

/// Element type whose destructor bumps a [`DropCounter`].
///
/// Register with `register_cloneable::<Tracked>` so containers can both
/// copy and release it.
#[derive(Clone, Debug)]
pub struct Tracked {
    pub value: i64,
    drops: Rc<Cell<usize>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}
