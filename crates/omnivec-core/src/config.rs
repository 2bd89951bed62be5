//! Engine configuration: growth policy and allocation-failure handling.
//!
//! [`EngineConfig`] is owned by the type registry and consulted by every
//! container operation that resizes storage. The growth and shrink rules
//! live on [`GrowthPolicy`] so they can be exercised without touching
//! any memory.

use crate::error::ConfigError;

/// Capacity growth and shrink rules for containers.
///
/// Growth is geometric: when an insertion would leave no spare slot
/// (`len + additional >= capacity`), capacity becomes
/// `capacity * factor + increment`. The `+ increment` term guarantees
/// progress from a capacity of zero.
///
/// Shrinking is symmetric: after a removal, capacity is halved while
/// `len < capacity / 2`. This bounds memory overhead to roughly twice the
/// live data. The cost is possible reallocation thrash when pushes and
/// pops alternate around a threshold; set `shrink` to `false` to trade the
/// memory bound for amortised-time purity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrowthPolicy {
    /// Multiplicative growth factor. Default: 2.
    pub factor: usize,
    /// Additive growth term. Default: 1.
    pub increment: usize,
    /// Whether removals release surplus capacity. Default: `true`.
    pub shrink: bool,
}

impl GrowthPolicy {
    /// The default `2 * capacity + 1` policy with shrinking enabled.
    pub const fn geometric() -> Self {
        Self {
            factor: 2,
            increment: 1,
            shrink: true,
        }
    }

    /// Whether adding `additional` elements to a container of `len`
    /// elements requires growing `capacity` first.
    pub fn needs_growth(&self, len: usize, additional: usize, capacity: usize) -> bool {
        len.saturating_add(additional) >= capacity
    }

    /// One growth step from `capacity`, or `None` on overflow.
    pub fn grown_capacity(&self, capacity: usize) -> Option<usize> {
        capacity
            .checked_mul(self.factor)?
            .checked_add(self.increment)
    }

    /// Smallest capacity that leaves room for `required` elements plus
    /// the spare slot growth always keeps, starting from `capacity`.
    pub fn capacity_for(&self, capacity: usize, required: usize) -> Option<usize> {
        let mut cap = capacity;
        while required >= cap {
            let next = self.grown_capacity(cap)?;
            if next <= cap {
                return None;
            }
            cap = next;
        }
        Some(cap)
    }

    /// Capacity after removals leave `len` live elements.
    ///
    /// Returns `capacity` unchanged when shrinking is disabled or not due.
    pub fn shrunk_capacity(&self, len: usize, capacity: usize) -> usize {
        if !self.shrink {
            return capacity;
        }
        let mut cap = capacity;
        while len < cap / 2 {
            cap /= 2;
        }
        cap
    }
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self::geometric()
    }
}

/// What to do when the global allocator refuses a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AllocFailurePolicy {
    /// Return [`ContainerError::AllocationFailed`](crate::ContainerError::AllocationFailed)
    /// and leave the container unchanged.
    #[default]
    Report,
    /// Terminate via `std::alloc::handle_alloc_error`, matching embedded
    /// deployments that have no graceful out-of-memory path.
    Abort,
}

/// Configuration shared by every container bound to one registry.
///
/// Validated when the registry is constructed; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity growth and shrink rules.
    pub growth: GrowthPolicy,
    /// Behaviour on allocator failure. Default: [`AllocFailurePolicy::Report`].
    pub on_alloc_failure: AllocFailurePolicy,
    /// Capacity a freshly initialised container reports before its first
    /// allocation. Default: 1.
    pub initial_capacity: usize,
}

impl EngineConfig {
    /// Default capacity of a freshly initialised container.
    pub const DEFAULT_INITIAL_CAPACITY: usize = 1;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.growth.factor == 0 || self.growth.increment == 0 {
            return Err(ConfigError::ZeroGrowth);
        }
        if self.initial_capacity == 0 {
            return Err(ConfigError::ZeroInitialCapacity);
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            growth: GrowthPolicy::geometric(),
            on_alloc_failure: AllocFailurePolicy::Report,
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
        }
    }
}
