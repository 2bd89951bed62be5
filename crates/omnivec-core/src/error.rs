//! Error types for the omnivec container engine.
//!
//! Two tiers exist. Logical errors (bad index, malformed range, wrong
//! element type) are returned as values and leave every container
//! untouched. Resource exhaustion is governed by
//! [`AllocFailurePolicy`](crate::AllocFailurePolicy): it either aborts the
//! process or surfaces as [`ContainerError::AllocationFailed`].

use std::error::Error;
use std::fmt;

use crate::id::TypeId;

/// Errors from container operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerError {
    /// The container's type ID is not present in the registry it was
    /// used with.
    UnknownType {
        /// The unrecognised type.
        type_id: TypeId,
    },
    /// A typed operation named a Rust type that does not match the
    /// container's registered element type, or two containers that must
    /// share a type do not.
    TypeMismatch {
        /// Registered name of the type the container holds.
        expected: String,
        /// Name of the type that was supplied.
        found: String,
    },
    /// An index was outside the occupied range of a container.
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// Length of the container at the time of the call.
        len: usize,
    },
    /// A half-open range `[from, to)` was malformed for the container.
    InvalidRange {
        /// Inclusive lower bound.
        from: usize,
        /// Exclusive upper bound.
        to: usize,
        /// Length of the container at the time of the call.
        len: usize,
    },
    /// An index path descended into a leaf container and still had
    /// components left.
    TooManyIndices {
        /// Number of indices supplied.
        provided: usize,
        /// Position in the path where a non-container node was reached.
        depth: usize,
    },
    /// An index path or dimension list was empty.
    EmptyIndexPath,
    /// Copying was requested for a type that owns resources but has no
    /// duplicate hook.
    NotDuplicable {
        /// Registered name of the type.
        type_name: String,
    },
    /// Zero-filled construction was requested for a type whose all-zero
    /// bit pattern is not a valid value.
    NotZeroable {
        /// Registered name of the type.
        type_name: String,
    },
    /// The requested capacity does not fit in the address space.
    CapacityOverflow {
        /// Requested capacity in elements.
        requested: usize,
    },
    /// The allocator could not satisfy a request and the engine is
    /// configured to report rather than abort.
    AllocationFailed {
        /// Number of bytes requested.
        bytes: usize,
    },
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { type_id } => write!(f, "unknown type id {type_id}"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: container holds '{expected}', got '{found}'")
            }
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            Self::InvalidRange { from, to, len } => {
                write!(f, "invalid range {from}..{to} for length {len}")
            }
            Self::TooManyIndices { provided, depth } => write!(
                f,
                "too many indices: {provided} supplied but level {depth} is not a container"
            ),
            Self::EmptyIndexPath => write!(f, "index path is empty"),
            Self::NotDuplicable { type_name } => {
                write!(f, "type '{type_name}' owns resources and has no duplicate hook")
            }
            Self::NotZeroable { type_name } => {
                write!(f, "type '{type_name}' cannot be zero-initialised")
            }
            Self::CapacityOverflow { requested } => {
                write!(f, "capacity overflow: {requested} elements")
            }
            Self::AllocationFailed { bytes } => {
                write!(f, "allocation of {bytes} bytes failed")
            }
        }
    }
}

impl Error for ContainerError {}

/// Errors from type registry queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// No descriptor with this name has been registered.
    UnknownTypeName {
        /// The name that was looked up.
        name: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTypeName { name } => write!(f, "no type registered as '{name}'"),
        }
    }
}

impl Error for RegistryError {}

/// Errors detected during [`EngineConfig::validate()`](crate::EngineConfig::validate).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The growth policy cannot enlarge every capacity
    /// (`factor == 0` or `increment == 0`).
    ZeroGrowth,
    /// `initial_capacity` is zero.
    ZeroInitialCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroGrowth => write!(f, "growth policy needs factor >= 1 and increment >= 1"),
            Self::ZeroInitialCapacity => write!(f, "initial_capacity must be at least 1"),
        }
    }
}

impl Error for ConfigError {}
