//! omnivec: runtime-typed growable containers.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the omnivec sub-crates. For most users, adding `omnivec` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use omnivec::prelude::*;
//!
//! let mut reg = TypeRegistry::new();
//! let int = reg.register_scalar::<i32>("int");
//!
//! let mut c = Container::new(&reg, int).unwrap();
//! for v in [1, 2, 3] {
//!     c.append(&reg, v).unwrap();
//! }
//! c.remove(&reg, 1).unwrap();
//! assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[1, 3]);
//!
//! let mut grid = Container::with_dimensions(&reg, int, &[2, 2]).unwrap();
//! grid.set(&reg, &index_path![1, 0], 42).unwrap();
//! assert_eq!(*grid.get::<i32>(&reg, &[1, 0]).unwrap(), 42);
//!
//! c.destroy(&reg);
//! grid.destroy(&reg);
//! reg.teardown();
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`arena`] | `omnivec-arena` | Type registry, `Container`, N-dimensional layer |
//! | [`types`] | `omnivec-core` | IDs, index paths, errors, configuration |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Type registry and containers (`omnivec-arena`).
///
/// [`arena::TypeRegistry`] and [`arena::Container`] are also available in
/// the [`prelude`].
pub use omnivec_arena as arena;

/// Core types, IDs, and errors (`omnivec-core`).
pub use omnivec_core as types;

pub use omnivec_core::index_path;

/// Common imports for typical omnivec usage.
///
/// ```rust
/// use omnivec::prelude::*;
/// ```
pub mod prelude {
    // Registry and containers
    pub use omnivec_arena::{Container, ElementKind, TypeDescriptor, TypeRegistry};

    // Identifiers and paths
    pub use omnivec_core::{index_path, IndexPath, Shape, TypeId};

    // Configuration
    pub use omnivec_core::{AllocFailurePolicy, EngineConfig, GrowthPolicy};

    // Errors
    pub use omnivec_core::{ConfigError, ContainerError, RegistryError};
}
