//! Type registry and type-erased growable containers.
//!
//! A [`Container`] is a contiguous, growable sequence whose element type
//! is chosen at runtime from a [`TypeRegistry`]. Element size, copy
//! semantics, and release behaviour all come from the registered
//! [`TypeDescriptor`], so a single container implementation serves
//! scalars, user structs, owned resources, and nested containers alike.
//!
//! # Architecture
//!
//! ```text
//! TypeRegistry (owned context, passed by reference)
//! ├── TypeDescriptor[] (append-only, indexed by TypeId)
//! └── EngineConfig (growth policy, allocation-failure policy)
//!
//! Container
//! ├── RawBuffer (one allocation, capacity × element layout)
//! ├── len
//! └── TypeId ──► TypeDescriptor
//!     └── ElementKind::Nested ──► elements are Containers (N-dimensional)
//! ```
//!
//! # Ownership
//!
//! A container exclusively owns its buffer and every element in it.
//! Elements that own resources are released through their type's hook
//! when they are popped, removed, overwritten, or when the container is
//! destroyed. Nested containers are destroyed recursively.
//!
//! Dropping a container frees its buffer but cannot run release hooks,
//! because hooks live in the registry. Call [`Container::destroy`] to
//! release elements.
//!
//! # Safety
//!
//! The crate denies `unsafe_code` by default. Allocator calls are
//! confined to `raw.rs`. Element-level unsafe code (moving, releasing,
//! and copying slots) is allowed in `container.rs`, `ndim.rs`, and the
//! registry's drop and clone glue, each block carrying a `// SAFETY:`
//! comment. Typed access is checked against the Rust type recorded at
//! registration; raw byte access is exposed only through `unsafe fn`s
//! with documented contracts.
//!
//! Release hooks may unwind. A slot is never counted as live once its
//! hook has started, so a panicking hook can leak elements but never
//! releases one twice.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod container;
pub mod ndim;
mod raw;
pub mod registry;

pub use container::Container;
pub use registry::{DuplicateHook, ElementKind, ReleaseHook, Scalar, TypeDescriptor, TypeRegistry};
