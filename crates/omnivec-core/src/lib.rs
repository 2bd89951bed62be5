//! Core types for the omnivec container engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rest of the workspace: type identifiers,
//! index paths, error types, and engine configuration.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod id;

pub use config::{AllocFailurePolicy, EngineConfig, GrowthPolicy};
pub use error::{ConfigError, ContainerError, RegistryError};
pub use id::{IndexPath, Shape, TypeId};

#[doc(hidden)]
pub use smallvec as __smallvec;
