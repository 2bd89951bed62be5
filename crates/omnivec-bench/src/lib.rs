//! Benchmark profiles for the omnivec container engine.
//!
//! - [`int_profile`]: a container preloaded with `n` sequential ints
//! - [`grid_profile`]: a zero-filled nested structure of `f64`

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::error::Error;

use omnivec_arena::{Container, TypeRegistry};
use omnivec_core::{ContainerError, TypeId};

/// Registry plus the type id of its `"int"` alias.
pub fn int_registry() -> (TypeRegistry, TypeId) {
    let mut reg = TypeRegistry::new();
    let int = reg.register_scalar::<i32>("int");
    (reg, int)
}

/// Container of `n` sequential ints.
pub fn int_profile(reg: &TypeRegistry, int: TypeId, n: usize) -> Result<Container, ContainerError> {
    let mut c = Container::new(reg, int)?;
    for v in 0..n {
        c.append(reg, v as i32)?;
    }
    Ok(c)
}

/// Zero-filled `f64` structure of the given dimensions.
pub fn grid_profile(reg: &TypeRegistry, dims: &[usize]) -> Result<Container, Box<dyn Error>> {
    let f64_type = reg.require("f64")?;
    Ok(Container::with_dimensions(reg, f64_type, dims)?)
}
