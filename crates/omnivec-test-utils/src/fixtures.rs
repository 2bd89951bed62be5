//! Reusable registries and containers.

use omnivec_arena::{Container, TypeRegistry};
use omnivec_core::{ContainerError, TypeId};

use crate::Tracked;

/// Registry with `i32` additionally registered as `"int"`.
pub fn int_registry() -> (TypeRegistry, TypeId) {
    let mut reg = TypeRegistry::new();
    let int = reg.register_scalar::<i32>("int");
    (reg, int)
}

/// Registry with [`Tracked`] registered as `"tracked"`.
pub fn tracked_registry() -> (TypeRegistry, TypeId) {
    let mut reg = TypeRegistry::new();
    let tracked = reg.register_cloneable::<Tracked>("tracked");
    (reg, tracked)
}

/// Container of `type_id` holding `values` in order.
pub fn filled<T: Clone + 'static>(
    reg: &TypeRegistry,
    type_id: TypeId,
    values: &[T],
) -> Result<Container, ContainerError> {
    let mut container = Container::new(reg, type_id)?;
    for value in values {
        container.append(reg, value.clone())?;
    }
    Ok(container)
}

/// Every leaf element of a (possibly nested) container, depth-first.
pub fn leaves<T: Clone + 'static>(
    reg: &TypeRegistry,
    container: &Container,
) -> Result<Vec<T>, ContainerError> {
    let mut out = Vec::new();
    collect(reg, container, &mut out)?;
    Ok(out)
}

fn collect<T: Clone + 'static>(
    reg: &TypeRegistry,
    container: &Container,
    out: &mut Vec<T>,
) -> Result<(), ContainerError> {
    if container.is_nested(reg) {
        for child in container.as_slice::<Container>(reg)? {
            collect(reg, child, out)?;
        }
    } else {
        out.extend_from_slice(container.as_slice::<T>(reg)?);
    }
    Ok(())
}
