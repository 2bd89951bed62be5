//! N-dimensional containers built from nested containers.
//!
//! A structure of dimensions `[d0, d1, ..., dk]` is a container of `d0`
//! nested containers, each holding `d1` nested containers, down to leaf
//! containers of `dk` elements of the leaf type. Every level is sized
//! exactly: construction reserves `d` slots per level and fills all of
//! them, so no growth policy applies.
//!
//! Elements are addressed by an index path (see [`IndexPath`]). Every
//! component but the last selects a nested container; the last selects
//! an element within the reached container.
//!
//! [`IndexPath`]: omnivec_core::IndexPath

#![allow(unsafe_code)]

use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};

use omnivec_core::{ContainerError, Shape, TypeId};
use tracing::trace;

use crate::container::Container;
use crate::registry::TypeRegistry;

type LeafFill<'a> = dyn FnMut(&mut Container) -> Result<(), ContainerError> + 'a;

fn build_level(
    reg: &TypeRegistry,
    leaf_type: TypeId,
    dims: &[usize],
    fill: &mut LeafFill<'_>,
) -> Result<Container, ContainerError> {
    match dims {
        [] => Err(ContainerError::EmptyIndexPath),
        [count] => {
            let mut leaf = Container::new(reg, leaf_type)?;
            leaf.set_capacity(reg, *count)?;
            if let Err(err) = fill(&mut leaf) {
                leaf.destroy(reg);
                return Err(err);
            }
            Ok(leaf)
        }
        [count, rest @ ..] => {
            let mut node = Container::new(reg, reg.container_type())?;
            node.set_capacity(reg, *count)?;
            for index in 0..*count {
                match build_level(reg, leaf_type, rest, fill) {
                    // SAFETY: `node` holds exactly `count` slots of
                    // `Container` and slot `index` is the next free one.
                    Ok(child) => unsafe {
                        node.write_slot(index, child);
                        node.set_len(index + 1);
                    },
                    Err(err) => {
                        node.destroy(reg);
                        return Err(err);
                    }
                }
            }
            Ok(node)
        }
    }
}

impl Container {
    /// Build a zero-filled structure of the given dimensions.
    ///
    /// The leaf type must be zeroable (a primitive scalar or a raw plain
    /// type). Dimensions of zero are allowed and produce empty levels.
    pub fn with_dimensions(
        reg: &TypeRegistry,
        leaf_type: TypeId,
        dims: &[usize],
    ) -> Result<Container, ContainerError> {
        if dims.is_empty() {
            return Err(ContainerError::EmptyIndexPath);
        }
        let desc = reg.resolve(leaf_type)?;
        if !desc.is_zeroable() {
            return Err(ContainerError::NotZeroable {
                type_name: desc.name().to_string(),
            });
        }
        trace!(%leaf_type, ?dims, "building zero-filled structure");
        build_level(reg, leaf_type, dims, &mut |leaf: &mut Container| {
            // SAFETY: the leaf was just sized to its dimension and the
            // type's all-zero bit pattern is a valid value.
            unsafe { leaf.fill_zeroed() };
            Ok(())
        })
    }

    /// Build a structure of the given dimensions with every leaf element
    /// a clone of `value`.
    pub fn with_dimensions_filled<T: Clone + 'static>(
        reg: &TypeRegistry,
        leaf_type: TypeId,
        dims: &[usize],
        value: T,
    ) -> Result<Container, ContainerError> {
        if dims.is_empty() {
            return Err(ContainerError::EmptyIndexPath);
        }
        reg.resolve_as::<T>(leaf_type)?;
        trace!(%leaf_type, ?dims, "building filled structure");
        build_level(reg, leaf_type, dims, &mut |leaf: &mut Container| {
            for index in 0..leaf.capacity() {
                // SAFETY: slot `index` is the next free slot of a buffer
                // sized to the dimension, and the type check matched `T`.
                unsafe {
                    leaf.write_slot(index, value.clone());
                    leaf.set_len(index + 1);
                }
            }
            Ok(())
        })
    }

    /// Replace this container with a zero-filled structure of `dims`.
    ///
    /// On error the container is left untouched.
    pub fn init_dimensions(
        &mut self,
        reg: &TypeRegistry,
        leaf_type: TypeId,
        dims: &[usize],
    ) -> Result<(), ContainerError> {
        let built = Self::with_dimensions(reg, leaf_type, dims)?;
        self.destroy(reg);
        *self = built;
        Ok(())
    }

    /// Follow all but the last component of `path`, returning the
    /// container that holds the addressed element and its index.
    fn locate(
        &self,
        reg: &TypeRegistry,
        path: &[usize],
    ) -> Result<(&Container, usize), ContainerError> {
        let (&last, prefix) = path.split_last().ok_or(ContainerError::EmptyIndexPath)?;
        let mut node = self;
        for (depth, &index) in prefix.iter().enumerate() {
            node = node.child(reg, index, depth, path.len())?;
        }
        if last >= node.len() {
            return Err(ContainerError::IndexOutOfBounds {
                index: last,
                len: node.len(),
            });
        }
        Ok((node, last))
    }

    fn locate_mut(
        &mut self,
        reg: &TypeRegistry,
        path: &[usize],
    ) -> Result<(&mut Container, usize), ContainerError> {
        let (&last, prefix) = path.split_last().ok_or(ContainerError::EmptyIndexPath)?;
        let mut node = self;
        for (depth, &index) in prefix.iter().enumerate() {
            let mut ptr = node.child_ptr(reg, index, depth, path.len())?;
            // SAFETY: `child_ptr` validated the slot, and `node` is
            // exclusively borrowed for the lifetime of the result.
            node = unsafe { ptr.as_mut() };
        }
        if last >= node.len() {
            return Err(ContainerError::IndexOutOfBounds {
                index: last,
                len: node.len(),
            });
        }
        Ok((node, last))
    }

    fn child_ptr(
        &self,
        reg: &TypeRegistry,
        index: usize,
        depth: usize,
        provided: usize,
    ) -> Result<NonNull<Container>, ContainerError> {
        if !self.is_nested(reg) {
            return Err(ContainerError::TooManyIndices { provided, depth });
        }
        let slot = self.element_ptr(index).ok_or(ContainerError::IndexOutOfBounds {
            index,
            len: self.len(),
        })?;
        Ok(slot.cast::<Container>())
    }

    fn child(
        &self,
        reg: &TypeRegistry,
        index: usize,
        depth: usize,
        provided: usize,
    ) -> Result<&Container, ContainerError> {
        let ptr = self.child_ptr(reg, index, depth, provided)?;
        // SAFETY: nested containers hold initialised `Container` values in
        // `[0, len)`, and `child_ptr` checked `index < len`.
        Ok(unsafe { ptr.as_ref() })
    }

    /// Typed reference to the element at `path`.
    pub fn get<T: 'static>(&self, reg: &TypeRegistry, path: &[usize]) -> Result<&T, ContainerError> {
        let (node, index) = self.locate(reg, path)?;
        Ok(&node.as_slice::<T>(reg)?[index])
    }

    /// Mutable typed reference to the element at `path`.
    pub fn get_mut<T: 'static>(
        &mut self,
        reg: &TypeRegistry,
        path: &[usize],
    ) -> Result<&mut T, ContainerError> {
        let (node, index) = self.locate_mut(reg, path)?;
        Ok(&mut node.as_mut_slice::<T>(reg)?[index])
    }

    /// Pointer to the element at `path`, valid until the structure is
    /// next modified.
    pub fn get_raw(&self, reg: &TypeRegistry, path: &[usize]) -> Result<NonNull<u8>, ContainerError> {
        let (node, index) = self.locate(reg, path)?;
        node.element_ptr(index).ok_or(ContainerError::IndexOutOfBounds {
            index,
            len: node.len(),
        })
    }

    /// Overwrite the element at `path`, releasing the previous value.
    pub fn set<T: 'static>(
        &mut self,
        reg: &TypeRegistry,
        path: &[usize],
        value: T,
    ) -> Result<(), ContainerError> {
        let (node, index) = self.locate_mut(reg, path)?;
        let kind = reg.resolve_as::<T>(node.type_id())?.kind();
        let value = ManuallyDrop::new(value);
        // SAFETY: `index < len`, the type check matched `T`, and `value` is
        // a separate local whose ownership moves into the slot.
        unsafe { node.replace_slot(reg, kind, index, ptr::from_ref(&*value).cast()) };
        Ok(())
    }

    /// Overwrite the element at `path` with bytes copied from `src`,
    /// releasing the previous value.
    ///
    /// # Safety
    ///
    /// `src` must point to `element_size()` readable bytes forming a valid
    /// element of the leaf type. Ownership of any resources it refers to
    /// moves into the structure.
    pub unsafe fn set_raw(
        &mut self,
        reg: &TypeRegistry,
        path: &[usize],
        src: *const u8,
    ) -> Result<(), ContainerError> {
        let (node, index) = self.locate_mut(reg, path)?;
        let kind = node.descriptor(reg)?.kind();
        // SAFETY: `index < len`; `src` is upheld by the caller.
        unsafe { node.replace_slot(reg, kind, index, src) };
        Ok(())
    }

    /// The nested container reached by following every component of
    /// `path`. An empty path yields `self`.
    pub fn node(&self, reg: &TypeRegistry, path: &[usize]) -> Result<&Container, ContainerError> {
        let mut node = self;
        for (depth, &index) in path.iter().enumerate() {
            node = node.child(reg, index, depth, path.len())?;
        }
        Ok(node)
    }

    /// Mutable form of [`node`](Container::node).
    pub fn node_mut(
        &mut self,
        reg: &TypeRegistry,
        path: &[usize],
    ) -> Result<&mut Container, ContainerError> {
        let mut node = self;
        for (depth, &index) in path.iter().enumerate() {
            let mut ptr = node.child_ptr(reg, index, depth, path.len())?;
            // SAFETY: as in `locate_mut`.
            node = unsafe { ptr.as_mut() };
        }
        Ok(node)
    }

    /// Release and remove the element at `path`, closing the gap in its
    /// parent. On error nothing changes.
    pub fn remove_at(&mut self, reg: &TypeRegistry, path: &[usize]) -> Result<(), ContainerError> {
        let (node, index) = self.locate_mut(reg, path)?;
        node.remove(reg, index)
    }

    /// Length at each level, following the first element of every nested
    /// level. A ragged structure reports the shape of its first branch.
    pub fn shape(&self, reg: &TypeRegistry) -> Shape {
        let mut shape = Shape::new();
        let mut node = self;
        loop {
            shape.push(node.len());
            match node.child(reg, 0, shape.len(), shape.len()) {
                Ok(first) => node = first,
                Err(_) => return shape,
            }
        }
    }

    /// Number of levels, counting the leaf level.
    pub fn depth(&self, reg: &TypeRegistry) -> usize {
        self.shape(reg).len()
    }
}
