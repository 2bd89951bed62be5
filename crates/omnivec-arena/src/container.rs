//! The container engine.
//!
//! Every operation takes the [`TypeRegistry`] the container was created
//! with. The registry supplies the element layout, the copy and release
//! semantics, and the growth policy.
//!
//! Logical errors (bad index, malformed range, type mismatch) are
//! detected before anything is touched, so a failed call leaves the
//! container exactly as it was. Allocation failures follow
//! [`AllocFailurePolicy`].

#![allow(unsafe_code)]

use std::alloc;
use std::fmt;
use std::ptr::{self, NonNull};
use std::slice;

use omnivec_core::{AllocFailurePolicy, ContainerError, TypeId};
use tracing::{debug, error, trace, warn};

use crate::raw::{AllocFailure, RawBuffer};
use crate::registry::{ElementKind, TypeDescriptor, TypeRegistry};

/// A growable, contiguous sequence of elements of one registered type.
///
/// Invariant: `len <= capacity`, and slots `[0, len)` hold initialised
/// elements. Capacity is logical: a fresh container reports the
/// configured initial capacity without holding any memory until the
/// first insertion.
///
/// `Container` is neither `Send` nor `Sync`. It may hold elements of
/// arbitrary registered types, and nothing guarantees those are
/// thread-safe.
pub struct Container {
    raw: RawBuffer,
    len: usize,
    type_id: TypeId,
}

fn allocation_error(reg: &TypeRegistry, failure: AllocFailure) -> ContainerError {
    match failure {
        AllocFailure::Overflow { requested } => ContainerError::CapacityOverflow { requested },
        AllocFailure::OutOfMemory { layout } => {
            error!(
                bytes = layout.size(),
                align = layout.align(),
                "allocation failed"
            );
            match reg.config().on_alloc_failure {
                AllocFailurePolicy::Abort => alloc::handle_alloc_error(layout),
                AllocFailurePolicy::Report => ContainerError::AllocationFailed {
                    bytes: layout.size(),
                },
            }
        }
    }
}

/// Release the element at `slot` according to `kind`.
///
/// # Safety
///
/// `slot` must hold an initialised element of a type with this `kind`.
/// The slot is logically uninitialised afterwards.
unsafe fn release_slot(reg: &TypeRegistry, kind: ElementKind, slot: NonNull<u8>) {
    match kind {
        ElementKind::Plain => {}
        // SAFETY: upheld by the caller.
        ElementKind::Owned { release, .. } => unsafe { release(slot) },
        // SAFETY: nested slots hold initialised `Container` values; the
        // pointer comes from the buffer allocation, not a shared borrow.
        ElementKind::Nested => unsafe { slot.cast::<Container>().as_mut().destroy(reg) },
    }
}

/// Write an independent copy of the element at `src` into `dst`.
///
/// # Safety
///
/// `src` must hold an initialised element described by `desc`. `dst` must
/// be an uninitialised slot of the same layout that does not overlap it.
unsafe fn duplicate_into(
    reg: &TypeRegistry,
    desc: &TypeDescriptor,
    src: NonNull<u8>,
    dst: NonNull<u8>,
) -> Result<(), ContainerError> {
    match desc.kind() {
        ElementKind::Plain => {
            // SAFETY: upheld by the caller.
            unsafe { ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), desc.element_size()) };
            Ok(())
        }
        ElementKind::Owned {
            duplicate: Some(duplicate),
            ..
        } => {
            // SAFETY: upheld by the caller.
            unsafe { duplicate(src, dst) };
            Ok(())
        }
        ElementKind::Owned {
            duplicate: None, ..
        } => Err(ContainerError::NotDuplicable {
            type_name: desc.name().to_string(),
        }),
        ElementKind::Nested => {
            // SAFETY: nested slots hold initialised `Container` values.
            let copy = unsafe { src.cast::<Container>().as_ref() }.deep_copy(reg)?;
            // SAFETY: `dst` is an uninitialised `Container` slot.
            unsafe { dst.cast::<Container>().as_ptr().write(copy) };
            Ok(())
        }
    }
}

impl Container {
    /// Create an empty container of `type_id`.
    ///
    /// No memory is allocated until the first insertion.
    pub fn new(reg: &TypeRegistry, type_id: TypeId) -> Result<Self, ContainerError> {
        let desc = reg.resolve(type_id)?;
        trace!(%type_id, name = desc.name(), "container created");
        Ok(Self {
            raw: RawBuffer::unallocated(desc.layout(), reg.config().initial_capacity),
            len: 0,
            type_id,
        })
    }

    /// Rebind this container to `type_id`, destroying any prior contents.
    ///
    /// On error the container is left untouched.
    pub fn init(&mut self, reg: &TypeRegistry, type_id: TypeId) -> Result<(), ContainerError> {
        let fresh = Self::new(reg, type_id)?;
        self.destroy(reg);
        *self = fresh;
        Ok(())
    }

    /// Number of initialised elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the container holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reserved element slots.
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Element type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Bytes per element.
    pub fn element_size(&self) -> usize {
        self.raw.element().size()
    }

    /// Whether the container currently holds memory from the allocator.
    pub fn is_allocated(&self) -> bool {
        self.raw.is_allocated()
    }

    /// Whether the elements are themselves containers, under the
    /// built-in name or any other registration of [`Container`].
    pub fn is_nested(&self, reg: &TypeRegistry) -> bool {
        reg.descriptor(self.type_id)
            .is_some_and(|desc| matches!(desc.kind(), ElementKind::Nested))
    }

    /// Pointer to element `index`, or `None` when out of bounds.
    pub fn element_ptr(&self, index: usize) -> Option<NonNull<u8>> {
        (index < self.len).then(|| self.raw.slot(index))
    }

    /// The elements as a typed slice.
    pub fn as_slice<T: 'static>(&self, reg: &TypeRegistry) -> Result<&[T], ContainerError> {
        reg.resolve_as::<T>(self.type_id)?;
        // SAFETY: the type check guarantees the layout is `T`'s. Slots
        // `[0, len)` are initialised; for `len == 0` the base pointer is
        // non-null and aligned for `T`.
        Ok(unsafe { slice::from_raw_parts(self.raw.slot(0).cast::<T>().as_ptr(), self.len) })
    }

    /// The elements as a mutable typed slice.
    pub fn as_mut_slice<T: 'static>(
        &mut self,
        reg: &TypeRegistry,
    ) -> Result<&mut [T], ContainerError> {
        reg.resolve_as::<T>(self.type_id)?;
        // SAFETY: as for `as_slice`; `&mut self` guarantees exclusivity.
        Ok(unsafe { slice::from_raw_parts_mut(self.raw.slot(0).cast::<T>().as_ptr(), self.len) })
    }

    pub(crate) fn descriptor<'r>(
        &self,
        reg: &'r TypeRegistry,
    ) -> Result<&'r TypeDescriptor, ContainerError> {
        reg.resolve(self.type_id)
    }

    fn reject(&self, err: ContainerError) -> ContainerError {
        debug!(type_id = %self.type_id, len = self.len, error = %err, "operation rejected");
        err
    }

    fn check_same_type(&self, reg: &TypeRegistry, other: &Container) -> Result<(), ContainerError> {
        if self.type_id == other.type_id {
            return Ok(());
        }
        let name = |id| reg.type_name(id).unwrap_or("<unregistered>").to_string();
        Err(self.reject(ContainerError::TypeMismatch {
            expected: name(self.type_id),
            found: name(other.type_id),
        }))
    }

    /// Reallocate to exactly `capacity` slots.
    pub(crate) fn set_capacity(
        &mut self,
        reg: &TypeRegistry,
        capacity: usize,
    ) -> Result<(), ContainerError> {
        if capacity == self.raw.capacity() && self.raw.is_allocated() {
            return Ok(());
        }
        trace!(
            type_id = %self.type_id,
            from = self.raw.capacity(),
            to = capacity,
            "reallocating"
        );
        self.raw
            .reallocate(capacity)
            .map_err(|failure| allocation_error(reg, failure))
    }

    /// Make room for `additional` more elements under the growth policy.
    fn grow_for(&mut self, reg: &TypeRegistry, additional: usize) -> Result<(), ContainerError> {
        let policy = reg.config().growth;
        let capacity = self.raw.capacity();
        let target = if policy.needs_growth(self.len, additional, capacity) {
            let required = self.len.saturating_add(additional);
            policy
                .capacity_for(capacity, required)
                .ok_or(ContainerError::CapacityOverflow { requested: required })?
        } else {
            capacity
        };
        self.set_capacity(reg, target)
    }

    /// Give back surplus capacity after a removal.
    ///
    /// A shrinking reallocation that fails keeps the larger buffer.
    fn shrink(&mut self, reg: &TypeRegistry) {
        if !self.raw.is_allocated() {
            return;
        }
        let capacity = self.raw.capacity();
        let target = reg.config().growth.shrunk_capacity(self.len, capacity);
        if target == capacity {
            return;
        }
        trace!(type_id = %self.type_id, from = capacity, to = target, "shrinking");
        if let Err(failure) = self.raw.reallocate(target) {
            let err = allocation_error(reg, failure);
            debug!(error = %err, "shrink skipped");
        }
    }

    /// Write `value` into slot `index` without releasing what was there.
    ///
    /// # Safety
    ///
    /// The buffer must be allocated, `index < capacity`, the container's
    /// type must be registered for `T`, and the slot must be uninitialised.
    pub(crate) unsafe fn write_slot<T>(&mut self, index: usize, value: T) {
        // SAFETY: upheld by the caller.
        unsafe { self.raw.slot(index).cast::<T>().as_ptr().write(value) }
    }

    /// Release the element in slot `index` and move the element at `src`
    /// into its place.
    ///
    /// The new element lands in the slot even when the release hook
    /// unwinds, so the slot never holds a released value.
    ///
    /// # Safety
    ///
    /// `index < len`, `kind` must be the container's element kind, and
    /// `src` must point to a valid element of the container's type that
    /// does not overlap the buffer. Ownership of that element moves in.
    pub(crate) unsafe fn replace_slot(
        &mut self,
        reg: &TypeRegistry,
        kind: ElementKind,
        index: usize,
        src: *const u8,
    ) {
        struct Refill<'a> {
            raw: &'a RawBuffer,
            index: usize,
            src: *const u8,
        }

        impl Drop for Refill<'_> {
            fn drop(&mut self) {
                // SAFETY: slot `index` is inside the buffer and `src` is a
                // valid, non-overlapping element (see `replace_slot`).
                unsafe { self.raw.write_bytes(self.index, self.src) }
            }
        }

        let refill = Refill {
            raw: &self.raw,
            index,
            src,
        };
        // SAFETY: slot `index` holds an initialised element of `kind`;
        // `refill` overwrites it once the release has finished.
        unsafe { release_slot(reg, kind, refill.raw.slot(index)) };
    }

    /// # Safety
    ///
    /// Slots `[0, len)` must be initialised and `len <= capacity`.
    pub(crate) unsafe fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.raw.capacity());
        self.len = len;
    }

    /// Fill `[len, capacity)` with zero bytes and make them live.
    ///
    /// # Safety
    ///
    /// The buffer must be allocated and the element type zeroable.
    pub(crate) unsafe fn fill_zeroed(&mut self) {
        let count = self.raw.capacity() - self.len;
        let bytes = count * self.raw.element().size();
        // SAFETY: upheld by the caller; the range lies inside the buffer.
        unsafe { ptr::write_bytes(self.raw.slot(self.len).as_ptr(), 0, bytes) };
        self.len = self.raw.capacity();
    }

    /// Append a value at the end, growing when needed.
    pub fn append<T: 'static>(&mut self, reg: &TypeRegistry, value: T) -> Result<(), ContainerError> {
        reg.resolve_as::<T>(self.type_id)?;
        self.grow_for(reg, 1)?;
        // SAFETY: `grow_for` left an allocated buffer with `len < capacity`,
        // and the type check matched `T`.
        unsafe { self.write_slot(self.len, value) };
        self.len += 1;
        Ok(())
    }

    /// Append one element copied bitwise from `src`.
    ///
    /// # Safety
    ///
    /// `src` must point to `element_size()` readable bytes forming a valid
    /// element of the container's type. Ownership of any resources it
    /// refers to moves into the container.
    pub unsafe fn append_raw(
        &mut self,
        reg: &TypeRegistry,
        src: *const u8,
    ) -> Result<(), ContainerError> {
        self.descriptor(reg)?;
        self.grow_for(reg, 1)?;
        // SAFETY: slot `len` is inside the buffer; `src` is upheld by the caller.
        unsafe { self.raw.write_bytes(self.len, src) };
        self.len += 1;
        Ok(())
    }

    /// Release and discard the last element. Empty containers are left
    /// untouched.
    pub fn pop(&mut self, reg: &TypeRegistry) -> Result<(), ContainerError> {
        if self.len == 0 {
            return Ok(());
        }
        let kind = self.descriptor(reg)?.kind();
        self.len -= 1;
        // SAFETY: slot `len` held the last initialised element.
        unsafe { release_slot(reg, kind, self.raw.slot(self.len)) };
        self.shrink(reg);
        Ok(())
    }

    /// Remove the last element and return it without releasing it.
    pub fn take_last<T: 'static>(&mut self, reg: &TypeRegistry) -> Result<Option<T>, ContainerError> {
        reg.resolve_as::<T>(self.type_id)?;
        if self.len == 0 {
            return Ok(None);
        }
        self.len -= 1;
        // SAFETY: slot `len` held an initialised `T`; it is moved out and
        // the slot is no longer counted.
        let value = unsafe { self.raw.slot(self.len).cast::<T>().as_ptr().read() };
        self.shrink(reg);
        Ok(Some(value))
    }

    fn check_occupied(&self, index: usize) -> Result<(), ContainerError> {
        if index >= self.len {
            return Err(self.reject(ContainerError::IndexOutOfBounds {
                index,
                len: self.len,
            }));
        }
        Ok(())
    }

    /// Insert `value` before the element at `index`.
    ///
    /// `index` must address an existing element; use
    /// [`append`](Container::append) to add at the end.
    pub fn insert<T: 'static>(
        &mut self,
        reg: &TypeRegistry,
        index: usize,
        value: T,
    ) -> Result<(), ContainerError> {
        reg.resolve_as::<T>(self.type_id)?;
        self.check_occupied(index)?;
        self.grow_for(reg, 1)?;
        // SAFETY: `index < len < capacity`, so the shifted run
        // `[index + 1, len + 1)` fits; slot `index` is then free.
        unsafe {
            self.raw.shift(index, index + 1, self.len - index);
            self.write_slot(index, value);
        }
        self.len += 1;
        Ok(())
    }

    /// Insert one element copied bitwise from `src` before `index`.
    ///
    /// # Safety
    ///
    /// Same contract as [`append_raw`](Container::append_raw).
    pub unsafe fn insert_raw(
        &mut self,
        reg: &TypeRegistry,
        index: usize,
        src: *const u8,
    ) -> Result<(), ContainerError> {
        self.descriptor(reg)?;
        self.check_occupied(index)?;
        self.grow_for(reg, 1)?;
        // SAFETY: as for `insert`; `src` is upheld by the caller.
        unsafe {
            self.raw.shift(index, index + 1, self.len - index);
            self.raw.write_bytes(index, src);
        }
        self.len += 1;
        Ok(())
    }

    /// Release and remove the element at `index`, closing the gap.
    ///
    /// Removing from an empty container is a no-op.
    pub fn remove(&mut self, reg: &TypeRegistry, index: usize) -> Result<(), ContainerError> {
        if self.len == 0 {
            return Ok(());
        }
        self.check_occupied(index)?;
        let kind = self.descriptor(reg)?.kind();
        self.release_range(reg, kind, index, index + 1);
        self.shrink(reg);
        Ok(())
    }

    /// Release `[from, to)` and move the tail `[to, len)` down over it.
    ///
    /// The length is cut to `from` before any hook runs, and the gap is
    /// closed by a guard. A hook that unwinds therefore leaves the
    /// unreleased rest of the range leaked, never counted as live.
    fn release_range(&mut self, reg: &TypeRegistry, kind: ElementKind, from: usize, to: usize) {
        struct CloseGap<'a> {
            container: &'a mut Container,
            from: usize,
            to: usize,
            tail: usize,
        }

        impl Drop for CloseGap<'_> {
            fn drop(&mut self) {
                // SAFETY: `[to, to + tail)` held the initialised tail and
                // `[from, to)` holds nothing live any more.
                unsafe { self.container.raw.shift(self.to, self.from, self.tail) };
                self.container.len = self.from + self.tail;
            }
        }

        let tail = self.len - to;
        self.len = from;
        let gap = CloseGap {
            container: self,
            from,
            to,
            tail,
        };
        if kind.needs_release() {
            for index in from..to {
                // SAFETY: every slot in `[from, to)` is initialised and is
                // released at most once.
                unsafe { release_slot(reg, kind, gap.container.raw.slot(index)) };
            }
        }
    }

    fn check_range(&self, from: usize, to: usize, len: usize) -> Result<(), ContainerError> {
        if from > to || to > len {
            return Err(self.reject(ContainerError::InvalidRange { from, to, len }));
        }
        Ok(())
    }

    /// Independent copy of `[from, to)` in a new container with capacity
    /// `to - from + 1`.
    fn copy_range(
        &self,
        reg: &TypeRegistry,
        from: usize,
        to: usize,
    ) -> Result<Container, ContainerError> {
        let desc = self.descriptor(reg)?;
        if !desc.kind().is_duplicable() {
            return Err(self.reject(ContainerError::NotDuplicable {
                type_name: desc.name().to_string(),
            }));
        }
        let count = to - from;
        let capacity = count
            .checked_add(1)
            .ok_or(ContainerError::CapacityOverflow { requested: count })?;
        let mut out = Container::new(reg, self.type_id)?;
        out.set_capacity(reg, capacity)?;

        if let ElementKind::Plain = desc.kind() {
            // SAFETY: `[from, to)` is initialised in `self` and `out` has
            // room for `count` slots in a separate allocation.
            unsafe { out.raw.write_run(0, self.raw.slot(from), count) };
            out.len = count;
            return Ok(out);
        }

        for i in 0..count {
            // SAFETY: source slot is initialised; destination slot `i` is
            // the first uninitialised slot of `out`.
            let copied = unsafe { duplicate_into(reg, desc, self.raw.slot(from + i), out.raw.slot(i)) };
            if let Err(err) = copied {
                out.destroy(reg);
                return Err(err);
            }
            out.len += 1;
        }
        Ok(out)
    }

    /// Independent copy of the whole container.
    pub fn deep_copy(&self, reg: &TypeRegistry) -> Result<Container, ContainerError> {
        self.copy_range(reg, 0, self.len)
    }

    /// Independent copy of `[from, to)` as a new container.
    pub fn slice(
        &self,
        reg: &TypeRegistry,
        from: usize,
        to: usize,
    ) -> Result<Container, ContainerError> {
        if from == to {
            return Container::new(reg, self.type_id);
        }
        self.check_range(from, to, self.len)?;
        self.copy_range(reg, from, to)
    }

    /// Replace this container's contents with a copy of `src[from..to]`.
    ///
    /// An empty range is a no-op. Prior contents are destroyed only once
    /// the copy has succeeded, so on error `self` is unchanged.
    pub fn slice_from(
        &mut self,
        reg: &TypeRegistry,
        src: &Container,
        from: usize,
        to: usize,
    ) -> Result<(), ContainerError> {
        if from == to {
            return Ok(());
        }
        src.check_range(from, to, src.len)?;
        self.check_same_type(reg, src)?;
        let copy = src.copy_range(reg, from, to)?;
        self.destroy(reg);
        *self = copy;
        Ok(())
    }

    /// Insert copies of all of `src`'s elements before position `index`.
    ///
    /// `index == len` appends. Capacity grows to exactly `len + src.len()`
    /// when needed. `src` is not modified.
    pub fn splice_insert(
        &mut self,
        reg: &TypeRegistry,
        src: &Container,
        index: usize,
    ) -> Result<(), ContainerError> {
        if index > self.len {
            return Err(self.reject(ContainerError::IndexOutOfBounds {
                index,
                len: self.len,
            }));
        }
        self.check_same_type(reg, src)?;
        let count = src.len;
        if count == 0 {
            return Ok(());
        }
        let required = self
            .len
            .checked_add(count)
            .ok_or(ContainerError::CapacityOverflow {
                requested: usize::MAX,
            })?;

        let mut incoming = src.copy_range(reg, 0, count)?;
        if let Err(err) = self.set_capacity(reg, required.max(self.raw.capacity())) {
            incoming.destroy(reg);
            return Err(err);
        }
        // SAFETY: capacity >= len + count, so the tail fits at
        // `index + count`; `incoming` is a distinct allocation holding
        // `count` initialised elements whose ownership moves here.
        unsafe {
            self.raw.shift(index, index + count, self.len - index);
            self.raw.write_run(index, incoming.raw.slot(0), count);
        }
        incoming.len = 0;
        self.len += count;
        Ok(())
    }

    /// Release and remove the elements in `[from, to)`.
    ///
    /// An empty range is a no-op.
    pub fn remove_range(
        &mut self,
        reg: &TypeRegistry,
        from: usize,
        to: usize,
    ) -> Result<(), ContainerError> {
        if from == to {
            return Ok(());
        }
        self.check_range(from, to, self.len)?;
        let kind = self.descriptor(reg)?.kind();
        self.release_range(reg, kind, from, to);
        self.shrink(reg);
        Ok(())
    }

    /// Release every element, keeping the container bound to its type.
    pub fn clear(&mut self, reg: &TypeRegistry) -> Result<(), ContainerError> {
        self.remove_range(reg, 0, self.len)
    }

    /// Reallocate to exactly `new_capacity` slots.
    ///
    /// Shrinking below the current length first releases the trailing
    /// elements. Growing leaves the length unchanged.
    pub fn resize(&mut self, reg: &TypeRegistry, new_capacity: usize) -> Result<(), ContainerError> {
        let kind = self.descriptor(reg)?.kind();
        if new_capacity < self.len {
            self.release_range(reg, kind, new_capacity, self.len);
        }
        self.set_capacity(reg, new_capacity)
    }

    /// Reallocate to exactly `new_capacity` slots and make all of them live.
    ///
    /// # Safety
    ///
    /// Slots `[old_len, new_capacity)` are uninitialised. The caller must
    /// write a valid element into each before it is read, released, or
    /// copied.
    pub unsafe fn resize_uninit(
        &mut self,
        reg: &TypeRegistry,
        new_capacity: usize,
    ) -> Result<(), ContainerError> {
        self.resize(reg, new_capacity)?;
        self.len = new_capacity;
        Ok(())
    }

    /// Release every element and free the buffer.
    ///
    /// Nested containers are destroyed recursively. Afterwards the
    /// container is empty, holds no memory, reports the initial capacity,
    /// and remains bound to its type.
    pub fn destroy(&mut self, reg: &TypeRegistry) {
        match reg.descriptor(self.type_id) {
            Some(desc) => {
                if self.raw.is_allocated() {
                    trace!(type_id = %self.type_id, len = self.len, "container destroyed");
                }
                self.release_range(reg, desc.kind(), 0, self.len);
            }
            None if self.len > 0 => {
                warn!(
                    type_id = %self.type_id,
                    len = self.len,
                    "destroying container of unregistered type; elements not released"
                );
            }
            None => {}
        }
        self.len = 0;
        self.raw.release(reg.config().initial_capacity);
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if self.len > 0 {
            trace!(
                type_id = %self.type_id,
                len = self.len,
                "container dropped without destroy; release hooks skipped"
            );
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("type_id", &self.type_id)
            .field("len", &self.len)
            .field("capacity", &self.raw.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnivec_core::EngineConfig;
    use std::alloc::Layout;
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    fn ints(reg: &TypeRegistry, values: &[i32]) -> Container {
        let mut c = Container::new(reg, reg.lookup("i32").unwrap()).unwrap();
        for &v in values {
            c.append(reg, v).unwrap();
        }
        c
    }

    #[test]
    fn fresh_container_reserves_without_allocating() {
        let reg = TypeRegistry::new();
        let c = Container::new(&reg, reg.lookup("i32").unwrap()).unwrap();
        assert_eq!(c.len(), 0);
        assert_eq!(c.capacity(), 1);
        assert_eq!(c.element_size(), 4);
        assert!(!c.is_allocated());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let reg = TypeRegistry::new();
        assert_eq!(
            Container::new(&reg, TypeId(500)).unwrap_err(),
            ContainerError::UnknownType {
                type_id: TypeId(500)
            }
        );
    }

    #[test]
    fn append_grows_two_n_plus_one() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[]);
        let mut seen = vec![];
        for v in 0..8 {
            c.append(&reg, v).unwrap();
            seen.push(c.capacity());
        }
        assert_eq!(seen, vec![3, 3, 7, 7, 7, 7, 15, 15]);
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn append_rejects_wrong_rust_type() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[1]);
        let err = c.append(&reg, 1u64).unwrap_err();
        assert!(matches!(err, ContainerError::TypeMismatch { .. }));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn pop_shrinks_and_ignores_empty() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[1, 2, 3, 4]);
        assert_eq!(c.capacity(), 7);
        c.pop(&reg).unwrap();
        c.pop(&reg).unwrap();
        assert_eq!(c.capacity(), 3);
        c.pop(&reg).unwrap();
        c.pop(&reg).unwrap();
        c.pop(&reg).unwrap();
        assert_eq!(c.len(), 0);
        assert_eq!(c.capacity(), 1);
    }

    #[test]
    fn take_last_moves_out() {
        let reg = TypeRegistry::new();
        let mut c = Container::new(&reg, reg.lookup(TypeRegistry::STRING).unwrap()).unwrap();
        c.append(&reg, String::from("a")).unwrap();
        c.append(&reg, String::from("b")).unwrap();
        assert_eq!(c.take_last::<String>(&reg).unwrap().as_deref(), Some("b"));
        assert_eq!(c.len(), 1);
        c.destroy(&reg);
        assert_eq!(c.take_last::<String>(&reg).unwrap(), None);
    }

    #[test]
    fn insert_shifts_tail_right() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[1, 2, 3]);
        c.insert(&reg, 1, 9).unwrap();
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[1, 9, 2, 3]);
        c.insert(&reg, 0, 8).unwrap();
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[8, 1, 9, 2, 3]);
    }

    #[test]
    fn insert_at_len_is_out_of_bounds() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[1, 2]);
        assert_eq!(
            c.insert(&reg, 2, 5).unwrap_err(),
            ContainerError::IndexOutOfBounds { index: 2, len: 2 }
        );
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[1, 2]);
    }

    #[test]
    fn remove_closes_gap() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[1, 2, 3, 4]);
        c.remove(&reg, 1).unwrap();
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[1, 3, 4]);
        assert_eq!(
            c.remove(&reg, 3).unwrap_err(),
            ContainerError::IndexOutOfBounds { index: 3, len: 3 }
        );
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[1, 3, 4]);
    }

    #[test]
    fn remove_on_empty_is_noop() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[]);
        c.remove(&reg, 0).unwrap();
        c.remove(&reg, 42).unwrap();
        assert!(c.is_empty());
    }

    #[test]
    fn slice_copies_range_with_tight_capacity() {
        let reg = TypeRegistry::new();
        let src = ints(&reg, &[10, 20, 30, 40, 50]);
        let part = src.slice(&reg, 1, 4).unwrap();
        assert_eq!(part.as_slice::<i32>(&reg).unwrap(), &[20, 30, 40]);
        assert_eq!(part.capacity(), 4);
        assert_eq!(src.len(), 5);
    }

    #[test]
    fn slice_from_replaces_contents() {
        let reg = TypeRegistry::new();
        let src = ints(&reg, &[1, 2, 3]);
        let mut dst = ints(&reg, &[7, 7, 7, 7]);
        dst.slice_from(&reg, &src, 0, 2).unwrap();
        assert_eq!(dst.as_slice::<i32>(&reg).unwrap(), &[1, 2]);

        dst.slice_from(&reg, &src, 2, 2).unwrap();
        assert_eq!(dst.as_slice::<i32>(&reg).unwrap(), &[1, 2]);
    }

    #[test]
    fn slice_rejects_bad_range_and_type() {
        let reg = TypeRegistry::new();
        let src = ints(&reg, &[1, 2, 3]);
        let mut dst = ints(&reg, &[9]);
        assert_eq!(
            dst.slice_from(&reg, &src, 2, 1).unwrap_err(),
            ContainerError::InvalidRange { from: 2, to: 1, len: 3 }
        );
        assert_eq!(
            dst.slice_from(&reg, &src, 1, 4).unwrap_err(),
            ContainerError::InvalidRange { from: 1, to: 4, len: 3 }
        );
        let mut floats = Container::new(&reg, reg.lookup("f32").unwrap()).unwrap();
        assert!(matches!(
            floats.slice_from(&reg, &src, 0, 1),
            Err(ContainerError::TypeMismatch { .. })
        ));
        assert_eq!(dst.as_slice::<i32>(&reg).unwrap(), &[9]);
    }

    #[test]
    fn splice_insert_in_middle_and_end() {
        let reg = TypeRegistry::new();
        let src = ints(&reg, &[7, 8]);
        let mut dst = ints(&reg, &[1, 2, 3]);
        dst.splice_insert(&reg, &src, 1).unwrap();
        assert_eq!(dst.as_slice::<i32>(&reg).unwrap(), &[1, 7, 8, 2, 3]);
        dst.splice_insert(&reg, &src, 5).unwrap();
        assert_eq!(dst.as_slice::<i32>(&reg).unwrap(), &[1, 7, 8, 2, 3, 7, 8]);
        assert_eq!(src.as_slice::<i32>(&reg).unwrap(), &[7, 8]);
        assert!(dst.capacity() >= dst.len());
    }

    #[test]
    fn splice_insert_past_end_is_rejected() {
        let reg = TypeRegistry::new();
        let src = ints(&reg, &[7]);
        let mut dst = ints(&reg, &[1]);
        assert_eq!(
            dst.splice_insert(&reg, &src, 2).unwrap_err(),
            ContainerError::IndexOutOfBounds { index: 2, len: 1 }
        );
    }

    #[test]
    fn remove_range_shifts_and_shrinks() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &(0..14).collect::<Vec<_>>());
        assert_eq!(c.capacity(), 15);
        c.remove_range(&reg, 2, 13).unwrap();
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[0, 1, 13]);
        assert!(c.capacity() <= 7);
        c.remove_range(&reg, 1, 1).unwrap();
        assert_eq!(c.len(), 3);
        assert!(matches!(
            c.remove_range(&reg, 0, 4),
            Err(ContainerError::InvalidRange { .. })
        ));
    }

    #[test]
    fn resize_grows_without_changing_len() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[1, 2]);
        c.resize(&reg, 10).unwrap();
        assert_eq!(c.capacity(), 10);
        assert_eq!(c.len(), 2);
        c.resize(&reg, 1).unwrap();
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[1]);
        assert_eq!(c.capacity(), 1);
    }

    #[test]
    fn resize_uninit_exposes_slots() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[]);
        unsafe { c.resize_uninit(&reg, 4).unwrap() };
        assert_eq!(c.len(), 4);
        c.as_mut_slice::<i32>(&reg).unwrap().copy_from_slice(&[4, 3, 2, 1]);
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[4, 3, 2, 1]);
    }

    #[test]
    fn raw_append_and_insert_for_layout_types() {
        let mut reg = TypeRegistry::new();
        let rgb = reg.register("rgb", Layout::new::<[u8; 3]>(), None);
        let mut c = Container::new(&reg, rgb).unwrap();
        unsafe {
            c.append_raw(&reg, [1u8, 2, 3].as_ptr()).unwrap();
            c.insert_raw(&reg, 0, [4u8, 5, 6].as_ptr()).unwrap();
        }
        let first = c.element_ptr(0).unwrap();
        let bytes = unsafe { slice::from_raw_parts(first.as_ptr(), 3) };
        assert_eq!(bytes, &[4, 5, 6]);
        assert!(c.element_ptr(2).is_none());
    }

    #[test]
    fn owned_elements_are_released() {
        let reg = TypeRegistry::new();
        let mut c = Container::new(&reg, reg.lookup(TypeRegistry::STRING).unwrap()).unwrap();
        for s in ["a", "b", "c", "d"] {
            c.append(&reg, s.to_string()).unwrap();
        }
        c.remove(&reg, 1).unwrap();
        c.pop(&reg).unwrap();
        let mut copy = c.deep_copy(&reg).unwrap();
        c.destroy(&reg);
        assert_eq!(copy.as_slice::<String>(&reg).unwrap(), &["a", "c"]);
        copy.destroy(&reg);
    }

    #[test]
    fn owned_without_duplicate_cannot_be_copied() {
        let mut reg = TypeRegistry::new();
        let bytes = reg.register_type::<Vec<u8>>("bytes");
        let mut c = Container::new(&reg, bytes).unwrap();
        c.append(&reg, vec![1u8]).unwrap();
        assert!(matches!(
            c.slice(&reg, 0, 1),
            Err(ContainerError::NotDuplicable { .. })
        ));
        c.destroy(&reg);
    }

    #[test]
    fn typed_values_without_destructor_are_not_bit_copied() {
        let mut reg = TypeRegistry::new();
        let unique = reg.register_type::<&'static mut i32>("unique");
        let mut c = Container::new(&reg, unique).unwrap();
        c.append(&reg, Box::leak(Box::new(7i32))).unwrap();
        assert!(matches!(
            c.slice(&reg, 0, 1),
            Err(ContainerError::NotDuplicable { .. })
        ));
        assert!(matches!(
            c.deep_copy(&reg),
            Err(ContainerError::NotDuplicable { .. })
        ));
        let mut other = Container::new(&reg, unique).unwrap();
        assert!(other.splice_insert(&reg, &c, 0).is_err());
        assert!(other.is_empty());
        c.destroy(&reg);
    }

    #[derive(Debug)]
    struct Noisy(u32);

    static CLONES: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    impl Clone for Noisy {
        fn clone(&self) -> Self {
            CLONES.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Noisy(self.0 + 100)
        }
    }

    #[test]
    fn cloneable_copies_run_clone() {
        let mut reg = TypeRegistry::new();
        let noisy = reg.register_cloneable::<Noisy>("noisy");
        let mut c = Container::new(&reg, noisy).unwrap();
        c.append(&reg, Noisy(1)).unwrap();
        c.append(&reg, Noisy(2)).unwrap();
        let mut copy = c.slice(&reg, 0, 2).unwrap();
        let values: Vec<u32> = copy.as_slice::<Noisy>(&reg).unwrap().iter().map(|n| n.0).collect();
        assert_eq!(values, vec![101, 102]);
        assert!(CLONES.load(std::sync::atomic::Ordering::Relaxed) >= 2);
        copy.destroy(&reg);
        c.destroy(&reg);
    }

    /// Element whose destructor counts calls and panics when armed.
    struct Bomb {
        armed: bool,
        drops: Rc<Cell<usize>>,
    }

    impl Drop for Bomb {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
            if self.armed {
                panic!("release hook failed");
            }
        }
    }

    fn bombs(reg: &mut TypeRegistry, armed: &[bool], drops: &Rc<Cell<usize>>) -> Container {
        let bomb = reg.register_type::<Bomb>("bomb");
        let mut c = Container::new(reg, bomb).unwrap();
        for &armed in armed {
            let drops = Rc::clone(drops);
            c.append(reg, Bomb { armed, drops }).unwrap();
        }
        c
    }

    #[test]
    fn unwinding_remove_never_leaves_released_slot_live() {
        let mut reg = TypeRegistry::new();
        let drops = Rc::new(Cell::new(0));
        let mut c = bombs(&mut reg, &[false, true, false], &drops);

        let result = panic::catch_unwind(AssertUnwindSafe(|| c.remove(&reg, 1)));
        assert!(result.is_err());
        assert_eq!(c.len(), 2);
        assert_eq!(drops.get(), 1);
        assert!(c.as_slice::<Bomb>(&reg).unwrap().iter().all(|b| !b.armed));

        c.destroy(&reg);
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn unwinding_remove_range_and_resize_keep_counts_consistent() {
        let mut reg = TypeRegistry::new();
        let drops = Rc::new(Cell::new(0));
        let mut c = bombs(&mut reg, &[false, true, false, false], &drops);

        let result = panic::catch_unwind(AssertUnwindSafe(|| c.remove_range(&reg, 0, 3)));
        assert!(result.is_err());
        assert_eq!(c.len(), 1, "the tail survives, the range is gone");
        assert_eq!(drops.get(), 2);

        let drops_before = drops.get();
        let armed = Bomb {
            armed: true,
            drops: Rc::clone(&drops),
        };
        c.append(&reg, armed).unwrap();
        let result = panic::catch_unwind(AssertUnwindSafe(|| c.resize(&reg, 1)));
        assert!(result.is_err());
        assert_eq!(c.len(), 1);
        assert_eq!(drops.get(), drops_before + 1);

        c.destroy(&reg);
        assert_eq!(drops.get(), drops_before + 2);
    }

    #[test]
    fn unwinding_destroy_leaves_container_empty() {
        let mut reg = TypeRegistry::new();
        let drops = Rc::new(Cell::new(0));
        let mut c = bombs(&mut reg, &[true, false], &drops);

        let result = panic::catch_unwind(AssertUnwindSafe(|| c.destroy(&reg)));
        assert!(result.is_err());
        assert_eq!(c.len(), 0);
        c.destroy(&reg);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn unwinding_set_installs_the_new_value() {
        let mut reg = TypeRegistry::new();
        let drops = Rc::new(Cell::new(0));
        let mut c = bombs(&mut reg, &[true], &drops);

        let replacement = Bomb {
            armed: false,
            drops: Rc::clone(&drops),
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| c.set(&reg, &[0], replacement)));
        assert!(result.is_err());
        assert_eq!(c.len(), 1);
        assert_eq!(drops.get(), 1);
        assert!(!c.get::<Bomb>(&reg, &[0]).unwrap().armed);

        c.destroy(&reg);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn destroy_resets_and_allows_reuse() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[1, 2, 3]);
        c.destroy(&reg);
        assert_eq!(c.len(), 0);
        assert_eq!(c.capacity(), 1);
        assert!(!c.is_allocated());
        c.append(&reg, 5).unwrap();
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[5]);
    }

    #[test]
    fn init_rebinds_type() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[1, 2]);
        c.init(&reg, reg.lookup("f64").unwrap()).unwrap();
        c.append(&reg, 2.5f64).unwrap();
        assert_eq!(c.as_slice::<f64>(&reg).unwrap(), &[2.5]);
        assert!(c.init(&reg, TypeId(777)).is_err());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn configured_initial_capacity_is_reported() {
        let config = EngineConfig {
            initial_capacity: 8,
            ..EngineConfig::default()
        };
        let reg = TypeRegistry::with_config(config).unwrap();
        let mut c = ints(&reg, &[]);
        assert_eq!(c.capacity(), 8);
        c.append(&reg, 1).unwrap();
        assert_eq!(c.capacity(), 8);
        assert!(c.is_allocated());
    }

    #[test]
    fn capacity_overflow_is_reported() {
        let reg = TypeRegistry::new();
        let mut c = ints(&reg, &[1]);
        assert!(matches!(
            c.resize(&reg, usize::MAX / 2),
            Err(ContainerError::CapacityOverflow { .. })
        ));
        assert_eq!(c.as_slice::<i32>(&reg).unwrap(), &[1]);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Append(i32),
            Pop,
            Insert(usize, i32),
            Remove(usize),
            RemoveRange(usize, usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => any::<i32>().prop_map(Op::Append),
                1 => Just(Op::Pop),
                2 => (0usize..64, any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
                1 => (0usize..64).prop_map(Op::Remove),
                1 => (0usize..64, 0usize..64).prop_map(|(a, b)| Op::RemoveRange(a.min(b), a.max(b))),
            ]
        }

        proptest! {
            #[test]
            fn matches_vec_model_within_capacity_bound(ops in prop::collection::vec(op(), 0..200)) {
                let reg = TypeRegistry::new();
                let mut c = ints(&reg, &[]);
                let mut model: Vec<i32> = Vec::new();
                for op in ops {
                    match op {
                        Op::Append(v) => {
                            c.append(&reg, v).unwrap();
                            model.push(v);
                        }
                        Op::Pop => {
                            c.pop(&reg).unwrap();
                            model.pop();
                        }
                        Op::Insert(i, v) => {
                            let res = c.insert(&reg, i, v);
                            if i < model.len() {
                                prop_assert!(res.is_ok());
                                model.insert(i, v);
                            } else {
                                prop_assert!(res.is_err());
                            }
                        }
                        Op::Remove(i) => {
                            let res = c.remove(&reg, i);
                            if i < model.len() {
                                prop_assert!(res.is_ok());
                                model.remove(i);
                            } else {
                                prop_assert_eq!(res.is_ok(), model.is_empty());
                            }
                        }
                        Op::RemoveRange(from, to) => {
                            let res = c.remove_range(&reg, from, to);
                            if from == to || to <= model.len() {
                                prop_assert!(res.is_ok());
                                if from != to {
                                    model.drain(from..to);
                                }
                            } else {
                                prop_assert!(res.is_err());
                            }
                        }
                    }
                    prop_assert_eq!(c.as_slice::<i32>(&reg).unwrap(), model.as_slice());
                    prop_assert!(c.len() <= c.capacity());
                    prop_assert!(c.capacity() <= (2 * c.len() + 1).max(1));
                }
            }

            #[test]
            fn slice_then_splice_reassembles(values in prop::collection::vec(any::<i32>(), 1..50), cut in 0usize..50) {
                let reg = TypeRegistry::new();
                let cut = cut % (values.len() + 1);
                let src = ints(&reg, &values);
                let mut head = src.slice(&reg, 0, cut).unwrap();
                let tail = src.slice(&reg, cut, values.len()).unwrap();
                let at = head.len();
                head.splice_insert(&reg, &tail, at).unwrap();
                prop_assert_eq!(head.as_slice::<i32>(&reg).unwrap(), values.as_slice());
            }
        }
    }
}
