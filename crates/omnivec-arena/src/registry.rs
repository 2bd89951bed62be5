//! Runtime type registry: `name` → `(TypeId, Layout, ElementKind)`.
//!
//! The [`TypeRegistry`] is the single source of truth for element types.
//! It is an explicitly owned context object: construct it once at startup,
//! pass it by reference to every container operation, and tear it down
//! after the last container has been destroyed.
//!
//! The registry is append-only. Descriptors are never removed or
//! reordered, so a [`TypeId`] stays valid for the registry's lifetime.
//! Lookup by name is a linear scan with first-match semantics.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::any::{self, TypeId as RustTypeId};
use std::fmt;
use std::ptr::{self, NonNull};

use omnivec_core::{ConfigError, ContainerError, EngineConfig, RegistryError, TypeId};
use tracing::debug;

use crate::container::Container;

/// Callback run on one element before its storage is reclaimed.
///
/// The pointer addresses a single initialised element. After the hook
/// returns, the engine treats the slot as uninitialised.
pub type ReleaseHook = unsafe fn(NonNull<u8>);

/// Callback writing an independent copy of the element at `src` into the
/// uninitialised slot at `dst`.
pub type DuplicateHook = unsafe fn(src: NonNull<u8>, dst: NonNull<u8>);

/// How the engine copies and releases elements of a type.
#[derive(Clone, Copy, Debug)]
pub enum ElementKind {
    /// Plain bytes: copied bitwise, nothing to release.
    Plain,
    /// Owns external resources.
    Owned {
        /// Run on each element before its slot is reclaimed.
        release: ReleaseHook,
        /// Produces an independent copy; `None` forbids copying.
        duplicate: Option<DuplicateHook>,
    },
    /// The element is itself a [`Container`]. Release is a recursive
    /// destroy; copying is a recursive deep copy.
    Nested,
}

impl ElementKind {
    /// Whether elements need any work before their storage is reclaimed.
    pub fn needs_release(&self) -> bool {
        !matches!(self, Self::Plain)
    }

    /// Whether elements can be copied.
    pub fn is_duplicable(&self) -> bool {
        !matches!(
            self,
            Self::Owned {
                duplicate: None,
                ..
            }
        )
    }
}

/// One registered element type.
#[derive(Clone)]
pub struct TypeDescriptor {
    name: String,
    id: TypeId,
    layout: Layout,
    kind: ElementKind,
    rust_type: Option<RustTypeId>,
    zeroable: bool,
}

impl TypeDescriptor {
    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dense identifier assigned at registration.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Element layout, padded to its alignment.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Bytes per element.
    pub fn element_size(&self) -> usize {
        self.layout.size()
    }

    /// Copy and release semantics.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Whether an all-zero bit pattern is a valid element.
    pub fn is_zeroable(&self) -> bool {
        self.zeroable
    }

    /// Whether typed access through `T` is permitted.
    pub fn is_type<T: 'static>(&self) -> bool {
        self.rust_type == Some(RustTypeId::of::<T>())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("size", &self.layout.size())
            .field("align", &self.layout.align())
            .field("kind", &self.kind)
            .finish()
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Primitive scalars whose every bit pattern of zeroes is a valid value.
///
/// Sealed: implemented for the integer types, `bool`, `char`, `f32`,
/// and `f64`.
pub trait Scalar: sealed::Sealed + Copy + 'static {}

macro_rules! impl_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}
            impl Scalar for $t {}
        )*
    };
}

impl_scalar!(i8, u8, i16, u16, i32, u32, i64, u64, i128, u128, isize, usize, bool, char, f32, f64);

/// Release hook that runs `T`'s destructor in place.
unsafe fn drop_glue<T>(ptr: NonNull<u8>) {
    // SAFETY: the engine only passes pointers to initialised `T` slots.
    unsafe { ptr::drop_in_place(ptr.cast::<T>().as_ptr()) }
}

/// Duplicate hook that clones a `T` into an uninitialised slot.
unsafe fn clone_glue<T: Clone>(src: NonNull<u8>, dst: NonNull<u8>) {
    // SAFETY: `src` is an initialised `T`; `dst` is an uninitialised,
    // properly aligned `T` slot that does not overlap it.
    unsafe {
        let value = src.cast::<T>().as_ref().clone();
        dst.cast::<T>().as_ptr().write(value);
    }
}

/// Process-lifetime table of element types.
///
/// Construction registers the built-in types: the primitive scalars under
/// their Rust names (`"i32"`, `"f64"`, ...), [`TypeRegistry::CONTAINER`]
/// for nested containers, and [`TypeRegistry::STRING`] for `String`.
///
/// Duplicate names are permitted; [`lookup`](TypeRegistry::lookup)
/// returns the first match. This lets a narrower alias be registered
/// later without replacing the first entry.
pub struct TypeRegistry {
    descriptors: Vec<TypeDescriptor>,
    container_type: TypeId,
    config: EngineConfig,
}

impl TypeRegistry {
    /// Name of the built-in nested container type.
    pub const CONTAINER: &'static str = "Container";

    /// Name of the built-in `String` type.
    pub const STRING: &'static str = "String";

    /// Create a registry with the default [`EngineConfig`].
    pub fn new() -> Self {
        Self::build(EngineConfig::default())
    }

    /// Create a registry with a custom configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        let mut registry = Self {
            descriptors: Vec::with_capacity(20),
            container_type: TypeId(0),
            config,
        };
        registry.register_scalar::<i8>("i8");
        registry.register_scalar::<u8>("u8");
        registry.register_scalar::<i16>("i16");
        registry.register_scalar::<u16>("u16");
        registry.register_scalar::<i32>("i32");
        registry.register_scalar::<u32>("u32");
        registry.register_scalar::<i64>("i64");
        registry.register_scalar::<u64>("u64");
        registry.register_scalar::<i128>("i128");
        registry.register_scalar::<u128>("u128");
        registry.register_scalar::<isize>("isize");
        registry.register_scalar::<usize>("usize");
        registry.register_scalar::<bool>("bool");
        registry.register_scalar::<char>("char");
        registry.register_scalar::<f32>("f32");
        registry.register_scalar::<f64>("f64");
        registry.container_type = registry.register_type::<Container>(Self::CONTAINER);
        registry.register_cloneable::<String>(Self::STRING);
        debug!(types = registry.len(), "type registry initialised");
        registry
    }

    fn push(
        &mut self,
        name: String,
        layout: Layout,
        kind: ElementKind,
        rust_type: Option<RustTypeId>,
        zeroable: bool,
    ) -> TypeId {
        let id = TypeId(self.descriptors.len() as u32);
        let layout = layout.pad_to_align();
        debug!(%id, name = %name, size = layout.size(), "registered element type");
        self.descriptors.push(TypeDescriptor {
            name,
            id,
            layout,
            kind,
            rust_type,
            zeroable,
        });
        id
    }

    /// Register a raw type by layout.
    ///
    /// Without a release hook the type is [`ElementKind::Plain`] and is
    /// assumed to be plain bytes: any bit pattern, including all zeroes,
    /// must be a valid value. With a hook it is [`ElementKind::Owned`]
    /// and cannot be copied; use [`register_with_duplicate`] to allow that.
    ///
    /// Raw types are only reachable through the engine's `*_raw` functions.
    ///
    /// [`register_with_duplicate`]: TypeRegistry::register_with_duplicate
    pub fn register(
        &mut self,
        name: impl Into<String>,
        layout: Layout,
        release: Option<ReleaseHook>,
    ) -> TypeId {
        match release {
            None => self.push(name.into(), layout, ElementKind::Plain, None, true),
            Some(release) => self.push(
                name.into(),
                layout,
                ElementKind::Owned {
                    release,
                    duplicate: None,
                },
                None,
                false,
            ),
        }
    }

    /// Register a raw owning type that can also be copied.
    pub fn register_with_duplicate(
        &mut self,
        name: impl Into<String>,
        layout: Layout,
        release: ReleaseHook,
        duplicate: DuplicateHook,
    ) -> TypeId {
        let kind = ElementKind::Owned {
            release,
            duplicate: Some(duplicate),
        };
        self.push(name.into(), layout, kind, None, false)
    }

    /// Register a Rust type. Its destructor becomes the release hook.
    ///
    /// Elements cannot be copied, even when `T` has no destructor; use
    /// [`register_copy`](TypeRegistry::register_copy) or
    /// [`register_cloneable`](TypeRegistry::register_cloneable) for that.
    /// Registering [`Container`] yields a nested type.
    pub fn register_type<T: 'static>(&mut self, name: impl Into<String>) -> TypeId {
        let kind = if RustTypeId::of::<T>() == RustTypeId::of::<Container>() {
            ElementKind::Nested
        } else {
            ElementKind::Owned {
                release: drop_glue::<T>,
                duplicate: None,
            }
        };
        self.push(
            name.into(),
            Layout::new::<T>(),
            kind,
            Some(RustTypeId::of::<T>()),
            false,
        )
    }

    /// Register a `Copy` type. Elements are copied bitwise and need no
    /// release.
    pub fn register_copy<T: Copy + 'static>(&mut self, name: impl Into<String>) -> TypeId {
        self.push(
            name.into(),
            Layout::new::<T>(),
            ElementKind::Plain,
            Some(RustTypeId::of::<T>()),
            false,
        )
    }

    /// Register a cloneable Rust type. Copies go through [`Clone`].
    pub fn register_cloneable<T: Clone + 'static>(&mut self, name: impl Into<String>) -> TypeId {
        let kind = ElementKind::Owned {
            release: drop_glue::<T>,
            duplicate: Some(clone_glue::<T>),
        };
        self.push(
            name.into(),
            Layout::new::<T>(),
            kind,
            Some(RustTypeId::of::<T>()),
            false,
        )
    }

    /// Register a primitive scalar under an additional name.
    pub fn register_scalar<T: Scalar>(&mut self, name: impl Into<String>) -> TypeId {
        self.push(
            name.into(),
            Layout::new::<T>(),
            ElementKind::Plain,
            Some(RustTypeId::of::<T>()),
            true,
        )
    }

    /// Find the first type registered under `name` (case-sensitive).
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.descriptors
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.id)
    }

    /// Like [`lookup`](TypeRegistry::lookup), but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<TypeId, RegistryError> {
        self.lookup(name).ok_or_else(|| RegistryError::UnknownTypeName {
            name: name.to_string(),
        })
    }

    /// Find the first type registered for the Rust type `T`.
    pub fn lookup_type<T: 'static>(&self) -> Option<TypeId> {
        self.descriptors
            .iter()
            .find(|d| d.is_type::<T>())
            .map(|d| d.id)
    }

    /// Descriptor for `id`, if registered.
    pub fn descriptor(&self, id: TypeId) -> Option<&TypeDescriptor> {
        self.descriptors.get(id.index())
    }

    /// Registered name of `id`, for diagnostics.
    pub fn type_name(&self, id: TypeId) -> Option<&str> {
        self.descriptor(id).map(TypeDescriptor::name)
    }

    /// Bytes per element of `id`.
    pub fn element_size(&self, id: TypeId) -> Option<usize> {
        self.descriptor(id).map(TypeDescriptor::element_size)
    }

    /// The built-in nested container type.
    pub fn container_type(&self) -> TypeId {
        self.container_type
    }

    /// Engine configuration shared by all containers.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no types are registered. Never true for a constructed
    /// registry, which always holds the built-ins.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterate over descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.iter()
    }

    /// Release every descriptor.
    ///
    /// Call after all containers bound to this registry have been
    /// destroyed. Consuming `self` rules out a second teardown.
    pub fn teardown(self) {
        debug!(types = self.len(), "type registry torn down");
    }

    pub(crate) fn resolve(&self, id: TypeId) -> Result<&TypeDescriptor, ContainerError> {
        self.descriptor(id)
            .ok_or(ContainerError::UnknownType { type_id: id })
    }

    /// Resolve `id` and check that it was registered for `T`.
    pub(crate) fn resolve_as<T: 'static>(
        &self,
        id: TypeId,
    ) -> Result<&TypeDescriptor, ContainerError> {
        let desc = self.resolve(id)?;
        if !desc.is_type::<T>() {
            return Err(ContainerError::TypeMismatch {
                expected: desc.name.clone(),
                found: any::type_name::<T>().to_string(),
            });
        }
        Ok(desc)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.descriptors.len())
            .field("container_type", &self.container_type)
            .field("config", &self.config)
            .finish()
    }
}
