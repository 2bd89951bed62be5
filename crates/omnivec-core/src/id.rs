//! Strongly-typed identifiers and the [`IndexPath`] / [`Shape`] aliases.

use smallvec::SmallVec;
use std::fmt;

/// Identifies a registered element type.
///
/// Types are assigned sequential IDs as they are registered.
/// `TypeId(n)` corresponds to the n-th descriptor in the registry, and
/// an ID is never reused for the lifetime of that registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Position of this type in the registry table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TypeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// An owned sequence of indices addressing one element through nested
/// containers, outermost first.
///
/// Uses `SmallVec<[usize; 4]>` so paths up to four levels deep stay on
/// the stack. Build one with [`index_path!`](crate::index_path).
pub type IndexPath = SmallVec<[usize; 4]>;

/// Per-level lengths of a rectangular nested container, outermost first.
pub type Shape = SmallVec<[usize; 4]>;

/// Build an [`IndexPath`] from a list of indices.
///
/// ```
/// use omnivec_core::index_path;
///
/// let path = index_path![1, 0];
/// assert_eq!(path.as_slice(), &[1, 0]);
/// ```
#[macro_export]
macro_rules! index_path {
    ($($index:expr),* $(,)?) => {{
        let path: $crate::IndexPath = $crate::__smallvec::smallvec![$($index),*];
        path
    }};
}
