//! Sparse storage for circuit equations.
//!
//! Vectors and matrices are 1-based; index 0 always resolves to a permanent
//! trash element so that stamps for grounded terminals need no special
//! casing. Elements live in an arena and are addressed by [`ElementId`]
//! handles that stay valid until the element is removed or the container is
//! cleared.

mod matrix;
mod scalar;
mod translation;
mod vector;

pub use matrix::SparseMatrix;
pub use scalar::Scalar;
pub use translation::Translation;
pub use vector::SparseVector;

use std::fmt;

/// Handle to an element of a [`SparseVector`] or [`SparseMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    /// The trash element, present in every container.
    pub const TRASH: ElementId = ElementId(0);

    /// Whether this is the trash element.
    pub fn is_trash(self) -> bool {
        self == Self::TRASH
    }
}

/// A (row, column) position in a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatrixLocation {
    pub row: usize,
    pub column: usize,
}

impl MatrixLocation {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl From<(usize, usize)> for MatrixLocation {
    fn from((row, column): (usize, usize)) -> Self {
        Self::new(row, column)
    }
}

impl fmt::Display for MatrixLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}
