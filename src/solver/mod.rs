//! Sparse linear solvers for circuit equations.
//!
//! Every analysis assembles a system `A x = b` where `A` holds the
//! conductances (and companion models of reactive elements) and `b` the
//! source terms. Rows and columns follow modified nodal analysis:
//!
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! Loading and solving are separate capabilities:
//!
//! - [`LoadSolver`] hands out element handles. Behaviors bind their
//!   locations once and then add contributions through a [`LoadTarget`]
//!   every iteration.
//! - [`FactorSolver`] factors and substitutes. Only the
//!   [`SparsePivotingSolver`] implements it; the [`ParallelSolver`] view
//!   exists purely to make the load phase race-free.

mod element_set;
mod markowitz;
mod parallel;
mod pivoting;

pub use element_set::ElementSet;
pub use markowitz::Markowitz;
pub use parallel::{ParallelSolver, ParallelState, TaskLoad, TaskSolver};
pub use pivoting::{PivotConfig, SparsePivotingSolver};

use crate::algebra::{ElementId, MatrixLocation, Scalar};
use crate::error::Result;

/// Default relative pivot threshold.
pub const DEFAULT_RELATIVE_THRESHOLD: f64 = 1e-3;

/// Default absolute pivot threshold.
pub const DEFAULT_ABSOLUTE_THRESHOLD: f64 = 1e-13;

/// Element access used while binding behaviors to the equations.
///
/// Locations and rows are external indices; 0 is the ground node and
/// resolves to a trash handle.
pub trait LoadSolver<T: Scalar> {
    /// Find or create the matrix element at `location`.
    fn get_element(&mut self, location: MatrixLocation) -> Result<ElementId>;

    /// Find the matrix element at `location` without creating it.
    fn find_element(&mut self, location: MatrixLocation) -> Option<ElementId>;

    /// Find or create the right-hand side element of `row`.
    fn get_rhs_element(&mut self, row: usize) -> Result<ElementId>;

    /// Find the right-hand side element of `row` without creating it.
    fn find_rhs_element(&mut self, row: usize) -> Option<ElementId>;

    /// The factoring capability, when this solver has it.
    fn factorizer(&mut self) -> Result<&mut dyn FactorSolver<T>>;
}

/// Write access to bound element values during a load pass.
pub trait LoadTarget<T> {
    /// Value of a matrix handle.
    fn matrix(&mut self, id: ElementId) -> &mut T;

    /// Value of a right-hand side handle.
    fn rhs(&mut self, id: ElementId) -> &mut T;
}

/// Factorization and substitution.
///
/// Solution slices are 1-based and have `size() + 1` entries; entry 0 is
/// the ground node and is left untouched.
pub trait FactorSolver<T: Scalar> {
    /// Number of equations.
    fn size(&self) -> usize;

    /// Refactor reusing the current pivot order.
    ///
    /// Returns `Ok(false)` when a pivot turns out to be zero. The steps
    /// before it remain eliminated; `order_and_factor` picks up from there.
    fn factor(&mut self) -> Result<bool>;

    /// Choose pivots where needed and factor. Returns the number of
    /// eliminated steps.
    fn order_and_factor(&mut self) -> Result<usize>;

    /// Solve `A x = b` into `solution`.
    fn solve(&mut self, solution: &mut [T]) -> Result<()>;

    /// Solve `Aᵀ x = b` into `solution`.
    fn solve_transposed(&mut self, solution: &mut [T]) -> Result<()>;

    /// Zero the matrix and right-hand side, keeping the structure.
    fn reset(&mut self);
}
