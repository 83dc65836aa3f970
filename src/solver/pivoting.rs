//! Sparse LU solver with Markowitz pivoting.
//!
//! The matrix is factored in place. After elimination the diagonal holds the
//! reciprocal pivots, the part below it the lower factor `L` and the part to
//! its right the unit upper factor `U`. Rows and columns are physically
//! swapped to bring each pivot onto the diagonal; the row and column
//! [`Translation`]s remember where every external index ended up.
//!
//! A non-zero degeneracy `d` excludes the last `d` internal rows and columns
//! from pivoting. Elimination then leaves the Schur complement in that
//! trailing block, and substitution takes the trailing unknowns from the
//! solution vector supplied by the caller.

use std::fmt;

use log::{debug, trace};

use crate::algebra::{ElementId, MatrixLocation, Scalar, SparseMatrix, SparseVector, Translation};
use crate::error::{EngineError, Result};

use super::{FactorSolver, LoadSolver, LoadTarget, Markowitz};
use super::{DEFAULT_ABSOLUTE_THRESHOLD, DEFAULT_RELATIVE_THRESHOLD};

/// Configuration for pivot selection.
#[derive(Debug, Clone)]
pub struct PivotConfig {
    /// Minimum pivot magnitude relative to the largest one in its column.
    pub relative_threshold: f64,
    /// Pivots at or below this magnitude are never accepted.
    pub absolute_threshold: f64,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            relative_threshold: DEFAULT_RELATIVE_THRESHOLD,
            absolute_threshold: DEFAULT_ABSOLUTE_THRESHOLD,
        }
    }
}

impl PivotConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relative pivot threshold.
    ///
    /// Lower values favour sparsity over numerical stability.
    pub fn with_relative_threshold(mut self, threshold: f64) -> Self {
        self.relative_threshold = threshold;
        self
    }

    /// Set the absolute pivot threshold.
    pub fn with_absolute_threshold(mut self, threshold: f64) -> Self {
        self.absolute_threshold = threshold;
        self
    }

    /// Check the configured values.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.relative_threshold) {
            return Err(EngineError::invalid_parameter(
                "relative_threshold",
                format!("{} is not within [0, 1]", self.relative_threshold),
            ));
        }
        if self.absolute_threshold < 0.0 {
            return Err(EngineError::invalid_parameter(
                "absolute_threshold",
                format!("{} is negative", self.absolute_threshold),
            ));
        }
        Ok(())
    }
}

/// A sparse matrix and right-hand side vector that can be factored and solved.
#[derive(Debug, Clone)]
pub struct SparsePivotingSolver<T> {
    matrix: SparseMatrix<T>,
    rhs: SparseVector<T>,
    row: Translation,
    column: Translation,
    markowitz: Markowitz,
    intermediate: Vec<T>,
    degeneracy: usize,
    /// Elimination steps already applied to the loaded values
    eliminated: usize,
    is_factored: bool,
    needs_reordering: bool,
}

impl<T: Scalar> Default for SparsePivotingSolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> SparsePivotingSolver<T> {
    /// Create an empty solver with the default pivot configuration.
    pub fn new() -> Self {
        Self::with_config(PivotConfig::default())
    }

    /// Create an empty solver.
    pub fn with_config(config: PivotConfig) -> Self {
        Self {
            matrix: SparseMatrix::new(),
            rhs: SparseVector::new(),
            row: Translation::new(),
            column: Translation::new(),
            markowitz: Markowitz::new(&config),
            intermediate: Vec::new(),
            degeneracy: 0,
            eliminated: 0,
            is_factored: false,
            needs_reordering: true,
        }
    }

    /// Number of equations.
    pub fn size(&self) -> usize {
        self.matrix.size().max(self.rhs.length())
    }

    /// Whether the last factorization succeeded and nothing was reset since.
    pub fn is_factored(&self) -> bool {
        self.is_factored
    }

    /// Whether the next [`order_and_factor`](Self::order_and_factor) will
    /// search for new pivots.
    pub fn needs_reordering(&self) -> bool {
        self.needs_reordering
    }

    /// Force (or cancel) a pivot search on the next factorization.
    pub fn set_needs_reordering(&mut self, value: bool) {
        self.needs_reordering = value;
    }

    /// Number of trailing equations excluded from elimination.
    pub fn degeneracy(&self) -> usize {
        self.degeneracy
    }

    pub fn set_degeneracy(&mut self, degeneracy: usize) {
        if degeneracy != self.degeneracy {
            self.degeneracy = degeneracy;
            self.needs_reordering = true;
        }
    }

    /// Number of equations that take part in elimination.
    fn order(&self) -> usize {
        self.size().saturating_sub(self.degeneracy)
    }

    /// The internal (factored) matrix.
    pub fn matrix(&self) -> &SparseMatrix<T> {
        &self.matrix
    }

    /// The internal right-hand side.
    pub fn rhs_vector(&self) -> &SparseVector<T> {
        &self.rhs
    }

    pub fn external_to_internal(&self, location: MatrixLocation) -> MatrixLocation {
        MatrixLocation::new(self.row.to_internal(location.row), self.column.to_internal(location.column))
    }

    pub fn internal_to_external(&self, location: MatrixLocation) -> MatrixLocation {
        MatrixLocation::new(self.row.to_external(location.row), self.column.to_external(location.column))
    }

    /// Find or create the element at an external location.
    pub fn get_element(&mut self, location: MatrixLocation) -> Result<ElementId> {
        let internal = self.external_to_internal(location);
        if let Some(id) = self.matrix.find_element(internal) {
            return Ok(id);
        }
        self.needs_reordering = true;
        self.matrix.get_element(internal)
    }

    /// Find the element at an external location.
    pub fn find_element(&self, location: MatrixLocation) -> Option<ElementId> {
        self.matrix.find_element(self.external_to_internal(location))
    }

    /// Remove the element at an external location.
    pub fn remove_element(&mut self, location: MatrixLocation) -> bool {
        let removed = self.matrix.remove_element(self.external_to_internal(location));
        if removed {
            self.needs_reordering = true;
        }
        removed
    }

    /// Find or create the right-hand side element of an external row.
    pub fn get_rhs_element(&mut self, row: usize) -> Result<ElementId> {
        self.rhs.get_element(self.row.to_internal(row))
    }

    /// Find the right-hand side element of an external row.
    pub fn find_rhs_element(&self, row: usize) -> Option<ElementId> {
        self.rhs.find_element(self.row.to_internal(row))
    }

    /// Matrix value at an external location.
    pub fn value(&self, location: MatrixLocation) -> T {
        self.matrix.value(self.external_to_internal(location))
    }

    /// Set the matrix value at an external location.
    pub fn set_value(&mut self, location: MatrixLocation, value: T) -> Result<()> {
        let id = self.get_element(location)?;
        self.matrix[id] = value;
        Ok(())
    }

    /// Right-hand side value of an external row.
    pub fn rhs_value(&self, row: usize) -> T {
        self.rhs.value(self.row.to_internal(row))
    }

    /// Set the right-hand side value of an external row.
    pub fn set_rhs_value(&mut self, row: usize, value: T) -> Result<()> {
        let id = self.get_rhs_element(row)?;
        self.rhs[id] = value;
        Ok(())
    }

    /// Add to a matrix handle.
    pub fn add_matrix(&mut self, id: ElementId, value: T) {
        self.matrix[id] += value;
    }

    /// Add to a right-hand side handle.
    pub fn add_rhs(&mut self, id: ElementId, value: T) {
        self.rhs[id] += value;
    }

    pub(crate) fn storage_mut(&mut self) -> (&mut SparseMatrix<T>, &mut SparseVector<T>) {
        (&mut self.matrix, &mut self.rhs)
    }

    /// Number of elimination steps applied since the last
    /// [`reset`](Self::reset).
    pub fn eliminated_steps(&self) -> usize {
        self.eliminated
    }

    /// Refactor with the current pivot order.
    ///
    /// Returns `Ok(false)` when a diagonal pivot is missing or zero. The
    /// steps before it stay eliminated and the solver is flagged for
    /// reordering, so a following [`order_and_factor`](Self::order_and_factor)
    /// searches pivots from the failed step on.
    ///
    /// Factoring works in place: values must only be loaded again after a
    /// [`reset`](Self::reset). Without one, factoring continues where the
    /// last call stopped.
    pub fn factor(&mut self) -> Result<bool> {
        self.is_factored = false;
        let order = self.order();
        for step in self.eliminated + 1..=order {
            let pivot = match self.matrix.find_diagonal_element(step) {
                Some(pivot) if !self.matrix[pivot].is_zero() => pivot,
                _ => {
                    debug!("Zero pivot at step {} while refactoring", step);
                    self.needs_reordering = true;
                    return Ok(false);
                }
            };
            self.eliminate(pivot)?;
            self.eliminated = step;
        }
        self.is_factored = true;
        Ok(true)
    }

    /// Factor the matrix, searching for pivots where needed.
    ///
    /// The previous pivot order is reused as long as each pivot remains
    /// admissible; from the first step where it is not, pivots are searched
    /// again. Steps already eliminated by a failed [`factor`](Self::factor)
    /// are kept. Returns the number of eliminated steps.
    pub fn order_and_factor(&mut self) -> Result<usize> {
        self.is_factored = false;
        let order = self.order();
        self.matrix.expand_to(self.size());

        let mut step = self.eliminated + 1;
        if !self.needs_reordering {
            while step <= order {
                let pivot = self.matrix.find_diagonal_element(step);
                if !self.markowitz.is_valid_pivot(&self.matrix, pivot, step, order) {
                    break;
                }
                if let Some(pivot) = pivot {
                    self.eliminate(pivot)?;
                }
                self.eliminated = step;
                step += 1;
            }
            if step > order {
                self.is_factored = true;
                return Ok(order);
            }
            debug!("Pivot at step {} is no longer admissible, reordering", step);
            self.needs_reordering = true;
        } else {
            debug!("Reordering {} equations", order);
        }

        for step in step..=order {
            self.markowitz.setup(&self.matrix, step, order);
            let Some(pivot) = self.markowitz.find_pivot(&self.matrix, step, order) else {
                return Err(EngineError::Singular {
                    row: self.row.to_external(step),
                });
            };
            self.move_pivot(pivot, step)?;
            self.eliminate(pivot)?;
            self.eliminated = step;
        }

        self.needs_reordering = false;
        self.is_factored = true;
        Ok(order)
    }

    /// Bring `pivot` onto the diagonal at `step`.
    fn move_pivot(&mut self, pivot: ElementId, step: usize) -> Result<()> {
        let MatrixLocation { row, column } = self.matrix.location_of(pivot);
        trace!("Pivot for step {} found at ({}, {})", step, row, column);
        if row != step {
            self.matrix.swap_rows(row, step)?;
            self.rhs.swap_elements(row, step)?;
            self.row.swap(row, step);
        }
        if column != step {
            self.matrix.swap_columns(column, step)?;
            self.column.swap(column, step);
        }
        Ok(())
    }

    /// One elimination step around `pivot`, creating fill-ins as needed.
    fn eliminate(&mut self, pivot: ElementId) -> Result<()> {
        let value = self.matrix[pivot];
        if value.is_zero() {
            return Err(EngineError::Singular {
                row: self.row.to_external(self.matrix.row_of(pivot)),
            });
        }
        let reciprocal = value.recip();
        self.matrix[pivot] = reciprocal;

        let mut upper = self.matrix.right(pivot);
        while let Some(u) = upper {
            self.matrix[u] *= reciprocal;
            let factor = self.matrix[u];
            let column = self.matrix.column_of(u);

            let mut sub = self.matrix.below(u);
            let mut lower = self.matrix.below(pivot);
            while let Some(l) = lower {
                let row = self.matrix.row_of(l);
                while let Some(s) = sub {
                    if self.matrix.row_of(s) >= row {
                        break;
                    }
                    sub = self.matrix.below(s);
                }
                let target = match sub {
                    Some(s) if self.matrix.row_of(s) == row => s,
                    _ => {
                        trace!("Fill-in at ({}, {})", row, column);
                        self.matrix.get_element(MatrixLocation::new(row, column))?
                    }
                };
                let contribution = factor * self.matrix[l];
                self.matrix[target] -= contribution;
                sub = self.matrix.below(target);
                lower = self.matrix.below(l);
            }
            upper = self.matrix.right(u);
        }
        Ok(())
    }

    fn check_solution(&mut self, solution: &[T]) -> Result<usize> {
        if !self.is_factored {
            return Err(EngineError::NotFactored);
        }
        let size = self.size();
        if solution.len() != size + 1 {
            return Err(EngineError::size_mismatch(size + 1, solution.len()));
        }
        self.intermediate.clear();
        self.intermediate.resize(size + 1, T::zero());
        Ok(size)
    }

    fn pivot(&self, step: usize) -> Result<ElementId> {
        self.matrix.find_diagonal_element(step).ok_or(EngineError::NotFactored)
    }

    /// Load the right-hand side into the intermediate vector and apply `L⁻¹`.
    ///
    /// The trailing degenerate unknowns are read from `solution`.
    pub fn forward_substitute(&mut self, solution: &[T]) -> Result<()> {
        let size = self.check_solution(solution)?;
        let order = self.order();

        for (index, value) in self.rhs.iter() {
            if index > order {
                break;
            }
            self.intermediate[index] = value;
        }
        for index in order + 1..=size {
            self.intermediate[index] = solution[self.column.to_external(index)];
        }

        for step in 1..=order {
            let mut temp = self.intermediate[step];
            if temp.is_zero() {
                continue;
            }
            let pivot = self.pivot(step)?;
            temp *= self.matrix[pivot];
            self.intermediate[step] = temp;
            let mut cursor = self.matrix.below(pivot);
            while let Some(id) = cursor {
                let row = self.matrix.row_of(id);
                if row > order {
                    break;
                }
                let contribution = temp * self.matrix[id];
                self.intermediate[row] -= contribution;
                cursor = self.matrix.below(id);
            }
        }
        Ok(())
    }

    /// Apply `U⁻¹` to the intermediate vector and write the result to
    /// `solution` in external order.
    pub fn backward_substitute(&mut self, solution: &mut [T]) -> Result<()> {
        if !self.is_factored {
            return Err(EngineError::NotFactored);
        }
        let size = self.size();
        if solution.len() != size + 1 || self.intermediate.len() != size + 1 {
            return Err(EngineError::size_mismatch(size + 1, solution.len()));
        }
        let order = self.order();

        for step in (1..=order).rev() {
            let mut temp = self.intermediate[step];
            let pivot = self.pivot(step)?;
            let mut cursor = self.matrix.right(pivot);
            while let Some(id) = cursor {
                temp -= self.matrix[id] * self.intermediate[self.matrix.column_of(id)];
                cursor = self.matrix.right(id);
            }
            self.intermediate[step] = temp;
        }

        self.column.unscramble(&self.intermediate, solution);
        Ok(())
    }

    /// Solve `A x = b`.
    pub fn solve(&mut self, solution: &mut [T]) -> Result<()> {
        self.forward_substitute(solution)?;
        self.backward_substitute(solution)
    }

    /// Solve `Aᵀ x = b`.
    pub fn solve_transposed(&mut self, solution: &mut [T]) -> Result<()> {
        let size = self.check_solution(solution)?;
        let order = self.order();

        for index in order + 1..=size {
            self.intermediate[index] = solution[self.column.to_external(index)];
        }
        for (index, value) in self.rhs.iter() {
            if index > order {
                break;
            }
            let target = self.column.to_internal(self.row.to_external(index));
            self.intermediate[target] = value;
        }

        for step in 1..=order {
            let temp = self.intermediate[step];
            if temp.is_zero() {
                continue;
            }
            let mut cursor = self.matrix.right(self.pivot(step)?);
            while let Some(id) = cursor {
                let column = self.matrix.column_of(id);
                if column > order {
                    break;
                }
                let contribution = temp * self.matrix[id];
                self.intermediate[column] -= contribution;
                cursor = self.matrix.right(id);
            }
        }

        for step in (1..=order).rev() {
            let mut temp = self.intermediate[step];
            let pivot = self.pivot(step)?;
            let mut cursor = self.matrix.below(pivot);
            while let Some(id) = cursor {
                let row = self.matrix.row_of(id);
                if row > order {
                    break;
                }
                temp -= self.intermediate[row] * self.matrix[id];
                cursor = self.matrix.below(id);
            }
            self.intermediate[step] = temp * self.matrix[pivot];
        }

        self.row.unscramble(&self.intermediate, solution);
        Ok(())
    }

    /// Contribution of the eliminated unknowns to an external degenerate row.
    ///
    /// Sums the factored values of the row over the eliminated columns,
    /// weighted by the intermediate solution of the last substitution.
    pub fn compute_degenerate_contribution(&self, index: usize) -> T {
        let order = self.order();
        let mut result = T::zero();
        let mut cursor = self.matrix.first_in_row(self.row.to_internal(index));
        while let Some(id) = cursor {
            let column = self.matrix.column_of(id);
            if column > order {
                break;
            }
            if let Some(&value) = self.intermediate.get(column) {
                result += self.matrix[id] * value;
            }
            cursor = self.matrix.right(id);
        }
        result
    }

    /// Zero the matrix and right-hand side, keeping the structure.
    pub fn reset(&mut self) {
        self.matrix.reset();
        self.rhs.reset();
        self.eliminated = 0;
        self.is_factored = false;
    }

    /// Drop all elements and pivoting information.
    pub fn clear(&mut self) {
        self.matrix.clear();
        self.rhs.clear();
        self.row.clear();
        self.column.clear();
        self.intermediate.clear();
        self.degeneracy = 0;
        self.eliminated = 0;
        self.is_factored = false;
        self.needs_reordering = true;
    }
}

impl<T: Scalar> LoadSolver<T> for SparsePivotingSolver<T> {
    fn get_element(&mut self, location: MatrixLocation) -> Result<ElementId> {
        SparsePivotingSolver::get_element(self, location)
    }

    fn find_element(&mut self, location: MatrixLocation) -> Option<ElementId> {
        SparsePivotingSolver::find_element(self, location)
    }

    fn get_rhs_element(&mut self, row: usize) -> Result<ElementId> {
        SparsePivotingSolver::get_rhs_element(self, row)
    }

    fn find_rhs_element(&mut self, row: usize) -> Option<ElementId> {
        SparsePivotingSolver::find_rhs_element(self, row)
    }

    fn factorizer(&mut self) -> Result<&mut dyn FactorSolver<T>> {
        Ok(self)
    }
}

impl<T: Scalar> LoadTarget<T> for SparsePivotingSolver<T> {
    fn matrix(&mut self, id: ElementId) -> &mut T {
        &mut self.matrix[id]
    }

    fn rhs(&mut self, id: ElementId) -> &mut T {
        &mut self.rhs[id]
    }
}

impl<T: Scalar> FactorSolver<T> for SparsePivotingSolver<T> {
    fn size(&self) -> usize {
        SparsePivotingSolver::size(self)
    }

    fn factor(&mut self) -> Result<bool> {
        SparsePivotingSolver::factor(self)
    }

    fn order_and_factor(&mut self) -> Result<usize> {
        SparsePivotingSolver::order_and_factor(self)
    }

    fn solve(&mut self, solution: &mut [T]) -> Result<()> {
        SparsePivotingSolver::solve(self, solution)
    }

    fn solve_transposed(&mut self, solution: &mut [T]) -> Result<()> {
        SparsePivotingSolver::solve_transposed(self, solution)
    }

    fn reset(&mut self) {
        SparsePivotingSolver::reset(self)
    }
}

impl<T: Scalar> fmt::Display for SparsePivotingSolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pivoting solver ({}x{})", self.size(), self.size() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64;

    fn loc(row: usize, column: usize) -> MatrixLocation {
        MatrixLocation::new(row, column)
    }

    fn load(solver: &mut SparsePivotingSolver<f64>, a: &[&[f64]], b: &[f64]) {
        for (r, row) in a.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    solver.set_value(loc(r + 1, c + 1), value).unwrap();
                }
            }
        }
        for (r, &value) in b.iter().enumerate() {
            solver.set_rhs_value(r + 1, value).unwrap();
        }
    }

    fn residual(a: &[&[f64]], x: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(row, &rhs)| {
                let ax: f64 = row.iter().zip(&x[1..]).map(|(a, x)| a * x).sum();
                (ax - rhs).abs()
            })
            .fold(0.0, f64::max)
    }

    const SYSTEM: [&[f64]; 4] = [
        &[0.0, 2.0, 0.0, 1.0],
        &[3.0, 0.0, 1.0, 0.0],
        &[0.0, 1.0, 4.0, 0.0],
        &[1.0, 0.0, 0.0, 5.0],
    ];

    #[test]
    fn test_solve_requires_pivoting() {
        let b = [1.0, 2.0, 3.0, 4.0];
        let mut solver = SparsePivotingSolver::new();
        load(&mut solver, &SYSTEM, &b);
        assert_eq!(solver.order_and_factor().unwrap(), 4);
        assert!(!solver.needs_reordering());

        let mut x = vec![0.0; 5];
        solver.solve(&mut x).unwrap();
        assert!(residual(&SYSTEM, &x, &b) < 1e-12);
    }

    #[test]
    fn test_refactor_reuses_order() {
        let b = [1.0, 0.0, -1.0, 2.0];
        let mut solver = SparsePivotingSolver::new();
        load(&mut solver, &SYSTEM, &b);
        solver.order_and_factor().unwrap();
        let elements = solver.matrix().element_count();

        // Reload the same structure with scaled values
        solver.reset();
        let scaled: Vec<Vec<f64>> = SYSTEM.iter().map(|r| r.iter().map(|v| 2.0 * v).collect()).collect();
        let scaled: Vec<&[f64]> = scaled.iter().map(|r| r.as_slice()).collect();
        load(&mut solver, &scaled, &b);
        assert!(!solver.needs_reordering());
        assert!(solver.factor().unwrap());
        assert_eq!(solver.matrix().element_count(), elements);

        let mut x = vec![0.0; 5];
        solver.solve(&mut x).unwrap();
        assert!(residual(&scaled, &x, &b) < 1e-12);
    }

    #[test]
    fn test_fill_in() {
        // Arrow matrix: eliminating the dense corner first fills everything in
        let a: [&[f64]; 3] = [&[4.0, 1.0, 1.0], &[1.0, 3.0, 0.0], &[1.0, 0.0, 2.0]];
        let b = [6.0, 4.0, 3.0];
        let mut solver = SparsePivotingSolver::new();
        load(&mut solver, &a, &b);
        solver.order_and_factor().unwrap();
        let mut x = vec![0.0; 4];
        solver.solve(&mut x).unwrap();
        for i in 1..=3 {
            assert_abs_diff_eq!(x[i], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_factor_zero_pivot() {
        let mut solver = SparsePivotingSolver::new();
        solver.set_value(loc(1, 2), 1.0).unwrap();
        solver.set_value(loc(2, 1), 1.0).unwrap();
        assert!(!solver.factor().unwrap());
        assert!(!solver.is_factored());
        assert_eq!(solver.order_and_factor().unwrap(), 2);
    }

    #[test]
    fn test_reorder_after_partial_refactor() {
        // The second pivot only vanishes after the first step is eliminated
        let a: [&[f64]; 3] = [&[1.0, 1.0, 0.0], &[1.0, 1.0, 1.0], &[0.0, 1.0, 1.0]];
        let b = [2.0, 3.0, 2.0];
        let mut solver = SparsePivotingSolver::new();
        load(&mut solver, &a, &b);
        assert!(!solver.factor().unwrap());
        assert_eq!(solver.eliminated_steps(), 1);
        assert!(solver.needs_reordering());

        assert_eq!(solver.order_and_factor().unwrap(), 3);
        let mut x = vec![0.0; 4];
        solver.solve(&mut x).unwrap();
        for i in 1..=3 {
            assert_abs_diff_eq!(x[i], 1.0, epsilon = 1e-12);
        }

        // A reload starts over from the first step
        solver.reset();
        assert_eq!(solver.eliminated_steps(), 0);
        load(&mut solver, &a, &b);
        assert!(solver.factor().unwrap());
        solver.solve(&mut x).unwrap();
        assert!(residual(&a, &x, &b) < 1e-12);
    }

    #[test]
    fn test_singular() {
        let mut solver = SparsePivotingSolver::new();
        solver.set_value(loc(1, 1), 1.0).unwrap();
        solver.set_value(loc(2, 1), 1.0).unwrap();
        solver.set_rhs_value(2, 1.0).unwrap();
        assert_eq!(solver.order_and_factor(), Err(EngineError::Singular { row: 2 }));
    }

    #[test]
    fn test_solve_errors() {
        let mut solver = SparsePivotingSolver::new();
        solver.set_value(loc(1, 1), 2.0).unwrap();
        let mut x = vec![0.0; 2];
        assert_eq!(solver.solve(&mut x), Err(EngineError::NotFactored));
        solver.order_and_factor().unwrap();
        let mut wrong = vec![0.0; 3];
        assert_eq!(solver.solve(&mut wrong), Err(EngineError::size_mismatch(2, 3)));
    }

    #[test]
    fn test_solve_transposed() {
        let b = [1.0, 2.0, 3.0, 4.0];
        let mut solver = SparsePivotingSolver::new();
        load(&mut solver, &SYSTEM, &b);
        solver.order_and_factor().unwrap();
        let mut x = vec![0.0; 5];
        solver.solve_transposed(&mut x).unwrap();

        let transposed: Vec<Vec<f64>> = (0..4).map(|c| (0..4).map(|r| SYSTEM[r][c]).collect()).collect();
        let transposed: Vec<&[f64]> = transposed.iter().map(|r| r.as_slice()).collect();
        assert!(residual(&transposed, &x, &b) < 1e-12);
    }

    #[test]
    fn test_partial_decomposition() {
        let mut solver = SparsePivotingSolver::new();
        solver.set_degeneracy(2);
        solver.set_value(loc(1, 2), 2.0).unwrap();
        solver.set_value(loc(2, 1), 1.0).unwrap();
        solver.set_value(loc(1, 3), 4.0).unwrap();
        solver.set_value(loc(4, 2), 4.0).unwrap();
        solver.set_value(loc(3, 3), 2.0).unwrap();
        solver.set_value(loc(3, 4), 4.0).unwrap();
        solver.set_value(loc(4, 4), 1.0).unwrap();

        assert_eq!(solver.order_and_factor().unwrap(), 2);

        // The trailing block holds the Schur complement
        assert_abs_diff_eq!(solver.value(loc(3, 3)), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solver.value(loc(3, 4)), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solver.value(loc(4, 3)), -8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solver.value(loc(4, 4)), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_partial_solve() {
        let mut solver = SparsePivotingSolver::new();
        solver.set_degeneracy(2);
        solver.set_value(loc(1, 1), 1.0).unwrap();
        solver.set_value(loc(1, 3), 2.0).unwrap();
        solver.set_value(loc(1, 4), 3.0).unwrap();
        solver.set_rhs_value(1, 1.0).unwrap();
        solver.set_value(loc(2, 2), 2.0).unwrap();
        solver.set_value(loc(2, 3), 4.0).unwrap();
        solver.set_rhs_value(2, 2.0).unwrap();
        assert!(solver.factor().unwrap());

        let mut x = vec![0.0; 5];
        solver.solve(&mut x).unwrap();
        assert_abs_diff_eq!(x[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], 1.0, epsilon = 1e-12);

        x[3] = 1.0;
        x[4] = 2.0;
        solver.solve(&mut x).unwrap();
        assert_abs_diff_eq!(x[1], -7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_contribution() {
        let mut solver = SparsePivotingSolver::new();
        solver.set_value(loc(1, 1), 1.0).unwrap();
        solver.set_value(loc(2, 2), 1.0).unwrap();
        solver.set_value(loc(2, 3), 1.0).unwrap();
        solver.set_value(loc(3, 1), 1.0).unwrap();
        solver.set_value(loc(3, 2), 1.0).unwrap();
        solver.set_value(loc(3, 3), 1.0).unwrap();
        solver.set_rhs_value(1, 2.0).unwrap();
        solver.set_rhs_value(2, 3.0).unwrap();
        solver.set_degeneracy(1);
        assert!(solver.factor().unwrap());
        assert_eq!(solver.value(loc(3, 3)), 0.0);

        let mut x = vec![0.0; 4];
        x[3] = 1.0;
        solver.solve(&mut x).unwrap();
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], 2.0, epsilon = 1e-12);
        // Row 3 still sees x1 + x2 from the eliminated unknowns
        assert_abs_diff_eq!(solver.compute_degenerate_contribution(3), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_complex_solve() {
        let j = Complex64::new(0.0, 1.0);
        let mut solver = SparsePivotingSolver::<Complex64>::new();
        solver.set_value(loc(1, 1), 1.0 + j).unwrap();
        solver.set_value(loc(1, 2), -j).unwrap();
        solver.set_value(loc(2, 1), -j).unwrap();
        solver.set_value(loc(2, 2), Complex64::new(2.0, 0.0)).unwrap();
        solver.set_rhs_value(1, Complex64::new(1.0, 0.0)).unwrap();
        solver.order_and_factor().unwrap();

        let mut x = vec![Complex64::new(0.0, 0.0); 3];
        solver.solve(&mut x).unwrap();
        let r1 = (1.0 + j) * x[1] - j * x[2] - 1.0;
        let r2 = -j * x[1] + 2.0 * x[2];
        assert!(r1.norm() < 1e-12);
        assert!(r2.norm() < 1e-12);
    }

    #[test]
    fn test_factorizer_and_clear() {
        let mut solver = SparsePivotingSolver::<f64>::new();
        solver.set_value(loc(1, 1), 2.0).unwrap();
        solver.set_rhs_value(1, 4.0).unwrap();
        {
            let load: &mut dyn LoadSolver<f64> = &mut solver;
            let factorizer = load.factorizer().unwrap();
            assert_eq!(factorizer.order_and_factor().unwrap(), 1);
            let mut x = vec![0.0; 2];
            factorizer.solve(&mut x).unwrap();
            assert_eq!(x[1], 2.0);
        }
        solver.clear();
        assert_eq!(solver.size(), 0);
        assert!(solver.needs_reordering());
        assert_eq!(solver.to_string(), "Pivoting solver (0x1)");
    }
}
