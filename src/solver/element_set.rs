//! Pre-bound groups of matrix and right-hand side handles.

use crate::algebra::{ElementId, MatrixLocation, Scalar};
use crate::error::{EngineError, Result};

use super::{LoadSolver, LoadTarget};

/// A fixed list of handles bound once and loaded together.
///
/// Stamps usually touch the same handful of locations every iteration;
/// binding them into a set keeps the load code down to one call.
#[derive(Debug, Clone, Default)]
pub struct ElementSet {
    matrix: Vec<ElementId>,
    rhs: Vec<ElementId>,
}

impl ElementSet {
    /// Bind `locations` and `rows` (external indices) on `solver`.
    pub fn new<T, S>(
        solver: &mut S,
        locations: &[MatrixLocation],
        rows: &[usize],
    ) -> Result<Self>
    where
        T: Scalar,
        S: LoadSolver<T> + ?Sized,
    {
        let matrix = locations
            .iter()
            .map(|&location| solver.get_element(location))
            .collect::<Result<Vec<_>>>()?;
        let rhs = rows
            .iter()
            .map(|&row| solver.get_rhs_element(row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { matrix, rhs })
    }

    pub fn matrix_handles(&self) -> &[ElementId] {
        &self.matrix
    }

    pub fn rhs_handles(&self) -> &[ElementId] {
        &self.rhs
    }

    /// Add `values` to the matrix handles, in binding order.
    pub fn add_matrix<T, L>(&self, target: &mut L, values: &[T]) -> Result<()>
    where
        T: Scalar,
        L: LoadTarget<T> + ?Sized,
    {
        if values.len() != self.matrix.len() {
            return Err(EngineError::size_mismatch(self.matrix.len(), values.len()));
        }
        for (&id, &value) in self.matrix.iter().zip(values) {
            *target.matrix(id) += value;
        }
        Ok(())
    }

    /// Add `values` to the right-hand side handles, in binding order.
    pub fn add_rhs<T, L>(&self, target: &mut L, values: &[T]) -> Result<()>
    where
        T: Scalar,
        L: LoadTarget<T> + ?Sized,
    {
        if values.len() != self.rhs.len() {
            return Err(EngineError::size_mismatch(self.rhs.len(), values.len()));
        }
        for (&id, &value) in self.rhs.iter().zip(values) {
            *target.rhs(id) += value;
        }
        Ok(())
    }

    /// Add matrix and right-hand side values at once.
    pub fn add<T, L>(&self, target: &mut L, matrix: &[T], rhs: &[T]) -> Result<()>
    where
        T: Scalar,
        L: LoadTarget<T> + ?Sized,
    {
        self.add_matrix(target, matrix)?;
        self.add_rhs(target, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SparsePivotingSolver;

    #[test]
    fn test_conductance_stamp() {
        let mut solver = SparsePivotingSolver::<f64>::new();
        let locations = [(1, 1), (1, 2), (2, 1), (2, 2)].map(MatrixLocation::from);
        let set = ElementSet::new::<f64, _>(&mut solver, &locations, &[1, 0]).unwrap();
        assert_eq!(set.rhs_handles()[1], ElementId::TRASH);

        let g = 0.25;
        set.add(&mut solver, &[g, -g, -g, g], &[1.0, 1.0]).unwrap();
        set.add_matrix(&mut solver, &[g, -g, -g, g]).unwrap();
        assert_eq!(solver.value(MatrixLocation::new(1, 2)), -0.5);
        assert_eq!(solver.value(MatrixLocation::new(2, 2)), 0.5);
        assert_eq!(solver.rhs_value(1), 1.0);
        assert_eq!(
            set.add_rhs(&mut solver, &[1.0]),
            Err(EngineError::size_mismatch(2, 1))
        );
    }
}
