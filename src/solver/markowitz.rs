//! Markowitz pivot selection.
//!
//! A pivot candidate is admissible when its magnitude exceeds the absolute
//! threshold and is at least the relative threshold times the largest
//! magnitude remaining in its column. Among admissible candidates the one
//! with the smallest Markowitz product `(r - 1)(c - 1)` wins, where `r` and
//! `c` count the elements in its row and column of the active submatrix.
//! Ties go to the larger magnitude ratio, then to the lowest (row, column).
//! Diagonal candidates are always tried before the rest of the submatrix.

use std::cmp::Ordering;

use crate::algebra::{ElementId, Scalar, SparseMatrix};

use super::PivotConfig;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: ElementId,
    product: usize,
    ratio: f64,
    row: usize,
    column: usize,
}

impl Candidate {
    /// `Less` means `self` is the better pivot.
    fn rank(&self, other: &Candidate) -> Ordering {
        self.product
            .cmp(&other.product)
            .then_with(|| other.ratio.partial_cmp(&self.ratio).unwrap_or(Ordering::Equal))
            .then_with(|| (self.row, self.column).cmp(&(other.row, other.column)))
    }
}

/// Pivot search over the active submatrix `[step, order]`.
#[derive(Debug, Clone)]
pub struct Markowitz {
    relative_threshold: f64,
    absolute_threshold: f64,
    row_counts: Vec<usize>,
    column_counts: Vec<usize>,
    column_max: Vec<f64>,
}

impl Markowitz {
    pub fn new(config: &PivotConfig) -> Self {
        Self {
            relative_threshold: config.relative_threshold,
            absolute_threshold: config.absolute_threshold,
            row_counts: Vec::new(),
            column_counts: Vec::new(),
            column_max: Vec::new(),
        }
    }

    /// Recount the active submatrix starting at `step`.
    pub fn setup<T: Scalar>(&mut self, matrix: &SparseMatrix<T>, step: usize, order: usize) {
        let size = matrix.size();
        self.row_counts.clear();
        self.row_counts.resize(size + 1, 0);
        self.column_counts.clear();
        self.column_counts.resize(size + 1, 0);
        self.column_max.clear();
        self.column_max.resize(size + 1, 0.0);

        for column in step..=order {
            let mut cursor = matrix.first_in_column(column);
            while let Some(id) = cursor {
                let row = matrix.row_of(id);
                if row > order {
                    break;
                }
                if row >= step {
                    self.row_counts[row] += 1;
                    self.column_counts[column] += 1;
                    let magnitude = matrix[id].magnitude();
                    if magnitude > self.column_max[column] {
                        self.column_max[column] = magnitude;
                    }
                }
                cursor = matrix.below(id);
            }
        }
    }

    /// Whether a pivot chosen earlier is still acceptable at `step`.
    pub fn is_valid_pivot<T: Scalar>(
        &self,
        matrix: &SparseMatrix<T>,
        pivot: Option<ElementId>,
        step: usize,
        order: usize,
    ) -> bool {
        let Some(pivot) = pivot else {
            return false;
        };
        let column = matrix.column_of(pivot);
        let mut largest = 0.0f64;
        let mut cursor = matrix.first_in_column(column);
        while let Some(id) = cursor {
            let row = matrix.row_of(id);
            if row > order {
                break;
            }
            if row >= step {
                largest = largest.max(matrix[id].magnitude());
            }
            cursor = matrix.below(id);
        }
        self.admissible(matrix[pivot].magnitude(), largest)
    }

    fn admissible(&self, magnitude: f64, column_max: f64) -> bool {
        magnitude > self.absolute_threshold && magnitude >= self.relative_threshold * column_max
    }

    fn candidate<T: Scalar>(&self, matrix: &SparseMatrix<T>, id: ElementId) -> Option<Candidate> {
        let row = matrix.row_of(id);
        let column = matrix.column_of(id);
        let magnitude = matrix[id].magnitude();
        let largest = self.column_max[column];
        if !self.admissible(magnitude, largest) {
            return None;
        }
        Some(Candidate {
            id,
            product: (self.row_counts[row] - 1) * (self.column_counts[column] - 1),
            ratio: magnitude / largest,
            row,
            column,
        })
    }

    /// Find a pivot in the active submatrix, or `None` if it is singular.
    ///
    /// Counts must be current for `step` (see [`Markowitz::setup`]).
    pub fn find_pivot<T: Scalar>(&self, matrix: &SparseMatrix<T>, step: usize, order: usize) -> Option<ElementId> {
        let pick = |best: Option<Candidate>, next: Candidate| match best {
            Some(b) if b.rank(&next) != Ordering::Greater => Some(b),
            _ => Some(next),
        };

        let diagonal = (step..=order)
            .filter_map(|i| matrix.find_diagonal_element(i))
            .filter_map(|id| self.candidate(matrix, id))
            .fold(None, pick);
        if let Some(best) = diagonal {
            return Some(best.id);
        }

        let mut best = None;
        for column in step..=order {
            let mut cursor = matrix.first_in_column(column);
            while let Some(id) = cursor {
                let row = matrix.row_of(id);
                if row > order {
                    break;
                }
                if row >= step {
                    if let Some(candidate) = self.candidate(matrix, id) {
                        best = pick(best, candidate);
                    }
                }
                cursor = matrix.below(id);
            }
        }
        best.map(|c| c.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::MatrixLocation;

    fn build(entries: &[(usize, usize, f64)]) -> SparseMatrix<f64> {
        let mut m = SparseMatrix::new();
        for &(r, c, v) in entries {
            m.set_value(MatrixLocation::new(r, c), v).unwrap();
        }
        m
    }

    #[test]
    fn test_prefers_sparse_diagonal() {
        // Row 1 is dense, row 3 only touches the diagonal
        let m = build(&[
            (1, 1, 4.0),
            (1, 2, 1.0),
            (1, 3, 1.0),
            (2, 1, 1.0),
            (2, 2, 4.0),
            (3, 3, 4.0),
        ]);
        let mut markowitz = Markowitz::new(&PivotConfig::default());
        markowitz.setup(&m, 1, 3);
        let pivot = markowitz.find_pivot(&m, 1, 3).unwrap();
        assert_eq!(m.location_of(pivot), MatrixLocation::new(3, 3));
    }

    #[test]
    fn test_off_diagonal_when_diagonal_missing() {
        let m = build(&[(1, 2, 2.0), (2, 1, 1.0)]);
        let mut markowitz = Markowitz::new(&PivotConfig::default());
        markowitz.setup(&m, 1, 2);
        let pivot = markowitz.find_pivot(&m, 1, 2).unwrap();
        // Equal products and ratios, lowest row wins
        assert_eq!(m.location_of(pivot), MatrixLocation::new(1, 2));
    }

    #[test]
    fn test_relative_threshold_rejects_tiny_diagonal() {
        let m = build(&[(1, 1, 1e-9), (2, 1, 1.0), (1, 2, 1.0)]);
        let mut markowitz = Markowitz::new(&PivotConfig::default());
        markowitz.setup(&m, 1, 2);
        assert!(!markowitz.is_valid_pivot(&m, m.find_diagonal_element(1), 1, 2));
        let pivot = markowitz.find_pivot(&m, 1, 2).unwrap();
        assert_ne!(m.location_of(pivot), MatrixLocation::new(1, 1));
    }

    #[test]
    fn test_singular_submatrix() {
        let m = build(&[(1, 1, 1.0), (2, 1, 1.0)]);
        let mut markowitz = Markowitz::new(&PivotConfig::default());
        markowitz.setup(&m, 2, 2);
        assert!(markowitz.find_pivot(&m, 2, 2).is_none());
    }
}
