//! Sparse matrix with elements linked along rows and columns.
//!
//! Every element sits in two sorted lists at once: its row (ordered by
//! column) and its column (ordered by row). Swapping two rows relinks the
//! affected elements inside their column lists and exchanges the row
//! headers; swapping columns is the mirror image.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::error::{EngineError, Result};

use super::{ElementId, MatrixLocation, Scalar};

/// The two kinds of lists an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    /// Along a row, ordered by column (left/right)
    Row = 0,
    /// Along a column, ordered by row (above/below)
    Column = 1,
}

#[derive(Debug, Clone)]
struct MatrixElement<T> {
    row: usize,
    column: usize,
    value: T,
    prev: [Option<ElementId>; 2],
    next: [Option<ElementId>; 2],
    live: bool,
}

impl<T: Scalar> MatrixElement<T> {
    fn new(row: usize, column: usize) -> Self {
        Self {
            row,
            column,
            value: T::zero(),
            prev: [None; 2],
            next: [None; 2],
            live: true,
        }
    }

    /// Position of the element within a list of kind `line`.
    fn key(&self, line: Line) -> usize {
        match line {
            Line::Row => self.column,
            Line::Column => self.row,
        }
    }

    fn set_key(&mut self, line: Line, key: usize) {
        match line {
            Line::Row => self.column = key,
            Line::Column => self.row = key,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Head {
    first: Option<ElementId>,
    last: Option<ElementId>,
}

/// A square sparse matrix, 1-based, with a trash element at row or column 0.
#[derive(Debug, Clone)]
pub struct SparseMatrix<T> {
    elements: Vec<MatrixElement<T>>,
    free: Vec<ElementId>,
    /// `heads[Line::Row][r]` is row `r`, `heads[Line::Column][c]` column `c`
    heads: [Vec<Head>; 2],
    diagonal: Vec<Option<ElementId>>,
    size: usize,
    count: usize,
    fixed: bool,
}

impl<T: Scalar> Default for SparseMatrix<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> SparseMatrix<T> {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self::with_size(0)
    }

    /// Create an empty matrix with a logical size.
    pub fn with_size(size: usize) -> Self {
        Self {
            elements: vec![MatrixElement::new(0, 0)],
            free: Vec::new(),
            heads: [vec![Head::default(); size + 1], vec![Head::default(); size + 1]],
            diagonal: vec![None; size + 1],
            size,
            count: 1,
            fixed: false,
        }
    }

    /// Logical size (number of rows and columns).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of allocated elements, the trash element included.
    pub fn element_count(&self) -> usize {
        self.count
    }

    /// Lock the size; growing beyond it becomes an error.
    pub fn fix_size(&mut self, size: usize) {
        self.expand(size);
        self.fixed = true;
    }

    /// Allow the matrix to grow again.
    pub fn unfix(&mut self) {
        self.fixed = false;
    }

    fn expand(&mut self, size: usize) {
        if size <= self.size {
            return;
        }
        self.size = size;
        for heads in &mut self.heads {
            heads.resize(size + 1, Head::default());
        }
        self.diagonal.resize(size + 1, None);
    }

    /// Grow to at least `size` rows and columns, even when fixed.
    pub(crate) fn expand_to(&mut self, size: usize) {
        self.expand(size);
    }

    fn ensure_size(&mut self, index: usize) -> Result<()> {
        if index > self.size {
            if self.fixed {
                return Err(EngineError::out_of_range(index, self.size));
            }
            self.expand(index);
        }
        Ok(())
    }

    /// The trash element.
    pub fn trash(&self) -> ElementId {
        ElementId::TRASH
    }

    /// Get the element at `location`, creating it if necessary.
    pub fn get_element(&mut self, location: MatrixLocation) -> Result<ElementId> {
        let MatrixLocation { row, column } = location;
        if row == 0 || column == 0 {
            return Ok(ElementId::TRASH);
        }
        self.ensure_size(row.max(column))?;

        if row == column {
            if let Some(id) = self.diagonal[row] {
                return Ok(id);
            }
        }

        let (found, before) = self.search(Line::Row, row, column);
        if let Some(id) = found {
            return Ok(id);
        }

        let id = self.allocate(row, column);
        self.insert_after(Line::Row, row, before, id);
        let (_, above) = self.search(Line::Column, column, row);
        self.insert_after(Line::Column, column, above, id);
        if row == column {
            self.diagonal[row] = Some(id);
        }
        self.count += 1;
        Ok(id)
    }

    /// Find the element at `location` without creating it.
    pub fn find_element(&self, location: MatrixLocation) -> Option<ElementId> {
        let MatrixLocation { row, column } = location;
        if row > self.size || column > self.size {
            return None;
        }
        if row == 0 || column == 0 {
            return Some(ElementId::TRASH);
        }
        if row == column {
            return self.diagonal[row];
        }
        self.search(Line::Row, row, column).0
    }

    /// Remove the element at `location`. Returns `false` if there was none.
    pub fn remove_element(&mut self, location: MatrixLocation) -> bool {
        if location.row == 0 || location.column == 0 {
            return false;
        }
        let Some(id) = self.find_element(location) else {
            return false;
        };
        self.unlink(Line::Row, location.row, id);
        self.unlink(Line::Column, location.column, id);
        if location.row == location.column {
            self.diagonal[location.row] = None;
        }
        self.elements[id.0].live = false;
        self.free.push(id);
        self.count -= 1;
        true
    }

    /// Value at `location`, zero when no element is stored.
    pub fn value(&self, location: MatrixLocation) -> T {
        self.find_element(location)
            .map(|id| self.elements[id.0].value)
            .unwrap_or_default()
    }

    /// Set the value at `location`. Writing zero never allocates.
    pub fn set_value(&mut self, location: MatrixLocation, value: T) -> Result<()> {
        if value.is_zero() {
            if let Some(id) = self.find_element(location) {
                self.elements[id.0].value = T::zero();
            }
        } else {
            let id = self.get_element(location)?;
            self.elements[id.0].value = value;
        }
        Ok(())
    }

    /// Diagonal element of row/column `index`, if present.
    pub fn find_diagonal_element(&self, index: usize) -> Option<ElementId> {
        self.diagonal.get(index).copied().flatten()
    }

    /// Location of a live element.
    pub fn location_of(&self, id: ElementId) -> MatrixLocation {
        let element = &self.elements[id.0];
        MatrixLocation::new(element.row, element.column)
    }

    /// Row of a live element.
    pub fn row_of(&self, id: ElementId) -> usize {
        self.elements[id.0].row
    }

    /// Column of a live element.
    pub fn column_of(&self, id: ElementId) -> usize {
        self.elements[id.0].column
    }

    /// Whether the handle refers to a live element.
    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.get(id.0).map(|e| e.live).unwrap_or(false)
    }

    pub fn first_in_row(&self, row: usize) -> Option<ElementId> {
        self.heads[Line::Row as usize].get(row).and_then(|h| h.first)
    }

    pub fn last_in_row(&self, row: usize) -> Option<ElementId> {
        self.heads[Line::Row as usize].get(row).and_then(|h| h.last)
    }

    pub fn first_in_column(&self, column: usize) -> Option<ElementId> {
        self.heads[Line::Column as usize].get(column).and_then(|h| h.first)
    }

    pub fn last_in_column(&self, column: usize) -> Option<ElementId> {
        self.heads[Line::Column as usize].get(column).and_then(|h| h.last)
    }

    /// Next element to the right in the same row.
    pub fn right(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].next[Line::Row as usize]
    }

    /// Previous element to the left in the same row.
    pub fn left(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].prev[Line::Row as usize]
    }

    /// Next element below in the same column.
    pub fn below(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].next[Line::Column as usize]
    }

    /// Previous element above in the same column.
    pub fn above(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].prev[Line::Column as usize]
    }

    /// Iterate over `(location, value)` of all non-trash elements, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (MatrixLocation, T)> + '_ {
        (1..=self.size).flat_map(move |row| {
            std::iter::successors(self.first_in_row(row), move |&id| self.right(id))
                .map(move |id| (self.location_of(id), self.elements[id.0].value))
        })
    }

    /// Mutable access to the value of every live element, trash included.
    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = (ElementId, &mut T)> {
        self.elements
            .iter_mut()
            .enumerate()
            .filter(|(_, e)| e.live)
            .map(|(i, e)| (ElementId(i), &mut e.value))
    }

    /// Swap two rows.
    pub fn swap_rows(&mut self, row1: usize, row2: usize) -> Result<()> {
        self.swap_rows_with(row1, row2, |_, _| {})
    }

    /// Swap two rows and report the swap to `listener` as `(low, high)`.
    pub fn swap_rows_with<F>(&mut self, row1: usize, row2: usize, listener: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        self.swap_lines(Line::Row, row1, row2, listener)
    }

    /// Swap two columns.
    pub fn swap_columns(&mut self, column1: usize, column2: usize) -> Result<()> {
        self.swap_columns_with(column1, column2, |_, _| {})
    }

    /// Swap two columns and report the swap to `listener` as `(low, high)`.
    pub fn swap_columns_with<F>(&mut self, column1: usize, column2: usize, listener: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        self.swap_lines(Line::Column, column1, column2, listener)
    }

    /// Exchange two whole lines of kind `line`.
    ///
    /// The elements of both lines are walked together in order of their
    /// cross index; each pair (or lone element) is relinked inside its
    /// crossing list, then the line headers are exchanged.
    fn swap_lines<F>(&mut self, line: Line, index1: usize, index2: usize, mut listener: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        if index1 == 0 || index2 == 0 {
            return Err(EngineError::out_of_range(0, self.size));
        }
        if index1 == index2 {
            return Ok(());
        }
        let (index1, index2) = if index2 < index1 {
            (index2, index1)
        } else {
            (index1, index2)
        };
        self.ensure_size(index2)?;

        let cross = match line {
            Line::Row => Line::Column,
            Line::Column => Line::Row,
        };
        let l = line as usize;
        let mut e1 = self.heads[l][index1].first;
        let mut e2 = self.heads[l][index2].first;
        self.heads[l].swap(index1, index2);

        loop {
            match (e1, e2) {
                (None, None) => break,
                (Some(a), None) => {
                    let key = self.elements[a.0].key(line);
                    self.swap_in_line(cross, key, Some(a), None, index1, index2);
                    e1 = self.elements[a.0].next[l];
                }
                (None, Some(b)) => {
                    let key = self.elements[b.0].key(line);
                    self.swap_in_line(cross, key, None, Some(b), index1, index2);
                    e2 = self.elements[b.0].next[l];
                }
                (Some(a), Some(b)) => {
                    let ka = self.elements[a.0].key(line);
                    let kb = self.elements[b.0].key(line);
                    if ka < kb {
                        self.swap_in_line(cross, ka, Some(a), None, index1, index2);
                        e1 = self.elements[a.0].next[l];
                    } else if kb < ka {
                        self.swap_in_line(cross, kb, None, Some(b), index1, index2);
                        e2 = self.elements[b.0].next[l];
                    } else {
                        self.swap_in_line(cross, ka, Some(a), Some(b), index1, index2);
                        e1 = self.elements[a.0].next[l];
                        e2 = self.elements[b.0].next[l];
                    }
                }
            }
        }

        // Only elements on the two swapped lines can enter or leave the diagonal
        for index in [index1, index2] {
            self.diagonal[index] = self.search(Line::Row, index, index).0;
        }

        listener(index1, index2);
        Ok(())
    }

    /// Relink one or two elements of the list `(line, header)` so that the
    /// element at key `key1` moves to `key2` and vice versa.
    fn swap_in_line(
        &mut self,
        line: Line,
        header: usize,
        first: Option<ElementId>,
        second: Option<ElementId>,
        key1: usize,
        key2: usize,
    ) {
        let l = line as usize;
        match (first, second) {
            (None, None) => {}

            (None, Some(second)) => {
                let prev = match self.elements[second.0].prev[l] {
                    Some(prev) if self.elements[prev.0].key(line) > key1 => prev,
                    _ => {
                        self.elements[second.0].set_key(line, key1);
                        return;
                    }
                };
                let mut element = prev;
                self.unlink(line, header, second);
                while let Some(p) = self.elements[element.0].prev[l] {
                    if self.elements[p.0].key(line) <= key1 {
                        break;
                    }
                    element = p;
                }
                let before = self.elements[element.0].prev[l];
                self.insert_after(line, header, before, second);
                self.elements[second.0].set_key(line, key1);
            }

            (Some(first), None) => {
                let next = match self.elements[first.0].next[l] {
                    Some(next) if self.elements[next.0].key(line) < key2 => next,
                    _ => {
                        self.elements[first.0].set_key(line, key2);
                        return;
                    }
                };
                let mut element = next;
                self.unlink(line, header, first);
                while let Some(n) = self.elements[element.0].next[l] {
                    if self.elements[n.0].key(line) >= key2 {
                        break;
                    }
                    element = n;
                }
                self.insert_after(line, header, Some(element), first);
                self.elements[first.0].set_key(line, key2);
            }

            (Some(first), Some(second)) => {
                let first_prev = self.elements[first.0].prev[l];
                let second_next = self.elements[second.0].next[l];

                if self.elements[first.0].next[l] == Some(second) {
                    self.set_next(line, header, first_prev, Some(second));
                    self.set_prev(line, header, second_next, Some(first));
                    self.elements[first.0].next[l] = second_next;
                    self.elements[first.0].prev[l] = Some(second);
                    self.elements[second.0].prev[l] = first_prev;
                    self.elements[second.0].next[l] = Some(first);
                } else {
                    let first_next = self.elements[first.0].next[l];
                    let second_prev = self.elements[second.0].prev[l];
                    self.set_next(line, header, first_prev, Some(second));
                    self.set_prev(line, header, first_next, Some(second));
                    self.set_prev(line, header, second_next, Some(first));
                    self.set_next(line, header, second_prev, Some(first));
                    self.elements[second.0].prev[l] = first_prev;
                    self.elements[second.0].next[l] = first_next;
                    self.elements[first.0].prev[l] = second_prev;
                    self.elements[first.0].next[l] = second_next;
                }
                self.elements[first.0].set_key(line, key2);
                self.elements[second.0].set_key(line, key1);
            }
        }
    }

    /// Point `of`'s next link at `to`, or the list head when `of` is `None`.
    fn set_next(&mut self, line: Line, header: usize, of: Option<ElementId>, to: Option<ElementId>) {
        match of {
            None => self.heads[line as usize][header].first = to,
            Some(id) => self.elements[id.0].next[line as usize] = to,
        }
    }

    /// Point `of`'s previous link at `to`, or the list tail when `of` is `None`.
    fn set_prev(&mut self, line: Line, header: usize, of: Option<ElementId>, to: Option<ElementId>) {
        match of {
            None => self.heads[line as usize][header].last = to,
            Some(id) => self.elements[id.0].prev[line as usize] = to,
        }
    }

    /// Walk list `(line, header)` looking for `key`.
    ///
    /// Returns the element with that key (if any) and the last element with a
    /// smaller key, which is the insertion point.
    fn search(&self, line: Line, header: usize, key: usize) -> (Option<ElementId>, Option<ElementId>) {
        let l = line as usize;
        let mut cursor = self.heads[l][header].first;
        let mut before = None;
        while let Some(id) = cursor {
            let k = self.elements[id.0].key(line);
            if k == key {
                return (Some(id), before);
            }
            if k > key {
                break;
            }
            before = Some(id);
            cursor = self.elements[id.0].next[l];
        }
        (None, before)
    }

    /// Link `id` into list `(line, header)` right after `before`.
    fn insert_after(&mut self, line: Line, header: usize, before: Option<ElementId>, id: ElementId) {
        let l = line as usize;
        let after = match before {
            None => self.heads[l][header].first,
            Some(b) => self.elements[b.0].next[l],
        };
        self.elements[id.0].prev[l] = before;
        self.elements[id.0].next[l] = after;
        self.set_next(line, header, before, Some(id));
        self.set_prev(line, header, after, Some(id));
    }

    fn unlink(&mut self, line: Line, header: usize, id: ElementId) {
        let l = line as usize;
        let prev = self.elements[id.0].prev[l];
        let next = self.elements[id.0].next[l];
        self.set_next(line, header, prev, next);
        self.set_prev(line, header, next, prev);
        self.elements[id.0].prev[l] = None;
        self.elements[id.0].next[l] = None;
    }

    fn allocate(&mut self, row: usize, column: usize) -> ElementId {
        match self.free.pop() {
            Some(id) => {
                self.elements[id.0] = MatrixElement::new(row, column);
                id
            }
            None => {
                self.elements.push(MatrixElement::new(row, column));
                ElementId(self.elements.len() - 1)
            }
        }
    }

    /// Zero every value but keep the structure.
    pub fn reset(&mut self) {
        for element in &mut self.elements {
            element.value = T::zero();
        }
    }

    /// Drop every element except the trash element.
    pub fn clear(&mut self) {
        self.elements.truncate(1);
        self.elements[0].value = T::zero();
        self.free.clear();
        self.heads = [vec![Head::default()], vec![Head::default()]];
        self.diagonal = vec![None];
        self.size = 0;
        self.count = 1;
        self.fixed = false;
    }
}

impl<T> Index<ElementId> for SparseMatrix<T> {
    type Output = T;

    fn index(&self, id: ElementId) -> &T {
        &self.elements[id.0].value
    }
}

impl<T> IndexMut<ElementId> for SparseMatrix<T> {
    fn index_mut(&mut self, id: ElementId) -> &mut T {
        &mut self.elements[id.0].value
    }
}

impl<T: Scalar> fmt::Display for SparseMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sparse matrix ({0}x{0})", self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(row: usize, column: usize) -> MatrixLocation {
        MatrixLocation::new(row, column)
    }

    fn dense(m: &SparseMatrix<f64>) -> Vec<Vec<f64>> {
        (1..=m.size())
            .map(|r| (1..=m.size()).map(|c| m.value(loc(r, c))).collect())
            .collect()
    }

    /// Every row and column list is sorted and consistent in both directions,
    /// and the diagonal cache matches the lists.
    fn check_links(m: &SparseMatrix<f64>) {
        for r in 1..=m.size() {
            let forward: Vec<_> = std::iter::successors(m.first_in_row(r), |&id| m.right(id)).collect();
            let mut backward: Vec<_> = std::iter::successors(m.last_in_row(r), |&id| m.left(id)).collect();
            backward.reverse();
            assert_eq!(forward, backward, "row {}", r);
            assert!(forward.iter().all(|&id| m.row_of(id) == r));
            assert!(forward.windows(2).all(|w| m.column_of(w[0]) < m.column_of(w[1])));
        }
        for c in 1..=m.size() {
            let forward: Vec<_> = std::iter::successors(m.first_in_column(c), |&id| m.below(id)).collect();
            let mut backward: Vec<_> = std::iter::successors(m.last_in_column(c), |&id| m.above(id)).collect();
            backward.reverse();
            assert_eq!(forward, backward, "column {}", c);
            assert!(forward.iter().all(|&id| m.column_of(id) == c));
            assert!(forward.windows(2).all(|w| m.row_of(w[0]) < m.row_of(w[1])));
        }
        for i in 1..=m.size() {
            match m.find_diagonal_element(i) {
                Some(id) => assert_eq!(m.location_of(id), loc(i, i)),
                None => assert!(m.iter().all(|(l, _)| l != loc(i, i))),
            }
        }
    }

    #[test]
    fn test_get_and_find() {
        let mut m = SparseMatrix::<f64>::new();
        let a = m.get_element(loc(2, 3)).unwrap();
        let b = m.get_element(loc(2, 3)).unwrap();
        assert_eq!(a, b);
        assert_eq!(m.size(), 3);
        assert_eq!(m.element_count(), 2);
        assert_eq!(m.find_element(loc(3, 2)), None);
        assert_eq!(m.find_element(loc(4, 4)), None);
        assert_eq!(m.find_element(loc(0, 3)), Some(ElementId::TRASH));
        check_links(&m);
    }

    #[test]
    fn test_trash_sink() {
        let mut m = SparseMatrix::<f64>::new();
        m.set_value(loc(1, 1), 1.0).unwrap();
        let count = m.element_count();
        let t1 = m.get_element(loc(0, 1)).unwrap();
        let t2 = m.get_element(loc(3, 0)).unwrap();
        assert_eq!(t1, t2);
        m[t1] += 5.0;
        assert_eq!(m.element_count(), count);
        assert_eq!(m.iter().count(), 1);
    }

    #[test]
    fn test_zero_write_does_not_allocate() {
        let mut m = SparseMatrix::<f64>::with_size(3);
        m.set_value(loc(1, 2), 0.0).unwrap();
        assert_eq!(m.element_count(), 1);
        m.set_value(loc(1, 2), 4.0).unwrap();
        m.set_value(loc(1, 2), 0.0).unwrap();
        assert_eq!(m.element_count(), 2);
        assert_eq!(m.value(loc(1, 2)), 0.0);
    }

    #[test]
    fn test_remove_element() {
        let mut m = SparseMatrix::<f64>::new();
        m.set_value(loc(1, 1), 1.0).unwrap();
        m.set_value(loc(1, 2), 2.0).unwrap();
        m.set_value(loc(2, 2), 3.0).unwrap();
        assert!(m.remove_element(loc(1, 2)));
        assert!(m.remove_element(loc(2, 2)));
        assert!(!m.remove_element(loc(2, 2)));
        assert_eq!(m.find_diagonal_element(2), None);
        assert_eq!(m.element_count(), 2);
        check_links(&m);
    }

    #[test]
    fn test_resistor_stamp_swap_restores() {
        // Two-terminal conductance of 5 between nodes 1 and 2 in a 3x3 system
        let mut m = SparseMatrix::<f64>::with_size(3);
        m.set_value(loc(1, 1), 5.0).unwrap();
        m.set_value(loc(2, 2), 5.0).unwrap();
        m.set_value(loc(1, 2), -5.0).unwrap();
        m.set_value(loc(2, 1), -5.0).unwrap();
        let before = dense(&m);

        m.swap_rows(1, 2).unwrap();
        assert_eq!(m.value(loc(1, 1)), -5.0);
        assert_eq!(m.value(loc(2, 1)), 5.0);
        check_links(&m);

        m.swap_rows(1, 2).unwrap();
        assert_eq!(dense(&m), before);
        check_links(&m);

        m.swap_columns(1, 2).unwrap();
        m.swap_columns(1, 2).unwrap();
        assert_eq!(dense(&m), before);
        check_links(&m);
    }

    fn patterned(n: usize, skip: impl Fn(usize, usize) -> bool) -> SparseMatrix<f64> {
        let mut m = SparseMatrix::with_size(n);
        for r in 1..=n {
            for c in 1..=n {
                if !skip(r, c) {
                    m.set_value(loc(r, c), (10 * r + c) as f64).unwrap();
                }
            }
        }
        m
    }

    #[test]
    fn test_swap_rows_and_columns_all_pairs() {
        let patterns: Vec<Box<dyn Fn(usize, usize) -> bool>> = vec![
            Box::new(|_: usize, _: usize| false),
            Box::new(|r: usize, c: usize| (r + c) % 2 == 0),
            Box::new(|r: usize, c: usize| r != c),
            Box::new(|r: usize, c: usize| r * c % 3 != 1),
            Box::new(|r: usize, _: usize| r == 3),
            Box::new(|_: usize, c: usize| c > 2),
        ];
        let n = 6;
        for pattern in &patterns {
            for i in 1..=n {
                for j in 1..=n {
                    let mut m = patterned(n, pattern);
                    let before = dense(&m);

                    m.swap_rows(i, j).unwrap();
                    check_links(&m);
                    let after = dense(&m);
                    for c in 0..n {
                        assert_eq!(after[i - 1][c], before[j - 1][c]);
                        assert_eq!(after[j - 1][c], before[i - 1][c]);
                    }
                    m.swap_rows(i, j).unwrap();
                    assert_eq!(dense(&m), before);

                    m.swap_columns(i, j).unwrap();
                    check_links(&m);
                    let after = dense(&m);
                    for r in 0..n {
                        assert_eq!(after[r][i - 1], before[r][j - 1]);
                        assert_eq!(after[r][j - 1], before[r][i - 1]);
                    }
                    m.swap_columns(j, i).unwrap();
                    assert_eq!(dense(&m), before);
                    check_links(&m);
                }
            }
        }
    }

    #[test]
    fn test_swap_listener() {
        let mut m = patterned(3, |_, _| false);
        let mut seen = Vec::new();
        m.swap_rows_with(3, 1, |a, b| seen.push((a, b))).unwrap();
        m.swap_columns_with(2, 2, |a, b| seen.push((a, b))).unwrap();
        assert_eq!(seen, vec![(1, 3)]);
    }

    #[test]
    fn test_reset_and_clear() {
        let mut m = patterned(3, |_, _| false);
        m.reset();
        assert_eq!(m.element_count(), 10);
        assert!(m.iter().all(|(_, v)| v == 0.0));
        m.clear();
        assert_eq!(m.size(), 0);
        assert_eq!(m.element_count(), 1);
        m.set_value(loc(2, 2), 1.0).unwrap();
        check_links(&m);
    }
}
