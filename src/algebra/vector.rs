//! Sparse vector with doubly-linked, arena-allocated elements.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::error::{EngineError, Result};

use super::{ElementId, Scalar};

/// A vector element: payload plus its neighbours in index order.
#[derive(Debug, Clone)]
struct VectorElement<T> {
    index: usize,
    value: T,
    prev: Option<ElementId>,
    next: Option<ElementId>,
    live: bool,
}

impl<T: Scalar> VectorElement<T> {
    fn new(index: usize) -> Self {
        Self {
            index,
            value: T::zero(),
            prev: None,
            next: None,
            live: true,
        }
    }
}

/// A vector that only stores the elements that were asked for.
///
/// Elements are kept in a list sorted by index. Index 0 is the trash
/// element: it always exists, never shows up in [`SparseVector::iter`], and
/// absorbs writes aimed at ground. The logical length grows on demand unless
/// the vector has been fixed with [`SparseVector::fix_length`].
#[derive(Debug, Clone)]
pub struct SparseVector<T> {
    /// Slot 0 is the trash element
    elements: Vec<VectorElement<T>>,
    /// Recycled slots of removed elements
    free: Vec<ElementId>,
    first: Option<ElementId>,
    last: Option<ElementId>,
    length: usize,
    count: usize,
    fixed: bool,
}

impl<T: Scalar> Default for SparseVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> SparseVector<T> {
    /// Create an empty vector.
    pub fn new() -> Self {
        Self::with_length(0)
    }

    /// Create an empty vector with a logical length.
    pub fn with_length(length: usize) -> Self {
        Self {
            elements: vec![VectorElement::new(0)],
            free: Vec::new(),
            first: None,
            last: None,
            length,
            count: 1,
            fixed: false,
        }
    }

    /// Logical length of the vector.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of allocated elements, the trash element included.
    pub fn element_count(&self) -> usize {
        self.count
    }

    /// Whether the length is locked.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Lock the logical length; growing beyond it becomes an error.
    pub fn fix_length(&mut self, length: usize) {
        self.length = self.length.max(length);
        self.fixed = true;
    }

    /// Allow the vector to grow again.
    pub fn unfix(&mut self) {
        self.fixed = false;
    }

    fn ensure_length(&mut self, index: usize) -> Result<()> {
        if index > self.length {
            if self.fixed {
                return Err(EngineError::out_of_range(index, self.length));
            }
            self.length = index;
        }
        Ok(())
    }

    /// The trash element.
    pub fn trash(&self) -> ElementId {
        ElementId::TRASH
    }

    /// Get the element at `index`, creating it if it does not exist.
    pub fn get_element(&mut self, index: usize) -> Result<ElementId> {
        if index == 0 {
            return Ok(ElementId::TRASH);
        }
        self.ensure_length(index)?;

        let mut cursor = self.first;
        let mut last = None;
        while let Some(id) = cursor {
            let element = &self.elements[id.0];
            if element.index > index {
                break;
            }
            if element.index == index {
                return Ok(id);
            }
            last = Some(id);
            cursor = element.next;
        }

        let id = self.allocate(index);
        self.elements[id.0].prev = last;
        self.elements[id.0].next = cursor;
        match last {
            None => self.first = Some(id),
            Some(prev) => self.elements[prev.0].next = Some(id),
        }
        match cursor {
            None => self.last = Some(id),
            Some(next) => self.elements[next.0].prev = Some(id),
        }
        self.count += 1;
        Ok(id)
    }

    /// Find the element at `index` without creating it.
    pub fn find_element(&self, index: usize) -> Option<ElementId> {
        if index == 0 {
            return Some(ElementId::TRASH);
        }
        if index > self.length {
            return None;
        }
        let mut cursor = self.first;
        while let Some(id) = cursor {
            let element = &self.elements[id.0];
            if element.index == index {
                return Some(id);
            }
            if element.index > index {
                return None;
            }
            cursor = element.next;
        }
        None
    }

    /// Remove the element at `index`. Returns `false` if there was none.
    pub fn remove_element(&mut self, index: usize) -> bool {
        if index == 0 {
            return false;
        }
        match self.find_element(index) {
            Some(id) => {
                self.unlink(id);
                self.elements[id.0].live = false;
                self.free.push(id);
                self.count -= 1;
                true
            }
            None => false,
        }
    }

    /// Value at `index`, zero when no element is stored.
    pub fn value(&self, index: usize) -> T {
        self.find_element(index)
            .map(|id| self.elements[id.0].value)
            .unwrap_or_default()
    }

    /// Set the value at `index`. Writing zero never allocates.
    pub fn set_value(&mut self, index: usize, value: T) -> Result<()> {
        if value.is_zero() {
            if let Some(id) = self.find_element(index) {
                self.elements[id.0].value = T::zero();
            }
        } else {
            let id = self.get_element(index)?;
            self.elements[id.0].value = value;
        }
        Ok(())
    }

    /// Index of a live element.
    pub fn index_of(&self, id: ElementId) -> usize {
        self.elements[id.0].index
    }

    /// Whether the handle refers to a live element.
    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.get(id.0).map(|e| e.live).unwrap_or(false)
    }

    /// First non-trash element.
    pub fn first(&self) -> Option<ElementId> {
        self.first
    }

    /// Last element.
    pub fn last(&self) -> Option<ElementId> {
        self.last
    }

    /// Next element in index order.
    pub fn next(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].next
    }

    /// Previous element in index order.
    pub fn prev(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].prev
    }

    /// Iterate over `(index, value)` of all non-trash elements.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            vector: self,
            cursor: self.first,
        }
    }

    /// Mutable access to the value of every live element, trash included.
    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = (ElementId, &mut T)> {
        self.elements
            .iter_mut()
            .enumerate()
            .filter(|(_, e)| e.live)
            .map(|(i, e)| (ElementId(i), &mut e.value))
    }

    /// Swap the values stored at two indices.
    pub fn swap_elements(&mut self, index1: usize, index2: usize) -> Result<()> {
        self.swap_elements_with(index1, index2, |_, _| {})
    }

    /// Swap two indices and report the swap to `listener` as `(low, high)`.
    ///
    /// Elements are relinked in place; only the part of the list between the
    /// two indices is visited.
    pub fn swap_elements_with<F>(&mut self, index1: usize, index2: usize, mut listener: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        if index1 == 0 || index2 == 0 {
            return Err(EngineError::out_of_range(0, self.length));
        }
        if index1 == index2 {
            return Ok(());
        }
        let (index1, index2) = if index2 < index1 {
            (index2, index1)
        } else {
            (index1, index2)
        };
        self.ensure_length(index2)?;

        let mut first = None;
        let mut second = None;
        let mut cursor = self.first;
        while let Some(id) = cursor {
            let index = self.elements[id.0].index;
            if index == index1 {
                first = Some(id);
            }
            if index > index1 {
                break;
            }
            cursor = self.elements[id.0].next;
        }
        while let Some(id) = cursor {
            let index = self.elements[id.0].index;
            if index == index2 {
                second = Some(id);
            }
            if index >= index2 {
                break;
            }
            cursor = self.elements[id.0].next;
        }

        self.relink(first, second, index1, index2);
        listener(index1, index2);
        Ok(())
    }

    fn relink(&mut self, first: Option<ElementId>, second: Option<ElementId>, index1: usize, index2: usize) {
        match (first, second) {
            (None, None) => {}

            (None, Some(second)) => {
                let prev = match self.elements[second.0].prev {
                    Some(prev) if self.elements[prev.0].index > index1 => prev,
                    _ => {
                        self.elements[second.0].index = index1;
                        return;
                    }
                };

                // Walk back to the first element above index1
                let mut element = prev;
                self.unlink(second);
                while let Some(p) = self.elements[element.0].prev {
                    if self.elements[p.0].index <= index1 {
                        break;
                    }
                    element = p;
                }

                let before = self.elements[element.0].prev;
                match before {
                    None => self.first = Some(second),
                    Some(b) => self.elements[b.0].next = Some(second),
                }
                self.elements[second.0].prev = before;
                self.elements[second.0].next = Some(element);
                self.elements[element.0].prev = Some(second);
                self.elements[second.0].index = index1;
            }

            (Some(first), None) => {
                let next = match self.elements[first.0].next {
                    Some(next) if self.elements[next.0].index < index2 => next,
                    _ => {
                        self.elements[first.0].index = index2;
                        return;
                    }
                };

                // Walk forward to the last element below index2
                let mut element = next;
                self.unlink(first);
                while let Some(n) = self.elements[element.0].next {
                    if self.elements[n.0].index >= index2 {
                        break;
                    }
                    element = n;
                }

                let after = self.elements[element.0].next;
                match after {
                    None => self.last = Some(first),
                    Some(a) => self.elements[a.0].prev = Some(first),
                }
                self.elements[first.0].next = after;
                self.elements[first.0].prev = Some(element);
                self.elements[element.0].next = Some(first);
                self.elements[first.0].index = index2;
            }

            (Some(first), Some(second)) => {
                let first_prev = self.elements[first.0].prev;
                let second_next = self.elements[second.0].next;

                if self.elements[first.0].next == Some(second) {
                    match first_prev {
                        None => self.first = Some(second),
                        Some(p) => self.elements[p.0].next = Some(second),
                    }
                    match second_next {
                        None => self.last = Some(first),
                        Some(n) => self.elements[n.0].prev = Some(first),
                    }
                    self.elements[first.0].next = second_next;
                    self.elements[first.0].prev = Some(second);
                    self.elements[second.0].prev = first_prev;
                    self.elements[second.0].next = Some(first);
                } else {
                    // Non-adjacent: both inner neighbours exist
                    let first_next = self.elements[first.0].next;
                    let second_prev = self.elements[second.0].prev;
                    match first_prev {
                        None => self.first = Some(second),
                        Some(p) => self.elements[p.0].next = Some(second),
                    }
                    if let Some(n) = first_next {
                        self.elements[n.0].prev = Some(second);
                    }
                    match second_next {
                        None => self.last = Some(first),
                        Some(n) => self.elements[n.0].prev = Some(first),
                    }
                    if let Some(p) = second_prev {
                        self.elements[p.0].next = Some(first);
                    }
                    self.elements[second.0].prev = first_prev;
                    self.elements[second.0].next = first_next;
                    self.elements[first.0].prev = second_prev;
                    self.elements[first.0].next = second_next;
                }
                self.elements[first.0].index = index2;
                self.elements[second.0].index = index1;
            }
        }
    }

    /// Detach an element from the list without freeing it.
    fn unlink(&mut self, id: ElementId) {
        let prev = self.elements[id.0].prev;
        let next = self.elements[id.0].next;
        match prev {
            None => self.first = next,
            Some(p) => self.elements[p.0].next = next,
        }
        match next {
            None => self.last = prev,
            Some(n) => self.elements[n.0].prev = prev,
        }
        self.elements[id.0].prev = None;
        self.elements[id.0].next = None;
    }

    fn allocate(&mut self, index: usize) -> ElementId {
        match self.free.pop() {
            Some(id) => {
                self.elements[id.0] = VectorElement::new(index);
                id
            }
            None => {
                self.elements.push(VectorElement::new(index));
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
        self.first = None;
        self.last = None;
        self.length = 0;
        self.count = 1;
        self.fixed = false;
    }
}

impl<T> Index<ElementId> for SparseVector<T> {
    type Output = T;

    fn index(&self, id: ElementId) -> &T {
        &self.elements[id.0].value
    }
}

impl<T> IndexMut<ElementId> for SparseVector<T> {
    fn index_mut(&mut self, id: ElementId) -> &mut T {
        &mut self.elements[id.0].value
    }
}

impl<T: Scalar> fmt::Display for SparseVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sparse vector ({})", self.length)
    }
}

/// Iterator over the non-trash elements of a [`SparseVector`].
pub struct Iter<'a, T> {
    vector: &'a SparseVector<T>,
    cursor: Option<ElementId>,
}

impl<'a, T: Scalar> Iterator for Iter<'a, T> {
    type Item = (usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let element = &self.vector.elements[id.0];
        self.cursor = element.next;
        Some((element.index, element.value))
    }
}
