//! External/internal index maps.

/// Maps external (user-facing) indices to internal (pivoted) indices and back.
///
/// Unallocated indices map to themselves; index 0 always maps to 0.
#[derive(Debug, Clone, Default)]
pub struct Translation {
    ext_to_int: Vec<usize>,
    int_to_ext: Vec<usize>,
}

impl Translation {
    pub fn new() -> Self {
        Self::with_size(0)
    }

    pub fn with_size(size: usize) -> Self {
        Self {
            ext_to_int: (0..=size).collect(),
            int_to_ext: (0..=size).collect(),
        }
    }

    /// Number of explicitly allocated indices.
    pub fn len(&self) -> usize {
        self.ext_to_int.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Internal index of an external index.
    pub fn to_internal(&self, external: usize) -> usize {
        self.ext_to_int.get(external).copied().unwrap_or(external)
    }

    /// External index of an internal index.
    pub fn to_external(&self, internal: usize) -> usize {
        self.int_to_ext.get(internal).copied().unwrap_or(internal)
    }

    fn expand(&mut self, size: usize) {
        let current = self.ext_to_int.len();
        if size + 1 > current {
            self.ext_to_int.extend(current..=size);
            self.int_to_ext.extend(current..=size);
        }
    }

    /// Swap two internal indices.
    pub fn swap(&mut self, index1: usize, index2: usize) {
        self.expand(index1.max(index2));
        self.int_to_ext.swap(index1, index2);
        self.ext_to_int[self.int_to_ext[index1]] = index1;
        self.ext_to_int[self.int_to_ext[index2]] = index2;
    }

    /// Copy `source` (external order) into `target` (internal order).
    ///
    /// Both slices are 1-based; element 0 is left untouched.
    pub fn scramble<T: Copy>(&self, source: &[T], target: &mut [T]) {
        for (external, &value) in source.iter().enumerate().skip(1) {
            target[self.to_internal(external)] = value;
        }
    }

    /// Copy `source` (internal order) into `target` (external order).
    pub fn unscramble<T: Copy>(&self, source: &[T], target: &mut [T]) {
        for (internal, &value) in source.iter().enumerate().skip(1) {
            target[self.to_external(internal)] = value;
        }
    }

    /// Back to the identity map.
    pub fn clear(&mut self) {
        self.ext_to_int.truncate(1);
        self.int_to_ext.truncate(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_and_swap() {
        let mut t = Translation::new();
        assert_eq!(t.to_internal(7), 7);
        t.swap(2, 5);
        assert_eq!(t.to_internal(2), 5);
        assert_eq!(t.to_internal(5), 2);
        assert_eq!(t.to_external(5), 2);
        t.swap(5, 3);
        assert_eq!(t.to_internal(2), 3);
        assert_eq!(t.to_external(3), 2);
        assert_eq!(t.to_internal(0), 0);
        for i in 1..=5 {
            assert_eq!(t.to_external(t.to_internal(i)), i);
        }
    }

    #[test]
    fn test_scramble_roundtrip() {
        let mut t = Translation::with_size(3);
        t.swap(1, 3);
        let external = [0.0, 1.0, 2.0, 3.0];
        let mut internal = [0.0; 4];
        t.scramble(&external, &mut internal);
        assert_eq!(internal, [0.0, 3.0, 2.0, 1.0]);
        let mut back = [0.0; 4];
        t.unscramble(&internal, &mut back);
        assert_eq!(back, external);
    }
}
