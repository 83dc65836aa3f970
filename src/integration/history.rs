//! State vectors kept over the last few time points.

/// A ring of state vectors: `states[0]` belongs to the time point being
/// solved, `states[1]` to the last accepted one, and so on.
///
/// Behaviors [`allocate`](StateHistory::allocate) their slots once while
/// binding. Charge storage elements use two consecutive slots: the
/// quantity at `index` and its derivative at `index + 1`.
#[derive(Debug, Clone)]
pub struct StateHistory {
    states: Vec<Vec<f64>>,
    length: usize,
}

impl StateHistory {
    /// Create a history keeping `depth` state vectors (at least two).
    pub fn new(depth: usize) -> Self {
        Self {
            states: vec![Vec::new(); depth.max(2)],
            length: 0,
        }
    }

    /// Number of state vectors kept.
    pub fn depth(&self) -> usize {
        self.states.len()
    }

    /// Number of slots in each state vector.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Reserve `count` consecutive slots and return the first.
    pub fn allocate(&mut self, count: usize) -> usize {
        let first = self.length;
        self.length += count;
        for state in &mut self.states {
            state.resize(self.length, 0.0);
        }
        first
    }

    pub fn current(&self) -> &[f64] {
        &self.states[0]
    }

    pub fn current_mut(&mut self) -> &mut [f64] {
        &mut self.states[0]
    }

    /// The state vector `age` points back; `previous(0)` is the current one.
    ///
    /// # Panics
    /// Panics if `age` is not below [`depth`](Self::depth).
    pub fn previous(&self, age: usize) -> &[f64] {
        &self.states[age]
    }

    /// A single value `age` points back.
    pub fn value(&self, age: usize, index: usize) -> f64 {
        self.states[age][index]
    }

    pub(crate) fn set_value(&mut self, age: usize, index: usize, value: f64) {
        self.states[age][index] = value;
    }

    /// Age every vector by one point and start the new current vector as a
    /// copy of the last accepted one.
    pub fn shift(&mut self) {
        self.states.rotate_right(1);
        self.rewind();
    }

    /// Restore the current vector from the last accepted one.
    pub fn rewind(&mut self) {
        let (current, rest) = self.states.split_at_mut(1);
        current[0].copy_from_slice(&rest[0]);
    }

    /// Copy the current vector over the whole history.
    pub fn fill(&mut self) {
        let (current, rest) = self.states.split_at_mut(1);
        for state in rest {
            state.copy_from_slice(&current[0]);
        }
    }

    /// Zero every slot.
    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.fill(0.0);
        }
    }

    /// Release all slots.
    pub fn clear(&mut self) {
        self.length = 0;
        for state in &mut self.states {
            state.clear();
        }
    }
}
