//! Shared loading of one solver by several parallel tasks.
//!
//! The first task that asks for an element gets it directly. Any other task
//! asking for the same element gets a private bridge instead: a value of its
//! own that [`ParallelSolver::apply`] adds into the real element once the
//! parallel pass is over. Every task therefore writes only memory it owns,
//! and the view can hand each task plain `&mut` references.
//!
//! Handles returned for a task are only meaningful in that task's
//! [`TaskLoad`]. Claims remember the location they were made for; a claim
//! whose element was removed from the solver fails the next load, even when
//! the storage slot has been reused by another element since.

use std::collections::HashMap;

use log::trace;
use rayon::prelude::*;

use crate::algebra::{ElementId, MatrixLocation, Scalar};
use crate::error::{EngineError, Result};

use super::{FactorSolver, LoadSolver, LoadTarget, SparsePivotingSolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Matrix(ElementId, MatrixLocation),
    Rhs(ElementId, usize),
}

impl Target {
    /// Whether the solver still holds this element at this location.
    fn is_live<T: Scalar>(self, solver: &SparsePivotingSolver<T>) -> bool {
        match self {
            Target::Matrix(id, location) => solver.find_element(location) == Some(id),
            Target::Rhs(id, row) => solver.find_rhs_element(row) == Some(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Direct(Target),
    Bridge(usize),
}

#[derive(Debug, Clone)]
struct Bridge<T> {
    value: T,
    /// `None` for the task's private trash
    target: Option<Target>,
}

/// Handles claimed by one task.
#[derive(Debug, Clone)]
struct TaskState<T> {
    matrix: Vec<Slot>,
    rhs: Vec<Slot>,
    matrix_slots: HashMap<MatrixLocation, usize>,
    rhs_slots: HashMap<usize, usize>,
    bridges: Vec<Bridge<T>>,
}

impl<T: Scalar> TaskState<T> {
    fn new() -> Self {
        let trash = Bridge {
            value: T::zero(),
            target: None,
        };
        Self {
            // Slot 0 of either list is the task's own trash
            matrix: vec![Slot::Bridge(0)],
            rhs: vec![Slot::Bridge(1)],
            matrix_slots: HashMap::new(),
            rhs_slots: HashMap::new(),
            bridges: vec![trash.clone(), trash],
        }
    }

    fn claimed(&self, target: Target) -> Option<usize> {
        match target {
            Target::Matrix(_, location) => self.matrix_slots.get(&location).copied(),
            Target::Rhs(_, row) => self.rhs_slots.get(&row).copied(),
        }
    }

    fn push(&mut self, target: Target, slot: Slot) -> usize {
        match target {
            Target::Matrix(_, location) => {
                self.matrix.push(slot);
                self.matrix_slots.insert(location, self.matrix.len() - 1);
                self.matrix.len() - 1
            }
            Target::Rhs(_, row) => {
                self.rhs.push(slot);
                self.rhs_slots.insert(row, self.rhs.len() - 1);
                self.rhs.len() - 1
            }
        }
    }

    /// Every solver element this task writes to, directly or bridged.
    fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        let direct = self.matrix.iter().chain(&self.rhs).filter_map(|slot| match *slot {
            Slot::Direct(target) => Some(target),
            Slot::Bridge(_) => None,
        });
        direct.chain(self.bridges.iter().filter_map(|b| b.target))
    }
}

/// Claims and bridges of a parallel load, kept across passes.
#[derive(Debug, Clone)]
pub struct ParallelState<T> {
    tasks: Vec<TaskState<T>>,
    /// Location -> task that claimed it first
    matrix_owners: HashMap<MatrixLocation, usize>,
    rhs_owners: HashMap<usize, usize>,
}

impl<T: Scalar> ParallelState<T> {
    /// Create the state for `tasks` parallel tasks.
    pub fn new(tasks: usize) -> Self {
        Self {
            tasks: (0..tasks).map(|_| TaskState::new()).collect(),
            matrix_owners: HashMap::new(),
            rhs_owners: HashMap::new(),
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of bridges to shared elements over all tasks.
    pub fn bridge_count(&self) -> usize {
        self.tasks
            .iter()
            .flat_map(|t| &t.bridges)
            .filter(|b| b.target.is_some())
            .count()
    }

    /// Zero every bridge.
    pub fn reset(&mut self) {
        for bridge in self.tasks.iter_mut().flat_map(|t| t.bridges.iter_mut()) {
            bridge.value = T::zero();
        }
    }

    /// Forget all claims, e.g. after the solver was cleared.
    pub fn clear(&mut self) {
        let tasks = self.tasks.len();
        *self = Self::new(tasks);
    }

    fn claim(&mut self, task: usize, target: Target) -> Result<ElementId> {
        if task >= self.tasks.len() {
            return Err(EngineError::out_of_range(task, self.tasks.len()));
        }
        let (id, owner) = match target {
            Target::Matrix(id, location) => (id, self.matrix_owners.get(&location).copied()),
            Target::Rhs(id, row) => (id, self.rhs_owners.get(&row).copied()),
        };
        if id.is_trash() {
            return Ok(ElementId::TRASH);
        }
        let state = &mut self.tasks[task];
        if let Some(slot) = state.claimed(target) {
            return Ok(ElementId(slot));
        }

        let slot = match owner {
            Some(owner) => {
                trace!("Task {} bridges {:?} owned by task {}", task, target, owner);
                state.bridges.push(Bridge {
                    value: T::zero(),
                    target: Some(target),
                });
                let bridge = state.bridges.len() - 1;
                state.push(target, Slot::Bridge(bridge))
            }
            None => {
                match target {
                    Target::Matrix(_, location) => self.matrix_owners.insert(location, task),
                    Target::Rhs(_, row) => self.rhs_owners.insert(row, task),
                };
                state.push(target, Slot::Direct(target))
            }
        };
        Ok(ElementId(slot))
    }
}

/// A view over a [`SparsePivotingSolver`] for parallel loading.
///
/// The view only hands out elements; factoring stays with the owning
/// solver.
pub struct ParallelSolver<'a, T> {
    solver: &'a mut SparsePivotingSolver<T>,
    state: &'a mut ParallelState<T>,
}

impl<'a, T: Scalar> ParallelSolver<'a, T> {
    pub fn new(solver: &'a mut SparsePivotingSolver<T>, state: &'a mut ParallelState<T>) -> Self {
        Self { solver, state }
    }

    pub fn task_count(&self) -> usize {
        self.state.task_count()
    }

    /// Element access on behalf of one task.
    pub fn task(&mut self, task: usize) -> TaskSolver<'_, T> {
        TaskSolver {
            solver: &mut *self.solver,
            state: &mut *self.state,
            task,
        }
    }

    /// Claim the matrix element at `location` for `task`.
    pub fn get_element(&mut self, task: usize, location: MatrixLocation) -> Result<ElementId> {
        self.task(task).get_element(location)
    }

    /// Claim an existing matrix element for `task`.
    pub fn find_element(&mut self, task: usize, location: MatrixLocation) -> Option<ElementId> {
        self.task(task).find_element(location)
    }

    /// Claim the right-hand side element of `row` for `task`.
    pub fn get_rhs_element(&mut self, task: usize, row: usize) -> Result<ElementId> {
        self.task(task).get_rhs_element(row)
    }

    /// Claim an existing right-hand side element for `task`.
    pub fn find_rhs_element(&mut self, task: usize, row: usize) -> Option<ElementId> {
        self.task(task).find_rhs_element(row)
    }

    /// Zero all bridges.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Run `load` once per task on the rayon pool and wait for all of them.
    ///
    /// Bridges are zeroed first. Each call receives the task index and the
    /// task's values; the first error returned by any task is reported.
    pub fn load<F>(&mut self, load: F) -> Result<()>
    where
        F: Fn(usize, &mut TaskLoad<'_, T>) -> Result<()> + Sync + Send,
    {
        self.state.reset();
        let mut loads = self.gather()?;
        trace!("Parallel load over {} tasks", loads.len());
        loads
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(task, values)| load(task, values))
    }

    /// Split the solver storage into disjoint per-task borrows.
    fn gather(&mut self) -> Result<Vec<TaskLoad<'_, T>>> {
        let solver = &*self.solver;
        let stale = self
            .state
            .tasks
            .iter()
            .flat_map(|task| task.targets())
            .find(|target| !target.is_live(solver));
        if let Some(target) = stale {
            return Err(EngineError::invalid_handle(format!(
                "claimed element {:?} was removed",
                target
            )));
        }

        let tasks = &mut self.state.tasks;
        let mut matrix_owners = HashMap::new();
        let mut rhs_owners = HashMap::new();
        for (task, state) in tasks.iter().enumerate() {
            for (slot, claimed) in state.matrix.iter().enumerate() {
                if let Slot::Direct(Target::Matrix(id, _)) = *claimed {
                    matrix_owners.insert(id, (task, slot));
                }
            }
            for (slot, claimed) in state.rhs.iter().enumerate() {
                if let Slot::Direct(Target::Rhs(id, _)) = *claimed {
                    rhs_owners.insert(id, (task, slot));
                }
            }
        }
        let (matrix, rhs) = self.solver.storage_mut();

        let mut direct_matrix: Vec<Vec<Option<&mut T>>> = tasks
            .iter()
            .map(|t| t.matrix.iter().map(|_| None).collect())
            .collect();
        let mut direct_rhs: Vec<Vec<Option<&mut T>>> = tasks
            .iter()
            .map(|t| t.rhs.iter().map(|_| None).collect())
            .collect();
        for (id, value) in matrix.values_mut() {
            if let Some(&(task, slot)) = matrix_owners.get(&id) {
                direct_matrix[task][slot] = Some(value);
            }
        }
        for (id, value) in rhs.values_mut() {
            if let Some(&(task, slot)) = rhs_owners.get(&id) {
                direct_rhs[task][slot] = Some(value);
            }
        }

        let mut loads = Vec::with_capacity(tasks.len());
        for ((state, mut matrix_refs), mut rhs_refs) in tasks.iter_mut().zip(direct_matrix).zip(direct_rhs) {
            let mut bridges: Vec<Option<&mut T>> = state.bridges.iter_mut().map(|b| Some(&mut b.value)).collect();
            let matrix = resolve(&state.matrix, &mut matrix_refs, &mut bridges)?;
            let rhs = resolve(&state.rhs, &mut rhs_refs, &mut bridges)?;
            loads.push(TaskLoad { matrix, rhs });
        }
        Ok(loads)
    }

    /// Add every bridge into its target element.
    pub fn apply(&mut self) {
        let (matrix, rhs) = self.solver.storage_mut();
        for bridge in self.state.tasks.iter().flat_map(|t| &t.bridges) {
            match bridge.target {
                Some(Target::Matrix(id, _)) => matrix[id] += bridge.value,
                Some(Target::Rhs(id, _)) => rhs[id] += bridge.value,
                None => {}
            }
        }
    }
}

fn resolve<'b, T>(
    slots: &[Slot],
    direct: &mut [Option<&'b mut T>],
    bridges: &mut [Option<&'b mut T>],
) -> Result<Vec<&'b mut T>> {
    slots
        .iter()
        .enumerate()
        .map(|(index, slot)| match *slot {
            Slot::Direct(target) => direct[index]
                .take()
                .ok_or_else(|| EngineError::invalid_handle(format!("claimed element {:?} was removed", target))),
            Slot::Bridge(bridge) => bridges[bridge]
                .take()
                .ok_or_else(|| EngineError::invalid_handle(format!("bridge {} is claimed twice", bridge))),
        })
        .collect()
}

/// Element access of a single task.
pub struct TaskSolver<'s, T> {
    solver: &'s mut SparsePivotingSolver<T>,
    state: &'s mut ParallelState<T>,
    task: usize,
}

impl<T: Scalar> LoadSolver<T> for TaskSolver<'_, T> {
    fn get_element(&mut self, location: MatrixLocation) -> Result<ElementId> {
        let id = self.solver.get_element(location)?;
        self.state.claim(self.task, Target::Matrix(id, location))
    }

    fn find_element(&mut self, location: MatrixLocation) -> Option<ElementId> {
        let id = self.solver.find_element(location)?;
        self.state.claim(self.task, Target::Matrix(id, location)).ok()
    }

    fn get_rhs_element(&mut self, row: usize) -> Result<ElementId> {
        let id = self.solver.get_rhs_element(row)?;
        self.state.claim(self.task, Target::Rhs(id, row))
    }

    fn find_rhs_element(&mut self, row: usize) -> Option<ElementId> {
        let id = self.solver.find_rhs_element(row)?;
        self.state.claim(self.task, Target::Rhs(id, row)).ok()
    }

    fn factorizer(&mut self) -> Result<&mut dyn FactorSolver<T>> {
        Err(EngineError::AccessNotSupported { operation: "factor" })
    }
}

/// The values one task may write during a parallel load.
pub struct TaskLoad<'a, T> {
    matrix: Vec<&'a mut T>,
    rhs: Vec<&'a mut T>,
}

impl<T: Scalar> TaskLoad<'_, T> {
    pub fn add_matrix(&mut self, id: ElementId, value: T) {
        *self.matrix[id.0] += value;
    }

    pub fn add_rhs(&mut self, id: ElementId, value: T) {
        *self.rhs[id.0] += value;
    }
}

impl<T: Scalar> LoadTarget<T> for TaskLoad<'_, T> {
    fn matrix(&mut self, id: ElementId) -> &mut T {
        &mut *self.matrix[id.0]
    }

    fn rhs(&mut self, id: ElementId) -> &mut T {
        &mut *self.rhs[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(row: usize, column: usize) -> MatrixLocation {
        MatrixLocation::new(row, column)
    }

    #[test]
    fn test_shared_location_sums_contributions() {
        let mut solver = SparsePivotingSolver::new();
        solver.set_value(loc(1, 1), 10.0).unwrap();
        let mut state = ParallelState::new(2);
        let mut view = ParallelSolver::new(&mut solver, &mut state);

        let handles = [
            view.get_element(0, loc(1, 1)).unwrap(),
            view.get_element(1, loc(1, 1)).unwrap(),
        ];
        view.load(|task, values| {
            let amount = if task == 0 { 3.0 } else { 4.0 };
            values.add_matrix(handles[task], amount);
            Ok(())
        })
        .unwrap();
        view.apply();

        assert_eq!(solver.value(loc(1, 1)), 17.0);
        assert_eq!(state.bridge_count(), 1);
    }

    #[test]
    fn test_claim_rules() {
        let mut solver = SparsePivotingSolver::<f64>::new();
        let mut state = ParallelState::new(3);
        let mut view = ParallelSolver::new(&mut solver, &mut state);

        let direct = view.get_element(1, loc(2, 1)).unwrap();
        assert_eq!(view.get_element(1, loc(2, 1)).unwrap(), direct);

        let bridged = view.get_element(2, loc(2, 1)).unwrap();
        assert_eq!(view.get_element(2, loc(2, 1)).unwrap(), bridged);
        assert_eq!(view.find_element(0, loc(2, 1)), Some(ElementId(1)));
        assert_eq!(view.find_element(0, loc(3, 3)), None);
        assert_eq!(view.get_element(0, loc(0, 2)).unwrap(), ElementId::TRASH);
        assert_eq!(view.get_rhs_element(0, 0).unwrap(), ElementId::TRASH);
        assert_eq!(
            view.get_element(3, loc(1, 1)),
            Err(EngineError::out_of_range(3, 3))
        );
        assert_eq!(state.bridge_count(), 2);
    }

    #[test]
    fn test_bridge_conservation() {
        let tasks = 8;
        let mut solver = SparsePivotingSolver::new();
        solver.set_value(loc(1, 1), 0.5).unwrap();
        solver.set_rhs_value(1, 1.0).unwrap();
        let mut state = ParallelState::new(tasks);
        let mut view = ParallelSolver::new(&mut solver, &mut state);

        let handles: Vec<_> = (0..tasks)
            .map(|t| {
                (
                    view.get_element(t, loc(1, 1)).unwrap(),
                    view.get_rhs_element(t, 1).unwrap(),
                )
            })
            .collect();

        for _ in 0..2 {
            view.load(|task, values| {
                let (m, r) = handles[task];
                values.add_matrix(m, (task + 1) as f64);
                *values.rhs(r) -= 1.0;
                Ok(())
            })
            .unwrap();
            view.apply();
        }

        // Two passes of 1 + 2 + ... + 8 on top of the initial values
        assert_eq!(solver.value(loc(1, 1)), 0.5 + 2.0 * 36.0);
        assert_eq!(solver.rhs_value(1), 1.0 - 2.0 * 8.0);
    }

    #[test]
    fn test_trash_is_private() {
        let mut solver = SparsePivotingSolver::<f64>::new();
        let mut state = ParallelState::new(2);
        let mut view = ParallelSolver::new(&mut solver, &mut state);
        let trash = view.get_element(0, loc(0, 0)).unwrap();
        view.load(|_, values| {
            values.add_matrix(trash, 1.0);
            Ok(())
        })
        .unwrap();
        view.apply();
        assert_eq!(solver.matrix().iter().count(), 0);
    }

    #[test]
    fn test_factor_not_supported() {
        let mut solver = SparsePivotingSolver::<f64>::new();
        let mut state = ParallelState::new(1);
        let mut view = ParallelSolver::new(&mut solver, &mut state);
        let mut task = view.task(0);
        assert!(matches!(
            task.factorizer(),
            Err(EngineError::AccessNotSupported { operation: "factor" })
        ));
    }

    #[test]
    fn test_removed_element_is_reported() {
        let mut solver = SparsePivotingSolver::<f64>::new();
        let mut state = ParallelState::new(1);
        {
            let mut view = ParallelSolver::new(&mut solver, &mut state);
            view.get_element(0, loc(1, 1)).unwrap();
        }
        solver.remove_element(loc(1, 1));
        let mut view = ParallelSolver::new(&mut solver, &mut state);
        assert!(matches!(
            view.load(|_, _| Ok(())),
            Err(EngineError::InvalidHandle { .. })
        ));
    }

    #[test]
    fn test_reused_slot_does_not_revive_a_claim() {
        let mut solver = SparsePivotingSolver::<f64>::new();
        let mut state = ParallelState::new(1);
        let handle = {
            let mut view = ParallelSolver::new(&mut solver, &mut state);
            view.get_element(0, loc(1, 1)).unwrap()
        };
        let removed = solver.find_element(loc(1, 1)).unwrap();
        solver.remove_element(loc(1, 1));
        solver.set_value(loc(2, 3), 0.5).unwrap();
        assert_eq!(solver.find_element(loc(2, 3)), Some(removed));

        let mut view = ParallelSolver::new(&mut solver, &mut state);
        assert!(matches!(
            view.load(|_, values| {
                values.add_matrix(handle, 1.0);
                Ok(())
            }),
            Err(EngineError::InvalidHandle { .. })
        ));
        view.apply();
        assert_eq!(solver.value(loc(2, 3)), 0.5);
    }

    #[test]
    fn test_claims_follow_reordering() {
        let mut solver = SparsePivotingSolver::new();
        solver.set_value(loc(1, 2), 1.0).unwrap();
        solver.set_value(loc(2, 1), 1.0).unwrap();
        solver.set_value(loc(2, 2), 1.0).unwrap();
        let mut state = ParallelState::new(2);
        let handles = {
            let mut view = ParallelSolver::new(&mut solver, &mut state);
            [
                view.get_element(0, loc(1, 2)).unwrap(),
                view.get_element(1, loc(1, 2)).unwrap(),
            ]
        };
        solver.set_rhs_value(1, 1.0).unwrap();
        solver.set_rhs_value(2, 3.0).unwrap();
        assert_eq!(solver.order_and_factor().unwrap(), 2);

        solver.reset();
        solver.set_value(loc(2, 1), 1.0).unwrap();
        solver.set_value(loc(2, 2), 1.0).unwrap();
        let mut view = ParallelSolver::new(&mut solver, &mut state);
        view.load(|task, values| {
            values.add_matrix(handles[task], 0.5);
            Ok(())
        })
        .unwrap();
        view.apply();
        assert_eq!(solver.value(loc(1, 2)), 1.0);
    }
}
