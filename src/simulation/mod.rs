//! Analyses driving the solver and the integration method.
//!
//! Devices take part through the [`Behavior`] trait. A behavior binds its
//! matrix locations once, updates its companion model sequentially, then
//! loads its contributions. Loading only reads the behavior, so the load
//! pass may run on the rayon pool through a
//! [`ParallelSolver`](crate::solver::ParallelSolver).

mod newton;
mod transient;

pub use newton::{NewtonConfig, NewtonRaphson};
pub use transient::{TimePoint, Transient, TransientConfig, TransientStatistics};

use crate::error::Result;
use crate::integration::{Breakpoints, IntegrationMethod, StateHistory};
use crate::solver::{LoadSolver, LoadTarget};

/// Which analysis is loading the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// DC operating point; charges do not move.
    OperatingPoint,
    /// Time domain.
    Transient,
}

/// What a behavior sees of the running analysis.
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    pub mode: AnalysisMode,
    /// Time of the point being solved.
    pub time: f64,
    /// Last iterate, 1-based; entry 0 is ground.
    pub solution: &'a [f64],
}

impl LoadContext<'_> {
    /// Value of unknown `index` in the last iterate, 0 for ground.
    pub fn value(&self, index: usize) -> f64 {
        self.solution.get(index).copied().unwrap_or(0.0)
    }
}

/// A device as seen by the analyses.
pub trait Behavior: Send + Sync {
    /// Unique name within the circuit.
    fn name(&self) -> &str;

    /// Request matrix and right-hand side handles and reserve state slots.
    fn bind(&mut self, solver: &mut dyn LoadSolver<f64>, states: &mut StateHistory) -> Result<()>;

    /// Update the companion model before a load.
    ///
    /// Runs sequentially. Charge storage writes its charge into the current
    /// state vector here and integrates it through `method`.
    fn update(&mut self, _context: &LoadContext<'_>, _method: &mut IntegrationMethod) -> Result<()> {
        Ok(())
    }

    /// Add contributions through the bound handles.
    fn load(&self, context: &LoadContext<'_>, target: &mut dyn LoadTarget<f64>) -> Result<()>;

    /// A time point (or the operating point) was accepted.
    ///
    /// Sources with discontinuities schedule their next edges here.
    fn accept(&mut self, _context: &LoadContext<'_>, _breakpoints: &mut Breakpoints) -> Result<()> {
        Ok(())
    }

    /// Whether the contributions depend on the solution.
    fn is_nonlinear(&self) -> bool {
        false
    }
}
