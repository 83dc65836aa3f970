//! Newton-Raphson iteration.

use log::trace;

use crate::error::{EngineError, Result};
use crate::solver::SparsePivotingSolver;

/// Default iteration limit for the operating point.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default relative convergence tolerance.
pub const DEFAULT_RELTOL: f64 = 1e-3;

/// Default absolute convergence tolerance (volts).
pub const DEFAULT_VNTOL: f64 = 1e-6;

/// Configuration of the Newton-Raphson iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonConfig {
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Relative tolerance on the change of an unknown.
    pub reltol: f64,
    /// Absolute tolerance on the change of an unknown.
    pub vntol: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            reltol: DEFAULT_RELTOL,
            vntol: DEFAULT_VNTOL,
        }
    }
}

impl NewtonConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_reltol(mut self, reltol: f64) -> Self {
        self.reltol = reltol;
        self
    }

    pub fn with_vntol(mut self, vntol: f64) -> Self {
        self.vntol = vntol;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(EngineError::invalid_parameter(
                "max_iterations",
                "at least one iteration is needed",
            ));
        }
        if !(self.reltol > 0.0 && self.vntol > 0.0) {
            return Err(EngineError::invalid_parameter(
                "reltol",
                "convergence tolerances must be positive",
            ));
        }
        Ok(())
    }
}

/// Newton-Raphson iteration over a [`SparsePivotingSolver`].
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Relative convergence tolerance
    pub reltol: f64,
    /// Absolute convergence tolerance
    pub vntol: f64,
    /// Previous iterate for the convergence check
    previous: Vec<f64>,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self::new()
    }
}

impl NewtonRaphson {
    pub fn new() -> Self {
        Self::with_config(&NewtonConfig::default())
    }

    pub fn with_config(config: &NewtonConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            reltol: config.reltol,
            vntol: config.vntol,
            previous: Vec::new(),
        }
    }

    /// Iterate until the solution settles.
    ///
    /// `solution` holds the initial guess and receives the result; it is
    /// resized to the solver. Each iteration zeroes the solver and calls
    /// `load` with the last iterate. A linear system is solved once.
    ///
    /// Returns the number of iterations used.
    pub fn solve<F>(
        &mut self,
        solver: &mut SparsePivotingSolver<f64>,
        solution: &mut Vec<f64>,
        nonlinear: bool,
        mut load: F,
    ) -> Result<usize>
    where
        F: FnMut(&mut SparsePivotingSolver<f64>, &[f64]) -> Result<()>,
    {
        solution.resize(solver.size() + 1, 0.0);

        for iteration in 1..=self.max_iterations {
            solver.reset();
            load(solver, solution)?;
            // Loading may have grown the system
            solution.resize(solver.size() + 1, 0.0);
            solver.order_and_factor()?;

            self.previous.clear();
            self.previous.extend_from_slice(solution);
            solver.solve(solution)?;

            if !nonlinear {
                return Ok(iteration);
            }
            trace!("Iteration {}: max change {:.3e}", iteration, self.residual(solution));
            if iteration > 1 && self.is_converged(solution) {
                return Ok(iteration);
            }
        }

        Err(EngineError::convergence_failure(
            self.max_iterations,
            self.residual(solution),
        ))
    }

    fn is_converged(&self, solution: &[f64]) -> bool {
        solution
            .iter()
            .zip(&self.previous)
            .skip(1)
            .all(|(&x, &p)| (x - p).abs() <= self.reltol * x.abs().max(p.abs()) + self.vntol)
    }

    /// Largest change of an unknown over the last iteration.
    fn residual(&self, solution: &[f64]) -> f64 {
        solution
            .iter()
            .zip(&self.previous)
            .skip(1)
            .fold(0.0f64, |max, (&x, &p)| max.max((x - p).abs()))
    }
}
