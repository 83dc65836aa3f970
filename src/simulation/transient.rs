//! Transient analysis.

use log::{debug, info, warn};

use crate::circuit::Circuit;
use crate::error::{EngineError, Result};
use crate::integration::{IntegrationConfig, IntegrationMethod};
use crate::solver::{ParallelSolver, ParallelState, SparsePivotingSolver};

use super::{AnalysisMode, Behavior, LoadContext, NewtonConfig, NewtonRaphson};

/// Default iteration limit per time point.
pub const DEFAULT_TRANSIENT_ITERATIONS: usize = 10;

/// Configuration of a transient analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientConfig {
    /// Suggested timestep; the first step is derived from it.
    pub step: f64,
    /// Final time.
    pub stop: f64,
    /// Largest timestep. Zero means a fiftieth of the simulated span.
    pub max_step: f64,
    /// Newton-Raphson iterations allowed per time point.
    pub max_iterations: usize,
    /// Operating point iteration settings.
    pub newton: NewtonConfig,
    /// Timestep control settings.
    pub integration: IntegrationConfig,
    /// Number of parallel load tasks; `None` loads sequentially.
    pub parallel: Option<usize>,
}

impl TransientConfig {
    /// Simulate until `stop` with a suggested `step`.
    pub fn new(step: f64, stop: f64) -> Self {
        Self {
            step,
            stop,
            max_step: 0.0,
            max_iterations: DEFAULT_TRANSIENT_ITERATIONS,
            newton: NewtonConfig::default(),
            integration: IntegrationConfig::default(),
            parallel: None,
        }
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_newton(mut self, newton: NewtonConfig) -> Self {
        self.newton = newton;
        self
    }

    pub fn with_integration(mut self, integration: IntegrationConfig) -> Self {
        self.integration = integration;
        self
    }

    /// Load the circuit with `tasks` parallel tasks.
    pub fn with_parallel(mut self, tasks: usize) -> Self {
        self.parallel = Some(tasks);
        self
    }

    /// The maximum step with the default filled in.
    pub fn effective_max_step(&self) -> f64 {
        if self.max_step > 0.0 {
            self.max_step
        } else {
            self.stop / 50.0
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.step > 0.0 && self.step.is_finite()) {
            return Err(EngineError::invalid_parameter(
                "step",
                format!("must be positive, got {}", self.step),
            ));
        }
        if !(self.stop > 0.0 && self.stop.is_finite()) {
            return Err(EngineError::invalid_parameter(
                "stop",
                format!("must be positive, got {}", self.stop),
            ));
        }
        if self.max_step.is_nan() || self.max_step < 0.0 {
            return Err(EngineError::invalid_parameter(
                "max_step",
                format!("must not be negative, got {}", self.max_step),
            ));
        }
        if self.max_iterations == 0 {
            return Err(EngineError::invalid_parameter(
                "max_iterations",
                "at least one iteration is needed",
            ));
        }
        if self.parallel == Some(0) {
            return Err(EngineError::invalid_parameter(
                "parallel",
                "at least one task is needed",
            ));
        }
        self.newton.validate()?;
        self.integration.validate()
    }
}

/// An accepted time point.
#[derive(Debug, Clone, Copy)]
pub struct TimePoint<'a> {
    pub time: f64,
    /// Step that led here; zero at the operating point.
    pub delta: f64,
    pub order: usize,
    /// 1-based solution; entry 0 is ground.
    pub solution: &'a [f64],
}

impl TimePoint<'_> {
    /// Value of unknown `index`, 0 for ground.
    pub fn value(&self, index: usize) -> f64 {
        self.solution.get(index).copied().unwrap_or(0.0)
    }
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransientStatistics {
    pub accepted_points: usize,
    pub rejected_points: usize,
    pub iterations: usize,
}

/// Time-domain analysis with adaptive steps.
#[derive(Debug)]
pub struct Transient {
    config: TransientConfig,
    solver: SparsePivotingSolver<f64>,
    method: IntegrationMethod,
    newton: NewtonRaphson,
    parallel: Option<ParallelState<f64>>,
    solution: Vec<f64>,
    statistics: TransientStatistics,
}

impl Transient {
    pub fn new(config: TransientConfig) -> Self {
        let method = IntegrationMethod::trapezoidal(config.integration.clone());
        let newton = NewtonRaphson::with_config(&config.newton);
        Self {
            config,
            solver: SparsePivotingSolver::new(),
            method,
            newton,
            parallel: None,
            solution: Vec::new(),
            statistics: TransientStatistics::default(),
        }
    }

    pub fn config(&self) -> &TransientConfig {
        &self.config
    }

    pub fn solver(&self) -> &SparsePivotingSolver<f64> {
        &self.solver
    }

    pub fn method(&self) -> &IntegrationMethod {
        &self.method
    }

    pub fn statistics(&self) -> TransientStatistics {
        self.statistics
    }

    /// Run the analysis, handing every accepted time point to `export`.
    ///
    /// The operating point is exported first at `t = 0`.
    pub fn run<F>(&mut self, circuit: &mut Circuit, mut export: F) -> Result<TransientStatistics>
    where
        F: FnMut(&TimePoint<'_>),
    {
        self.config.validate()?;
        circuit.validate()?;
        self.statistics = TransientStatistics::default();

        let stop = self.config.stop;
        let max_step = self.config.effective_max_step();
        let mut integration = self.config.integration.clone();
        if integration.min_break == 0.0 {
            integration.min_break = 5e-5 * max_step;
        }
        if integration.delta_min == 0.0 {
            integration.delta_min = 1e-13 * max_step;
        }
        self.method = IntegrationMethod::trapezoidal(integration);
        // Only node voltages bound the step, branch currents are free to jump
        self.method.set_truncatable(circuit.node_unknowns());
        info!(
            "Transient analysis to {:.3e} s, max step {:.3e} s, {} unknowns",
            stop,
            max_step,
            circuit.unknown_count()
        );

        self.bind(circuit)?;
        self.solution = vec![0.0; self.solver.size() + 1];
        self.newton.max_iterations = self.config.newton.max_iterations;
        let iterations = self.iterate(circuit, AnalysisMode::OperatingPoint)?;
        self.statistics.iterations += iterations;
        debug!("Operating point found in {} iterations", iterations);

        self.method.initialize();
        self.method.set_breakpoint(stop)?;
        self.method.fill_old_deltas(max_step);
        self.method.states_mut().fill();
        self.newton.max_iterations = self.config.max_iterations;

        loop {
            self.accept(circuit)?;
            export(&TimePoint {
                time: self.method.time(),
                delta: if self.method.time() > 0.0 {
                    self.method.time() - self.method.saved_time()
                } else {
                    0.0
                },
                order: self.method.order(),
                solution: &self.solution,
            });
            if self.method.time() >= stop {
                break;
            }

            let delta = if self.method.time() > 0.0 {
                self.method.delta()
            } else {
                (stop / 50.0).min(self.config.step) / 10.0
            };
            self.method.advance(delta.min(max_step))?;
            self.solve_time_point(circuit)?;
        }

        info!(
            "Transient analysis done: {} points accepted, {} rejected, {} iterations",
            self.statistics.accepted_points,
            self.statistics.rejected_points,
            self.statistics.iterations
        );
        Ok(self.statistics)
    }

    /// Solve the proposed time point, cutting the step until it converges
    /// and its truncation error is acceptable.
    fn solve_time_point(&mut self, circuit: &mut Circuit) -> Result<()> {
        loop {
            let old_delta = self.method.delta();
            if old_delta.is_nan() {
                return Err(EngineError::invalid_parameter(
                    "delta",
                    "the timestep is not a number",
                ));
            }
            self.method.compute_coefficients()?;
            let prediction = self.method.predict()?;
            self.solution.copy_from_slice(prediction);
            self.method.states_mut().rewind();

            match self.iterate(circuit, AnalysisMode::Transient) {
                Ok(iterations) => {
                    self.statistics.iterations += iterations;
                    if self.method.new_delta(&self.solution)? {
                        return Ok(());
                    }
                    self.statistics.rejected_points += 1;
                    warn!(
                        "Time point {:.6e} rejected, retrying with step {:.3e}",
                        self.method.saved_time() + old_delta,
                        self.method.delta()
                    );
                }
                Err(error) if error.is_recoverable() => {
                    self.statistics.rejected_points += 1;
                    warn!("{} at t = {:.6e}, cutting the step", error, self.method.time());
                    self.method.retry(old_delta / 8.0)?;
                }
                Err(error) => return Err(error),
            }

            if self.method.delta() <= self.method.delta_min()
                && old_delta <= self.method.delta_min()
            {
                return Err(EngineError::TimestepTooSmall {
                    time: self.method.time(),
                    delta: self.method.delta(),
                });
            }
        }
    }

    /// Accept the current time point.
    fn accept(&mut self, circuit: &mut Circuit) -> Result<()> {
        let context = LoadContext {
            mode: AnalysisMode::Transient,
            time: self.method.time(),
            solution: &self.solution,
        };
        for behavior in circuit.behaviors_mut() {
            behavior.accept(&context, self.method.breakpoints_mut())?;
        }
        self.method.save_solution(&self.solution);
        self.method.update_breakpoints();
        self.statistics.accepted_points += 1;
        Ok(())
    }

    /// Clear the solver and bind every behavior to it.
    fn bind(&mut self, circuit: &mut Circuit) -> Result<()> {
        self.solver.clear();
        self.method.states_mut().clear();
        self.parallel = self.config.parallel.map(ParallelState::new);

        match &mut self.parallel {
            Some(state) => {
                let tasks = state.task_count();
                let mut view = ParallelSolver::new(&mut self.solver, state);
                for (index, behavior) in circuit.behaviors_mut().iter_mut().enumerate() {
                    let mut task = view.task(index % tasks);
                    behavior.bind(&mut task, self.method.states_mut())?;
                }
                debug!(
                    "Bound {} behaviors over {} tasks, {} bridges",
                    circuit.len(),
                    tasks,
                    state.bridge_count()
                );
            }
            None => {
                for behavior in circuit.behaviors_mut() {
                    behavior.bind(&mut self.solver, self.method.states_mut())?;
                }
            }
        }
        Ok(())
    }

    fn iterate(&mut self, circuit: &mut Circuit, mode: AnalysisMode) -> Result<usize> {
        let nonlinear = circuit.is_nonlinear();
        let time = match mode {
            AnalysisMode::OperatingPoint => 0.0,
            AnalysisMode::Transient => self.method.time(),
        };
        let Self {
            solver,
            method,
            newton,
            parallel,
            solution,
            ..
        } = self;
        let behaviors = circuit.behaviors_mut();

        newton.solve(solver, solution, nonlinear, |solver, solution| {
            let context = LoadContext {
                mode,
                time,
                solution,
            };
            for behavior in behaviors.iter_mut() {
                behavior.update(&context, method)?;
            }
            load(&*behaviors, solver, parallel.as_mut(), &context)
        })
    }
}

/// Load every behavior, spread over the parallel tasks when there are any.
fn load(
    behaviors: &[Box<dyn Behavior>],
    solver: &mut SparsePivotingSolver<f64>,
    parallel: Option<&mut ParallelState<f64>>,
    context: &LoadContext<'_>,
) -> Result<()> {
    match parallel {
        Some(state) => {
            let tasks = state.task_count();
            let mut view = ParallelSolver::new(solver, state);
            view.load(|task, values| {
                for behavior in behaviors.iter().skip(task).step_by(tasks) {
                    behavior.load(context, &mut *values)?;
                }
                Ok(())
            })?;
            view.apply();
        }
        None => {
            for behavior in behaviors {
                behavior.load(context, &mut *solver)?;
            }
        }
    }
    Ok(())
}
