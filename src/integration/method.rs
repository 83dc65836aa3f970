//! Timestep control.

use log::{debug, trace};

use crate::error::{EngineError, Result};

use super::{
    Breakpoints, Integration, IntegrationConfig, IntegrationRule, MethodState, StateHistory,
    Trapezoidal, DEFAULT_DELTA_MIN,
};

/// Adaptive time stepping around an [`IntegrationRule`].
///
/// A transient analysis drives the method through a fixed cycle:
///
/// 1. [`initialize`](Self::initialize) once the operating point is known,
/// 2. [`advance`](Self::advance) to propose the next time point,
/// 3. [`compute_coefficients`](Self::compute_coefficients) and
///    [`predict`](Self::predict), then solve,
/// 4. [`retry`](Self::retry) with a smaller step when the solve fails, or
///    [`new_delta`](Self::new_delta) when it converges, which either
///    accepts the point or rewinds to a smaller step,
/// 5. [`save_solution`](Self::save_solution) and
///    [`update_breakpoints`](Self::update_breakpoints) on acceptance.
#[derive(Debug)]
pub struct IntegrationMethod {
    rule: Box<dyn IntegrationRule>,
    config: IntegrationConfig,
    breakpoints: Breakpoints,
    states: StateHistory,

    state: MethodState,
    time: f64,
    delta: f64,
    order: usize,
    slope: f64,
    is_break: bool,
    saved_time: f64,
    saved_delta: f64,
    /// `delta_old[0]` is the step being taken
    delta_old: Vec<f64>,

    /// Accepted solutions, most recent first
    solutions: Vec<Vec<f64>>,
    has_solutions: bool,
    prediction: Vec<f64>,
    /// Unknowns checked by the truncation error estimate, all when `None`
    truncatable: Option<Vec<usize>>,
}

impl IntegrationMethod {
    /// Create a method for `rule`.
    pub fn new(rule: Box<dyn IntegrationRule>, mut config: IntegrationConfig) -> Self {
        let depth = rule.max_order() + 1;
        if config.delta_min <= 0.0 {
            config.delta_min = DEFAULT_DELTA_MIN;
        }
        let mut breakpoints = Breakpoints::new();
        breakpoints.set_min_break(config.min_break);
        Self {
            rule,
            config,
            breakpoints,
            states: StateHistory::new(depth),
            state: MethodState::Uninitialized,
            time: 0.0,
            delta: f64::NAN,
            order: 1,
            slope: 0.0,
            is_break: true,
            saved_time: f64::NAN,
            saved_delta: f64::NAN,
            delta_old: vec![f64::NAN; depth],
            solutions: vec![Vec::new(); depth],
            has_solutions: false,
            prediction: Vec::new(),
            truncatable: None,
        }
    }

    /// Create a trapezoidal method.
    pub fn trapezoidal(config: IntegrationConfig) -> Self {
        Self::new(Box::new(Trapezoidal::new()), config)
    }

    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    pub fn state(&self) -> MethodState {
        self.state
    }

    /// The time point being solved.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The step leading to [`time`](Self::time).
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn max_order(&self) -> usize {
        self.rule.max_order()
    }

    /// Derivative of an integrated quantity with respect to its value.
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Whether the current time point sits on a breakpoint.
    pub fn is_break(&self) -> bool {
        self.is_break
    }

    /// The last accepted time point.
    pub fn saved_time(&self) -> f64 {
        self.saved_time
    }

    /// Step history, `delta_old()[0]` being the current step.
    pub fn delta_old(&self) -> &[f64] {
        &self.delta_old
    }

    pub fn delta_min(&self) -> f64 {
        self.config.delta_min
    }

    pub fn set_delta_min(&mut self, delta_min: f64) {
        self.config.delta_min = delta_min;
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn breakpoints_mut(&mut self) -> &mut Breakpoints {
        &mut self.breakpoints
    }

    /// Schedule a time point the method has to land on.
    pub fn set_breakpoint(&mut self, time: f64) -> Result<()> {
        self.breakpoints.set_breakpoint(time)
    }

    pub fn states(&self) -> &StateHistory {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut StateHistory {
        &mut self.states
    }

    /// The last prediction, 1-based.
    pub fn prediction(&self) -> &[f64] {
        &self.prediction
    }

    /// Accepted solution `age` points back, 1-based.
    pub fn solution(&self, age: usize) -> &[f64] {
        &self.solutions[age]
    }

    /// Restrict the truncation error estimate to `unknowns`.
    pub fn set_truncatable(&mut self, unknowns: Vec<usize>) {
        self.truncatable = Some(unknowns);
    }

    /// Reset to `t = 0` at order 1, standing on a breakpoint.
    pub fn initialize(&mut self) {
        self.time = 0.0;
        self.delta = f64::NAN;
        self.order = 1;
        self.slope = 0.0;
        self.is_break = true;
        self.saved_time = f64::NAN;
        self.saved_delta = f64::NAN;
        self.delta_old.fill(f64::NAN);
        self.breakpoints.clear();
        self.breakpoints.set_min_break(self.config.min_break);
        for solution in &mut self.solutions {
            solution.clear();
        }
        self.has_solutions = false;
        self.prediction.clear();
        self.state = MethodState::Accepted;
        debug!("Integration method initialized");
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.state == MethodState::Uninitialized {
            return Err(EngineError::NotInitialized);
        }
        Ok(())
    }

    /// Propose the next time point `delta` after the current one.
    ///
    /// Starting from a breakpoint, the floor of the set included, the step is
    /// cut to a tenth of the smaller of the last full step and the breakpoint
    /// spacing (a hundredth at `t = 0`). A step that would cross the next breakpoint ends on it
    /// instead and raises the break flag.
    pub fn advance(&mut self, delta: f64) -> Result<()> {
        self.ensure_initialized()?;
        let mut delta = delta;
        self.is_break = false;
        self.saved_time = self.time;
        if self.saved_delta.is_nan() {
            self.saved_delta = delta;
        }

        let first = self.breakpoints.first();
        let on_first = self.time == first || first - self.time <= self.config.delta_min;
        let on_floor = self.time == self.breakpoints.floor();
        if on_first || on_floor {
            self.order = 1;
            let spacing = if on_first {
                self.breakpoints.delta()
            } else {
                first - self.time
            };
            let spacing = self.saved_delta.min(spacing);
            delta = delta.min(0.1 * spacing);
            if self.time == 0.0 {
                delta /= 10.0;
            }
            delta = delta.max(2.0 * self.config.delta_min);
            self.time += delta;
            trace!("Stepping off breakpoint {:.6e} with {:.3e}", first, delta);
        } else if self.time + delta >= first {
            self.saved_delta = delta;
            delta = first - self.time;
            self.is_break = true;
            self.time = first;
            trace!("Landing on breakpoint {:.6e}", first);
        } else {
            self.time += delta;
        }

        self.delta = delta;
        self.delta_old.rotate_right(1);
        self.delta_old[0] = delta;
        self.states.shift();
        self.state = MethodState::Advancing;
        Ok(())
    }

    /// Retry the current time point with the smaller step `delta`.
    ///
    /// `delta` must be strictly below the step being retried.
    pub fn retry(&mut self, delta: f64) -> Result<()> {
        self.ensure_initialized()?;
        if delta >= self.delta {
            return Err(EngineError::InvalidRetry {
                delta,
                current: self.delta,
            });
        }
        let delta = delta.max(self.config.delta_min);
        debug!("Retrying t = {:.6e} with step {:.3e}", self.saved_time + delta, delta);
        self.delta = delta;
        self.delta_old[0] = delta;
        self.time = self.saved_time + delta;
        self.order = 1;
        self.state = MethodState::Retrying;
        Ok(())
    }

    /// Update the coefficients of the rule for the current step.
    pub fn compute_coefficients(&mut self) -> Result<()> {
        self.slope = self.rule.compute_coefficients(self.order, self.delta)?;
        Ok(())
    }

    /// Integrate the state at `index` into `index + 1`.
    pub fn integrate(&mut self, index: usize, capacitance: f64) -> Result<Integration> {
        self.rule
            .integrate(self.order, &mut self.states, index, capacitance)
    }

    /// Extrapolate the solution at the current time point.
    ///
    /// Needs at least one [`save_solution`](Self::save_solution).
    pub fn predict(&mut self) -> Result<&[f64]> {
        if !self.has_solutions {
            return Err(EngineError::NotInitialized);
        }
        let length = self.solutions[0].len();
        self.prediction.resize(length, 0.0);
        self.rule.predict(
            self.order,
            &self.solutions,
            &self.delta_old,
            &mut self.prediction,
        )?;
        Ok(&self.prediction)
    }

    /// Remember an accepted solution.
    pub fn save_solution(&mut self, solution: &[f64]) {
        if !self.has_solutions {
            for saved in &mut self.solutions {
                saved.clear();
                saved.extend_from_slice(solution);
            }
            self.has_solutions = true;
        } else {
            self.solutions.rotate_right(1);
            self.solutions[0].clear();
            self.solutions[0].extend_from_slice(solution);
        }
    }

    /// Drop the breakpoints that lie behind the current time.
    pub fn update_breakpoints(&mut self) {
        while self.time > self.breakpoints.first() {
            self.breakpoints.clear_breakpoint();
        }
    }

    /// Overwrite the whole step history with `delta`.
    pub fn fill_old_deltas(&mut self, delta: f64) {
        self.delta_old.fill(delta);
    }

    /// Largest step the truncation error of `solution` allows, capped at
    /// twice the current step.
    pub fn truncate(&self, solution: &[f64]) -> Result<f64> {
        let mut limit = 2.0 * self.delta;
        let check = |index: usize| -> Result<f64> {
            let (Some(&value), Some(&predicted)) = (solution.get(index), self.prediction.get(index)) else {
                return Ok(f64::INFINITY);
            };
            let difference = value - predicted;
            let tolerance =
                value.abs().max(predicted.abs()) * self.config.lte_reltol + self.config.lte_abstol;
            self.rule.truncation_step(
                self.order,
                difference,
                tolerance,
                self.config.trtol,
                &self.delta_old,
            )
        };
        match &self.truncatable {
            Some(unknowns) => {
                for &index in unknowns {
                    limit = limit.min(check(index)?);
                }
            }
            None => {
                for index in 1..solution.len() {
                    limit = limit.min(check(index)?);
                }
            }
        }
        Ok(limit)
    }

    /// Judge the converged time point.
    ///
    /// Returns `true` when the point is accepted; the step for the next
    /// point is then ready in [`delta`](Self::delta), possibly at a higher
    /// order. Returns `false` when the error is too large; time has then
    /// been rewound to a smaller step that must be solved again.
    pub fn new_delta(&mut self, solution: &[f64]) -> Result<bool> {
        self.ensure_initialized()?;
        let mut new_delta = self.truncate(solution)?;
        let accepted = if new_delta > 0.9 * self.delta {
            if self.order == 1 && self.max_order() > 1 {
                self.order = 2;
                let raised = self.truncate(solution)?;
                if raised <= 1.05 * self.delta {
                    self.order = 1;
                } else {
                    new_delta = raised;
                    trace!("Raising order to 2 at t = {:.6e}", self.time);
                }
            }
            true
        } else {
            false
        };

        new_delta = new_delta.max(self.config.delta_min);
        if !accepted {
            self.time = self.saved_time + new_delta;
        }
        self.delta = new_delta;
        self.delta_old[0] = new_delta;
        self.state = if accepted {
            MethodState::Accepted
        } else {
            MethodState::Retrying
        };
        Ok(accepted)
    }
}
