//! Adaptive time integration.
//!
//! An [`IntegrationMethod`] decides where the next time point goes. It lands
//! exactly on [`Breakpoints`], grows or shrinks the step from a local
//! truncation error estimate, and rewinds when the nonlinear solve fails.
//! The formulas themselves (coefficients, prediction, error estimate and
//! the companion model of a charge) come from an [`IntegrationRule`];
//! [`Trapezoidal`] is the one shipped here.

mod breakpoints;
mod history;
mod method;
mod trapezoidal;

pub use breakpoints::Breakpoints;
pub use history::StateHistory;
pub use method::IntegrationMethod;
pub use trapezoidal::Trapezoidal;

use std::fmt;

use crate::error::{EngineError, Result};

/// Default transient tolerance factor.
pub const DEFAULT_TRTOL: f64 = 7.0;

/// Default relative tolerance of the truncation error estimate.
pub const DEFAULT_LTE_RELTOL: f64 = 1e-3;

/// Default absolute tolerance of the truncation error estimate.
pub const DEFAULT_LTE_ABSTOL: f64 = 1e-6;

/// Default smallest timestep.
pub const DEFAULT_DELTA_MIN: f64 = 1e-12;

/// Configuration of the time stepping.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationConfig {
    /// Overestimation factor of the truncation error.
    pub trtol: f64,
    /// Relative tolerance of the truncation error estimate.
    pub lte_reltol: f64,
    /// Absolute tolerance of the truncation error estimate.
    pub lte_abstol: f64,
    /// Smallest timestep before giving up. Zero lets the transient analysis
    /// derive it from the maximum step; a method used on its own falls back
    /// to [`DEFAULT_DELTA_MIN`].
    pub delta_min: f64,
    /// Minimum breakpoint spacing. Zero lets the transient analysis derive
    /// it from the maximum step.
    pub min_break: f64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            trtol: DEFAULT_TRTOL,
            lte_reltol: DEFAULT_LTE_RELTOL,
            lte_abstol: DEFAULT_LTE_ABSTOL,
            delta_min: 0.0,
            min_break: 0.0,
        }
    }
}

impl IntegrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trtol(mut self, trtol: f64) -> Self {
        self.trtol = trtol;
        self
    }

    pub fn with_lte_reltol(mut self, reltol: f64) -> Self {
        self.lte_reltol = reltol;
        self
    }

    pub fn with_lte_abstol(mut self, abstol: f64) -> Self {
        self.lte_abstol = abstol;
        self
    }

    pub fn with_delta_min(mut self, delta_min: f64) -> Self {
        self.delta_min = delta_min;
        self
    }

    pub fn with_min_break(mut self, min_break: f64) -> Self {
        self.min_break = min_break;
        self
    }

    /// Check that every tolerance is usable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("trtol", self.trtol),
            ("lte_reltol", self.lte_reltol),
            ("lte_abstol", self.lte_abstol),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::invalid_parameter(
                    name,
                    format!("must be positive, got {}", value),
                ));
            }
        }
        let non_negative = [("delta_min", self.delta_min), ("min_break", self.min_break)];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::invalid_parameter(
                    name,
                    format!("must not be negative, got {}", value),
                ));
            }
        }
        Ok(())
    }
}

/// Companion model of an integrated charge: `i = geq v + ceq`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Integration {
    /// Equivalent conductance.
    pub geq: f64,
    /// Equivalent current.
    pub ceq: f64,
}

/// Where an [`IntegrationMethod`] is in its step cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodState {
    /// `initialize` has not been called.
    Uninitialized,
    /// A new time point has been proposed.
    Advancing,
    /// The current time point is being retried with a smaller step.
    Retrying,
    /// The last time point was accepted.
    Accepted,
}

impl fmt::Display for MethodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MethodState::Uninitialized => "uninitialized",
            MethodState::Advancing => "advancing",
            MethodState::Retrying => "retrying",
            MethodState::Accepted => "accepted",
        };
        f.write_str(name)
    }
}

/// The formulas of a linear multistep integration rule.
///
/// `delta_old[0]` is the step being taken, `delta_old[1]` the one before.
/// Solutions are 1-based like the solver's.
pub trait IntegrationRule: fmt::Debug + Send + Sync {
    /// Highest supported order.
    fn max_order(&self) -> usize;

    /// Update the coefficients for `order` and step `delta`. Returns the
    /// derivative of the integrated quantity with respect to its value.
    fn compute_coefficients(&mut self, order: usize, delta: f64) -> Result<f64>;

    /// Integrate the quantity at `index` into `index + 1` of the current
    /// state vector and return the companion model for `capacitance`.
    fn integrate(
        &self,
        order: usize,
        states: &mut StateHistory,
        index: usize,
        capacitance: f64,
    ) -> Result<Integration>;

    /// Extrapolate the next solution from the accepted ones.
    fn predict(
        &self,
        order: usize,
        solutions: &[Vec<f64>],
        delta_old: &[f64],
        prediction: &mut [f64],
    ) -> Result<()>;

    /// Largest step that keeps an error of `difference` between solution
    /// and prediction within `tolerance`.
    fn truncation_step(
        &self,
        order: usize,
        difference: f64,
        tolerance: f64,
        trtol: f64,
        delta_old: &[f64],
    ) -> Result<f64>;
}
