//! The trapezoidal rule.
//!
//! Order 1 is the backward Euler step, order 2 the trapezoidal rule proper:
//!
//! ```text
//! order 1:  q'(n) = (q(n) - q(n-1)) / h
//! order 2:  q'(n) = 2 (q(n) - q(n-1)) / h - q'(n-1)
//! ```

use crate::error::{EngineError, Result};

use super::{Integration, IntegrationRule, StateHistory};

/// Coefficients of the trapezoidal rule.
#[derive(Debug, Clone, Default)]
pub struct Trapezoidal {
    ag: [f64; 2],
}

impl Trapezoidal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coefficients of the last [`compute_coefficients`](IntegrationRule::compute_coefficients).
    pub fn coefficients(&self) -> [f64; 2] {
        self.ag
    }
}

fn check_order(order: usize) -> Result<()> {
    match order {
        1 | 2 => Ok(()),
        _ => Err(EngineError::InvalidOrder { order }),
    }
}

impl IntegrationRule for Trapezoidal {
    fn max_order(&self) -> usize {
        2
    }

    fn compute_coefficients(&mut self, order: usize, delta: f64) -> Result<f64> {
        self.ag = match order {
            1 => [1.0 / delta, -1.0 / delta],
            2 => [2.0 / delta, 1.0],
            _ => return Err(EngineError::InvalidOrder { order }),
        };
        Ok(self.ag[0])
    }

    fn integrate(
        &self,
        order: usize,
        states: &mut StateHistory,
        index: usize,
        capacitance: f64,
    ) -> Result<Integration> {
        let derivative = index + 1;
        let [ag0, ag1] = self.ag;
        let q0 = states.value(0, index);
        let q1 = states.value(1, index);
        let value = match order {
            1 => ag0 * q0 + ag1 * q1,
            2 => -states.value(1, derivative) * ag1 + ag0 * (q0 - q1),
            _ => return Err(EngineError::InvalidOrder { order }),
        };
        states.set_value(0, derivative, value);
        Ok(Integration {
            geq: ag0 * capacitance,
            ceq: value - ag0 * q0,
        })
    }

    fn predict(
        &self,
        order: usize,
        solutions: &[Vec<f64>],
        delta_old: &[f64],
        prediction: &mut [f64],
    ) -> Result<()> {
        check_order(order)?;
        let (sol0, sol1) = (&solutions[0], &solutions[1]);
        for i in 1..prediction.len() {
            let dd0 = (sol0[i] - sol1[i]) / delta_old[1];
            prediction[i] = if order == 1 {
                sol0[i] + delta_old[0] * dd0
            } else {
                let b = -delta_old[0] / (2.0 * delta_old[1]);
                let a = 1.0 - b;
                let dd1 = (sol1[i] - solutions[2][i]) / delta_old[2];
                sol0[i] + (b * dd1 + a * dd0) * delta_old[0]
            };
        }
        Ok(())
    }

    fn truncation_step(
        &self,
        order: usize,
        difference: f64,
        tolerance: f64,
        trtol: f64,
        delta_old: &[f64],
    ) -> Result<f64> {
        if difference == 0.0 {
            return Ok(f64::INFINITY);
        }
        match order {
            1 => Ok(delta_old[0] * (2.0 * trtol * tolerance / difference).abs().sqrt()),
            2 => {
                let ratio = delta_old[1] / delta_old[0];
                let derivative = 4.0 * difference / (1.0 + ratio * ratio);
                Ok(delta_old[0] * (12.0 * trtol * tolerance / derivative).abs().cbrt())
            }
            _ => Err(EngineError::InvalidOrder { order }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_invalid_orders() {
        let mut rule = Trapezoidal::new();
        for order in [0, 3] {
            assert_eq!(
                rule.compute_coefficients(order, 1e-6),
                Err(EngineError::InvalidOrder { order })
            );
        }
        let mut states = StateHistory::new(3);
        states.allocate(2);
        assert!(rule.integrate(3, &mut states, 0, 1.0).is_err());
    }

    #[test]
    fn test_order_one_closed_form() {
        let delta = 1e-3;
        let capacitance = 2e-6;
        let mut rule = Trapezoidal::new();
        assert_relative_eq!(rule.compute_coefficients(1, delta).unwrap(), 1.0 / delta);

        let mut states = StateHistory::new(3);
        let q = states.allocate(2);
        states.current_mut()[q] = 3e-6;
        states.fill();
        states.shift();
        states.current_mut()[q] = 5e-6;

        let result = rule.integrate(1, &mut states, q, capacitance).unwrap();
        assert_relative_eq!(result.geq, capacitance / delta, max_relative = 1e-12);
        assert_relative_eq!(result.ceq, -3e-6 / delta, max_relative = 1e-9);
        assert_relative_eq!(states.value(0, q + 1), (5e-6 - 3e-6) / delta, max_relative = 1e-9);
    }

    #[test]
    fn test_order_two_uses_previous_derivative() {
        let delta = 0.5;
        let mut rule = Trapezoidal::new();
        assert_eq!(rule.compute_coefficients(2, delta).unwrap(), 4.0);

        let mut states = StateHistory::new(3);
        let q = states.allocate(2);
        states.current_mut()[q] = 1.0;
        states.current_mut()[q + 1] = 0.5;
        states.fill();
        states.shift();
        states.current_mut()[q] = 2.0;

        let result = rule.integrate(2, &mut states, q, 1.0).unwrap();
        // 2 (2 - 1) / 0.5 - 0.5
        assert_relative_eq!(states.value(0, q + 1), 3.5);
        assert_relative_eq!(result.geq, 4.0);
        assert_relative_eq!(result.ceq, 3.5 - 8.0);
    }

    #[test]
    fn test_predict_extrapolates_lines() {
        let rule = Trapezoidal::new();
        let delta_old = [0.1, 0.2, 0.3];
        // Points at t = 0.5, 0.3, 0 and the prediction at 0.6
        let times = [0.5, 0.3, 0.0];
        let line = |t: f64| 1.0 + 2.0 * t;
        let solutions: Vec<Vec<f64>> = times.iter().map(|&t| vec![0.0, line(t)]).collect();
        let mut prediction = vec![0.0; 2];
        rule.predict(1, &solutions, &delta_old, &mut prediction).unwrap();
        assert_relative_eq!(prediction[1], line(0.6), epsilon = 1e-12);

        rule.predict(2, &solutions, &delta_old, &mut prediction).unwrap();
        assert_relative_eq!(prediction[1], line(0.6), epsilon = 1e-12);
        assert!(rule.predict(4, &solutions, &delta_old, &mut prediction).is_err());
    }

    #[test]
    fn test_truncation_step() {
        let rule = Trapezoidal::new();
        let delta_old = [1e-3, 1e-3];
        assert_eq!(
            rule.truncation_step(1, 0.0, 1e-6, 7.0, &delta_old).unwrap(),
            f64::INFINITY
        );
        let first = rule.truncation_step(1, 1e-4, 1e-6, 7.0, &delta_old).unwrap();
        assert_relative_eq!(first, 1e-3 * (2.0 * 7.0 * 1e-6 / 1e-4f64).sqrt(), max_relative = 1e-12);
        let second = rule.truncation_step(2, -1e-4, 1e-6, 7.0, &delta_old).unwrap();
        assert_relative_eq!(second, 1e-3 * (12.0 * 7.0 * 1e-6 / 2e-4f64).cbrt(), max_relative = 1e-12);
    }
}
