//! Breakpoint bookkeeping.

use std::fmt;

use crate::error::{EngineError, Result};

/// Ordered set of times the integrator has to land on exactly.
///
/// The set always has a lower bound and ends in `+∞`. The lower bound starts
/// at 0 and is kept as a floor apart from the inserted points, so
/// [`first`](Self::first) reports the earliest inserted time as soon as one
/// exists. Popping the last inserted point moves the floor onto it.
#[derive(Debug, Clone)]
pub struct Breakpoints {
    /// Inserted points in ascending order, terminated by `+∞`
    points: Vec<f64>,
    floor: f64,
    min_break: f64,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self::new()
    }
}

impl Breakpoints {
    /// Create the initial `{0, ∞}` set.
    pub fn new() -> Self {
        Self {
            points: vec![f64::INFINITY],
            floor: 0.0,
            min_break: 0.0,
        }
    }

    /// Minimum spacing below which two points are the same point.
    pub fn min_break(&self) -> f64 {
        self.min_break
    }

    pub fn set_min_break(&mut self, min_break: f64) {
        self.min_break = min_break.max(0.0);
    }

    /// Number of inserted points inside the set.
    fn inserted(&self) -> usize {
        self.points.len() - 1
    }

    /// The earliest breakpoint.
    pub fn first(&self) -> f64 {
        if self.inserted() > 0 {
            self.points[0]
        } else {
            self.floor
        }
    }

    /// The lower bound: 0, or the last point popped.
    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Distance between the two earliest breakpoints.
    pub fn delta(&self) -> f64 {
        let next = if self.inserted() > 0 {
            self.points[1]
        } else {
            self.points[0]
        };
        next - self.first()
    }

    /// Number of points including both bounds.
    pub fn len(&self) -> usize {
        self.points.len() + 1
    }

    /// Never true, the bounds are always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Inserted points in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.points[..self.inserted()].iter().copied()
    }

    /// Insert `time` unless a point within `min_break` already exists,
    /// the floor included.
    pub fn set_breakpoint(&mut self, time: f64) -> Result<()> {
        if !time.is_finite() || time < 0.0 {
            return Err(EngineError::invalid_parameter(
                "breakpoint",
                format!("time must be finite and non-negative, got {}", time),
            ));
        }
        if (time - self.floor).abs() <= self.min_break {
            return Ok(());
        }
        let position = self.points.partition_point(|&p| p < time);
        let near = |index: usize| {
            index < self.inserted() && (self.points[index] - time).abs() <= self.min_break
        };
        if near(position) || (position > 0 && near(position - 1)) {
            return Ok(());
        }
        self.points.insert(position, time);
        Ok(())
    }

    /// Pop the earliest breakpoint.
    ///
    /// With no inserted points left the floor moves up to the upper bound.
    pub fn clear_breakpoint(&mut self) {
        if self.inserted() > 0 {
            self.floor = self.points.remove(0);
        } else {
            self.floor = self.points[0];
        }
    }

    /// Back to `{0, ∞}`.
    pub fn clear(&mut self) {
        self.points.clear();
        self.points.push(f64::INFINITY);
        self.floor = 0.0;
    }
}

impl fmt::Display for Breakpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}", self.floor)?;
        for point in &self.points {
            write!(f, ", {}", point)?;
        }
        write!(f, "}}")
    }
}
