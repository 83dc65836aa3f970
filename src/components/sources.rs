//! Voltage and current sources.

use crate::algebra::MatrixLocation;
use crate::circuit::{BranchId, NodeId};
use crate::error::Result;
use crate::integration::{Breakpoints, StateHistory};
use crate::simulation::{Behavior, LoadContext};
use crate::solver::{ElementSet, LoadSolver, LoadTarget};

/// A trapezoidal pulse train.
///
/// ```text
///          ______          pulsed
///         /      \
/// ______ /        \______  initial
///  delay rise width fall
/// ```
///
/// A non-positive period gives a single pulse.
#[derive(Debug, Clone, PartialEq)]
pub struct Pulse {
    pub initial: f64,
    pub pulsed: f64,
    pub delay: f64,
    pub rise: f64,
    pub fall: f64,
    pub width: f64,
    pub period: f64,
}

impl Pulse {
    fn is_periodic(&self) -> bool {
        self.period > 0.0 && self.period.is_finite()
    }

    /// Edge times within one period, relative to its start.
    fn edges(&self) -> [f64; 4] {
        [
            0.0,
            self.rise,
            self.rise + self.width,
            self.rise + self.width + self.fall,
        ]
    }

    /// Value at `time`.
    pub fn value(&self, time: f64) -> f64 {
        if time < self.delay {
            return self.initial;
        }
        let mut local = time - self.delay;
        if self.is_periodic() {
            local -= self.period * (local / self.period).floor();
        }
        let [_, top, fall_start, fall_end] = self.edges();
        if local < top {
            self.initial + (self.pulsed - self.initial) * local / self.rise
        } else if local < fall_start {
            self.pulsed
        } else if local < fall_end {
            self.pulsed + (self.initial - self.pulsed) * (local - fall_start) / self.fall
        } else {
            self.initial
        }
    }

    /// The first edge strictly after `time`.
    pub fn next_edge(&self, time: f64) -> Option<f64> {
        if time < self.delay {
            return Some(self.delay);
        }
        let edges = self.edges();
        if !self.is_periodic() {
            return edges.iter().map(|e| self.delay + e).find(|&t| t > time);
        }
        let period = ((time - self.delay) / self.period).floor();
        (0..3)
            .flat_map(|k| {
                let start = self.delay + (period + k as f64) * self.period;
                edges.into_iter().map(move |e| start + e)
            })
            .find(|&t| t > time)
    }
}

/// Time dependence of an independent source.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    Dc(f64),
    Pulse(Pulse),
}

impl Waveform {
    pub fn value(&self, time: f64) -> f64 {
        match self {
            Waveform::Dc(value) => *value,
            Waveform::Pulse(pulse) => pulse.value(time),
        }
    }

    /// Schedule the next discontinuity after `time`.
    fn schedule(&self, time: f64, breakpoints: &mut Breakpoints) -> Result<()> {
        match self {
            Waveform::Dc(_) => Ok(()),
            Waveform::Pulse(pulse) => match pulse.next_edge(time) {
                Some(edge) => breakpoints.set_breakpoint(edge),
                None => Ok(()),
            },
        }
    }
}

/// A voltage source.
///
/// Voltage sources add a branch current unknown. The source enforces
/// `V+ - V- = V_source`.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    name: String,
    nodes: [NodeId; 2], // [positive, negative]
    branch: BranchId,
    waveform: Waveform,
    elements: ElementSet,
}

impl VoltageSource {
    pub fn new(
        name: impl Into<String>,
        positive: NodeId,
        negative: NodeId,
        branch: BranchId,
        waveform: Waveform,
    ) -> Self {
        Self {
            name: name.into(),
            nodes: [positive, negative],
            branch,
            waveform,
            elements: ElementSet::default(),
        }
    }

    pub fn branch(&self) -> BranchId {
        self.branch
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }
}

impl Behavior for VoltageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(&mut self, solver: &mut dyn LoadSolver<f64>, _states: &mut StateHistory) -> Result<()> {
        let (p, n, b) = (self.nodes[0].index(), self.nodes[1].index(), self.branch.index());
        let locations = [(p, b), (n, b), (b, p), (b, n)].map(MatrixLocation::from);
        self.elements = ElementSet::new::<f64, _>(solver, &locations, &[b])?;
        Ok(())
    }

    fn load(&self, context: &LoadContext<'_>, target: &mut dyn LoadTarget<f64>) -> Result<()> {
        let value = self.waveform.value(context.time);
        self.elements
            .add(target, &[1.0, -1.0, 1.0, -1.0], &[value])
    }

    fn accept(&mut self, context: &LoadContext<'_>, breakpoints: &mut Breakpoints) -> Result<()> {
        self.waveform.schedule(context.time, breakpoints)
    }
}

/// A current source. Current flows from the positive node through the
/// source into the negative node.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    name: String,
    nodes: [NodeId; 2],
    waveform: Waveform,
    elements: ElementSet,
}

impl CurrentSource {
    pub fn new(name: impl Into<String>, positive: NodeId, negative: NodeId, waveform: Waveform) -> Self {
        Self {
            name: name.into(),
            nodes: [positive, negative],
            waveform,
            elements: ElementSet::default(),
        }
    }
}

impl Behavior for CurrentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(&mut self, solver: &mut dyn LoadSolver<f64>, _states: &mut StateHistory) -> Result<()> {
        let rows = [self.nodes[0].index(), self.nodes[1].index()];
        self.elements = ElementSet::new::<f64, _>(solver, &[], &rows)?;
        Ok(())
    }

    fn load(&self, context: &LoadContext<'_>, target: &mut dyn LoadTarget<f64>) -> Result<()> {
        let value = self.waveform.value(context.time);
        self.elements.add_rhs(target, &[-value, value])
    }

    fn accept(&mut self, context: &LoadContext<'_>, breakpoints: &mut Breakpoints) -> Result<()> {
        self.waveform.schedule(context.time, breakpoints)
    }
}
