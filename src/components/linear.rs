//! Linear passive components: Resistor, Capacitor.

use crate::algebra::MatrixLocation;
use crate::circuit::NodeId;
use crate::error::{EngineError, Result};
use crate::integration::{Integration, IntegrationMethod, StateHistory};
use crate::simulation::{AnalysisMode, Behavior, LoadContext};
use crate::solver::{ElementSet, LoadSolver, LoadTarget};

/// The four locations of a two-terminal conductance stamp.
pub(crate) fn conductance_locations(positive: NodeId, negative: NodeId) -> [MatrixLocation; 4] {
    let (p, n) = (positive.index(), negative.index());
    [(p, p), (p, n), (n, p), (n, n)].map(MatrixLocation::from)
}

/// A resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    name: String,
    nodes: [NodeId; 2], // [positive, negative]
    resistance: f64,
    elements: ElementSet,
}

impl Resistor {
    /// Create a new resistor. The resistance is floored at 1 µΩ.
    pub fn new(name: impl Into<String>, positive: NodeId, negative: NodeId, resistance: f64) -> Self {
        Self {
            name: name.into(),
            nodes: [positive, negative],
            resistance: resistance.max(1e-6),
            elements: ElementSet::default(),
        }
    }

    pub fn nodes(&self) -> [NodeId; 2] {
        self.nodes
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl Behavior for Resistor {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(&mut self, solver: &mut dyn LoadSolver<f64>, _states: &mut StateHistory) -> Result<()> {
        let [p, n] = self.nodes;
        self.elements = ElementSet::new::<f64, _>(solver, &conductance_locations(p, n), &[])?;
        Ok(())
    }

    fn load(&self, _context: &LoadContext<'_>, target: &mut dyn LoadTarget<f64>) -> Result<()> {
        let g = self.conductance();
        self.elements.add_matrix(target, &[g, -g, -g, g])
    }
}

/// A capacitor.
///
/// The charge `q = C v` lives in the state vector; the integration method
/// turns it into the companion model `i = geq v + ceq` for every step.
/// At the operating point the capacitor is open.
#[derive(Debug, Clone)]
pub struct Capacitor {
    name: String,
    nodes: [NodeId; 2],
    capacitance: f64,
    elements: ElementSet,
    /// Charge slot; the current follows at `state + 1`
    state: Option<usize>,
    companion: Integration,
}

impl Capacitor {
    pub fn new(name: impl Into<String>, positive: NodeId, negative: NodeId, capacitance: f64) -> Self {
        Self {
            name: name.into(),
            nodes: [positive, negative],
            capacitance,
            elements: ElementSet::default(),
            state: None,
            companion: Integration::default(),
        }
    }

    pub fn nodes(&self) -> [NodeId; 2] {
        self.nodes
    }

    pub fn capacitance(&self) -> f64 {
        self.capacitance
    }

    /// Capacitor current at the last update, 0 before binding.
    pub fn current(&self, states: &StateHistory) -> f64 {
        self.state.map_or(0.0, |index| states.value(0, index + 1))
    }

    fn state(&self) -> Result<usize> {
        self.state
            .ok_or_else(|| EngineError::invalid_handle(format!("capacitor '{}' is not bound", self.name)))
    }
}

impl Behavior for Capacitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(&mut self, solver: &mut dyn LoadSolver<f64>, states: &mut StateHistory) -> Result<()> {
        let [p, n] = self.nodes;
        self.elements = ElementSet::new::<f64, _>(
            solver,
            &conductance_locations(p, n),
            &[p.index(), n.index()],
        )?;
        self.state = Some(states.allocate(2));
        Ok(())
    }

    fn update(&mut self, context: &LoadContext<'_>, method: &mut IntegrationMethod) -> Result<()> {
        let state = self.state()?;
        let [p, n] = self.nodes;
        let voltage = context.value(p.index()) - context.value(n.index());
        method.states_mut().current_mut()[state] = self.capacitance * voltage;
        self.companion = match context.mode {
            AnalysisMode::OperatingPoint => Integration::default(),
            AnalysisMode::Transient => method.integrate(state, self.capacitance)?,
        };
        Ok(())
    }

    fn load(&self, _context: &LoadContext<'_>, target: &mut dyn LoadTarget<f64>) -> Result<()> {
        let Integration { geq, ceq } = self.companion;
        self.elements
            .add(target, &[geq, -geq, -geq, geq], &[-ceq, ceq])
    }
}
