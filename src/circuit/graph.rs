//! Unknown numbering and behavior storage.

use std::collections::{HashMap, HashSet};

use super::types::{BranchId, ComponentId, NodeId};
use crate::error::{EngineError, Result};
use crate::simulation::Behavior;

/// A circuit ready for analysis.
pub struct Circuit {
    /// Node names to node IDs, ground included
    node_map: HashMap<String, NodeId>,
    /// Unknown index to name; entry 0 is ground
    unknown_names: Vec<String>,
    /// Unknown index to whether it is a branch current
    branches: Vec<bool>,
    behaviors: Vec<Box<dyn Behavior>>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    /// An empty circuit with only the ground node ("0" or "gnd").
    pub fn new() -> Self {
        let mut node_map = HashMap::new();
        node_map.insert("0".to_string(), NodeId::GROUND);
        node_map.insert("gnd".to_string(), NodeId::GROUND);
        Self {
            node_map,
            unknown_names: vec!["0".to_string()],
            branches: vec![false],
            behaviors: Vec::new(),
        }
    }

    /// The node called `name`, created on first use.
    pub fn node(&mut self, name: &str) -> NodeId {
        let key = name.to_lowercase();
        if let Some(&id) = self.node_map.get(&key) {
            return id;
        }
        let id = NodeId(self.unknown_names.len());
        self.unknown_names.push(name.to_string());
        self.branches.push(false);
        self.node_map.insert(key, id);
        id
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(&name.to_lowercase()).copied()
    }

    /// A new branch current unknown labelled `name`.
    pub fn branch(&mut self, name: &str) -> BranchId {
        let id = BranchId(self.unknown_names.len());
        self.unknown_names.push(format!("{}#branch", name));
        self.branches.push(true);
        id
    }

    /// Number of unknowns, ground excluded.
    pub fn unknown_count(&self) -> usize {
        self.unknown_names.len() - 1
    }

    /// Indices of the node voltage unknowns, ground excluded.
    pub fn node_unknowns(&self) -> Vec<usize> {
        (1..self.branches.len()).filter(|&i| !self.branches[i]).collect()
    }

    /// Name of the unknown at `index`.
    pub fn unknown_name(&self, index: usize) -> Option<&str> {
        self.unknown_names.get(index).map(String::as_str)
    }

    /// Add a behavior.
    pub fn add<B: Behavior + 'static>(&mut self, behavior: B) -> ComponentId {
        self.behaviors.push(Box::new(behavior));
        ComponentId(self.behaviors.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    pub fn behavior(&self, id: ComponentId) -> Option<&dyn Behavior> {
        self.behaviors.get(id.0).map(|b| b.as_ref())
    }

    pub fn behaviors(&self) -> &[Box<dyn Behavior>] {
        &self.behaviors
    }

    pub fn behaviors_mut(&mut self) -> &mut [Box<dyn Behavior>] {
        &mut self.behaviors
    }

    /// Whether any behavior needs Newton-Raphson iteration.
    pub fn is_nonlinear(&self) -> bool {
        self.behaviors.iter().any(|b| b.is_nonlinear())
    }

    /// Check the circuit can be analyzed.
    ///
    /// Checks:
    /// - There is at least one behavior and one unknown
    /// - Behavior names are unique
    pub fn validate(&self) -> Result<()> {
        if self.behaviors.is_empty() || self.unknown_count() == 0 {
            return Err(EngineError::invalid_parameter(
                "circuit",
                "the circuit has no behaviors or no unknowns",
            ));
        }
        let mut names = HashSet::new();
        for behavior in &self.behaviors {
            if !names.insert(behavior.name().to_lowercase()) {
                return Err(EngineError::invalid_parameter(
                    "circuit",
                    format!("duplicate behavior name '{}'", behavior.name()),
                ));
            }
        }
        Ok(())
    }
}
