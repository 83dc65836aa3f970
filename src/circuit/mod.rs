//! Circuit container.
//!
//! A [`Circuit`] numbers the unknowns (node voltages and branch currents)
//! and owns the behaviors that load them. It does not parse netlists; the
//! caller builds it in code.

mod graph;
mod types;

pub use graph::Circuit;
pub use types::*;
