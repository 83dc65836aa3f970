//! # Tranz Core
//!
//! A sparse pivoting solver and adaptive transient engine for SPICE-style
//! circuit simulation.
//!
//! This library provides:
//! - 1-based sparse vectors and matrices with arena storage and a trash
//!   element for grounded stamps
//! - An LU solver with Markowitz pivoting that keeps its ordering between
//!   factorizations
//! - A parallel load view that lets several tasks stamp at the same time
//! - Breakpoint bookkeeping and an adaptive trapezoidal integration method
//!
//! ## Architecture
//!
//! - [`algebra`] - Sparse storage, scalars and index translation
//! - [`solver`] - Pivoting LU solver, Markowitz strategy, parallel view
//! - [`integration`] - Breakpoints, state history, timestep control
//! - [`circuit`] - Node and branch naming, device container
//! - [`components`] - Reference stamps (R, C, sources)
//! - [`simulation`] - Newton-Raphson and the transient driver
//!
//! ## Usage
//!
//! ```no_run
//! use tranz_core::components::{Capacitor, Resistor, VoltageSource, Waveform};
//! use tranz_core::simulation::{Transient, TransientConfig};
//! use tranz_core::Circuit;
//!
//! let mut circuit = Circuit::new();
//! let input = circuit.node("in");
//! let output = circuit.node("out");
//! let branch = circuit.branch("V1");
//! circuit.add(VoltageSource::new("V1", input, tranz_core::circuit::NodeId::GROUND, branch, Waveform::Dc(1.0)));
//! circuit.add(Resistor::new("R1", input, output, 1e3));
//! circuit.add(Capacitor::new("C1", output, tranz_core::circuit::NodeId::GROUND, 1e-6));
//!
//! let mut transient = Transient::new(TransientConfig::new(1e-5, 5e-3));
//! transient
//!     .run(&mut circuit, |point| println!("{} {}", point.time, point.value(output.index())))
//!     .unwrap();
//! ```
//!
//! ## Transient Method
//!
//! For each time point:
//!
//! 1. Predict the solution from the accepted history
//! 2. Update companion models and load the system
//! 3. Iterate Newton-Raphson until convergence
//! 4. Estimate the truncation error and accept or reject the step
//!
//! Reactive elements are discretized using the trapezoidal rule.

pub mod algebra;
pub mod circuit;
pub mod components;
pub mod error;
pub mod integration;
pub mod simulation;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{EngineError, Result};
pub use simulation::{Transient, TransientConfig};
pub use solver::SparsePivotingSolver;
