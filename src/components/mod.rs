//! Reference stamps.
//!
//! This module provides the stamps the analyses can load:
//! - Linear: Resistor, Capacitor
//! - Sources: Voltage Source, Current Source (DC or pulse)
//!
//! Each device implements [`Behavior`](crate::simulation::Behavior) and
//! stamps through the handles it obtained when binding.

mod linear;
mod sources;

pub use linear::{Capacitor, Resistor};
pub use sources::{CurrentSource, Pulse, VoltageSource, Waveform};
