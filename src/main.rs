//! Tranz - transient analysis of an RC low-pass driven by a pulse
//!
//! Runs the adaptive transient engine on
//!
//! ```text
//! in ──R── out
//!  │        │
//!  V        C
//!  │        │
//! gnd      gnd
//! ```
//!
//! and prints every accepted time point as CSV.
//!
//! # Usage
//!
//! ```bash
//! tranz --resistance 1e3 --capacitance 1e-6 --stop 5e-3 --parallel 2 > rc.csv
//! ```

use std::error::Error;
use std::io::{self, BufWriter, Write};

use clap::Parser;
use log::{info, LevelFilter};
use tranz_core::{
    circuit::NodeId,
    components::{Capacitor, Pulse, Resistor, VoltageSource, Waveform},
    Circuit, Transient, TransientConfig,
};

/// Transient simulation of a pulsed RC low-pass
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Series resistance in ohms
    #[arg(short, long, default_value_t = 1e3)]
    resistance: f64,

    /// Shunt capacitance in farads
    #[arg(short, long, default_value_t = 1e-6)]
    capacitance: f64,

    /// Pulse amplitude in volts
    #[arg(short, long, default_value_t = 1.0)]
    amplitude: f64,

    /// Pulse width in seconds
    #[arg(long, default_value_t = 1e-3)]
    width: f64,

    /// Pulse period in seconds (0 for a single pulse)
    #[arg(long, default_value_t = 4e-3)]
    period: f64,

    /// Rise and fall time in seconds
    #[arg(long, default_value_t = 1e-5)]
    edge: f64,

    /// Suggested timestep in seconds
    #[arg(long, default_value_t = 1e-5)]
    step: f64,

    /// Final time in seconds
    #[arg(short, long, default_value_t = 8e-3)]
    stop: f64,

    /// Maximum timestep in seconds (0 for stop/50)
    #[arg(long, default_value_t = 0.0)]
    max_step: f64,

    /// Load the circuit with this many parallel tasks
    #[arg(short, long)]
    parallel: Option<usize>,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .init();

    // Build the circuit
    let mut circuit = Circuit::new();
    let input = circuit.node("in");
    let output = circuit.node("out");
    let branch = circuit.branch("V1");
    let pulse = Pulse {
        initial: 0.0,
        pulsed: args.amplitude,
        delay: 0.0,
        rise: args.edge,
        fall: args.edge,
        width: args.width,
        period: args.period,
    };
    circuit.add(VoltageSource::new(
        "V1",
        input,
        NodeId::GROUND,
        branch,
        Waveform::Pulse(pulse),
    ));
    circuit.add(Resistor::new("R1", input, output, args.resistance));
    circuit.add(Capacitor::new("C1", output, NodeId::GROUND, args.capacitance));

    let mut config = TransientConfig::new(args.step, args.stop).with_max_step(args.max_step);
    if let Some(tasks) = args.parallel {
        config = config.with_parallel(tasks);
    }
    let mut transient = Transient::new(config);

    // Export
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    writeln!(out, "time,v_in,v_out")?;
    let mut write_result = Ok(());
    let statistics = transient.run(&mut circuit, |point| {
        if write_result.is_ok() {
            write_result = writeln!(
                out,
                "{:.9e},{:.9e},{:.9e}",
                point.time,
                point.value(input.index()),
                point.value(output.index())
            );
        }
    })?;
    write_result?;
    out.flush()?;

    info!(
        "{} points accepted, {} rejected, {} iterations",
        statistics.accepted_points, statistics.rejected_points, statistics.iterations
    );
    Ok(())
}
