use approx::assert_relative_eq;
use tranz_core::circuit::NodeId;
use tranz_core::components::{Capacitor, CurrentSource, Pulse, Resistor, VoltageSource, Waveform};
use tranz_core::error::EngineError;
use tranz_core::integration::IntegrationConfig;
use tranz_core::{Circuit, Transient, TransientConfig};

const R: f64 = 1e3;
const C: f64 = 1e-6;

struct Point {
    time: f64,
    delta: f64,
    v_in: f64,
    v_out: f64,
}

/// `in ── R ── out ── C ── gnd` driven by `waveform`.
fn rc_circuit(waveform: Waveform) -> (Circuit, NodeId, NodeId) {
    let mut circuit = Circuit::new();
    let input = circuit.node("in");
    let output = circuit.node("out");
    let branch = circuit.branch("V1");
    circuit.add(VoltageSource::new("V1", input, NodeId::GROUND, branch, waveform));
    circuit.add(Resistor::new("R1", input, output, R));
    circuit.add(Capacitor::new("C1", output, NodeId::GROUND, C));
    (circuit, input, output)
}

fn step() -> Waveform {
    Waveform::Pulse(Pulse {
        initial: 0.0,
        pulsed: 1.0,
        delay: 0.0,
        rise: 1e-9,
        fall: 1e-9,
        width: 1.0,
        period: 0.0,
    })
}

fn run(config: TransientConfig, waveform: Waveform) -> Vec<Point> {
    let (mut circuit, input, output) = rc_circuit(waveform);
    let mut transient = Transient::new(config);
    let mut points = Vec::new();
    transient
        .run(&mut circuit, |point| {
            points.push(Point {
                time: point.time,
                delta: point.delta,
                v_in: point.value(input.index()),
                v_out: point.value(output.index()),
            })
        })
        .unwrap();
    points
}

#[test]
fn test_rc_charging_follows_exponential() {
    let stop = 5e-3;
    let points = run(TransientConfig::new(1e-5, stop), step());

    assert_eq!(points[0].time, 0.0);
    assert_eq!(points[0].delta, 0.0);
    assert_eq!(points[0].v_out, 0.0);
    assert_eq!(points.last().unwrap().time, stop);

    for pair in points.windows(2) {
        assert!(pair[1].time > pair[0].time);
        assert!(pair[1].delta <= stop / 50.0 * (1.0 + 1e-12));
    }
    for point in points.iter().filter(|p| p.time > 1e-6) {
        let expected = 1.0 - (-point.time / (R * C)).exp();
        assert!(
            (point.v_out - expected).abs() < 1e-2,
            "t = {}: {} vs {}",
            point.time,
            point.v_out,
            expected
        );
        assert_relative_eq!(point.v_in, 1.0, max_relative = 1e-9);
    }
}

#[test]
fn test_pulse_edges_are_hit_exactly() {
    let pulse = Pulse {
        initial: 0.0,
        pulsed: 2.0,
        delay: 1e-4,
        rise: 1e-5,
        fall: 2e-5,
        width: 5e-4,
        period: 1e-3,
    };
    let stop = 2.5e-3;
    let points = run(
        TransientConfig::new(1e-5, stop).with_max_step(5e-5),
        Waveform::Pulse(pulse.clone()),
    );

    let mut edges = Vec::new();
    for k in 0..3 {
        let start = pulse.delay + k as f64 * pulse.period;
        for offset in [0.0, pulse.rise, pulse.rise + pulse.width, pulse.rise + pulse.width + pulse.fall] {
            let edge = start + offset;
            if edge < stop {
                edges.push(edge);
            }
        }
    }
    assert_eq!(edges.len(), 10);

    for edge in edges {
        let point = points
            .iter()
            .find(|p| (p.time - edge).abs() <= 1e-12)
            .unwrap_or_else(|| panic!("no time point on edge {}", edge));
        assert_relative_eq!(point.v_in, pulse.value(edge), epsilon = 1e-9);
    }
}

#[test]
fn test_parallel_load_matches_sequential() {
    let stop = 3e-3;
    let sequential = run(TransientConfig::new(1e-5, stop), step());
    let parallel = run(TransientConfig::new(1e-5, stop).with_parallel(2), step());

    let last_s = sequential.last().unwrap();
    let last_p = parallel.last().unwrap();
    assert_eq!(last_s.time, last_p.time);
    assert_relative_eq!(last_s.v_out, last_p.v_out, epsilon = 1e-6);
    assert_relative_eq!(last_p.v_out, 1.0 - (-stop / (R * C)).exp(), epsilon = 1e-2);
}

#[test]
fn test_current_source_into_resistor() {
    let mut circuit = Circuit::new();
    let node = circuit.node("n1");
    circuit.add(CurrentSource::new("I1", NodeId::GROUND, node, Waveform::Dc(1e-3)));
    circuit.add(Resistor::new("R1", node, NodeId::GROUND, 2e3));

    let mut transient = Transient::new(TransientConfig::new(1e-6, 1e-5));
    let mut values = Vec::new();
    let statistics = transient
        .run(&mut circuit, |point| values.push(point.value(node.index())))
        .unwrap();

    assert_eq!(statistics.accepted_points, values.len());
    for value in values {
        assert_relative_eq!(value, 2.0, max_relative = 1e-12);
    }
}

#[test]
fn test_branch_current_jumps_do_not_shrink_the_step() {
    // The source holds the node at 1 V while the pulsed load switches its current
    let mut circuit = Circuit::new();
    let node = circuit.node("n1");
    let branch = circuit.branch("V1");
    circuit.add(VoltageSource::new("V1", node, NodeId::GROUND, branch, Waveform::Dc(1.0)));
    circuit.add(Resistor::new("R1", node, NodeId::GROUND, 1e3));
    circuit.add(CurrentSource::new(
        "I1",
        NodeId::GROUND,
        node,
        Waveform::Pulse(Pulse {
            initial: 0.0,
            pulsed: 1e-3,
            delay: 1e-4,
            rise: 1e-9,
            fall: 1e-9,
            width: 2e-4,
            period: 0.0,
        }),
    ));

    let stop = 1e-3;
    let mut transient = Transient::new(TransientConfig::new(1e-5, stop));
    let mut points = Vec::new();
    let statistics = transient
        .run(&mut circuit, |point| {
            points.push((point.delta, point.value(node.index()), point.value(branch.index())))
        })
        .unwrap();

    assert_eq!(statistics.rejected_points, 0);
    for &(_, voltage, _) in &points {
        assert_relative_eq!(voltage, 1.0, max_relative = 1e-12);
    }
    let (low, high) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), &(_, _, current)| {
            (low.min(current), high.max(current))
        });
    assert_relative_eq!(high - low, 1e-3, max_relative = 1e-9);
    let largest = points.iter().map(|p| p.0).fold(0.0, f64::max);
    assert_relative_eq!(largest, stop / 50.0, max_relative = 1e-9);
}

#[test]
fn test_explicit_delta_min_is_kept() {
    let stop = 1e-3;
    let (mut circuit, _, _) = rc_circuit(step());
    let mut transient = Transient::new(TransientConfig::new(1e-5, stop));
    transient.run(&mut circuit, |_| {}).unwrap();
    assert_relative_eq!(transient.method().delta_min(), 1e-13 * stop / 50.0, max_relative = 1e-12);

    let (mut circuit, _, _) = rc_circuit(step());
    let config = TransientConfig::new(1e-5, stop)
        .with_integration(IntegrationConfig::new().with_delta_min(1e-14));
    let mut transient = Transient::new(config);
    transient.run(&mut circuit, |_| {}).unwrap();
    assert_eq!(transient.method().delta_min(), 1e-14);
}

#[test]
fn test_invalid_runs_are_rejected() {
    let (mut circuit, _, _) = rc_circuit(Waveform::Dc(1.0));
    let mut transient = Transient::new(TransientConfig::new(1e-5, 0.0));
    assert!(matches!(
        transient.run(&mut circuit, |_| {}),
        Err(EngineError::InvalidParameter { name: "stop", .. })
    ));

    let mut empty = Circuit::new();
    let mut transient = Transient::new(TransientConfig::new(1e-5, 1e-3));
    assert!(matches!(
        transient.run(&mut empty, |_| {}),
        Err(EngineError::InvalidParameter { name: "circuit", .. })
    ));
}
