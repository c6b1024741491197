//! End-to-end circuits solved through the full registry/solver pipeline.

use num_complex::Complex;
use voltra_core::{Circuit, NodeId};
use voltra_devices::{
    Capacitor, Diode, Inductor, Npn, PortSpec, Resistor, SParameterBlock,
    SinusoidalVoltageSource, VoltageSource,
};
use voltra_solver::{Simulation, TransientParams};

fn node(n: u32) -> NodeId {
    NodeId::new(n)
}

/// V 1 0 10, R1 1 2 1k, R2 2 0 1k, .nodc: the divider settles at 5V.
#[test]
fn test_resistive_divider() {
    let mut circuit = Circuit::new();
    circuit.register_node(node(2));
    let vi = circuit.allocate_current();
    circuit
        .elements
        .add_static(Box::new(VoltageSource::new("V1", node(1), node(0), 10.0, vi)));
    circuit
        .elements
        .add_static(Box::new(Resistor::new("R1", node(1), node(2), 1000.0)));
    circuit
        .elements
        .add_static(Box::new(Resistor::new("R2", node(2), node(0), 1000.0)));

    let params = TransientParams {
        t_start: 0.0,
        t_stop: 1e-3,
        dt: 1e-5,
    };
    let mut sim = Simulation::new(circuit, params, false);
    sim.run().unwrap();

    let last = sim.steps() - 1;
    assert!((sim.voltage(node(2), last) - 5.0).abs() < 1e-6);
    assert!((sim.voltage(node(1), last) - 10.0).abs() < 1e-6);
    // source branch current: 5mA out of the positive terminal
    assert!((sim.current(1, last) + 5e-3).abs() < 1e-6);
}

/// V 1 0 1, R 1 2 1k, C 2 0 1u: the capacitor charges to 1 − e⁻⁵.
#[test]
fn test_rc_charge() {
    let mut circuit = Circuit::new();
    circuit.register_node(node(2));
    let vi = circuit.allocate_current();
    circuit
        .elements
        .add_static(Box::new(VoltageSource::new("V1", node(1), node(0), 1.0, vi)));
    circuit
        .elements
        .add_static(Box::new(Resistor::new("R1", node(1), node(2), 1000.0)));
    circuit
        .elements
        .add_dynamic(Box::new(Capacitor::new("C1", node(2), node(0), 1e-6)));

    let params = TransientParams {
        t_start: 0.0,
        t_stop: 5e-3,
        dt: 1e-6,
    };
    let mut sim = Simulation::new(circuit, params, false);
    sim.run().unwrap();

    let last = sim.steps() - 1;
    let expected = 1.0 - (-5.0_f64).exp();
    assert!(
        (sim.voltage(node(2), last) - expected).abs() < 1e-4,
        "V(cap) = {} (expected {expected})",
        sim.voltage(node(2), last)
    );
}

/// VS 1 0 2 1000, R 1 2 1k, D 2 0: the diode clamps the positive swing.
#[test]
fn test_diode_clipper_positive_clamp() {
    let mut circuit = Circuit::new();
    circuit.register_node(node(2));
    let vi = circuit.allocate_current();
    circuit.elements.add_dynamic(Box::new(SinusoidalVoltageSource::new(
        "VS1",
        node(1),
        node(0),
        2.0,
        1000.0,
        0.0,
        0.0,
        vi,
    )));
    circuit
        .elements
        .add_static(Box::new(Resistor::new("R1", node(1), node(2), 1000.0)));
    circuit
        .elements
        .add_nonlinear(Box::new(Diode::new("D1", node(2), node(0))));

    let params = TransientParams {
        t_start: 0.0,
        t_stop: 2e-3,
        dt: 1e-6,
    };
    let mut sim = Simulation::new(circuit, params, false);
    sim.run().unwrap();

    let waveform = sim.voltage_waveform(node(2));
    let max = waveform.iter().cloned().fold(f64::MIN, f64::max);
    let min = waveform.iter().cloned().fold(f64::MAX, f64::min);
    assert!(max < 0.8, "positive swing not clamped: {max}");
    assert!(max > 0.3, "diode never conducted: {max}");
    // a single diode leaves the negative swing untouched
    assert!(min < -1.8, "negative swing unexpectedly clamped: {min}");
}

/// Antiparallel diodes clip both half-waves inside ±0.8V.
#[test]
fn test_diode_clipper_antiparallel() {
    let mut circuit = Circuit::new();
    circuit.register_node(node(2));
    let vi = circuit.allocate_current();
    circuit.elements.add_dynamic(Box::new(SinusoidalVoltageSource::new(
        "VS1",
        node(1),
        node(0),
        2.0,
        1000.0,
        0.0,
        0.0,
        vi,
    )));
    circuit
        .elements
        .add_static(Box::new(Resistor::new("R1", node(1), node(2), 1000.0)));
    circuit
        .elements
        .add_nonlinear(Box::new(Diode::new("D1", node(2), node(0))));
    circuit
        .elements
        .add_nonlinear(Box::new(Diode::new("D2", node(0), node(2))));

    let params = TransientParams {
        t_start: 0.0,
        t_stop: 2e-3,
        dt: 1e-6,
    };
    let mut sim = Simulation::new(circuit, params, false);
    sim.run().unwrap();

    let waveform = sim.voltage_waveform(node(2));
    let max = waveform.iter().cloned().fold(f64::MIN, f64::max);
    let min = waveform.iter().cloned().fold(f64::MAX, f64::min);
    assert!(max < 0.8 && max > 0.3, "positive clamp off: {max}");
    assert!(min > -0.8 && min < -0.3, "negative clamp off: {min}");
}

/// V 1 0 1, L 1 2 1mH, C 2 0 1uF: rings at 1/(2π√LC) ≈ 5.03 kHz.
#[test]
fn test_lc_oscillator_frequency() {
    let mut circuit = Circuit::new();
    circuit.register_node(node(2));
    let vi = circuit.allocate_current();
    let li = circuit.allocate_dc_current();
    circuit
        .elements
        .add_static(Box::new(VoltageSource::new("V1", node(1), node(0), 1.0, vi)));
    circuit
        .elements
        .add_dynamic(Box::new(Inductor::new("L1", node(1), node(2), 1e-3, li)));
    circuit
        .elements
        .add_dynamic(Box::new(Capacitor::new("C1", node(2), node(0), 1e-6)));

    let params = TransientParams {
        t_start: 0.0,
        t_stop: 10e-3,
        dt: 1e-6,
    };
    let mut sim = Simulation::new(circuit, params, false);
    sim.run().unwrap();

    // the step response swings around 1V; measure the period between
    // downward crossings of that midline
    let waveform = sim.voltage_waveform(node(2));
    let mut crossings = Vec::new();
    for n in 1..waveform.len() {
        let (prev, curr) = (waveform[n - 1] - 1.0, waveform[n] - 1.0);
        if prev > 0.0 && curr <= 0.0 {
            let frac = prev / (prev - curr);
            crossings.push((n as f64 - 1.0 + frac) * params.dt);
        }
    }
    assert!(crossings.len() >= 10, "too few crossings: {}", crossings.len());

    let measured_period =
        (crossings.last().unwrap() - crossings[0]) / (crossings.len() - 1) as f64;
    let measured_freq = 1.0 / measured_period;
    let expected_freq = 1.0 / (2.0 * std::f64::consts::PI * (1e-3_f64 * 1e-6).sqrt());
    let rel_err = (measured_freq - expected_freq).abs() / expected_freq;
    assert!(
        rel_err < 0.01,
        "ringing at {measured_freq:.1} Hz, expected {expected_freq:.1} Hz ({:.2}%)",
        rel_err * 100.0
    );
}

/// V 1 0 5, R 1 2 10k, QN1 3 2 0, R 3 0 1k: saturated NPN bias point.
#[test]
fn test_bjt_npn_dc_bias() {
    let mut circuit = Circuit::new();
    circuit.register_node(node(3));
    let vi = circuit.allocate_current();
    circuit
        .elements
        .add_static(Box::new(VoltageSource::new("V1", node(1), node(0), 5.0, vi)));
    circuit
        .elements
        .add_static(Box::new(Resistor::new("R1", node(1), node(2), 10_000.0)));
    circuit
        .elements
        .add_nonlinear(Box::new(Npn::new("QN1", node(3), node(2), node(0))));
    circuit
        .elements
        .add_static(Box::new(Resistor::new("R2", node(3), node(0), 1000.0)));

    let params = TransientParams {
        t_start: 0.0,
        t_stop: 1e-5,
        dt: 1e-6,
    };
    let mut sim = Simulation::new(circuit, params, true);
    sim.run().unwrap();

    let v_base = sim.voltage(node(2), 0);
    let v_collector = sim.voltage(node(3), 0);
    assert!(
        v_base > 0.6 && v_base < 0.8,
        "V(base) = {v_base} outside the forward-bias window"
    );
    assert!(v_collector > 0.0, "V(collector) = {v_collector}");
}

/// A resistor-diode-source ladder reaches the same steady state whether
/// it starts from the DC operating point or from zeros.
#[test]
fn test_dc_operating_point_invariance() {
    let build = || {
        let mut circuit = Circuit::new();
        circuit.register_node(node(2));
        let vi = circuit.allocate_current();
        circuit
            .elements
            .add_static(Box::new(VoltageSource::new("V1", node(1), node(0), 2.0, vi)));
        circuit
            .elements
            .add_static(Box::new(Resistor::new("R1", node(1), node(2), 1000.0)));
        circuit
            .elements
            .add_nonlinear(Box::new(Diode::new("D1", node(2), node(0))));
        circuit
    };

    // long transient from zeros
    let mut from_zeros = Simulation::new(
        build(),
        TransientParams {
            t_start: 0.0,
            t_stop: 1e-3,
            dt: 1e-5,
        },
        false,
    );
    from_zeros.run().unwrap();

    // DC then a minimal transient
    let mut from_dc = Simulation::new(
        build(),
        TransientParams {
            t_start: 0.0,
            t_stop: 3e-5,
            dt: 1e-5,
        },
        true,
    );
    from_dc.run().unwrap();

    let steady_a = from_zeros.voltage(node(2), from_zeros.steps() - 1);
    let steady_b = from_dc.voltage(node(2), from_dc.steps() - 1);
    assert!(
        (steady_a - steady_b).abs() < 1e-6,
        "steady states differ: {steady_a} vs {steady_b}"
    );
    // forward drop of the reference diode
    assert!(steady_a > 0.3 && steady_a < 0.8);
}

/// A 2-port S-parameter thru block between matched source and load
/// reproduces the input at port 2.
#[test]
fn test_sparam_thru_line() {
    let freqs: Vec<f64> = (0..8).map(|i| i as f64 * 1e8).collect();
    let one = vec![Complex::new(1.0, 0.0); 8];
    let zero = vec![Complex::new(0.0, 0.0); 8];
    let s = vec![vec![zero.clone(), one.clone()], vec![one, zero]];

    let mut circuit = Circuit::new();
    circuit.register_node(node(3));
    let vi = circuit.allocate_current();
    let p1 = circuit.allocate_current();
    let p2 = circuit.allocate_current();

    circuit
        .elements
        .add_static(Box::new(VoltageSource::new("V1", node(1), node(0), 1.0, vi)));
    circuit
        .elements
        .add_static(Box::new(Resistor::new("R1", node(1), node(2), 50.0)));
    circuit.elements.add_dynamic(Box::new(SParameterBlock::from_sampled(
        "S1",
        vec![
            PortSpec {
                positive: node(2),
                negative: node(0),
                current_index: p1,
            },
            PortSpec {
                positive: node(3),
                negative: node(0),
                current_index: p2,
            },
        ],
        &freqs,
        &s,
        50.0,
        0.01,
    )));
    circuit
        .elements
        .add_static(Box::new(Resistor::new("R2", node(3), node(0), 50.0)));

    let params = TransientParams {
        t_start: 0.0,
        t_stop: 1e-7,
        dt: 1e-9,
    };
    let mut sim = Simulation::new(circuit, params, false);
    sim.run().unwrap();

    // ideal thru between matched terminations: half the source at both
    // ports, equal voltages across the block
    let last = sim.steps() - 1;
    let v_in = sim.voltage(node(2), last);
    let v_out = sim.voltage(node(3), last);
    assert!(
        (v_out - 0.5).abs() < 0.025,
        "V(port2) = {v_out} (expected 0.5 ± 5%)"
    );
    assert!((v_in - v_out).abs() < 1e-6, "thru ports differ: {v_in} vs {v_out}");
}
