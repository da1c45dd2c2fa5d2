//! Simulation of the circuits in `test_files/`.

use rstest::rstest;

use pennylane::serialize::load_json_file;
use pennylane::simulator::{simulate, McmMethod, SimulationConfig};
use pennylane::transforms::{decompose, DecomposeOptions};

#[rstest]
#[case::tree(McmMethod::Tree)]
#[case::one_shot(McmMethod::OneShot)]
fn mcm_bell(#[case] mcm_method: McmMethod) {
    let circ = load_json_file("../test_files/mcm_bell.json").unwrap();
    assert_eq!(circ.mid_circuit_measurements().count(), 2);

    let config = SimulationConfig {
        mcm_method,
        ..SimulationConfig::seeded(11)
    };
    let res = simulate(&circ, &config).unwrap();
    let res = res.measurements().unwrap();
    // Wire 1 is reset after being measured as 1.
    assert_eq!(res[0].as_scalar(), Some(1.0));
    let counts = res[1].as_counts().unwrap();
    assert_eq!(counts.len(), 1);
    let valid: usize = counts.values().sum();
    assert!(valid > 400 && valid < 600, "{valid} valid shots");
    let probs = res[2].as_probabilities().unwrap();
    assert_eq!(probs.len(), 2);
    assert!(probs[1] > 0.0 && probs[1] < 0.3);
}

#[rstest]
#[case::legacy(false)]
#[case::graph(true)]
fn toffoli(#[case] graph: bool) {
    let circ = load_json_file("../test_files/toffoli.json").unwrap();
    let config = SimulationConfig::default();
    let res = simulate(&circ, &config).unwrap();
    let probs = res.measurements().unwrap()[0]
        .as_probabilities()
        .unwrap()
        .to_vec();
    assert!((probs[0b111] - 1.0).abs() < 1e-12);

    let options = DecomposeOptions {
        graph,
        ..DecomposeOptions::with_gate_set(["RZ", "RX", "CNOT", "GlobalPhase"])
    };
    let out = decompose(&circ, &options).unwrap();
    assert!(out.circuits[0].num_operations() > circ.num_operations());
    let res = simulate(&out.circuits[0], &config).unwrap();
    let decomposed = res.measurements().unwrap()[0].as_probabilities().unwrap();
    for (p, q) in probs.iter().zip(decomposed) {
        assert!((p - q).abs() < 1e-10);
    }
}
