//! Native execution of circuits with mid-circuit measurements, one shot at a
//! time.
//!
//! Every mid-circuit measurement samples its outcome from the current state
//! and collapses it. The circuits produced by
//! [`dynamic_one_shot`](crate::transforms::dynamic_one_shot()) are executed
//! this way and their results recombined by the transform.

use indexmap::IndexMap;
use rand::Rng;

use super::sampling::measure_bin;
use super::tree_mcm::{branch_state, McmSamples};
use super::{initial_state, resolve_condition, SimulationError, LOG_TARGET};
use crate::circuit::{Circuit, CircuitError};
use crate::measurements::{MeasurementResult, SimulationResult};
use crate::ops::{McmId, MidMeasure, Operator};
use crate::simulator::StateVector;
use crate::transforms::dynamic_one_shot::{gather_mcm, PostselectMode};
use crate::transforms::{dynamic_one_shot, OneShotOptions};

/// Simulate a circuit with mid-circuit measurements by executing every shot
/// independently.
#[tracing::instrument(skip_all, fields(shots = ?circuit.shots().total_shots(), mode = %mode))]
pub fn simulate_one_shot<R: Rng + ?Sized>(
    circuit: &Circuit,
    mode: PostselectMode,
    rng: &mut R,
) -> Result<SimulationResult, SimulationError> {
    let expanded = dynamic_one_shot(
        circuit,
        &OneShotOptions {
            postselect_mode: mode,
        },
    )?;
    tracing::debug!(target: LOG_TARGET, circuits = expanded.circuits.len(), "executing single-shot circuits");
    let results = expanded
        .circuits
        .iter()
        .map(|c| simulate_native(c, mode, rng))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(expanded.postprocess(results)?)
}

/// Execute a circuit once, sampling the outcome of every mid-circuit
/// measurement.
///
/// The terminal measurements are taken with the shots of the circuit on the
/// final state. Measurements of mid-circuit measurement values use the
/// outcomes of this execution.
pub fn simulate_native<R: Rng + ?Sized>(
    circuit: &Circuit,
    mode: PostselectMode,
    rng: &mut R,
) -> Result<SimulationResult, SimulationError> {
    let Some(shots) = circuit.shots().total_shots() else {
        return Err(SimulationError::AnalyticMidMeasure);
    };
    let mut state = initial_state(circuit)?;
    let mut mcm_active: IndexMap<McmId, u8> = IndexMap::new();
    for (i, op) in circuit.operations().iter().enumerate() {
        match op {
            Operator::Gate(gate) => state.apply_operation(gate)?,
            Operator::StatePrep(_) if i == 0 => {}
            Operator::StatePrep(_) => {
                return Err(CircuitError::MisplacedStatePrep { position: i }.into())
            }
            Operator::Conditional(c) => {
                if resolve_condition(c.condition(), &mcm_active)? {
                    state.apply_operation(c.op())?;
                }
            }
            Operator::MidMeasure(m) => {
                for gate in m.diagonalizing_gates() {
                    state.apply_operation(&gate)?;
                }
                let outcome = sample_outcome(&state, m, mode, rng)?;
                state = branch_state(&state, m, outcome)?;
                mcm_active.insert(m.id(), outcome);
            }
        }
    }

    let samples: McmSamples = mcm_active
        .iter()
        .map(|(id, outcome)| (*id, vec![*outcome; shots]))
        .collect();
    let valid = vec![true; shots];
    let mut results = Vec::with_capacity(circuit.measurements().len());
    for mp in circuit.measurements() {
        let res: MeasurementResult = match mp.is_mcm_value() {
            true => gather_mcm(mp, &samples, &valid, mode)?,
            false => measure_bin(std::slice::from_ref(mp), &state, shots, rng)?
                .into_iter()
                .next()
                .ok_or(SimulationError::MismatchedBranchResult {
                    kind: mp.kind().name(),
                })?,
        };
        results.push(res);
    }
    Ok(SimulationResult::Measurements(results))
}

/// Sample the outcome of a mid-circuit measurement by the Born rule.
///
/// `state` is already rotated into the measurement basis.
///
/// With [`PostselectMode::FillShots`] the postselected outcome is returned
/// whenever it has a non-zero probability.
fn sample_outcome<R: Rng + ?Sized>(
    state: &StateVector,
    mcm: &MidMeasure,
    mode: PostselectMode,
    rng: &mut R,
) -> Result<u8, SimulationError> {
    if let (PostselectMode::FillShots, Some(p)) = (mode, mcm.postselect()) {
        if state.outcome_probability(mcm.wire(), p)? > 0.0 {
            return Ok(p);
        }
    }
    let p1 = state.outcome_probability(mcm.wire(), 1)?;
    Ok(u8::from(rng.gen::<f64>() < p1))
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::measurements::{MeasurementProcess, MeasurementTarget, Observable};
    use crate::ops::{GateKind, Operation, Pauli};
    use crate::utils::{approx_eq, build_simple_circuit};

    #[fixture]
    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn teleport_like(postselect: Option<u8>) -> Circuit {
        let mut m = MidMeasure::new(0);
        if let Some(p) = postselect {
            m = m.with_postselect(p);
        }
        build_simple_circuit(|circ| {
            circ.append(GateKind::Hadamard, [0])?;
            let v = circ.measure(m)?;
            circ.cond(&v, Operation::new(GateKind::PauliX, [1]))?;
            circ.measurement(MeasurementProcess::expval(Observable::z(1)));
            circ.measurement(MeasurementProcess::counts(v.clone()));
            circ.measurement(MeasurementProcess::probs(MeasurementTarget::wires([0, 1])));
            circ.shots(200usize);
            Ok(())
        })
        .unwrap()
    }

    #[rstest]
    fn outcomes_are_correlated(mut rng: StdRng) {
        let circ = teleport_like(None);
        let res = simulate_one_shot(&circ, PostselectMode::HwLike, &mut rng).unwrap();
        let res = res.measurements().unwrap();
        let counts = res[1].as_counts().unwrap();
        assert_eq!(counts.values().sum::<usize>(), 200);
        let ones = counts.get("1").copied().unwrap_or(0) as f64;
        let expval = res[0].as_scalar().unwrap();
        assert!(approx_eq(expval, 1.0 - 2.0 * ones / 200.0, 1e-12));
        let probs = res[2].as_probabilities().unwrap();
        assert!(approx_eq(probs[1] + probs[2], 0.0, 1e-12));
        assert!(approx_eq(probs[3], ones / 200.0, 1e-12));
    }

    #[rstest]
    #[case(PostselectMode::HwLike)]
    #[case(PostselectMode::FillShots)]
    fn postselection(mut rng: StdRng, #[case] mode: PostselectMode) {
        let circ = teleport_like(Some(1));
        let res = simulate_one_shot(&circ, mode, &mut rng).unwrap();
        let res = res.measurements().unwrap();
        assert!(approx_eq(res[0].as_scalar().unwrap(), -1.0, 1e-12));
        let kept = res[1].as_counts().unwrap()["1"];
        match mode {
            PostselectMode::FillShots => assert_eq!(kept, 200),
            _ => assert!(kept > 50 && kept < 150),
        }
    }

    #[rstest]
    fn reset_returns_to_zero(mut rng: StdRng) {
        let m = MidMeasure::new(0).with_reset(true);
        let circ = build_simple_circuit(|circ| {
            circ.append(GateKind::PauliX, [0])?;
            circ.measure(m)?;
            circ.measurement(MeasurementProcess::expval(Observable::z(0)));
            circ.measurement(MeasurementProcess::sample(m.value()));
            circ.shots(1usize);
            Ok(())
        })
        .unwrap();
        let res = simulate_native(&circ, PostselectMode::HwLike, &mut rng).unwrap();
        let res = res.measurements().unwrap();
        assert_eq!(res[0].as_scalar(), Some(1.0));
        assert_eq!(res[1].as_samples().unwrap(), &[vec![1.0]]);
    }

    #[rstest]
    #[case::plus(false, 0.0)]
    #[case::minus(true, 1.0)]
    fn pauli_basis_outcomes(mut rng: StdRng, #[case] minus: bool, #[case] outcome: f64) {
        let m = MidMeasure::new(0).with_basis(Pauli::X);
        let circ = build_simple_circuit(|circ| {
            if minus {
                circ.append(GateKind::PauliX, [0])?;
            }
            circ.append(GateKind::Hadamard, [0])?;
            circ.measure(m)?;
            circ.measurement(MeasurementProcess::expval(Observable::x(0)));
            circ.measurement(MeasurementProcess::sample(m.value()));
            circ.shots(20usize);
            Ok(())
        })
        .unwrap();
        let res = simulate_one_shot(&circ, PostselectMode::HwLike, &mut rng).unwrap();
        let res = res.measurements().unwrap();
        let expval = res[0].as_scalar().unwrap();
        assert!(approx_eq(expval, 1.0 - 2.0 * outcome, 1e-12));
        let samples = res[1].as_samples().unwrap();
        assert_eq!(samples.len(), 20);
        assert!(samples.iter().all(|row| row == &[outcome]));
    }
}
