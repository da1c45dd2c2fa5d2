//! Tree simulation of circuits with mid-circuit measurements.
//!
//! The circuit is split at its first mid-circuit measurement. The prefix is
//! simulated and the measured wire is sampled once per shot; every observed
//! outcome then starts a branch that simulates the rest of the circuit on the
//! projected state, with the shots that produced that outcome. Branch results
//! are combined bottom-up, weighted by the number of shots that survived
//! postselection in each branch.
//!
//! Two maps thread through the recursion:
//!
//! - `mcm_active`: the outcomes fixed on the path from the root to the
//!   current branch. Each branch receives its own extended copy.
//! - `mcm_samples`: one column of per-shot outcomes for every measurement
//!   taken so far, aligned across columns. It is shared by the whole tree and
//!   shrinks when postselection rejects shots.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use itertools::Itertools;
use num_complex::Complex64;
use rand::Rng;

use super::sampling::{self, measure_bin};
use super::{get_final_state, initial_state, SimulationError, StateVector, LOG_TARGET};
use crate::circuit::Circuit;
use crate::measurements::{
    MeasurementKind, MeasurementProcess, MeasurementResult, MeasurementTarget, SimulationResult,
};
use crate::ops::{GateKind, McmId, MidMeasure, Operation, Operator};
use crate::transforms::dynamic_one_shot::{gather_mcm, PostselectMode};

/// Branch states with a smaller norm after projection cannot be renormalized.
pub const NORM_TOLERANCE: f64 = 1e-15;

/// Outcomes of every mid-circuit measurement, one entry per surviving shot.
pub type McmSamples = IndexMap<McmId, Vec<u8>>;

/// Simulate a circuit with mid-circuit measurements by exploring the tree of
/// measurement outcomes.
///
/// Shot vectors are simulated one bin at a time and returned as
/// [`SimulationResult::Partitioned`].
///
/// # Errors
///
/// Fails for analytic circuits, for measurements that cannot be combined
/// across branches, and when a branch state cannot be renormalized.
#[tracing::instrument(skip_all, fields(shots = ?circuit.shots().total_shots()))]
pub fn simulate_tree_mcm<R: Rng + ?Sized>(
    circuit: &Circuit,
    rng: &mut R,
) -> Result<SimulationResult, SimulationError> {
    let shots = circuit.shots();
    if shots.has_partitioned_shots() {
        return shots
            .bins()
            .map(|s| simulate_tree_mcm(&circuit.with_shots(s), rng))
            .collect::<Result<Vec<_>, _>>()
            .map(SimulationResult::Partitioned);
    }
    let Some(total) = shots.total_shots() else {
        return Err(SimulationError::AnalyticMidMeasure);
    };
    let run = run_tree(circuit, total, rng)?;
    tracing::debug!(
        target: LOG_TARGET,
        total,
        valid = run.valid_shots,
        mcms = run.mcm_samples.len(),
        "explored mid-circuit measurement tree"
    );
    Ok(SimulationResult::Measurements(run.results))
}

/// The outcome of a full tree simulation.
#[derive(Debug)]
struct TreeRun {
    /// Shots that survived postselection.
    valid_shots: usize,
    results: Vec<MeasurementResult>,
    mcm_samples: McmSamples,
}

fn run_tree<R: Rng + ?Sized>(
    circuit: &Circuit,
    shots: usize,
    rng: &mut R,
) -> Result<TreeRun, SimulationError> {
    let state = initial_state(circuit)?;
    let num_wires = state.num_wires();
    let mut mcm_samples = McmSamples::new();
    let (valid_shots, branch_results) = simulate_node(
        circuit,
        state,
        shots,
        &IndexMap::new(),
        &mut mcm_samples,
        rng,
    )?;
    let results = combine_measurements(
        circuit.measurements(),
        valid_shots,
        branch_results,
        &mcm_samples,
        num_wires,
    )?;
    Ok(TreeRun {
        valid_shots,
        results,
        mcm_samples,
    })
}

/// Simulate one node of the tree with `shots` shots.
///
/// Returns the number of shots that survived postselection below this node,
/// and the results of the continuation measurements (see
/// [`circuit_up_to_first_mcm`]) combined over the explored branches.
fn simulate_node<R: Rng + ?Sized>(
    circuit: &Circuit,
    state: StateVector,
    shots: usize,
    mcm_active: &IndexMap<McmId, u8>,
    mcm_samples: &mut McmSamples,
    rng: &mut R,
) -> Result<(usize, Vec<MeasurementResult>), SimulationError> {
    let Some((base, mcm, next)) = circuit_up_to_first_mcm(circuit) else {
        let state = get_final_state(circuit, state, mcm_active)?;
        let results = measure_bin(circuit.measurements(), &state, shots, rng)?;
        return Ok((shots, results));
    };

    let state = get_final_state(&base, state, mcm_active)?;
    let sampled = measure_bin(base.measurements(), &state, shots, rng)?;
    let outcomes = sampled
        .first()
        .and_then(MeasurementResult::as_samples)
        .unwrap_or_default()
        .iter()
        .map(|row| row.first().map_or(0, |&b| b as u8))
        .collect_vec();
    update_mcm_samples(mcm.id(), &outcomes, mcm_active, mcm_samples);

    let mut branches = Vec::new();
    for (branch, count) in samples_to_counts(&outcomes) {
        if mcm.postselect().is_some_and(|p| p != branch) {
            tracing::trace!(target: LOG_TARGET, mcm = %mcm.id(), branch, count, "pruning branch");
            prune_mcm_samples(mcm.id(), branch, mcm_active, mcm_samples);
            continue;
        }
        let branch_state = branch_state(&state, &mcm, branch)?;
        let mut branch_active = mcm_active.clone();
        branch_active.insert(mcm.id(), branch);
        let (valid, results) =
            simulate_node(&next, branch_state, count, &branch_active, mcm_samples, rng)?;
        if valid > 0 {
            branches.push((valid, results));
        }
    }

    let valid_shots = branches.iter().map(|(v, _)| v).sum();
    let results = next
        .measurements()
        .iter()
        .enumerate()
        .map(|(i, mp)| match branches.is_empty() {
            true => Ok(measurement_with_no_shots(mp, state.num_wires())),
            false => combine_core(mp.kind(), branches.iter().map(|(v, res)| (*v, &res[i]))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((valid_shots, results))
}

/// Split a circuit at its first mid-circuit measurement.
///
/// Returns `None` if there is none. Otherwise returns:
///
/// - the *base* circuit with the operators before the measurement, rotated
///   into the measurement basis, measuring a sample of the measured wire;
/// - the measurement itself;
/// - the *continuation* with the remaining operators. Its measurements are
///   the original ones without those on measurement values, with variances
///   turned into samples so they can be pooled across branches.
pub fn circuit_up_to_first_mcm(circuit: &Circuit) -> Option<(Circuit, MidMeasure, Circuit)> {
    let (i, mcm) = circuit
        .operations()
        .iter()
        .enumerate()
        .find_map(|(i, op)| op.as_mid_measure().map(|m| (i, *m)))?;
    let ops = circuit.operations();
    let base_ops = ops[..i]
        .iter()
        .cloned()
        .chain(mcm.diagonalizing_gates().into_iter().map(Operator::from))
        .collect();
    let sample = MeasurementProcess::sample(MeasurementTarget::Wires(vec![mcm.wire()]));
    let base = circuit
        .with_operations(base_ops)
        .with_measurements(vec![sample]);
    let next = circuit
        .with_operations(ops[i + 1..].to_vec())
        .with_measurements(continuation_measurements(circuit.measurements()));
    Some((base, mcm, next))
}

fn continuation_measurements(measurements: &[MeasurementProcess]) -> Vec<MeasurementProcess> {
    measurements
        .iter()
        .filter(|mp| !mp.is_mcm_value())
        .map(|mp| match mp.kind() {
            MeasurementKind::Var => mp.with_kind(MeasurementKind::Sample),
            _ => mp.clone(),
        })
        .collect()
}

/// Count the occurrences of each outcome.
pub fn samples_to_counts(samples: &[u8]) -> BTreeMap<u8, usize> {
    samples.iter().copied().counts().into_iter().collect()
}

/// The positions of `mcm_samples` on the branch selected by `mcm_active`,
/// stopping at `until`.
fn branch_mask(
    mcm_active: &IndexMap<McmId, u8>,
    mcm_samples: &McmSamples,
    until: McmId,
    len: usize,
) -> Vec<bool> {
    let mut mask = vec![true; len];
    for (id, value) in mcm_active.iter().take_while(|(id, _)| **id != until) {
        if let Some(column) = mcm_samples.get(id) {
            for (m, s) in mask.iter_mut().zip(column) {
                *m &= s == value;
            }
        }
    }
    mask
}

/// Record the outcomes of measurement `id` at the positions of the current
/// branch.
///
/// At the root the outcomes become the column itself. Below it, the column
/// (zero-filled on first use) is written at the shots selected by
/// `mcm_active`, in order.
pub fn update_mcm_samples(
    id: McmId,
    samples: &[u8],
    mcm_active: &IndexMap<McmId, u8>,
    mcm_samples: &mut McmSamples,
) {
    if mcm_active.is_empty() {
        mcm_samples.insert(id, samples.to_vec());
        return;
    }
    let len = mcm_samples.values().next().map_or(0, Vec::len);
    let mask = branch_mask(mcm_active, mcm_samples, id, len);
    let column = mcm_samples.entry(id).or_insert_with(|| vec![0; len]);
    let positions = mask.iter().positions(|m| *m);
    for (pos, sample) in positions.zip(samples) {
        column[pos] = *sample;
    }
}

/// Remove the shots where measurement `id` gave `branch` on the current
/// branch from every column.
pub fn prune_mcm_samples(
    id: McmId,
    branch: u8,
    mcm_active: &IndexMap<McmId, u8>,
    mcm_samples: &mut McmSamples,
) {
    let Some(column) = mcm_samples.get(&id) else {
        return;
    };
    let mut mask = branch_mask(mcm_active, mcm_samples, id, column.len());
    for (m, s) in mask.iter_mut().zip(column) {
        *m &= *s == branch;
    }
    for column in mcm_samples.values_mut() {
        let mut keep = mask.iter().map(|m| !m);
        column.retain(|_| keep.next().unwrap_or(true));
    }
}

/// The state after measuring `branch` on the wire of `mcm`: projected,
/// renormalized and reset if requested.
///
/// `state` must already be rotated into the measurement basis of `mcm`. The
/// rotation is undone after the projection unless the wire is reset.
///
/// # Errors
///
/// Returns [`SimulationError::ZeroNorm`] if the projected state vanishes.
pub fn branch_state(
    state: &StateVector,
    mcm: &MidMeasure,
    branch: u8,
) -> Result<StateVector, SimulationError> {
    let mut state = state.clone();
    state.project(mcm.wire(), branch)?;
    let norm = state.norm();
    if norm < NORM_TOLERANCE {
        return Err(SimulationError::ZeroNorm { norm });
    }
    state.scale(norm);
    if !mcm.reset() {
        for gate in mcm.diagonalizing_gates().iter().rev() {
            state.apply_operation(&gate.adjoint())?;
        }
    } else if branch == 1 {
        state.apply_operation(&Operation::new(GateKind::PauliX, [mcm.wire()]))?;
    }
    Ok(state)
}

/// Combine the results of the tree into the results of `measurements`.
///
/// Measurements on measurement values are gathered from `mcm_samples`. The
/// others consume `branch_results` in order. Variances are computed from the
/// pooled samples.
///
/// # Errors
///
/// Fails if the recorded samples have different lengths, or if a result
/// cannot be computed from the pooled branch results.
pub fn combine_measurements(
    measurements: &[MeasurementProcess],
    valid_shots: usize,
    branch_results: Vec<MeasurementResult>,
    mcm_samples: &McmSamples,
    num_wires: usize,
) -> Result<Vec<MeasurementResult>, SimulationError> {
    let mut columns = mcm_samples.values();
    let empty_samples = columns.next().is_none_or(Vec::is_empty);
    if empty_samples && columns.any(|c| !c.is_empty()) {
        return Err(SimulationError::InconsistentSamples);
    }
    let mut branch_results = branch_results.into_iter();
    measurements
        .iter()
        .map(|mp| {
            if mp.is_mcm_value() {
                if empty_samples {
                    return Ok(measurement_with_no_shots(mp, num_wires));
                }
                let len = mcm_samples.values().next().map_or(0, Vec::len);
                let is_valid = vec![true; len];
                let gathered = gather_mcm(mp, mcm_samples, &is_valid, PostselectMode::HwLike)?;
                return Ok(gathered);
            }
            let result = branch_results.next();
            match result {
                Some(res) if valid_shots > 0 => finalize(mp, res),
                _ => Ok(measurement_with_no_shots(mp, num_wires)),
            }
        })
        .collect()
}

/// Turn pooled samples into a variance where one was requested.
fn finalize(
    mp: &MeasurementProcess,
    result: MeasurementResult,
) -> Result<MeasurementResult, SimulationError> {
    match (mp.kind(), result) {
        (MeasurementKind::Var, MeasurementResult::Samples(rows)) => {
            let values = rows.iter().map(|r| r.iter().product::<f64>()).collect_vec();
            Ok(MeasurementResult::Scalar(sampling::variance(&values)))
        }
        (MeasurementKind::Var, _) => Err(SimulationError::MismatchedBranchResult {
            kind: mp.kind().name(),
        }),
        (_, result) => Ok(result),
    }
}

/// Combine the per-branch results of one measurement, each paired with the
/// number of valid shots of its branch.
pub fn combine_core<'a>(
    kind: MeasurementKind,
    branches: impl IntoIterator<Item = (usize, &'a MeasurementResult)>,
) -> Result<MeasurementResult, SimulationError> {
    let mismatch = || SimulationError::MismatchedBranchResult { kind: kind.name() };
    let branches = branches.into_iter().collect_vec();
    let total = branches.iter().map(|(w, _)| *w).sum::<usize>() as f64;
    match kind {
        MeasurementKind::Counts { .. } => {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for (_, res) in &branches {
                for (key, count) in res.as_counts().ok_or_else(mismatch)? {
                    *counts.entry(key.clone()).or_default() += count;
                }
            }
            Ok(MeasurementResult::Counts(counts))
        }
        MeasurementKind::Expval => {
            let mut acc = 0.0;
            for (w, res) in &branches {
                acc += *w as f64 * res.as_scalar().ok_or_else(mismatch)?;
            }
            Ok(MeasurementResult::Scalar(acc / total))
        }
        MeasurementKind::Probs => {
            let mut acc: Vec<f64> = Vec::new();
            for (w, res) in &branches {
                let probs = res.as_probabilities().ok_or_else(mismatch)?;
                if acc.is_empty() {
                    acc = vec![0.0; probs.len()];
                }
                if acc.len() != probs.len() {
                    return Err(mismatch());
                }
                for (a, p) in acc.iter_mut().zip(probs) {
                    *a += *w as f64 * p;
                }
            }
            acc.iter_mut().for_each(|a| *a /= total);
            Ok(MeasurementResult::Probabilities(acc))
        }
        MeasurementKind::Sample | MeasurementKind::Var => {
            let mut rows = Vec::new();
            for (_, res) in &branches {
                rows.extend_from_slice(res.as_samples().ok_or_else(mismatch)?);
            }
            Ok(MeasurementResult::Samples(rows))
        }
        MeasurementKind::State => Err(SimulationError::UnsupportedMeasurement {
            kind: kind.name(),
            context: "with mid-circuit measurements",
        }),
    }
}

/// A NaN-filled placeholder for a measurement that received no valid shot.
///
/// `num_wires` is the number of wires of the simulated state, used for
/// probabilities over every wire.
pub fn measurement_with_no_shots(mp: &MeasurementProcess, num_wires: usize) -> MeasurementResult {
    match mp.kind() {
        MeasurementKind::Probs => {
            let len = match mp.target() {
                MeasurementTarget::Wires(w) if w.is_empty() => 1 << num_wires,
                MeasurementTarget::Wires(w) => 1 << w.len(),
                MeasurementTarget::Observable(obs) => 1 << obs.terms().len(),
                MeasurementTarget::MidMeasure(mv) => mv.values().len(),
                MeasurementTarget::MidMeasures(mvs) => {
                    mvs.iter().map(|mv| mv.values().len()).product()
                }
            };
            MeasurementResult::Probabilities(vec![f64::NAN; len])
        }
        MeasurementKind::Expval | MeasurementKind::Var => MeasurementResult::Scalar(f64::NAN),
        MeasurementKind::Sample => MeasurementResult::Samples(vec![]),
        MeasurementKind::Counts { .. } => MeasurementResult::Counts(BTreeMap::new()),
        MeasurementKind::State => {
            MeasurementResult::State(vec![Complex64::new(f64::NAN, f64::NAN); 1 << num_wires])
        }
    }
}

#[cfg(test)]
mod tests {
    use cool_asserts::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::circuit::Shots;
    use crate::measurements::Observable;
    use crate::ops::{Pauli, Wire};
    use crate::utils::{approx_eq, build_simple_circuit};

    #[fixture]
    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    /// Two measured Hadamard wires, the second conditioned on the first.
    fn two_mcms(postselect: Option<u8>) -> (Circuit, MidMeasure, MidMeasure) {
        let mut m0 = MidMeasure::new(0);
        if let Some(p) = postselect {
            m0 = m0.with_postselect(p);
        }
        let m1 = MidMeasure::new(1);
        let circ = build_simple_circuit(|circ| {
            circ.append(GateKind::Hadamard, [0])?;
            circ.append(GateKind::Hadamard, [1])?;
            let v0 = circ.measure(m0)?;
            circ.cond(&v0, Operation::new(GateKind::PauliX, [2]))?;
            circ.measure(m1)?;
            circ.measurement(MeasurementProcess::counts(MeasurementTarget::wires([2])));
            circ.measurement(MeasurementProcess::expval(Observable::z(2)));
            circ.measurement(MeasurementProcess::var(Observable::z(2)));
            circ.measurement(MeasurementProcess::sample(m1.value()));
            Ok(())
        })
        .unwrap();
        (circ, m0, m1)
    }

    #[test]
    fn split_at_first_mcm() {
        let (circ, m0, _) = two_mcms(None);
        let (base, mcm, next) = circuit_up_to_first_mcm(&circ).unwrap();
        assert_eq!(mcm, m0);
        assert_eq!(base.num_operations(), 2);
        assert_eq!(base.measurements().len(), 1);
        assert_eq!(base.measurements()[0].kind(), MeasurementKind::Sample);
        assert_eq!(base.measurements()[0].wires(), vec![Wire::new(0)]);
        assert_eq!(next.num_operations(), 2);
        let kinds = next.measurements().iter().map(|m| m.kind()).collect_vec();
        assert_eq!(
            kinds,
            vec![
                MeasurementKind::Counts {
                    all_outcomes: false,
                },
                MeasurementKind::Expval,
                MeasurementKind::Sample,
            ]
        );
        let (_, _, last) = circuit_up_to_first_mcm(&next).unwrap();
        assert!(circuit_up_to_first_mcm(&last).is_none());
    }

    #[test]
    fn counts_of_samples() {
        let counts = samples_to_counts(&[1, 0, 1, 1]);
        assert_eq!(counts, BTreeMap::from([(0, 1), (1, 3)]));
        assert!(samples_to_counts(&[]).is_empty());
    }

    #[test]
    fn sibling_samples_do_not_mix() {
        let (a, b) = (McmId::fresh(), McmId::fresh());
        let mut samples = McmSamples::new();
        update_mcm_samples(a, &[0, 1, 1, 0], &IndexMap::new(), &mut samples);
        // Shots 1 and 2 took the branch a = 1.
        update_mcm_samples(b, &[1, 0], &IndexMap::from([(a, 1)]), &mut samples);
        update_mcm_samples(b, &[1, 1], &IndexMap::from([(a, 0)]), &mut samples);
        assert_eq!(samples[&b], vec![1, 1, 0, 1]);
    }

    #[test]
    fn pruning_removes_rejected_shots() {
        let (a, b) = (McmId::fresh(), McmId::fresh());
        let mut samples = McmSamples::from([(a, vec![0, 1, 1, 0]), (b, vec![1, 1, 0, 0])]);
        prune_mcm_samples(b, 1, &IndexMap::from([(a, 1)]), &mut samples);
        assert_eq!(samples[&a], vec![0, 1, 0]);
        assert_eq!(samples[&b], vec![1, 0, 0]);

        prune_mcm_samples(a, 0, &IndexMap::new(), &mut samples);
        assert_eq!(samples[&a], vec![1]);
        assert_eq!(samples[&b], vec![0]);
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, false)]
    #[case(1, true)]
    fn branch_states_are_normalized(#[case] branch: u8, #[case] reset: bool) {
        let mut state = StateVector::zero(vec![Wire::new(0), Wire::new(1)]);
        state
            .apply_operation(&Operation::new(GateKind::RY, [0]).with_param(1.0))
            .unwrap();
        state
            .apply_operation(&Operation::new(GateKind::CNOT, [0, 1]))
            .unwrap();
        let mcm = MidMeasure::new(0).with_reset(reset);
        let projected = branch_state(&state, &mcm, branch).unwrap();
        assert!(approx_eq(projected.norm(), 1.0, 1e-8));
        let expected_wire0 = match reset {
            true => 0,
            false => branch,
        };
        let prob = projected
            .outcome_probability(Wire::new(0), expected_wire0)
            .unwrap();
        assert!(approx_eq(prob, 1.0, 1e-12));
        let prob = projected.outcome_probability(Wire::new(1), branch).unwrap();
        assert!(approx_eq(prob, 1.0, 1e-12));
    }

    /// Measuring `X` on `|+>` or `|->` is deterministic and leaves the state
    /// unchanged.
    #[rstest]
    #[case::plus(false, 0)]
    #[case::minus(true, 1)]
    fn pauli_basis_measurement(mut rng: StdRng, #[case] minus: bool, #[case] outcome: u8) {
        let mcm = MidMeasure::new(0).with_basis(Pauli::X);
        let circ = build_simple_circuit(|circ| {
            if minus {
                circ.append(GateKind::PauliX, [0])?;
            }
            circ.append(GateKind::Hadamard, [0])?;
            let v = circ.measure(mcm)?;
            circ.measurement(MeasurementProcess::expval(Observable::x(0)));
            circ.measurement(MeasurementProcess::sample(v));
            Ok(())
        })
        .unwrap();
        let run = run_tree(&circ, 100, &mut rng).unwrap();
        assert_eq!(run.valid_shots, 100);
        assert!(run.mcm_samples[&mcm.id()].iter().all(|o| *o == outcome));
        let eigenvalue = 1.0 - 2.0 * f64::from(outcome);
        let expval = run.results[0].as_scalar().unwrap();
        assert!(approx_eq(expval, eigenvalue, 1e-12));
    }

    #[test]
    fn pauli_basis_reset_returns_to_zero() {
        let mut state = StateVector::zero(vec![Wire::new(0)]);
        // |-> rotated into the X basis is |1>.
        state
            .apply_operation(&Operation::new(GateKind::PauliX, [0]))
            .unwrap();
        let mcm = MidMeasure::new(0).with_basis(Pauli::X).with_reset(true);
        let projected = branch_state(&state, &mcm, 1).unwrap();
        let prob = projected.outcome_probability(Wire::new(0), 0).unwrap();
        assert!(approx_eq(prob, 1.0, 1e-12));
    }

    #[test]
    fn vanishing_branch_fails() {
        let state = StateVector::zero(vec![Wire::new(0)]);
        assert_matches!(
            branch_state(&state, &MidMeasure::new(0), 1),
            Err(SimulationError::ZeroNorm { .. })
        );
    }

    #[rstest]
    fn shots_are_conserved(mut rng: StdRng) {
        let (circ, m0, m1) = two_mcms(None);
        let run = run_tree(&circ, 400, &mut rng).unwrap();
        assert_eq!(run.valid_shots, 400);
        assert_eq!(run.mcm_samples[&m0.id()].len(), 400);
        assert_eq!(run.mcm_samples[&m1.id()].len(), 400);

        let counts = run.results[0].as_counts().unwrap();
        assert_eq!(counts.values().sum::<usize>(), 400);
        // Wire 2 is flipped exactly when the first measurement gave 1.
        let ones = run.mcm_samples[&m0.id()]
            .iter()
            .filter(|o| **o == 1)
            .count();
        assert_eq!(counts.get("1").copied().unwrap_or(0), ones);
        let expval = run.results[1].as_scalar().unwrap();
        assert!(approx_eq(expval, 1.0 - 2.0 * ones as f64 / 400.0, 1e-12));
        let var = run.results[2].as_scalar().unwrap();
        assert!(approx_eq(var, 1.0 - expval * expval, 1e-12));
        let m1_samples = run.results[3].as_samples().unwrap();
        let recorded = run.mcm_samples[&m1.id()]
            .iter()
            .map(|&o| vec![f64::from(o)])
            .collect_vec();
        assert_eq!(m1_samples, recorded.as_slice());
    }

    #[rstest]
    fn postselection_prunes_history(mut rng: StdRng) {
        let (circ, m0, m1) = two_mcms(Some(1));
        let run = run_tree(&circ, 400, &mut rng).unwrap();
        assert!(run.valid_shots < 400 && run.valid_shots > 100);
        assert!(run.mcm_samples[&m0.id()].iter().all(|o| *o == 1));
        assert_eq!(run.mcm_samples[&m0.id()].len(), run.valid_shots);
        assert_eq!(run.mcm_samples[&m1.id()].len(), run.valid_shots);
        let counts = run.results[0].as_counts().unwrap();
        assert_eq!(counts, &BTreeMap::from([("1".to_string(), run.valid_shots)]));
        assert!(approx_eq(run.results[1].as_scalar().unwrap(), -1.0, 1e-12));
    }

    #[rstest]
    fn everything_rejected(mut rng: StdRng) {
        let mcm = MidMeasure::new(0).with_postselect(1);
        let circ = build_simple_circuit(|circ| {
            let v = circ.measure(mcm)?;
            circ.measurement(MeasurementProcess::expval(Observable::z(0)));
            circ.measurement(MeasurementProcess::probs(MeasurementTarget::wires([0, 1])));
            circ.measurement(MeasurementProcess::probs(v.clone()));
            circ.measurement(MeasurementProcess::sample(v));
            circ.shots(50usize);
            Ok(())
        })
        .unwrap();
        let res = simulate_tree_mcm(&circ, &mut rng).unwrap();
        let res = res.measurements().unwrap();
        assert!(res[0].is_nan());
        assert_eq!(res[1].as_probabilities().unwrap().len(), 4);
        assert!(res[1].is_nan());
        assert_eq!(res[2].as_probabilities().unwrap().len(), 2);
        assert_eq!(res[3].as_samples().unwrap().len(), 0);
    }

    #[rstest]
    fn shot_vectors_are_partitioned(mut rng: StdRng) {
        let (circ, _, _) = two_mcms(None);
        let circ = circ.with_shots(Shots::from_bins([10, 10, 30]));
        let res = simulate_tree_mcm(&circ, &mut rng).unwrap();
        let parts = res.parts().unwrap();
        assert_eq!(parts.len(), 3);
        let total: usize = parts[2].measurements().unwrap()[0]
            .as_counts()
            .unwrap()
            .values()
            .sum();
        assert_eq!(total, 30);
    }

    #[test]
    fn state_cannot_be_combined() {
        let res = MeasurementResult::Scalar(1.0);
        assert_matches!(
            combine_core(MeasurementKind::State, [(1, &res)]),
            Err(SimulationError::UnsupportedMeasurement { .. })
        );
        assert_matches!(
            combine_core(MeasurementKind::Probs, [(1, &res)]),
            Err(SimulationError::MismatchedBranchResult { kind: "Probs" })
        );
    }

    #[test]
    fn weighted_expectations() {
        let a = MeasurementResult::Scalar(1.0);
        let b = MeasurementResult::Scalar(-1.0);
        let res = combine_core(MeasurementKind::Expval, [(3, &a), (1, &b)]).unwrap();
        assert_eq!(res.as_scalar(), Some(0.5));
    }
}
