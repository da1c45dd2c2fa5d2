//! Execution of mid-circuit measurements one shot at a time.
//!
//! [`dynamic_one_shot`] replaces a circuit with one single-shot circuit per
//! shot. Each execution samples every mid-circuit measurement and reports its
//! outcome as an extra sample measurement; the postprocessing function then
//! rebuilds the requested statistics from the per-shot results, dropping the
//! shots rejected by postselection.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::{TransformError, TransformOutput};
use crate::circuit::{Circuit, Shots};
use crate::measurements::{
    format_row, MeasurementKind, MeasurementProcess, MeasurementResult, MeasurementTarget,
    MeasurementValue, SimulationResult,
};
use crate::ops::McmId;
use crate::simulator::sampling::{mean, variance};
use crate::simulator::tree_mcm::measurement_with_no_shots;

/// Replaces the samples of invalid shots in
/// [`PostselectMode::PadInvalidSamples`] mode.
pub const FILL_VALUE: f64 = i32::MIN as f64;

/// How shots rejected by postselection are handled.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum PostselectMode {
    /// Rejected shots are dropped, as they would be on hardware.
    #[default]
    HwLike,
    /// Executions force the postselected outcome whenever it is possible, so
    /// no shot is lost.
    FillShots,
    /// Rejected shots keep their place in sample results, filled with
    /// [`FILL_VALUE`].
    PadInvalidSamples,
}

/// Options for [`dynamic_one_shot`].
#[derive(Debug, Clone, Default)]
pub struct OneShotOptions {
    /// Treatment of rejected shots.
    pub postselect_mode: PostselectMode,
}

/// Expand a circuit with mid-circuit measurements into single-shot circuits.
///
/// Broadcast circuits are expanded first, giving `total_shots` circuits per
/// batch element, ordered by batch element. Circuits without mid-circuit
/// measurements are returned unchanged.
///
/// Each single-shot circuit measures the non mid-circuit measurement values
/// of the original circuit (variances as samples), followed by a sample of
/// every mid-circuit measurement in execution order.
///
/// # Errors
///
/// Fails for analytic circuits, for unsupported measurement kinds, and for
/// sample measurements of a broadcast circuit with postselection.
pub fn dynamic_one_shot(
    circuit: &Circuit,
    options: &OneShotOptions,
) -> Result<TransformOutput, TransformError> {
    if !circuit.has_mid_circuit_measurements() {
        return Ok(TransformOutput::identity(circuit.clone()));
    }
    for mp in circuit.measurements() {
        check_supported(mp)?;
    }
    let total_shots = match circuit.shots().total_shots() {
        Some(n) if n > 0 => n,
        _ => return Err(TransformError::AnalyticShots),
    };
    let batch_size = circuit.batch_size()?;
    let samples_present = circuit
        .measurements()
        .iter()
        .any(|mp| mp.kind() == MeasurementKind::Sample);
    let postselect_present = circuit
        .mid_circuit_measurements()
        .any(|m| m.postselect().is_some());
    if samples_present && postselect_present && batch_size.is_some() {
        return Err(TransformError::SampleWithPostselectBroadcast);
    }

    let elements = match batch_size {
        Some(n) => (0..n)
            .map(|i| {
                circuit.with_operations(
                    circuit
                        .operations()
                        .iter()
                        .map(|op| op.batch_element(i))
                        .collect(),
                )
            })
            .collect_vec(),
        None => vec![circuit.clone()],
    };
    let circuits = elements
        .iter()
        .flat_map(|c| std::iter::repeat_n(auxiliary_circuit(c), total_shots))
        .collect_vec();

    let original = circuit.clone();
    let mode = options.postselect_mode;
    let num_elements = elements.len();
    Ok(TransformOutput::new(circuits, move |results| {
        let expected = num_elements * total_shots;
        if results.len() != expected {
            return Err(TransformError::ResultCount {
                expected,
                found: results.len(),
            });
        }
        let per_element = results
            .chunks(total_shots)
            .map(|chunk| process_element(&original, chunk, mode))
            .collect::<Result<Vec<_>, _>>()?;
        match batch_size {
            Some(_) => Ok(SimulationResult::Batched(per_element)),
            None => per_element
                .into_iter()
                .next()
                .ok_or(TransformError::ResultCount { expected, found: 0 }),
        }
    }))
}

fn check_supported(mp: &MeasurementProcess) -> Result<(), TransformError> {
    match mp.kind() {
        MeasurementKind::Counts { .. }
        | MeasurementKind::Expval
        | MeasurementKind::Probs
        | MeasurementKind::Sample
        | MeasurementKind::Var => Ok(()),
        kind => Err(TransformError::UnsupportedMeasurement { kind: kind.name() }),
    }
}

/// The single-shot version of `circuit`.
fn auxiliary_circuit(circuit: &Circuit) -> Circuit {
    let measurements = circuit
        .measurements()
        .iter()
        .filter(|mp| !mp.is_mcm_value())
        .map(|mp| match mp.kind() {
            MeasurementKind::Var => mp.with_kind(MeasurementKind::Sample),
            _ => mp.clone(),
        })
        .chain(
            circuit
                .mid_circuit_measurements()
                .map(|m| MeasurementProcess::sample(m.value())),
        )
        .collect();
    circuit
        .with_measurements(measurements)
        .with_shots(Shots::new(1))
}

/// Postprocess the shots of one batch element, splitting shot vectors.
fn process_element(
    circuit: &Circuit,
    results: &[SimulationResult],
    mode: PostselectMode,
) -> Result<SimulationResult, TransformError> {
    if !circuit.shots().has_partitioned_shots() {
        return parse_native_mid_circuit_measurements(circuit, results, mode)
            .map(SimulationResult::Measurements);
    }
    let mut offset = 0;
    let mut bins = Vec::with_capacity(circuit.shots().num_bins());
    for shots in circuit.shots().bins() {
        let chunk = &results[offset..offset + shots];
        bins.push(SimulationResult::Measurements(
            parse_native_mid_circuit_measurements(circuit, chunk, mode)?,
        ));
        offset += shots;
    }
    Ok(SimulationResult::Partitioned(bins))
}

/// Combine the per-shot results of the single-shot circuits into the
/// results of the measurements of `circuit`.
///
/// # Errors
///
/// Fails if a result does not match the single-shot circuit layout.
pub fn parse_native_mid_circuit_measurements(
    circuit: &Circuit,
    results: &[SimulationResult],
    mode: PostselectMode,
) -> Result<Vec<MeasurementResult>, TransformError> {
    let shots = results
        .iter()
        .map(|r| {
            r.measurements()
                .ok_or(TransformError::MalformedResult { kind: "Sample" })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mcms = circuit.mid_circuit_measurements().collect_vec();
    let mut mcm_samples: IndexMap<McmId, Vec<u8>> = IndexMap::new();
    for (j, mcm) in mcms.iter().enumerate() {
        let column = shots
            .iter()
            .map(|res| {
                let idx = (res.len() + j).checked_sub(mcms.len());
                idx.and_then(|i| res.get(i))
                    .and_then(MeasurementResult::as_samples)
                    .and_then(|rows| rows.first()?.first().copied())
                    .map(|v| v as u8)
                    .ok_or(TransformError::MalformedResult { kind: "Sample" })
            })
            .collect::<Result<Vec<_>, _>>()?;
        mcm_samples.insert(mcm.id(), column);
    }
    let is_valid = (0..shots.len())
        .map(|i| {
            mcms.iter().all(|m| match m.postselect() {
                Some(p) => mcm_samples[&m.id()][i] == p,
                None => true,
            })
        })
        .collect_vec();
    let has_valid = is_valid.iter().any(|v| *v);
    let num_wires = circuit.wires().len();

    let mut m_count = 0;
    circuit
        .measurements()
        .iter()
        .map(|mp| {
            check_supported(mp)?;
            if mp.is_mcm_value() {
                return match has_valid {
                    true => gather_mcm(mp, &mcm_samples, &is_valid, mode),
                    false => Ok(measurement_with_no_shots(mp, num_wires)),
                };
            }
            let column = m_count;
            m_count += 1;
            if !has_valid {
                return Ok(measurement_with_no_shots(mp, num_wires));
            }
            let kind = mp.kind().name();
            let per_shot = shots
                .iter()
                .map(|res| res.get(column).ok_or(TransformError::MalformedResult { kind }))
                .collect::<Result<Vec<_>, _>>()?;
            gather_non_mcm(mp, &per_shot, &is_valid, mode)
        })
        .collect()
}

/// Combine single-shot results of a measurement over the valid shots.
///
/// # Errors
///
/// Fails if a result does not match the measurement kind.
pub fn gather_non_mcm(
    mp: &MeasurementProcess,
    results: &[&MeasurementResult],
    is_valid: &[bool],
    mode: PostselectMode,
) -> Result<MeasurementResult, TransformError> {
    let kind = mp.kind();
    let malformed = || TransformError::MalformedResult { kind: kind.name() };
    let valid = || {
        results
            .iter()
            .zip(is_valid)
            .filter(|(_, v)| **v)
            .map(|(r, _)| *r)
    };
    match kind {
        MeasurementKind::Counts { all_outcomes } => {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for (res, v) in results.iter().zip(is_valid) {
                for (key, count) in res.as_counts().ok_or_else(malformed)? {
                    *counts.entry(key.clone()).or_default() += count * usize::from(*v);
                }
            }
            if !all_outcomes {
                counts.retain(|_, c| *c > 0);
            }
            Ok(MeasurementResult::Counts(counts))
        }
        MeasurementKind::Sample => {
            let mut rows = Vec::new();
            for (res, v) in results.iter().zip(is_valid) {
                let shot_rows = res.as_samples().ok_or_else(malformed)?;
                match (v, mode) {
                    (true, _) => rows.extend_from_slice(shot_rows),
                    (false, PostselectMode::PadInvalidSamples) => {
                        rows.extend(shot_rows.iter().map(|row| vec![FILL_VALUE; row.len()]))
                    }
                    (false, _) => {}
                }
            }
            Ok(MeasurementResult::Samples(rows))
        }
        MeasurementKind::Expval => {
            let values = valid()
                .map(|r| r.as_scalar().ok_or_else(malformed))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(MeasurementResult::Scalar(mean(&values)))
        }
        MeasurementKind::Probs => {
            let mut acc: Vec<f64> = Vec::new();
            let mut n = 0;
            for res in valid() {
                let probs = res.as_probabilities().ok_or_else(malformed)?;
                if acc.is_empty() {
                    acc = vec![0.0; probs.len()];
                }
                acc.iter_mut().zip(probs).for_each(|(a, p)| *a += p);
                n += 1;
            }
            acc.iter_mut().for_each(|a| *a /= n as f64);
            Ok(MeasurementResult::Probabilities(acc))
        }
        MeasurementKind::Var => {
            let mut values = Vec::new();
            for res in valid() {
                let rows = res.as_samples().ok_or_else(malformed)?;
                values.extend(rows.iter().map(|r| r.iter().product::<f64>()));
            }
            Ok(MeasurementResult::Scalar(variance(&values)))
        }
        MeasurementKind::State => Err(TransformError::UnsupportedMeasurement { kind: kind.name() }),
    }
}

/// Compute a measurement of mid-circuit measurement values from the
/// recorded per-shot outcomes.
///
/// # Errors
///
/// Fails if an outcome column is missing, or for statistics that are not
/// defined on the target.
pub fn gather_mcm(
    mp: &MeasurementProcess,
    mcm_samples: &IndexMap<McmId, Vec<u8>>,
    is_valid: &[bool],
    mode: PostselectMode,
) -> Result<MeasurementResult, TransformError> {
    let kind = mp.kind();
    let concretize = |mv: &MeasurementValue| {
        mv.concretize(mcm_samples).ok_or_else(|| {
            let mut ids = mv.measurements().iter();
            match ids.find(|id| !mcm_samples.contains_key(*id)) {
                Some(&id) => TransformError::MissingMcmSamples { id },
                None => TransformError::MalformedResult { kind: kind.name() },
            }
        })
    };
    let joint = !matches!(kind, MeasurementKind::Expval | MeasurementKind::Var);
    let (rows, outcomes): (Vec<Vec<f64>>, Vec<Vec<f64>>) = match mp.target() {
        MeasurementTarget::MidMeasure(mv) => {
            let rows = concretize(mv)?.into_iter().map(|v| vec![v]).collect_vec();
            (rows, vec![mv.values()])
        }
        MeasurementTarget::MidMeasures(mvs) if joint => {
            let columns = mvs.iter().map(concretize).collect::<Result<Vec<_>, _>>()?;
            let num_shots = columns.first().map_or(0, Vec::len);
            let rows = (0..num_shots)
                .map(|shot| columns.iter().map(|c| c[shot]).collect())
                .collect();
            (rows, mvs.iter().map(MeasurementValue::values).collect())
        }
        _ => return Err(TransformError::UnsupportedMeasurement { kind: kind.name() }),
    };

    match kind {
        MeasurementKind::Probs => {
            let combos = outcomes.into_iter().multi_cartesian_product().collect_vec();
            let counts = combos
                .iter()
                .map(|combo| {
                    rows.iter()
                        .zip(is_valid)
                        .filter(|(row, v)| **v && *row == combo)
                        .count() as f64
                })
                .collect_vec();
            let total: f64 = counts.iter().sum();
            Ok(MeasurementResult::Probabilities(counts.into_iter().map(|c| c / total).collect()))
        }
        MeasurementKind::Counts { all_outcomes } => {
            let mut counts: BTreeMap<String, usize> = match all_outcomes {
                true => outcomes
                    .into_iter()
                    .multi_cartesian_product()
                    .map(|combo| (format_row(&combo), 0))
                    .collect(),
                false => BTreeMap::new(),
            };
            for (row, _) in rows.iter().zip(is_valid).filter(|(_, v)| **v) {
                *counts.entry(format_row(row)).or_default() += 1;
            }
            Ok(MeasurementResult::Counts(counts))
        }
        MeasurementKind::Sample => {
            let per_shot = rows
                .into_iter()
                .map(|row| MeasurementResult::Samples(vec![row]))
                .collect_vec();
            gather_non_mcm(mp, &per_shot.iter().collect_vec(), is_valid, mode)
        }
        MeasurementKind::Expval | MeasurementKind::Var => {
            let values = rows
                .iter()
                .zip(is_valid)
                .filter(|(_, v)| **v)
                .map(|(row, _)| row[0])
                .collect_vec();
            Ok(MeasurementResult::Scalar(match kind {
                MeasurementKind::Expval => mean(&values),
                _ => variance(&values),
            }))
        }
        MeasurementKind::State => Err(TransformError::UnsupportedMeasurement { kind: kind.name() }),
    }
}

#[cfg(test)]
mod tests {
    use cool_asserts::assert_matches;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::measurements::Observable;
    use crate::ops::{GateKind, MidMeasure, Operation};
    use crate::utils::build_simple_circuit;

    struct Fixture {
        circuit: Circuit,
        m0: MidMeasure,
        m1: MidMeasure,
    }

    #[fixture]
    fn postselected() -> Fixture {
        let m0 = MidMeasure::new(0).with_postselect(1);
        let m1 = MidMeasure::new(1);
        let circuit = build_simple_circuit(|circ| {
            circ.append(GateKind::Hadamard, [0])?;
            circ.append(GateKind::Hadamard, [1])?;
            circ.measure(m0)?;
            circ.measure(m1)?;
            circ.measurement(MeasurementProcess::expval(Observable::z(1)));
            circ.measurement(MeasurementProcess::var(m1.value()));
            circ.measurement(MeasurementProcess::counts(vec![m0.value(), m1.value()]));
            circ.measurement(MeasurementProcess::sample(MeasurementTarget::wires([1])));
            circ.shots(4usize);
            Ok(())
        })
        .unwrap();
        Fixture { circuit, m0, m1 }
    }

    /// The result of one single-shot execution with the given outcomes.
    fn shot(m0: u8, m1: u8) -> SimulationResult {
        let z = 1.0 - 2.0 * f64::from(m1);
        SimulationResult::from(vec![
            MeasurementResult::Scalar(z),
            MeasurementResult::Samples(vec![vec![f64::from(m1)]]),
            MeasurementResult::Samples(vec![vec![f64::from(m0)]]),
            MeasurementResult::Samples(vec![vec![f64::from(m1)]]),
        ])
    }

    #[rstest]
    fn auxiliary_circuits(postselected: Fixture) {
        let out = dynamic_one_shot(&postselected.circuit, &OneShotOptions::default()).unwrap();
        assert_eq!(out.circuits.len(), 4);
        let aux = &out.circuits[0];
        assert_eq!(aux.shots(), &Shots::new(1));
        let kinds = aux.measurements().iter().map(|m| m.kind()).collect_vec();
        assert_eq!(
            kinds,
            vec![
                MeasurementKind::Expval,
                MeasurementKind::Sample,
                MeasurementKind::Sample,
                MeasurementKind::Sample,
            ]
        );
        let ids = aux.measurements()[2..]
            .iter()
            .map(|m| m.mcm_values()[0].measurements().to_vec())
            .collect_vec();
        assert_eq!(
            ids,
            vec![vec![postselected.m0.id()], vec![postselected.m1.id()]]
        );
    }

    #[rstest]
    fn postprocessing_drops_rejected_shots(postselected: Fixture) {
        let out = dynamic_one_shot(&postselected.circuit, &OneShotOptions::default()).unwrap();
        let results = vec![shot(1, 0), shot(0, 1), shot(1, 1), shot(1, 0)];
        let res = out.postprocess(results).unwrap();
        let res = res.measurements().unwrap();
        assert_eq!(res[0].as_scalar(), Some(1.0 / 3.0));
        let var = res[1].as_scalar().unwrap();
        assert!((var - 2.0 / 9.0).abs() < 1e-12);
        let counts = res[2].as_counts().unwrap();
        assert_eq!(
            counts,
            &BTreeMap::from([("10".to_string(), 2), ("11".to_string(), 1)])
        );
        assert_eq!(
            res[3].as_samples().unwrap(),
            &[vec![0.0], vec![1.0], vec![0.0]]
        );
    }

    #[rstest]
    fn padding_keeps_rejected_samples(postselected: Fixture) {
        let options = OneShotOptions {
            postselect_mode: PostselectMode::PadInvalidSamples,
        };
        let out = dynamic_one_shot(&postselected.circuit, &options).unwrap();
        let results = vec![shot(1, 0), shot(0, 1), shot(1, 1), shot(1, 0)];
        let res = out.postprocess(results).unwrap();
        let samples = res.measurements().unwrap()[3].as_samples().unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[1], vec![FILL_VALUE]);
    }

    #[rstest]
    fn no_valid_shots(postselected: Fixture) {
        let out = dynamic_one_shot(&postselected.circuit, &OneShotOptions::default()).unwrap();
        let results = vec![shot(0, 0), shot(0, 1), shot(0, 1), shot(0, 0)];
        let res = out.postprocess(results).unwrap();
        let res = res.measurements().unwrap();
        assert!(res[0].is_nan());
        assert!(res[1].is_nan());
        assert_eq!(res[2].as_counts().unwrap().len(), 0);
    }

    #[rstest]
    fn shot_vector_bins(postselected: Fixture) {
        let circuit = postselected.circuit.with_shots(Shots::from_bins([1, 3]));
        let out = dynamic_one_shot(&circuit, &OneShotOptions::default()).unwrap();
        assert_eq!(out.circuits.len(), 4);
        let results = vec![shot(1, 1), shot(0, 1), shot(1, 1), shot(1, 0)];
        let res = out.postprocess(results).unwrap();
        let parts = res.parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].measurements().unwrap()[0].as_scalar(), Some(-1.0));
        assert_eq!(parts[1].measurements().unwrap()[0].as_scalar(), Some(0.0));
    }

    #[test]
    fn circuits_without_mcms_pass_through() {
        let circ = build_simple_circuit(|circ| {
            circ.append(GateKind::Hadamard, [0])?;
            circ.measurement(MeasurementProcess::state());
            Ok(())
        })
        .unwrap();
        let out = dynamic_one_shot(&circ, &OneShotOptions::default()).unwrap();
        assert_eq!(out.circuits.len(), 1);
    }

    #[test]
    fn invalid_inputs() {
        let m = MidMeasure::new(0).with_postselect(0);
        let base = build_simple_circuit(|circ| {
            circ.append_op(Operation::new(GateKind::RX, [0]).with_param(vec![0.1, 0.2]))?;
            circ.measure(m)?;
            circ.measurement(MeasurementProcess::sample(MeasurementTarget::wires([0])));
            Ok(())
        })
        .unwrap();
        let options = OneShotOptions::default();
        assert_matches!(
            dynamic_one_shot(&base, &options),
            Err(TransformError::AnalyticShots)
        );
        assert_matches!(
            dynamic_one_shot(&base.with_shots(10usize), &options),
            Err(TransformError::SampleWithPostselectBroadcast)
        );
        let state = base
            .with_shots(10usize)
            .with_measurements(vec![MeasurementProcess::state()]);
        assert_matches!(
            dynamic_one_shot(&state, &options),
            Err(TransformError::UnsupportedMeasurement { kind: "State" })
        );
    }

    #[test]
    fn probabilities_of_measurement_values() {
        let (a, b) = (McmId::fresh(), McmId::fresh());
        let samples = IndexMap::from([(a, vec![0, 1, 1, 1]), (b, vec![1, 1, 0, 1])]);
        let sum = MeasurementValue::identity(a).add(&MeasurementValue::identity(b));
        let mp = MeasurementProcess::probs(sum);
        let valid = [true, true, true, false];
        let res = gather_mcm(&mp, &samples, &valid, PostselectMode::HwLike).unwrap();
        // Values 0, 1, 2 observed 0, 2, 1 times among the valid shots.
        let probs = res.as_probabilities().unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs[1] - 2.0 / 3.0).abs() < 1e-12);
        assert!((probs[2] - 1.0 / 3.0).abs() < 1e-12);

        let mp = MeasurementProcess::counts_all_outcomes(vec![
            MeasurementValue::identity(a),
            MeasurementValue::identity(b),
        ]);
        let res = gather_mcm(&mp, &samples, &valid, PostselectMode::HwLike).unwrap();
        let counts = res.as_counts().unwrap();
        assert_eq!(counts.len(), 4);
        assert_eq!(counts["00"], 0);
        assert_eq!(counts["01"], 1);
        assert_eq!(counts["11"], 1);
        assert_eq!(counts["10"], 1);
    }
}
