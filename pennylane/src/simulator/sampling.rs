//! Shot-based measurement of a state vector.

use std::collections::BTreeMap;

use itertools::Itertools;
use rand::Rng;

use super::measure::diagonalized;
use super::{SimulationError, StateVector};
use crate::circuit::Shots;
use crate::measurements::{
    format_outcome, format_row, MeasurementKind, MeasurementProcess, MeasurementResult,
    MeasurementTarget, SimulationResult,
};

/// Measure with finite shots.
///
/// Every bin of the shot vector is sampled independently. A single bin
/// returns [`SimulationResult::Measurements`], several bins return
/// [`SimulationResult::Partitioned`].
pub fn measure_with_samples<R: Rng + ?Sized>(
    measurements: &[MeasurementProcess],
    state: &StateVector,
    shots: &Shots,
    rng: &mut R,
) -> Result<SimulationResult, SimulationError> {
    let mut bins = shots
        .bins()
        .map(|s| measure_bin(measurements, state, s, rng).map(SimulationResult::Measurements))
        .collect::<Result<Vec<_>, _>>()?;
    match (shots.has_partitioned_shots(), bins.len()) {
        (false, 1) => Ok(bins.remove(0)),
        _ => Ok(SimulationResult::Partitioned(bins)),
    }
}

/// Measure every process with `shots` samples.
pub fn measure_bin<R: Rng + ?Sized>(
    measurements: &[MeasurementProcess],
    state: &StateVector,
    shots: usize,
    rng: &mut R,
) -> Result<Vec<MeasurementResult>, SimulationError> {
    measurements
        .iter()
        .map(|mp| measure_sampled(mp, state, shots, rng))
        .collect()
}

/// Draw `shots` computational basis outcomes of `wires`.
///
/// Outcomes are returned as indices in binary order, the first wire being
/// the most significant bit. No wires means every wire of the state.
pub fn sample_state<R: Rng + ?Sized>(
    state: &StateVector,
    wires: &[crate::ops::Wire],
    shots: usize,
    rng: &mut R,
) -> Result<Vec<usize>, SimulationError> {
    let probs = state.probabilities(wires)?;
    Ok(sample_distribution(&probs, shots, rng))
}

/// Draw indices from a discrete distribution by inverting the cumulative
/// distribution function.
pub(crate) fn sample_distribution<R: Rng + ?Sized>(
    probs: &[f64],
    shots: usize,
    rng: &mut R,
) -> Vec<usize> {
    let cumulative = probs
        .iter()
        .scan(0.0, |acc, p| {
            *acc += p;
            Some(*acc)
        })
        .collect_vec();
    let total = cumulative.last().copied().unwrap_or(0.0);
    let last = probs.len().saturating_sub(1);
    (0..shots)
        .map(|_| {
            let r = rng.gen::<f64>() * total;
            cumulative.partition_point(|&c| c <= r).min(last)
        })
        .collect()
}

/// Per-shot rows of a sampled measurement: bits for wires, eigenvalues for
/// observables.
fn sample_rows<R: Rng + ?Sized>(
    mp: &MeasurementProcess,
    state: &StateVector,
    shots: usize,
    rng: &mut R,
) -> Result<Vec<Vec<f64>>, SimulationError> {
    match mp.target() {
        MeasurementTarget::Wires(wires) => {
            let n = match wires.is_empty() {
                true => state.num_wires(),
                false => wires.len(),
            };
            let indices = sample_state(state, wires, shots, rng)?;
            Ok(indices
                .into_iter()
                .map(|idx| (0..n).map(|j| ((idx >> (n - 1 - j)) & 1) as f64).collect())
                .collect())
        }
        MeasurementTarget::Observable(obs) => {
            if obs.terms().is_empty() {
                return Ok(vec![vec![obs.coeff()]; shots]);
            }
            let rotated = diagonalized(state, obs)?;
            let eigvals = obs.eigvals();
            let indices = sample_state(&rotated, &obs.wires(), shots, rng)?;
            Ok(indices.into_iter().map(|idx| vec![eigvals[idx]]).collect())
        }
        MeasurementTarget::MidMeasure(_) | MeasurementTarget::MidMeasures(_) => {
            Err(mcm_target_error(mp))
        }
    }
}

/// Every possible counts key of a measurement, used with `all_outcomes`.
fn all_outcomes(mp: &MeasurementProcess, state: &StateVector) -> Vec<String> {
    match mp.target() {
        MeasurementTarget::Wires(wires) => {
            let n = match wires.is_empty() {
                true => state.num_wires(),
                false => wires.len(),
            };
            (0..1usize << n).map(|idx| format!("{idx:0n$b}")).collect()
        }
        MeasurementTarget::Observable(obs) => obs
            .eigvals()
            .into_iter()
            .sorted_by(f64::total_cmp)
            .dedup()
            .map(format_outcome)
            .collect(),
        _ => vec![],
    }
}

/// Count identical rows.
pub(crate) fn rows_to_counts<'a>(
    rows: impl IntoIterator<Item = &'a Vec<f64>>,
    all_outcomes: impl IntoIterator<Item = String>,
) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = all_outcomes.into_iter().map(|k| (k, 0)).collect();
    for row in rows {
        *counts.entry(format_row(row)).or_default() += 1;
    }
    counts
}

/// The mean, NaN without values.
pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// The population variance, NaN without values.
pub(crate) fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn measure_sampled<R: Rng + ?Sized>(
    mp: &MeasurementProcess,
    state: &StateVector,
    shots: usize,
    rng: &mut R,
) -> Result<MeasurementResult, SimulationError> {
    let kind = mp.kind();
    Ok(match kind {
        MeasurementKind::State => {
            return Err(SimulationError::UnsupportedMeasurement {
                kind: kind.name(),
                context: "with finite shots",
            })
        }
        MeasurementKind::Probs => {
            let (probs_len, indices) = match mp.target() {
                MeasurementTarget::Observable(obs) if obs.terms().is_empty() => {
                    (1, vec![0; shots])
                }
                MeasurementTarget::Observable(obs) => {
                    let rotated = diagonalized(state, obs)?;
                    let wires = obs.wires();
                    (
                        1usize << wires.len(),
                        sample_state(&rotated, &wires, shots, rng)?,
                    )
                }
                MeasurementTarget::Wires(wires) => {
                    let n = match wires.is_empty() {
                        true => state.num_wires(),
                        false => wires.len(),
                    };
                    (1usize << n, sample_state(state, wires, shots, rng)?)
                }
                _ => return Err(mcm_target_error(mp)),
            };
            let mut probs = vec![0.0; probs_len];
            for idx in indices {
                probs[idx] += 1.0;
            }
            probs.iter_mut().for_each(|p| *p /= shots as f64);
            MeasurementResult::Probabilities(probs)
        }
        MeasurementKind::Sample => MeasurementResult::Samples(sample_rows(mp, state, shots, rng)?),
        MeasurementKind::Counts { all_outcomes: all } => {
            let rows = sample_rows(mp, state, shots, rng)?;
            let keys = match all {
                true => all_outcomes(mp, state),
                false => vec![],
            };
            MeasurementResult::Counts(rows_to_counts(&rows, keys))
        }
        MeasurementKind::Expval | MeasurementKind::Var => {
            let values = sample_rows(mp, state, shots, rng)?
                .iter()
                .map(|r| r.iter().product::<f64>())
                .collect_vec();
            match kind {
                MeasurementKind::Expval => MeasurementResult::Scalar(mean(&values)),
                _ => MeasurementResult::Scalar(variance(&values)),
            }
        }
    })
}

fn mcm_target_error(mp: &MeasurementProcess) -> SimulationError {
    SimulationError::UnsupportedMeasurement {
        kind: mp.kind().name(),
        context: "on mid-circuit measurement values outside of native execution",
    }
}
