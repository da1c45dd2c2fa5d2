//! Measurement results.

use std::collections::BTreeMap;

use num_complex::Complex64;
use serde::Serialize;

/// The result of a single measurement process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementResult {
    /// An expectation value or variance.
    Scalar(f64),
    /// A probability distribution, in binary order of the outcomes.
    Probabilities(Vec<f64>),
    /// One row per shot, one column per measured wire or value.
    Samples(Vec<Vec<f64>>),
    /// Occurrences of each outcome.
    Counts(BTreeMap<String, usize>),
    /// The final state vector.
    State(Vec<Complex64>),
}

impl MeasurementResult {
    /// The scalar value, if this is a scalar result.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MeasurementResult::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// The probabilities, if this is a probability result.
    pub fn as_probabilities(&self) -> Option<&[f64]> {
        match self {
            MeasurementResult::Probabilities(p) => Some(p),
            _ => None,
        }
    }

    /// The samples, if this is a sample result.
    pub fn as_samples(&self) -> Option<&[Vec<f64>]> {
        match self {
            MeasurementResult::Samples(s) => Some(s),
            _ => None,
        }
    }

    /// The counts, if this is a counts result.
    pub fn as_counts(&self) -> Option<&BTreeMap<String, usize>> {
        match self {
            MeasurementResult::Counts(c) => Some(c),
            _ => None,
        }
    }

    /// Whether every numeric entry is NaN.
    ///
    /// Branches and bins without any valid shot produce such placeholders.
    pub fn is_nan(&self) -> bool {
        match self {
            MeasurementResult::Scalar(v) => v.is_nan(),
            MeasurementResult::Probabilities(p) => p.iter().all(|v| v.is_nan()),
            _ => false,
        }
    }
}

/// The result of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SimulationResult {
    /// One result per measurement process.
    Measurements(Vec<MeasurementResult>),
    /// One result per shot-vector bin.
    Partitioned(Vec<SimulationResult>),
    /// One result per batch element of a broadcast circuit.
    Batched(Vec<SimulationResult>),
}

impl SimulationResult {
    /// The per-measurement results, if the result is not split.
    pub fn measurements(&self) -> Option<&[MeasurementResult]> {
        match self {
            SimulationResult::Measurements(m) => Some(m),
            _ => None,
        }
    }

    /// The single measurement result of a circuit with one measurement.
    pub fn single(&self) -> Option<&MeasurementResult> {
        match self.measurements()? {
            [m] => Some(m),
            _ => None,
        }
    }

    /// The sub-results of a partitioned or batched result.
    pub fn parts(&self) -> Option<&[SimulationResult]> {
        match self {
            SimulationResult::Partitioned(p) | SimulationResult::Batched(p) => Some(p),
            SimulationResult::Measurements(_) => None,
        }
    }
}

impl From<Vec<MeasurementResult>> for SimulationResult {
    fn from(results: Vec<MeasurementResult>) -> Self {
        SimulationResult::Measurements(results)
    }
}
