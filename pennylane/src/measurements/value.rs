//! Classical values computed from mid-circuit measurement outcomes.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::ops::McmId;

type ProcessingFn = Arc<dyn Fn(&[u8]) -> f64 + Send + Sync>;

/// A function of the outcomes of one or more mid-circuit measurements.
///
/// The value is only known once the outcomes are, either on a branch of the
/// simulation tree or from per-shot samples.
#[derive(Clone)]
pub struct MeasurementValue {
    measurements: Vec<McmId>,
    processing_fn: ProcessingFn,
}

impl MeasurementValue {
    /// A value computed by `f` from the outcomes of `measurements`, passed in
    /// the same order.
    pub fn new(measurements: Vec<McmId>, f: impl Fn(&[u8]) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            measurements,
            processing_fn: Arc::new(f),
        }
    }

    /// The raw outcome of a single measurement.
    pub fn identity(id: McmId) -> Self {
        Self::new(vec![id], |outcomes| f64::from(outcomes[0]))
    }

    /// The measurements the value depends on.
    pub fn measurements(&self) -> &[McmId] {
        &self.measurements
    }

    /// Evaluate the value for outcomes given in the order of
    /// [`MeasurementValue::measurements`].
    pub fn evaluate(&self, outcomes: &[u8]) -> f64 {
        (self.processing_fn)(outcomes)
    }

    /// Evaluate the value on a branch where every measurement has a fixed
    /// outcome. Returns `None` if some measurement has not been taken.
    pub fn concretize_active(&self, active: &IndexMap<McmId, u8>) -> Option<f64> {
        let outcomes: Option<Vec<u8>> = self
            .measurements
            .iter()
            .map(|id| active.get(id).copied())
            .collect();
        outcomes.map(|o| self.evaluate(&o))
    }

    /// Evaluate the value for every recorded shot. Returns `None` if some
    /// measurement has no samples.
    pub fn concretize(&self, samples: &IndexMap<McmId, Vec<u8>>) -> Option<Vec<f64>> {
        let columns: Vec<&Vec<u8>> = self
            .measurements
            .iter()
            .map(|id| samples.get(id))
            .collect::<Option<_>>()?;
        let num_shots = columns.first().map_or(0, |c| c.len());
        let mut outcomes = vec![0; columns.len()];
        Some(
            (0..num_shots)
                .map(|shot| {
                    for (o, col) in outcomes.iter_mut().zip(&columns) {
                        *o = col[shot];
                    }
                    self.evaluate(&outcomes)
                })
                .collect(),
        )
    }

    /// Every assignment of outcomes with the resulting value.
    ///
    /// Assignments are enumerated in binary order, the first measurement
    /// being the most significant bit.
    pub fn branches(&self) -> Vec<(Vec<u8>, f64)> {
        let n = self.measurements.len();
        (0..1usize << n)
            .map(|idx| {
                let outcomes = (0..n)
                    .map(|j| ((idx >> (n - 1 - j)) & 1) as u8)
                    .collect_vec();
                let value = self.evaluate(&outcomes);
                (outcomes, value)
            })
            .collect()
    }

    /// The distinct values the measurement value can take, sorted.
    pub fn values(&self) -> Vec<f64> {
        let mut values = self.branches().into_iter().map(|(_, v)| v).collect_vec();
        values.sort_by(f64::total_cmp);
        values.dedup();
        values
    }

    /// Apply a function to the value.
    pub fn map(&self, f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        let inner = self.processing_fn.clone();
        Self {
            measurements: self.measurements.clone(),
            processing_fn: Arc::new(move |o| f(inner(o))),
        }
    }

    /// Logical negation: `1` when the value is zero, `0` otherwise.
    pub fn not(&self) -> Self {
        self.map(|v| f64::from(u8::from(v == 0.0)))
    }

    /// Compare the value with a constant.
    pub fn equals(&self, constant: f64) -> Self {
        self.map(move |v| f64::from(u8::from(v == constant)))
    }

    /// Combine two values with a binary function.
    ///
    /// The measurements of the result are the union of both, in order of
    /// first appearance.
    pub fn combine(
        &self,
        other: &Self,
        f: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        let measurements = self
            .measurements
            .iter()
            .chain(&other.measurements)
            .copied()
            .unique()
            .collect_vec();
        let positions = |ids: &[McmId]| {
            ids.iter()
                .map(|id| {
                    measurements
                        .iter()
                        .position(|m| m == id)
                        .unwrap_or_default()
                })
                .collect_vec()
        };
        let lhs_pos = positions(&self.measurements);
        let rhs_pos = positions(&other.measurements);
        let (lhs, rhs) = (self.processing_fn.clone(), other.processing_fn.clone());
        Self::new(measurements, move |outcomes| {
            let pick = |pos: &[usize]| pos.iter().map(|&p| outcomes[p]).collect_vec();
            f(lhs(&pick(&lhs_pos)), rhs(&pick(&rhs_pos)))
        })
    }

    /// Logical conjunction.
    pub fn and(&self, other: &Self) -> Self {
        self.combine(other, |a, b| f64::from(u8::from(a != 0.0 && b != 0.0)))
    }

    /// Logical disjunction.
    pub fn or(&self, other: &Self) -> Self {
        self.combine(other, |a, b| f64::from(u8::from(a != 0.0 || b != 0.0)))
    }

    /// Arithmetic sum.
    pub fn add(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a + b)
    }
}

impl fmt::Debug for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementValue")
            .field("measurements", &self.measurements)
            .finish_non_exhaustive()
    }
}
