//! Terminal measurements of a circuit.
//!
//! A [`MeasurementProcess`] pairs the statistic to compute
//! ([`MeasurementKind`]) with what is measured ([`MeasurementTarget`]): a set
//! of wires, an [`Observable`], or classical values derived from mid-circuit
//! measurements.

pub mod observable;
pub mod result;
pub mod value;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::ops::Wire;

pub use observable::Observable;
pub use result::{MeasurementResult, SimulationResult};
pub use value::MeasurementValue;

/// The statistic computed by a measurement.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[non_exhaustive]
pub enum MeasurementKind {
    /// Expectation value.
    Expval,
    /// Variance.
    Var,
    /// Outcome probabilities.
    Probs,
    /// Raw per-shot samples.
    Sample,
    /// Outcome counts.
    Counts {
        /// Also report outcomes that were never observed.
        all_outcomes: bool,
    },
    /// The final state vector.
    State,
}

impl MeasurementKind {
    /// The name of the statistic.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// What a measurement acts on.
#[derive(Debug, Clone)]
pub enum MeasurementTarget {
    /// Computational basis measurement of wires. No wires means every wire
    /// of the circuit.
    Wires(Vec<Wire>),
    /// An observable.
    Observable(Observable),
    /// A classical value computed from mid-circuit measurements.
    MidMeasure(MeasurementValue),
    /// Several classical values, measured jointly.
    MidMeasures(Vec<MeasurementValue>),
}

impl MeasurementTarget {
    /// A computational basis measurement of the given wires.
    pub fn wires(wires: impl IntoIterator<Item = usize>) -> Self {
        MeasurementTarget::Wires(wires.into_iter().map(Wire::new).collect())
    }

    /// A computational basis measurement of every wire.
    pub fn all_wires() -> Self {
        MeasurementTarget::Wires(vec![])
    }
}

impl From<Observable> for MeasurementTarget {
    fn from(obs: Observable) -> Self {
        MeasurementTarget::Observable(obs)
    }
}

impl From<MeasurementValue> for MeasurementTarget {
    fn from(value: MeasurementValue) -> Self {
        MeasurementTarget::MidMeasure(value)
    }
}

impl From<Vec<MeasurementValue>> for MeasurementTarget {
    fn from(values: Vec<MeasurementValue>) -> Self {
        MeasurementTarget::MidMeasures(values)
    }
}

/// A terminal measurement.
#[derive(Debug, Clone)]
pub struct MeasurementProcess {
    kind: MeasurementKind,
    target: MeasurementTarget,
}

impl MeasurementProcess {
    /// Create a measurement.
    pub fn new(kind: MeasurementKind, target: impl Into<MeasurementTarget>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }

    /// Expectation value.
    pub fn expval(target: impl Into<MeasurementTarget>) -> Self {
        Self::new(MeasurementKind::Expval, target)
    }

    /// Variance.
    pub fn var(target: impl Into<MeasurementTarget>) -> Self {
        Self::new(MeasurementKind::Var, target)
    }

    /// Outcome probabilities.
    pub fn probs(target: impl Into<MeasurementTarget>) -> Self {
        Self::new(MeasurementKind::Probs, target)
    }

    /// Per-shot samples.
    pub fn sample(target: impl Into<MeasurementTarget>) -> Self {
        Self::new(MeasurementKind::Sample, target)
    }

    /// Counts of the observed outcomes.
    pub fn counts(target: impl Into<MeasurementTarget>) -> Self {
        Self::new(
            MeasurementKind::Counts {
                all_outcomes: false,
            },
            target,
        )
    }

    /// Counts of every possible outcome, including unobserved ones.
    pub fn counts_all_outcomes(target: impl Into<MeasurementTarget>) -> Self {
        Self::new(MeasurementKind::Counts { all_outcomes: true }, target)
    }

    /// The final state vector.
    pub fn state() -> Self {
        Self::new(MeasurementKind::State, MeasurementTarget::all_wires())
    }

    /// The statistic.
    pub fn kind(&self) -> MeasurementKind {
        self.kind
    }

    /// The measured target.
    pub fn target(&self) -> &MeasurementTarget {
        &self.target
    }

    /// The same target with a different statistic.
    pub fn with_kind(&self, kind: MeasurementKind) -> Self {
        Self {
            kind,
            target: self.target.clone(),
        }
    }

    /// The observable, if the target is one.
    pub fn obs(&self) -> Option<&Observable> {
        match &self.target {
            MeasurementTarget::Observable(obs) => Some(obs),
            _ => None,
        }
    }

    /// The quantum wires read by the measurement.
    pub fn wires(&self) -> Vec<Wire> {
        match &self.target {
            MeasurementTarget::Wires(wires) => wires.clone(),
            MeasurementTarget::Observable(obs) => obs.wires(),
            MeasurementTarget::MidMeasure(_) | MeasurementTarget::MidMeasures(_) => vec![],
        }
    }

    /// Whether the measurement is computed from mid-circuit measurement
    /// outcomes rather than from the quantum state.
    pub fn is_mcm_value(&self) -> bool {
        matches!(
            self.target,
            MeasurementTarget::MidMeasure(_) | MeasurementTarget::MidMeasures(_)
        )
    }

    /// The measurement values the measurement depends on.
    pub fn mcm_values(&self) -> Vec<&MeasurementValue> {
        match &self.target {
            MeasurementTarget::MidMeasure(mv) => vec![mv],
            MeasurementTarget::MidMeasures(mvs) => mvs.iter().collect(),
            _ => vec![],
        }
    }
}

/// The key used in counts dictionaries for a single value.
///
/// Integral values are printed without a fractional part.
pub(crate) fn format_outcome(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// The key used in counts dictionaries for a sample row.
pub(crate) fn format_row(row: &[f64]) -> String {
    match row {
        [single] => format_outcome(*single),
        _ if row.iter().all(|v| *v == 0.0 || *v == 1.0) => {
            row.iter().map(|v| format_outcome(*v)).join("")
        }
        _ => row.iter().map(|v| format_outcome(*v)).join(","),
    }
}
