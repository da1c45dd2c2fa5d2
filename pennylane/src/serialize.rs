//! JSON circuit format.
//!
//! A [`SerialCircuit`] is a plain description of a circuit, where mid-circuit
//! measurements are referred to by a label. Decoding it resolves the labels
//! and validates every operator.
//!
//! ```json
//! {
//!   "shots": 1000,
//!   "operations": [
//!     { "type": "gate", "name": "H", "wires": [0] },
//!     { "type": "measure", "label": "m0", "wire": 0, "postselect": 1 },
//!     { "type": "gate", "name": "CNOT", "wires": [0, 1] },
//!     { "type": "gate", "name": "X", "wires": [1], "condition": { "mcm": "m0" } }
//!   ],
//!   "measurements": [
//!     { "kind": "expval", "observable": { "coeff": 1.0, "terms": [[1, "Z"]] } },
//!     { "kind": "counts", "mcm": { "mcm": "m0" } }
//!   ]
//! }
//! ```

use std::path::Path;
use std::{fs, io};

use derive_more::{Display, Error, From};
use indexmap::IndexMap;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, CircuitError, Shots};
use crate::decomposition::parse_operator_name;
use crate::measurements::{
    MeasurementKind, MeasurementProcess, MeasurementTarget, MeasurementValue, Observable,
};
use crate::ops::{Conditional, MidMeasure, Operation, Operator, Param, Pauli, StatePrep};

/// A serialized circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialCircuit {
    /// Total shots, or the shots of every bin. Analytic if missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shots: Option<SerialShots>,
    /// The operators, in execution order.
    pub operations: Vec<SerialOperator>,
    /// The terminal measurements.
    #[serde(default)]
    pub measurements: Vec<SerialMeasurement>,
}

/// Serialized shots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
#[allow(missing_docs)]
pub enum SerialShots {
    Total(usize),
    Bins(Vec<usize>),
}

impl From<SerialShots> for Shots {
    fn from(shots: SerialShots) -> Self {
        match shots {
            SerialShots::Total(n) => Shots::new(n),
            SerialShots::Bins(bins) => Shots::from_bins(bins),
        }
    }
}

/// A serialized operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SerialOperator {
    /// A named gate, optionally conditioned on mid-circuit measurements.
    Gate {
        /// Gate name, e.g. `"CNOT"`, `"CX"` or `"Adjoint(S)"`.
        name: String,
        /// The wires.
        wires: Vec<usize>,
        /// Scalar or broadcast parameters.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        params: Vec<Param>,
        /// Apply the adjoint of the gate.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        adjoint: bool,
        /// Only apply the gate when this value is non-zero.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<SerialValue>,
    },
    /// A mid-circuit measurement.
    Measure {
        /// The label used to refer to the outcome.
        label: String,
        /// The measured wire.
        wire: usize,
        /// Measure this Pauli observable instead of `Z`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        basis: Option<Pauli>,
        /// Keep only the shots with this outcome.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        postselect: Option<u8>,
        /// Reset the wire to `|0>` after measuring it.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        reset: bool,
    },
    /// A computational basis state preparation.
    BasisState {
        /// One bit per wire.
        state: Vec<u8>,
        /// The prepared wires.
        wires: Vec<usize>,
    },
    /// An arbitrary state preparation.
    StatePrep {
        /// The `2^n` amplitudes as `[re, im]` pairs.
        amplitudes: Vec<Complex64>,
        /// The prepared wires.
        wires: Vec<usize>,
    },
}

/// A serialized function of mid-circuit measurement outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialValue {
    /// The outcome of a labelled measurement.
    Mcm(String),
    /// Logical negation.
    Not(Box<SerialValue>),
    /// Logical conjunction of every value.
    And(Vec<SerialValue>),
    /// Logical disjunction of every value.
    Or(Vec<SerialValue>),
    /// Arithmetic sum of every value.
    Sum(Vec<SerialValue>),
    /// Whether the value equals a constant.
    Equals(Box<SerialValue>, f64),
}

/// The statistic of a serialized measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum SerialMeasurementKind {
    Expval,
    Var,
    Probs,
    Sample,
    Counts,
    State,
}

/// A serialized terminal measurement.
///
/// At most one target may be given. Without a target, every wire is
/// measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialMeasurement {
    /// The statistic.
    pub kind: SerialMeasurementKind,
    /// Report unobserved outcomes too. Counts only.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all_outcomes: bool,
    /// Computational basis measurement of these wires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wires: Option<Vec<usize>>,
    /// A Pauli-word observable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observable: Option<Observable>,
    /// A single mid-circuit measurement value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcm: Option<SerialValue>,
    /// Several mid-circuit measurement values, measured jointly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcms: Option<Vec<SerialValue>>,
}

impl SerialCircuit {
    /// Convert the serialized circuit into a [`Circuit`].
    pub fn decode(self) -> Result<Circuit, DecodeError> {
        let mut decoder = Decoder::default();
        let operations = self
            .operations
            .into_iter()
            .map(|op| decoder.operator(op))
            .collect::<Result<Vec<_>, _>>()?;
        let measurements = self
            .measurements
            .into_iter()
            .map(|m| decoder.measurement(m))
            .collect::<Result<Vec<_>, _>>()?;
        let shots = self.shots.map_or_else(Shots::analytic, Shots::from);
        Ok(Circuit::try_new(operations, measurements, shots)?)
    }
}

/// Resolves measurement labels while decoding.
#[derive(Debug, Default)]
struct Decoder {
    mcms: IndexMap<String, MidMeasure>,
}

impl Decoder {
    fn operator(&mut self, op: SerialOperator) -> Result<Operator, DecodeError> {
        Ok(match op {
            SerialOperator::Gate {
                name,
                wires,
                params,
                adjoint,
                condition,
            } => {
                let Some((kind, named_adjoint)) = parse_operator_name(&name) else {
                    return Err(DecodeError::UnknownGate { name });
                };
                let mut gate = Operation::new(kind, wires).with_params(params);
                if adjoint != named_adjoint {
                    gate = gate.adjoint();
                }
                match condition {
                    Some(value) => Conditional::new(self.value(value)?, gate).into(),
                    None => gate.into(),
                }
            }
            SerialOperator::Measure {
                label,
                wire,
                basis,
                postselect,
                reset,
            } => {
                let mut mcm = MidMeasure::new(wire).with_reset(reset);
                if let Some(basis) = basis {
                    mcm = mcm.with_basis(basis);
                }
                if let Some(value) = postselect {
                    mcm = mcm.with_postselect(value);
                }
                if self.mcms.insert(label.clone(), mcm).is_some() {
                    return Err(DecodeError::DuplicateLabel { label });
                }
                mcm.into()
            }
            SerialOperator::BasisState { state, wires } => StatePrep::basis(state, wires).into(),
            SerialOperator::StatePrep { amplitudes, wires } => {
                StatePrep::amplitudes(amplitudes, wires).into()
            }
        })
    }

    fn value(&self, value: SerialValue) -> Result<MeasurementValue, DecodeError> {
        let fold = |values: Vec<SerialValue>,
                    f: fn(&MeasurementValue, &MeasurementValue) -> MeasurementValue|
         -> Result<MeasurementValue, DecodeError> {
            let mut values = values.into_iter().map(|v| self.value(v));
            let first = values.next().ok_or(DecodeError::EmptyValue)??;
            values.try_fold(first, |acc, v| Ok(f(&acc, &v?)))
        };
        match value {
            SerialValue::Mcm(label) => match self.mcms.get(&label) {
                Some(mcm) => Ok(mcm.value()),
                None => Err(DecodeError::UnknownLabel { label }),
            },
            SerialValue::Not(v) => Ok(self.value(*v)?.not()),
            SerialValue::And(values) => fold(values, MeasurementValue::and),
            SerialValue::Or(values) => fold(values, MeasurementValue::or),
            SerialValue::Sum(values) => fold(values, MeasurementValue::add),
            SerialValue::Equals(v, constant) => Ok(self.value(*v)?.equals(constant)),
        }
    }

    fn measurement(&self, m: SerialMeasurement) -> Result<MeasurementProcess, DecodeError> {
        let kind = match m.kind {
            SerialMeasurementKind::Expval => MeasurementKind::Expval,
            SerialMeasurementKind::Var => MeasurementKind::Var,
            SerialMeasurementKind::Probs => MeasurementKind::Probs,
            SerialMeasurementKind::Sample => MeasurementKind::Sample,
            SerialMeasurementKind::Counts => MeasurementKind::Counts {
                all_outcomes: m.all_outcomes,
            },
            SerialMeasurementKind::State => MeasurementKind::State,
        };
        let num_targets = usize::from(m.wires.is_some())
            + usize::from(m.observable.is_some())
            + usize::from(m.mcm.is_some())
            + usize::from(m.mcms.is_some());
        if num_targets > 1 {
            return Err(DecodeError::AmbiguousTarget { kind: kind.name() });
        }
        let target = if let Some(wires) = m.wires {
            MeasurementTarget::wires(wires)
        } else if let Some(obs) = m.observable {
            obs.into()
        } else if let Some(value) = m.mcm {
            self.value(value)?.into()
        } else if let Some(values) = m.mcms {
            values
                .into_iter()
                .map(|v| self.value(v))
                .collect::<Result<Vec<_>, _>>()?
                .into()
        } else {
            MeasurementTarget::all_wires()
        };
        Ok(MeasurementProcess::new(kind, target))
    }
}

/// Load a circuit from a JSON file.
pub fn load_json_file(path: impl AsRef<Path>) -> Result<Circuit, DecodeError> {
    let file = fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    load_json_reader(reader)
}

/// Load a circuit from a JSON reader.
pub fn load_json_reader(json: impl io::Read) -> Result<Circuit, DecodeError> {
    let ser: SerialCircuit = serde_json::from_reader(json)?;
    ser.decode()
}

/// Load a circuit from a JSON string.
pub fn load_json_str(json: &str) -> Result<Circuit, DecodeError> {
    load_json_reader(json.as_bytes())
}

/// An error decoding a serialized circuit.
#[derive(Debug, Display, Error, From)]
#[non_exhaustive]
pub enum DecodeError {
    /// The gate name is not known.
    #[display("Unknown gate {name}.")]
    UnknownGate {
        /// The gate name.
        name: String,
    },
    /// A condition or measurement refers to a measurement that was not taken
    /// before.
    #[display("Unknown mid-circuit measurement label {label}.")]
    UnknownLabel {
        /// The label.
        label: String,
    },
    /// Two mid-circuit measurements have the same label.
    #[display("Mid-circuit measurement label {label} is used twice.")]
    DuplicateLabel {
        /// The label.
        label: String,
    },
    /// A combination of measurement values has no operands.
    #[display("Cannot combine an empty list of measurement values.")]
    EmptyValue,
    /// A measurement has several targets.
    #[display("A {kind} measurement must have at most one target.")]
    AmbiguousTarget {
        /// The measurement kind.
        kind: &'static str,
    },
    /// The decoded circuit is malformed.
    #[display("{_0}")]
    #[from]
    Circuit(CircuitError),
    /// Invalid JSON.
    #[display("Invalid circuit JSON. {_0}")]
    #[from]
    InvalidJson(serde_json::Error),
    /// The file could not be read.
    #[display("Unable to load circuit json file. {_0}")]
    #[from]
    FileLoadError(io::Error),
}
