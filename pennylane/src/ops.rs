//! Quantum operators.
//!
//! A circuit is a sequence of [`Operator`]s. Most of them are named gates
//! ([`Operation`]); the remaining variants are mid-circuit measurements,
//! state preparations and operations conditioned on the outcome of earlier
//! mid-circuit measurements.

pub mod decompositions;
pub mod matrix;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use derive_more::{Display, From, Into};
use itertools::Itertools;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::circuit::CircuitError;
use crate::measurements::MeasurementValue;

pub use matrix::GateMatrix;

/// A wire label.
#[repr(transparent)]
#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    From,
    Into,
    Serialize,
    Deserialize,
)]
pub struct Wire(usize);

impl Wire {
    /// Create a new wire label.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The wire index.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Parameters used to build resource representations of an operator.
///
/// Only operators whose decomposition cost depends on the instance (e.g.
/// the number of wires of a [`GateKind::MultiRZ`]) carry entries.
pub type ResourceParams = BTreeMap<SmolStr, usize>;

#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    Serialize,
    Deserialize,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    EnumString,
)]
#[non_exhaustive]
/// Named gates understood by the simulator and the decomposition system.
//
// When adding new gates, make sure to also edit:
// - `GateKind::num_wires`, `GateKind::num_params` in this same file
// - `matrix::gate_matrix` for the unitary
// - `decompositions` and `decomposition::builtin` for the rewrite rules
pub enum GateKind {
    /// Identity
    Identity,
    /// Hadamard gate
    Hadamard,
    /// Pauli X
    PauliX,
    /// Pauli Y
    PauliY,
    /// Pauli Z
    PauliZ,
    /// S gate
    S,
    /// T gate
    T,
    /// Square root of X
    SX,
    /// X rotation
    RX,
    /// Y rotation
    RY,
    /// Z rotation
    RZ,
    /// Phase shift
    ///
    /// PhaseShift(φ) = diag(1, e^{iφ})
    PhaseShift,
    /// Arbitrary single qubit rotation
    ///
    /// Rot(φ, θ, ω) = RZ(ω) RY(θ) RZ(φ)
    Rot,
    /// Controlled X gate
    CNOT,
    /// Controlled Z gate
    CZ,
    /// Controlled Y gate
    CY,
    /// Swap two qubits
    SWAP,
    /// Controlled Z rotation
    CRZ,
    /// Double-controlled X gate
    Toffoli,
    /// Z rotation on the parity of an arbitrary number of wires
    MultiRZ,
    /// Global phase
    ///
    /// GlobalPhase(φ) = e^{-iφ} I
    GlobalPhase,
}

impl GateKind {
    /// The name of the gate.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// The number of wires the gate acts on, or `None` if it can act on any
    /// number of wires.
    pub fn num_wires(&self) -> Option<usize> {
        use GateKind::*;
        match self {
            Identity | Hadamard | PauliX | PauliY | PauliZ | S | T | SX | RX | RY | RZ
            | PhaseShift | Rot => Some(1),
            CNOT | CZ | CY | SWAP | CRZ => Some(2),
            Toffoli => Some(3),
            MultiRZ | GlobalPhase => None,
        }
    }

    /// The number of parameters of the gate.
    pub fn num_params(&self) -> usize {
        use GateKind::*;
        match self {
            RX | RY | RZ | PhaseShift | CRZ | MultiRZ | GlobalPhase => 1,
            Rot => 3,
            _ => 0,
        }
    }

    /// The parameters needed to estimate the resources of a decomposition of
    /// this gate.
    ///
    /// Gates with non-empty resource keys must be given an explicit resource
    /// representation when they appear in a resource estimate.
    pub fn resource_keys(&self) -> &'static [&'static str] {
        match self {
            GateKind::MultiRZ => &["num_wires"],
            _ => &[],
        }
    }

    /// Whether the gate is its own inverse.
    pub fn is_self_inverse(&self) -> bool {
        use GateKind::*;
        matches!(
            self,
            Identity | Hadamard | PauliX | PauliY | PauliZ | CNOT | CZ | CY | SWAP | Toffoli
        )
    }

    /// Look up a gate by name, accepting the common aliases (e.g. `"CX"`,
    /// `"H"`).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = crate::decomposition::translate_op_alias(name);
        name.parse().ok()
    }
}

/// A gate parameter, possibly broadcast over a batch dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum Param {
    /// A single value.
    Scalar(f64),
    /// One value per batch element.
    Broadcast(Vec<f64>),
}

impl Param {
    /// The batch size of a broadcast parameter.
    pub fn batch_size(&self) -> Option<usize> {
        match self {
            Param::Scalar(_) => None,
            Param::Broadcast(values) => Some(values.len()),
        }
    }

    /// The value of a scalar parameter.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Param::Scalar(v) => Some(*v),
            Param::Broadcast(_) => None,
        }
    }

    /// Apply `f` to every value of the parameter.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Param {
        match self {
            Param::Scalar(v) => Param::Scalar(f(*v)),
            Param::Broadcast(values) => Param::Broadcast(values.iter().copied().map(f).collect()),
        }
    }

    /// The negated parameter.
    pub fn neg(&self) -> Param {
        self.map(|v| -v)
    }

    /// The value used by batch element `index`.
    pub fn at(&self, index: usize) -> f64 {
        match self {
            Param::Scalar(v) => *v,
            Param::Broadcast(values) => values[index],
        }
    }
}

/// An instance of a named gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    kind: GateKind,
    wires: Vec<Wire>,
    params: Vec<Param>,
    adjoint: bool,
}

impl Operation {
    /// Create a new operation without parameters.
    pub fn new(kind: GateKind, wires: impl IntoIterator<Item = impl Into<Wire>>) -> Self {
        Self {
            kind,
            wires: wires.into_iter().map_into().collect(),
            params: Vec::new(),
            adjoint: false,
        }
    }

    /// Append a parameter.
    pub fn with_param(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Append several parameters.
    pub fn with_params(mut self, params: impl IntoIterator<Item = impl Into<Param>>) -> Self {
        self.params.extend(params.into_iter().map_into());
        self
    }

    /// The adjoint of this operation.
    pub fn adjoint(&self) -> Self {
        Self {
            adjoint: !self.adjoint,
            ..self.clone()
        }
    }

    /// The gate kind.
    pub fn kind(&self) -> GateKind {
        self.kind
    }

    /// The wires the operation acts on.
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// The gate parameters.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Whether this is the adjoint of the base gate.
    pub fn is_adjoint(&self) -> bool {
        self.adjoint
    }

    /// The operator name, e.g. `RX` or `Adjoint(RX)`.
    pub fn name(&self) -> SmolStr {
        match self.adjoint {
            true => SmolStr::from(format!("Adjoint({})", self.kind.name())),
            false => SmolStr::new_static(self.kind.name()),
        }
    }

    /// The parameters as scalars.
    pub fn scalar_params(&self) -> Result<Vec<f64>, CircuitError> {
        self.params
            .iter()
            .map(|p| {
                p.as_scalar()
                    .ok_or_else(|| CircuitError::BroadcastParameter { name: self.name() })
            })
            .collect()
    }

    /// The common batch size of the broadcast parameters, if any.
    pub fn batch_size(&self) -> Result<Option<usize>, CircuitError> {
        common_batch_size(self.params.iter().filter_map(Param::batch_size))
    }

    /// The operation used by batch element `index`.
    pub fn batch_element(&self, index: usize) -> Self {
        Self {
            params: self
                .params
                .iter()
                .map(|p| Param::Scalar(p.at(index)))
                .collect(),
            ..self.clone()
        }
    }

    /// Parameters relevant for resource estimation.
    pub fn resource_params(&self) -> ResourceParams {
        self.kind
            .resource_keys()
            .iter()
            .filter_map(|&key| match key {
                "num_wires" => Some((SmolStr::new_static(key), self.wires.len())),
                _ => None,
            })
            .collect()
    }

    /// The unitary matrix of the operation, in the order of its wires.
    pub fn matrix(&self) -> Result<GateMatrix, CircuitError> {
        let params = self.scalar_params()?;
        let m = matrix::gate_matrix(self.kind, &params, self.wires.len());
        Ok(match self.adjoint {
            true => m.dagger(),
            false => m,
        })
    }

    /// Whether the operation defines a fixed decomposition.
    pub fn has_decomposition(&self) -> bool {
        decompositions::default_decomposition(self).is_some()
    }

    /// The fixed decomposition of the operation, if it has one.
    ///
    /// This is the decomposition used when the graph-based decomposition
    /// system is disabled.
    pub fn decomposition(&self) -> Option<Vec<Operation>> {
        decompositions::default_decomposition(self)
    }

    /// Check the number of wires and parameters.
    pub fn validate(&self) -> Result<(), CircuitError> {
        if let Some(expected) = self.kind.num_wires() {
            if expected != self.wires.len() {
                return Err(CircuitError::WireCount {
                    name: self.name(),
                    expected,
                    found: self.wires.len(),
                });
            }
        }
        if self.kind == GateKind::MultiRZ && self.wires.is_empty() {
            return Err(CircuitError::WireCount {
                name: self.name(),
                expected: 1,
                found: 0,
            });
        }
        if self.kind.num_params() != self.params.len() {
            return Err(CircuitError::ParamCount {
                name: self.name(),
                expected: self.kind.num_params(),
                found: self.params.len(),
            });
        }
        if let Some(wire) = self.wires.iter().duplicates().next() {
            return Err(CircuitError::DuplicateWire {
                name: self.name(),
                wire: *wire,
            });
        }
        self.batch_size()?;
        Ok(())
    }
}

/// Identifier of a mid-circuit measurement.
///
/// Every [`MidMeasure`] gets a process-unique id when it is created. Copies
/// of a measurement share its id.
#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[display("mcm{_0}")]
pub struct McmId(u64);

impl McmId {
    /// A new id, distinct from all previously created ones.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A mid-circuit measurement of a single wire.
///
/// The wire is measured in the computational basis unless another Pauli
/// basis is set with [`MidMeasure::with_basis`]. Outcome 0 corresponds to the
/// +1 eigenstate.
#[derive(Debug, Clone, Copy)]
pub struct MidMeasure {
    id: McmId,
    wire: Wire,
    basis: Pauli,
    postselect: Option<u8>,
    reset: bool,
}

impl MidMeasure {
    /// Measure `wire`.
    pub fn new(wire: impl Into<Wire>) -> Self {
        Self {
            id: McmId::fresh(),
            wire: wire.into(),
            basis: Pauli::Z,
            postselect: None,
            reset: false,
        }
    }

    /// Measure the Pauli observable `basis` instead of `Z`.
    pub fn with_basis(mut self, basis: Pauli) -> Self {
        self.basis = basis;
        self
    }

    /// Only keep the executions where the outcome equals `value`.
    pub fn with_postselect(mut self, value: u8) -> Self {
        self.postselect = Some(value);
        self
    }

    /// Reset the wire to |0> after the measurement.
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// The measurement id.
    pub fn id(&self) -> McmId {
        self.id
    }

    /// The measured wire.
    pub fn wire(&self) -> Wire {
        self.wire
    }

    /// The measured Pauli observable.
    pub fn basis(&self) -> Pauli {
        self.basis
    }

    /// Gates rotating the measurement basis onto the computational basis of
    /// the wire.
    pub fn diagonalizing_gates(&self) -> Vec<Operation> {
        self.basis.diagonalizing_gates(self.wire)
    }

    /// The postselected outcome, if any.
    pub fn postselect(&self) -> Option<u8> {
        self.postselect
    }

    /// Whether the wire is reset after the measurement.
    pub fn reset(&self) -> bool {
        self.reset
    }

    /// The outcome of this measurement as a classical value.
    pub fn value(&self) -> MeasurementValue {
        MeasurementValue::identity(self.id)
    }
}

impl PartialEq for MidMeasure {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MidMeasure {}

impl std::hash::Hash for MidMeasure {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Preparation of the initial state of a circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum StatePrep {
    /// A computational basis state.
    Basis {
        /// One bit per wire.
        bits: Vec<u8>,
        /// The prepared wires.
        wires: Vec<Wire>,
    },
    /// An arbitrary normalized state vector.
    Amplitudes {
        /// The `2^n` amplitudes, wire 0 being the most significant bit.
        amplitudes: Vec<Complex64>,
        /// The prepared wires.
        wires: Vec<Wire>,
    },
}

impl StatePrep {
    /// Prepare a computational basis state.
    pub fn basis(
        bits: impl IntoIterator<Item = u8>,
        wires: impl IntoIterator<Item = impl Into<Wire>>,
    ) -> Self {
        StatePrep::Basis {
            bits: bits.into_iter().collect(),
            wires: wires.into_iter().map_into().collect(),
        }
    }

    /// Prepare an arbitrary state.
    pub fn amplitudes(
        amplitudes: impl IntoIterator<Item = Complex64>,
        wires: impl IntoIterator<Item = impl Into<Wire>>,
    ) -> Self {
        StatePrep::Amplitudes {
            amplitudes: amplitudes.into_iter().collect(),
            wires: wires.into_iter().map_into().collect(),
        }
    }

    /// The prepared wires.
    pub fn wires(&self) -> &[Wire] {
        match self {
            StatePrep::Basis { wires, .. } | StatePrep::Amplitudes { wires, .. } => wires,
        }
    }

    /// Check that the preparation is consistent with its wires.
    pub fn validate(&self) -> Result<(), CircuitError> {
        match self {
            StatePrep::Basis { bits, wires } => {
                if bits.len() != wires.len() || bits.iter().any(|&b| b > 1) {
                    return Err(CircuitError::InvalidStatePrep {
                        reason: format!("basis state {bits:?} does not match wires {wires:?}"),
                    });
                }
            }
            StatePrep::Amplitudes { amplitudes, wires } => {
                if amplitudes.len() != 1 << wires.len() {
                    return Err(CircuitError::InvalidStatePrep {
                        reason: format!(
                            "expected {} amplitudes, got {}",
                            1usize << wires.len(),
                            amplitudes.len()
                        ),
                    });
                }
                let norm: f64 = amplitudes.iter().map(|a| a.norm_sqr()).sum();
                if (norm - 1.0).abs() > 1e-10 {
                    return Err(CircuitError::InvalidStatePrep {
                        reason: format!("state is not normalized (norm² = {norm})"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// An operation applied only when a measurement value is non-zero.
#[derive(Debug, Clone)]
pub struct Conditional {
    condition: MeasurementValue,
    op: Operation,
}

impl Conditional {
    /// Condition `op` on `condition`.
    pub fn new(condition: MeasurementValue, op: Operation) -> Self {
        Self { condition, op }
    }

    /// The classical condition.
    pub fn condition(&self) -> &MeasurementValue {
        &self.condition
    }

    /// The conditioned operation.
    pub fn op(&self) -> &Operation {
        &self.op
    }
}

/// Condition an operation on the outcome of mid-circuit measurements.
pub fn cond(condition: &MeasurementValue, op: Operation) -> Operator {
    Operator::Conditional(Conditional::new(condition.clone(), op))
}

/// An element of a circuit.
#[derive(Debug, Clone, From)]
pub enum Operator {
    /// A named gate.
    Gate(Operation),
    /// A mid-circuit measurement.
    MidMeasure(MidMeasure),
    /// A state preparation.
    StatePrep(StatePrep),
    /// A classically conditioned gate.
    Conditional(Conditional),
}

impl Operator {
    /// The operator name.
    pub fn name(&self) -> SmolStr {
        match self {
            Operator::Gate(op) => op.name(),
            Operator::MidMeasure(_) => SmolStr::new_static("MidMeasure"),
            Operator::StatePrep(StatePrep::Basis { .. }) => SmolStr::new_static("BasisState"),
            Operator::StatePrep(StatePrep::Amplitudes { .. }) => SmolStr::new_static("StatePrep"),
            Operator::Conditional(c) => SmolStr::from(format!("Conditional({})", c.op.name())),
        }
    }

    /// The wires the operator acts on.
    pub fn wires(&self) -> Vec<Wire> {
        match self {
            Operator::Gate(op) => op.wires.clone(),
            Operator::MidMeasure(m) => vec![m.wire],
            Operator::StatePrep(prep) => prep.wires().to_vec(),
            Operator::Conditional(c) => c.op.wires.clone(),
        }
    }

    /// The mid-circuit measurement, if this is one.
    pub fn as_mid_measure(&self) -> Option<&MidMeasure> {
        match self {
            Operator::MidMeasure(m) => Some(m),
            _ => None,
        }
    }

    /// Whether this is a mid-circuit measurement.
    pub fn is_mid_measure(&self) -> bool {
        matches!(self, Operator::MidMeasure(_))
    }

    /// The batch size of the operator parameters.
    pub fn batch_size(&self) -> Result<Option<usize>, CircuitError> {
        match self {
            Operator::Gate(op) => op.batch_size(),
            Operator::Conditional(c) => c.op.batch_size(),
            _ => Ok(None),
        }
    }

    /// The operator used by batch element `index`.
    pub fn batch_element(&self, index: usize) -> Self {
        match self {
            Operator::Gate(op) => Operator::Gate(op.batch_element(index)),
            Operator::Conditional(c) => Operator::Conditional(Conditional {
                condition: c.condition.clone(),
                op: c.op.batch_element(index),
            }),
            other => other.clone(),
        }
    }

    /// Check that the operator is well formed.
    pub fn validate(&self) -> Result<(), CircuitError> {
        match self {
            Operator::Gate(op) => op.validate(),
            Operator::Conditional(c) => c.op.validate(),
            Operator::StatePrep(prep) => prep.validate(),
            Operator::MidMeasure(m) => match m.postselect {
                Some(v) if v > 1 => Err(CircuitError::InvalidPostselect { value: v }),
                _ => Ok(()),
            },
        }
    }
}

/// The common size of a set of batch dimensions.
pub(crate) fn common_batch_size(
    sizes: impl IntoIterator<Item = usize>,
) -> Result<Option<usize>, CircuitError> {
    let mut batch = None;
    for size in sizes {
        match batch {
            None => batch = Some(size),
            Some(first) if first != size => {
                return Err(CircuitError::InconsistentBatchSize {
                    first,
                    second: size,
                })
            }
            _ => {}
        }
    }
    Ok(batch)
}

#[derive(
    Clone,
    Copy,
    Debug,
    Serialize,
    Deserialize,
    EnumIter,
    Display,
    PartialEq,
    Eq,
    Hash,
    EnumString,
)]
#[allow(missing_docs)]
/// Simple enum representation of Pauli matrices.
pub enum Pauli {
    I,
    X,
    Y,
    Z,
}

impl Pauli {
    /// Check if this pauli commutes with another.
    pub fn commutes_with(&self, other: Self) -> bool {
        *self == Pauli::I || other == Pauli::I || *self == other
    }

    /// Gates rotating the eigenbasis of this Pauli onto the computational
    /// basis.
    pub fn diagonalizing_gates(&self, wire: Wire) -> Vec<Operation> {
        match self {
            Pauli::I | Pauli::Z => vec![],
            Pauli::X => vec![Operation::new(GateKind::Hadamard, [wire])],
            Pauli::Y => vec![
                Operation::new(GateKind::S, [wire]).adjoint(),
                Operation::new(GateKind::Hadamard, [wire]),
            ],
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use cool_asserts::assert_matches;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn gate_names_roundtrip() {
        for kind in GateKind::iter() {
            assert_eq!(kind.name().parse::<GateKind>(), Ok(kind));
        }
        assert_eq!(GateKind::from_name("CX"), Some(GateKind::CNOT));
        assert_eq!(GateKind::from_name("H"), Some(GateKind::Hadamard));
    }

    #[rstest]
    #[case(Operation::new(GateKind::CNOT, [0]), false)]
    #[case(Operation::new(GateKind::CNOT, [0, 1]), true)]
    #[case(Operation::new(GateKind::CNOT, [1, 1]), false)]
    #[case(Operation::new(GateKind::RX, [0]), false)]
    #[case(Operation::new(GateKind::RX, [0]).with_param(0.3), true)]
    #[case(Operation::new(GateKind::MultiRZ, [0, 1, 2]).with_param(0.3), true)]
    #[case(Operation::new(GateKind::RX, [0]).with_param(vec![0.1, 0.2]), true)]
    fn validate_operations(#[case] op: Operation, #[case] valid: bool) {
        assert_eq!(op.validate().is_ok(), valid, "{op:?}");
    }

    #[test]
    fn adjoint_name() {
        let op = Operation::new(GateKind::RY, [0]).with_param(0.5);
        assert_eq!(op.name(), "RY");
        assert_eq!(op.adjoint().name(), "Adjoint(RY)");
        assert_eq!(op.adjoint().adjoint(), op);
    }

    #[test]
    fn mid_measure_identity() {
        let m0 = MidMeasure::new(0);
        let m1 = MidMeasure::new(0);
        assert_ne!(m0, m1);
        assert_eq!(m0, m0.with_postselect(1));
        assert_matches!(
            Operator::from(MidMeasure::new(0).with_postselect(2)).validate(),
            Err(CircuitError::InvalidPostselect { value: 2 })
        );
    }

    #[test]
    fn resource_params() {
        let op = Operation::new(GateKind::MultiRZ, [0, 1, 2]).with_param(0.3);
        assert_eq!(op.resource_params().get("num_wires"), Some(&3));
        assert!(Operation::new(GateKind::CNOT, [0, 1])
            .resource_params()
            .is_empty());
    }

    #[test]
    fn broadcast_batch_size() {
        let op = Operation::new(GateKind::Rot, [0]).with_params([
            Param::from(vec![0.1, 0.2]),
            Param::from(0.3),
            Param::from(vec![0.4, 0.5]),
        ]);
        assert_eq!(op.batch_size(), Ok(Some(2)));
        assert_eq!(op.batch_element(1).scalar_params(), Ok(vec![0.2, 0.3, 0.5]));

        let bad = Operation::new(GateKind::Rot, [0]).with_params([
            Param::from(vec![0.1, 0.2]),
            Param::from(0.3),
            Param::from(vec![0.4]),
        ]);
        assert_matches!(
            bad.batch_size(),
            Err(CircuitError::InconsistentBatchSize { .. })
        );
    }
}
