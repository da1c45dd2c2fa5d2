//! Quantum circuit representation.
//!
//! A [`Circuit`] is an immutable script: an ordered list of [`Operator`]s,
//! the measurements taken at the end, and the [`Shots`] to execute it with.

pub mod shots;

use std::collections::BTreeSet;

use derive_more::{Display, Error};
use smol_str::SmolStr;

use crate::measurements::{MeasurementProcess, MeasurementValue};
use crate::ops::{
    common_batch_size, GateKind, MidMeasure, Operation, Operator, Param, StatePrep, Wire,
};

pub use shots::{ShotCopies, Shots};

/// A quantum circuit with terminal measurements.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    operations: Vec<Operator>,
    measurements: Vec<MeasurementProcess>,
    shots: Shots,
}

impl Circuit {
    /// Create a new circuit.
    ///
    /// # Errors
    ///
    /// Returns an error if an operator is malformed, if a state preparation
    /// is not the first operation, or if the broadcast dimensions disagree.
    pub fn try_new(
        operations: Vec<Operator>,
        measurements: Vec<MeasurementProcess>,
        shots: impl Into<Shots>,
    ) -> Result<Self, CircuitError> {
        for (i, op) in operations.iter().enumerate() {
            op.validate()?;
            if i > 0 && matches!(op, Operator::StatePrep(_)) {
                return Err(CircuitError::MisplacedStatePrep { position: i });
            }
        }
        let circ = Self {
            operations,
            measurements,
            shots: shots.into(),
        };
        circ.batch_size()?;
        Ok(circ)
    }

    /// Start building a circuit.
    pub fn builder() -> CircuitBuilder {
        CircuitBuilder::default()
    }

    /// The operators, in execution order.
    pub fn operations(&self) -> &[Operator] {
        &self.operations
    }

    /// The terminal measurements.
    pub fn measurements(&self) -> &[MeasurementProcess] {
        &self.measurements
    }

    /// The shot specification.
    pub fn shots(&self) -> &Shots {
        &self.shots
    }

    /// The number of operators.
    pub fn num_operations(&self) -> usize {
        self.operations.len()
    }

    /// A copy of the circuit with different shots.
    pub fn with_shots(&self, shots: impl Into<Shots>) -> Self {
        Self {
            shots: shots.into(),
            ..self.clone()
        }
    }

    /// A copy of the circuit with different operators.
    ///
    /// The operators are assumed valid; they usually come from rewriting
    /// the operators of an existing circuit.
    pub fn with_operations(&self, operations: Vec<Operator>) -> Self {
        Self {
            operations,
            ..self.clone()
        }
    }

    /// A copy of the circuit with different measurements.
    pub fn with_measurements(&self, measurements: Vec<MeasurementProcess>) -> Self {
        Self {
            measurements,
            ..self.clone()
        }
    }

    /// The sorted set of wires used by the operators and the measurements.
    pub fn wires(&self) -> Vec<Wire> {
        let mut wires: BTreeSet<Wire> = self.operations.iter().flat_map(Operator::wires).collect();
        wires.extend(self.measurements.iter().flat_map(|m| m.wires()));
        wires.into_iter().collect()
    }

    /// The mid-circuit measurements, in execution order.
    pub fn mid_circuit_measurements(&self) -> impl Iterator<Item = &MidMeasure> + '_ {
        self.operations.iter().filter_map(Operator::as_mid_measure)
    }

    /// Whether the circuit contains mid-circuit measurements.
    pub fn has_mid_circuit_measurements(&self) -> bool {
        self.mid_circuit_measurements().next().is_some()
    }

    /// The common batch size of the broadcast parameters, if any.
    pub fn batch_size(&self) -> Result<Option<usize>, CircuitError> {
        let mut sizes = Vec::new();
        for op in &self.operations {
            sizes.extend(op.batch_size()?);
        }
        common_batch_size(sizes)
    }
}

/// Incremental construction of a [`Circuit`].
#[derive(Debug, Clone, Default)]
pub struct CircuitBuilder {
    operations: Vec<Operator>,
    measurements: Vec<MeasurementProcess>,
    shots: Shots,
}

impl CircuitBuilder {
    /// Append a gate without parameters.
    pub fn append(
        &mut self,
        kind: GateKind,
        wires: impl IntoIterator<Item = usize>,
    ) -> Result<&mut Self, CircuitError> {
        self.append_op(Operation::new(kind, wires))
    }

    /// Append a parametrized gate.
    pub fn append_with_params(
        &mut self,
        kind: GateKind,
        wires: impl IntoIterator<Item = usize>,
        params: impl IntoIterator<Item = impl Into<Param>>,
    ) -> Result<&mut Self, CircuitError> {
        self.append_op(Operation::new(kind, wires).with_params(params))
    }

    /// Append an arbitrary operator.
    pub fn append_op(&mut self, op: impl Into<Operator>) -> Result<&mut Self, CircuitError> {
        let op = op.into();
        op.validate()?;
        if matches!(op, Operator::StatePrep(_)) && !self.operations.is_empty() {
            return Err(CircuitError::MisplacedStatePrep {
                position: self.operations.len(),
            });
        }
        self.operations.push(op);
        Ok(self)
    }

    /// Prepare the initial state.
    pub fn prepare(&mut self, prep: StatePrep) -> Result<&mut Self, CircuitError> {
        self.append_op(prep)
    }

    /// Append a mid-circuit measurement and return its value.
    pub fn measure(&mut self, mcm: MidMeasure) -> Result<MeasurementValue, CircuitError> {
        let value = mcm.value();
        self.append_op(mcm)?;
        Ok(value)
    }

    /// Append an operation applied only when `condition` is non-zero.
    pub fn cond(
        &mut self,
        condition: &MeasurementValue,
        op: Operation,
    ) -> Result<&mut Self, CircuitError> {
        self.append_op(crate::ops::cond(condition, op))
    }

    /// Add a terminal measurement.
    pub fn measurement(&mut self, measurement: MeasurementProcess) -> &mut Self {
        self.measurements.push(measurement);
        self
    }

    /// Set the shots.
    pub fn shots(&mut self, shots: impl Into<Shots>) -> &mut Self {
        self.shots = shots.into();
        self
    }

    /// Finish the circuit.
    pub fn build(&self) -> Result<Circuit, CircuitError> {
        Circuit::try_new(
            self.operations.clone(),
            self.measurements.clone(),
            self.shots.clone(),
        )
    }
}

/// An error building or validating a circuit.
#[derive(Display, Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum CircuitError {
    /// The operator acts on the wrong number of wires.
    #[display("{name} acts on {expected} wires, but {found} were given.")]
    WireCount {
        /// The operator name.
        name: SmolStr,
        /// The expected number of wires.
        expected: usize,
        /// The number of wires given.
        found: usize,
    },
    /// The operator has the wrong number of parameters.
    #[display("{name} takes {expected} parameters, but {found} were given.")]
    ParamCount {
        /// The operator name.
        name: SmolStr,
        /// The expected number of parameters.
        expected: usize,
        /// The number of parameters given.
        found: usize,
    },
    /// The operator uses a wire twice.
    #[display("{name} acts on wire {wire} more than once.")]
    DuplicateWire {
        /// The operator name.
        name: SmolStr,
        /// The repeated wire.
        wire: Wire,
    },
    /// A state preparation appears after other operators.
    #[display("State preparations must be the first operation, found one at position {position}.")]
    MisplacedStatePrep {
        /// The position of the state preparation.
        position: usize,
    },
    /// The state preparation does not match its wires.
    #[display("Invalid state preparation: {reason}")]
    InvalidStatePrep {
        /// Description of the problem.
        reason: String,
    },
    /// Broadcast parameters have different lengths.
    #[display("Broadcast parameters have inconsistent batch sizes {first} and {second}.")]
    InconsistentBatchSize {
        /// The first batch size found.
        first: usize,
        /// The conflicting batch size.
        second: usize,
    },
    /// A scalar was required but the parameter is broadcast.
    #[display("{name} has broadcast parameters; expand the batch first.")]
    BroadcastParameter {
        /// The operator name.
        name: SmolStr,
    },
    /// Mid-circuit measurements can only postselect on 0 or 1.
    #[display("Invalid postselection value {value}, expected 0 or 1.")]
    InvalidPostselect {
        /// The postselected value.
        value: u8,
    },
}

#[cfg(test)]
mod tests {
    use cool_asserts::assert_matches;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::measurements::{MeasurementProcess, MeasurementTarget};
    use crate::ops::{MidMeasure, StatePrep};
    use crate::utils::build_simple_circuit;

    #[fixture]
    fn bell_circ() -> Circuit {
        build_simple_circuit(|circ| {
            circ.append(GateKind::Hadamard, [0])?;
            circ.append(GateKind::CNOT, [0, 1])?;
            circ.measurement(MeasurementProcess::probs(MeasurementTarget::wires([0, 1])));
            Ok(())
        })
        .unwrap()
    }

    #[rstest]
    fn circuit_wires(bell_circ: Circuit) {
        assert_eq!(bell_circ.wires(), vec![Wire::new(0), Wire::new(1)]);
        assert_eq!(bell_circ.num_operations(), 2);
        assert!(!bell_circ.has_mid_circuit_measurements());
        assert!(bell_circ.shots().is_analytic());
        assert_eq!(bell_circ.batch_size(), Ok(None));
    }

    #[test]
    fn measurement_wires_are_included() {
        let circ = build_simple_circuit(|circ| {
            circ.append(GateKind::Hadamard, [2])?;
            circ.measurement(MeasurementProcess::probs(MeasurementTarget::wires([0, 4])));
            Ok(())
        })
        .unwrap();
        assert_eq!(circ.wires(), vec![Wire::new(0), Wire::new(2), Wire::new(4)]);
    }

    #[test]
    fn mid_measure_values() {
        let mut builder = Circuit::builder();
        builder.append(GateKind::Hadamard, [0]).unwrap();
        let m0 = builder.measure(MidMeasure::new(0)).unwrap();
        builder
            .cond(&m0, Operation::new(GateKind::PauliX, [1]))
            .unwrap();
        let circ = builder.shots(10usize).build().unwrap();
        assert!(circ.has_mid_circuit_measurements());
        let mcm = circ.mid_circuit_measurements().next().unwrap();
        assert_eq!(m0.measurements(), &[mcm.id()]);
    }

    #[test]
    fn misplaced_state_prep() {
        let mut builder = Circuit::builder();
        builder.append(GateKind::Hadamard, [0]).unwrap();
        assert_matches!(
            builder.prepare(StatePrep::basis([1], [0])),
            Err(CircuitError::MisplacedStatePrep { position: 1 })
        );
    }

    #[test]
    fn inconsistent_batches() {
        let res = Circuit::try_new(
            vec![
                Operation::new(GateKind::RX, [0])
                    .with_param(vec![0.1, 0.2])
                    .into(),
                Operation::new(GateKind::RY, [0])
                    .with_param(vec![0.1, 0.2, 0.3])
                    .into(),
            ],
            vec![],
            Shots::analytic(),
        );
        assert_matches!(
            res,
            Err(CircuitError::InconsistentBatchSize {
                first: 2,
                second: 3,
            })
        );
    }
}
