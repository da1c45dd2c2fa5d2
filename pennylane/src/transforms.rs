//! Circuit transforms.
//!
//! A transform turns one circuit into a batch of circuits, plus a
//! postprocessing function that turns the results of executing that batch
//! back into the result of the original circuit.

pub mod decompose;
pub mod dynamic_one_shot;

use std::fmt;
use std::sync::Arc;

use derive_more::{Display, Error, From};

use crate::circuit::{Circuit, CircuitError};
use crate::decomposition::DecompositionError;
use crate::measurements::SimulationResult;
use crate::ops::McmId;
use crate::simulator::SimulationError;

pub use decompose::{decompose, DecomposeOptions, GateSet};
pub use dynamic_one_shot::{dynamic_one_shot, OneShotOptions, PostselectMode};

type PostprocessingFn =
    Arc<dyn Fn(Vec<SimulationResult>) -> Result<SimulationResult, TransformError> + Send + Sync>;

/// The output of a transform: circuits to execute and the function that
/// combines their results.
#[derive(Clone)]
pub struct TransformOutput {
    /// The circuits to execute.
    pub circuits: Vec<Circuit>,
    postprocessing: PostprocessingFn,
}

impl TransformOutput {
    /// A transform output with a custom postprocessing function.
    pub fn new(
        circuits: Vec<Circuit>,
        postprocessing: impl Fn(Vec<SimulationResult>) -> Result<SimulationResult, TransformError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            circuits,
            postprocessing: Arc::new(postprocessing),
        }
    }

    /// A single circuit whose result is passed through.
    pub fn identity(circuit: Circuit) -> Self {
        Self::new(vec![circuit], |results| {
            results
                .into_iter()
                .next()
                .ok_or(TransformError::ResultCount {
                    expected: 1,
                    found: 0,
                })
        })
    }

    /// Combine the results of executing [`TransformOutput::circuits`], in
    /// order.
    pub fn postprocess(
        &self,
        results: Vec<SimulationResult>,
    ) -> Result<SimulationResult, TransformError> {
        (self.postprocessing)(results)
    }
}

impl fmt::Debug for TransformOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformOutput")
            .field("circuits", &self.circuits)
            .finish_non_exhaustive()
    }
}

/// Expand a broadcast circuit into one circuit per batch element.
///
/// The results are collected into [`SimulationResult::Batched`]. Circuits
/// without broadcasting are returned unchanged.
pub fn broadcast_expand(circuit: &Circuit) -> Result<TransformOutput, TransformError> {
    let Some(batch_size) = circuit.batch_size()? else {
        return Ok(TransformOutput::identity(circuit.clone()));
    };
    let circuits = (0..batch_size)
        .map(|i| {
            let ops = circuit
                .operations()
                .iter()
                .map(|op| op.batch_element(i))
                .collect();
            circuit.with_operations(ops)
        })
        .collect();
    Ok(TransformOutput::new(circuits, move |results| {
        if results.len() != batch_size {
            return Err(TransformError::ResultCount {
                expected: batch_size,
                found: results.len(),
            });
        }
        Ok(SimulationResult::Batched(results))
    }))
}

/// An error while applying a transform or postprocessing its results.
#[derive(Display, Debug, Clone, Error, PartialEq, From)]
#[non_exhaustive]
pub enum TransformError {
    /// The circuit is malformed.
    #[display("{_0}")]
    #[from]
    Circuit(CircuitError),
    /// Simulating or measuring failed.
    #[display("{_0}")]
    #[from]
    Simulation(SimulationError),
    /// The circuit cannot be decomposed into the gate set.
    #[display("{_0}")]
    #[from]
    Decomposition(DecompositionError),
    /// The measurement kind is not supported by the transform.
    #[display("Native mid-circuit measurement mode does not support {kind} measurements.")]
    UnsupportedMeasurement {
        /// The measurement kind.
        kind: &'static str,
    },
    /// The transform needs finite shots.
    #[display("dynamic_one_shot is only supported with finite shots.")]
    AnalyticShots,
    /// Samples cannot be padded per batch element when postselecting.
    #[display("Returning samples is not supported when postselecting mid-circuit measurements with broadcasting.")]
    SampleWithPostselectBroadcast,
    /// The postprocessing function received the wrong number of results.
    #[display("Expected {expected} results, found {found}.")]
    ResultCount {
        /// The number of circuits of the transform.
        expected: usize,
        /// The number of results received.
        found: usize,
    },
    /// A result does not have the shape of the circuit it comes from.
    #[display("Malformed result for a {kind} measurement.")]
    MalformedResult {
        /// The measurement kind.
        kind: &'static str,
    },
    /// No samples were recorded for a mid-circuit measurement.
    #[display("No samples recorded for mid-circuit measurement {id}.")]
    MissingMcmSamples {
        /// The measurement id.
        id: McmId,
    },
}

#[cfg(test)]
mod tests {
    use cool_asserts::assert_matches;

    use super::*;
    use crate::measurements::{MeasurementProcess, MeasurementResult, Observable};
    use crate::ops::{GateKind, Operation, Operator, Param};
    use crate::utils::build_simple_circuit;

    #[test]
    fn expand_broadcast() {
        let circ = build_simple_circuit(|circ| {
            circ.append_op(Operation::new(GateKind::RX, [0]).with_param(vec![0.1, 0.2, 0.3]))?;
            circ.append(GateKind::Hadamard, [1])?;
            circ.measurement(MeasurementProcess::expval(Observable::z(0)));
            Ok(())
        })
        .unwrap();
        let out = broadcast_expand(&circ).unwrap();
        assert_eq!(out.circuits.len(), 3);
        let Operator::Gate(rx) = &out.circuits[1].operations()[0] else {
            panic!("expected a gate");
        };
        assert_eq!(rx.params(), &[Param::Scalar(0.2)]);
        assert_eq!(out.circuits[1].batch_size(), Ok(None));

        let results = (0..3)
            .map(|i| SimulationResult::from(vec![MeasurementResult::Scalar(i as f64)]))
            .collect::<Vec<_>>();
        assert_matches!(out.postprocess(results), Ok(SimulationResult::Batched(r)) => assert_eq!(r.len(), 3));
        assert_matches!(
            out.postprocess(vec![]),
            Err(TransformError::ResultCount {
                expected: 3,
                found: 0,
            })
        );
    }

    #[test]
    fn no_broadcast_is_identity() {
        let circ = build_simple_circuit(|circ| {
            circ.append(GateKind::Hadamard, [0])?;
            Ok(())
        })
        .unwrap();
        let out = broadcast_expand(&circ).unwrap();
        assert_eq!(out.circuits.len(), 1);
        let res = SimulationResult::from(vec![MeasurementResult::Scalar(1.0)]);
        assert_eq!(out.postprocess(vec![res.clone()]).unwrap(), res);
    }
}
