//! Statevector simulation of circuits.
//!
//! [`simulate`] is the entry point. Circuits without mid-circuit
//! measurements are run to their final state and measured, either exactly or
//! by sampling. Circuits with mid-circuit measurements and finite shots are
//! run with the method selected in [`SimulationConfig`]: the branching tree
//! simulator ([`tree_mcm`]) or single-shot execution ([`one_shot`]).

pub mod measure;
pub mod one_shot;
pub mod sampling;
pub mod state;
pub mod tree_mcm;

use derive_more::{Display, Error, From};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

use crate::circuit::{Circuit, CircuitError};
use crate::measurements::{MeasurementResult, SimulationResult};
use crate::ops::{McmId, Operator, Wire};
use crate::transforms::{self, PostselectMode, TransformError};

pub use state::StateVector;
pub use tree_mcm::simulate_tree_mcm;

/// Log target for simulation events.
pub const LOG_TARGET: &str = "pennylane::simulate";

/// How circuits with mid-circuit measurements are executed.
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
pub enum McmMethod {
    /// Explore the tree of measurement outcomes, splitting the shots between
    /// branches.
    #[default]
    Tree,
    /// Run every shot independently, collapsing the state at each
    /// mid-circuit measurement.
    OneShot,
}

/// Configuration options for [`simulate`].
#[derive(Debug, Clone, Default)]
pub struct SimulationConfig {
    /// Seed for the random number generator. Uses system entropy if `None`.
    pub seed: Option<u64>,
    /// Execution method for circuits with mid-circuit measurements.
    pub mcm_method: McmMethod,
    /// Treatment of shots rejected by postselection in one-shot mode.
    pub postselect_mode: PostselectMode,
}

impl SimulationConfig {
    /// A new configuration with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// The random number generator for one simulation call.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Simulate a circuit.
///
/// Broadcast circuits are expanded and return [`SimulationResult::Batched`];
/// shot vectors return [`SimulationResult::Partitioned`].
///
/// # Errors
///
/// Returns an error if a measurement is not supported by the execution mode,
/// if the circuit has mid-circuit measurements but no shots, or if a branch
/// of the simulation tree cannot be normalized.
#[tracing::instrument(skip_all, fields(ops = circuit.num_operations(), shots = ?circuit.shots().total_shots()))]
pub fn simulate(
    circuit: &Circuit,
    config: &SimulationConfig,
) -> Result<SimulationResult, SimulationError> {
    let mut rng = config.rng();
    simulate_with_rng(circuit, config, &mut rng)
}

/// Simulate a circuit with an explicit random number generator.
pub fn simulate_with_rng(
    circuit: &Circuit,
    config: &SimulationConfig,
    rng: &mut StdRng,
) -> Result<SimulationResult, SimulationError> {
    // One-shot execution expands broadcast circuits itself.
    let one_shot =
        circuit.has_mid_circuit_measurements() && config.mcm_method == McmMethod::OneShot;
    if circuit.batch_size()?.is_some() && !one_shot {
        let expanded = transforms::broadcast_expand(circuit)?;
        let results = expanded
            .circuits
            .iter()
            .map(|c| simulate_with_rng(c, config, rng))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(expanded.postprocess(results)?);
    }

    if circuit.has_mid_circuit_measurements() {
        if circuit.shots().is_analytic() {
            return Err(SimulationError::AnalyticMidMeasure);
        }
        tracing::debug!(target: LOG_TARGET, method = %config.mcm_method, "simulating mid-circuit measurements");
        return match config.mcm_method {
            McmMethod::Tree => simulate_tree_mcm(circuit, rng),
            McmMethod::OneShot => one_shot::simulate_one_shot(circuit, config.postselect_mode, rng),
        };
    }

    let state = get_final_state(circuit, initial_state(circuit)?, &IndexMap::new())?;
    measure_final_state(circuit, &state, rng)
}

/// The state a circuit starts in: `|0…0>` over the circuit wires, or the
/// state prepared by a leading [`Operator::StatePrep`].
pub fn initial_state(circuit: &Circuit) -> Result<StateVector, SimulationError> {
    let wires = circuit.wires();
    match circuit.operations().first() {
        Some(Operator::StatePrep(prep)) => StateVector::prepared(wires, prep),
        _ => Ok(StateVector::zero(wires)),
    }
}

/// Apply the operators of `circuit` to `state`.
///
/// A leading state preparation is assumed to be part of `state` already.
/// Conditional operators are resolved with the outcomes in `mcm_active`.
///
/// # Errors
///
/// Mid-circuit measurements cannot be applied here; they are handled by the
/// tree and one-shot simulators.
pub fn get_final_state(
    circuit: &Circuit,
    mut state: StateVector,
    mcm_active: &IndexMap<McmId, u8>,
) -> Result<StateVector, SimulationError> {
    for (i, op) in circuit.operations().iter().enumerate() {
        match op {
            Operator::Gate(gate) => state.apply_operation(gate)?,
            Operator::StatePrep(_) if i == 0 => {}
            Operator::StatePrep(_) => {
                return Err(CircuitError::MisplacedStatePrep { position: i }.into())
            }
            Operator::Conditional(c) => {
                if resolve_condition(c.condition(), mcm_active)? {
                    state.apply_operation(c.op())?;
                }
            }
            Operator::MidMeasure(m) => {
                return Err(SimulationError::UnresolvedMidMeasure { id: m.id() })
            }
        }
    }
    Ok(state)
}

/// Evaluate a classical condition on a branch.
pub(crate) fn resolve_condition(
    condition: &crate::measurements::MeasurementValue,
    mcm_active: &IndexMap<McmId, u8>,
) -> Result<bool, SimulationError> {
    match condition.concretize_active(mcm_active) {
        Some(value) => Ok(value != 0.0),
        None => {
            let id = condition
                .measurements()
                .iter()
                .find(|id| !mcm_active.contains_key(*id))
                .copied();
            Err(match id {
                Some(id) => SimulationError::UnresolvedMidMeasure { id },
                None => SimulationError::InconsistentSamples,
            })
        }
    }
}

/// Measure the final state of a circuit without mid-circuit measurements.
pub fn measure_final_state(
    circuit: &Circuit,
    state: &StateVector,
    rng: &mut StdRng,
) -> Result<SimulationResult, SimulationError> {
    if circuit.shots().is_analytic() {
        let results = circuit
            .measurements()
            .iter()
            .map(|mp| measure::measure(mp, state))
            .collect::<Result<Vec<MeasurementResult>, _>>()?;
        return Ok(SimulationResult::Measurements(results));
    }
    sampling::measure_with_samples(circuit.measurements(), state, circuit.shots(), rng)
}

/// An error during simulation.
#[derive(Display, Debug, Clone, Error, PartialEq, From)]
#[non_exhaustive]
pub enum SimulationError {
    /// The circuit is malformed.
    #[display("{_0}")]
    #[from]
    Circuit(CircuitError),
    /// A branch state vanished after projection.
    #[display("Cannot normalize state with state_norm {norm}")]
    ZeroNorm {
        /// The norm of the projected state.
        norm: f64,
    },
    /// An operator or measurement refers to a wire outside the state.
    #[display("Wire {wire} is not part of the simulated state.")]
    UnknownWire {
        /// The unknown wire.
        wire: Wire,
    },
    /// The measurement cannot be computed in this execution mode.
    #[display("{kind} measurements are not supported {context}.")]
    UnsupportedMeasurement {
        /// The measurement kind.
        kind: &'static str,
        /// The execution mode.
        context: &'static str,
    },
    /// Mid-circuit measurements need finite shots.
    #[display("Analytic execution does not support mid-circuit measurements; set a finite number of shots.")]
    AnalyticMidMeasure,
    /// A mid-circuit measurement outcome is needed but not known.
    #[display("The outcome of mid-circuit measurement {id} is not known at this point.")]
    UnresolvedMidMeasure {
        /// The measurement id.
        id: McmId,
    },
    /// The recorded mid-circuit measurement samples have different lengths.
    #[display("mcm_samples have inconsistent shapes.")]
    InconsistentSamples,
    /// A branch returned a result of the wrong type.
    #[display("Branch results cannot be combined into a {kind} measurement.")]
    MismatchedBranchResult {
        /// The measurement kind.
        kind: &'static str,
    },
    /// An error from a circuit transform.
    #[display("{_0}")]
    Transform(Box<TransformError>),
}

impl From<TransformError> for SimulationError {
    fn from(err: TransformError) -> Self {
        SimulationError::Transform(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use cool_asserts::assert_matches;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::measurements::{MeasurementProcess, MeasurementTarget, Observable};
    use crate::ops::{GateKind, MidMeasure, Operation};
    use crate::utils::{approx_eq, build_simple_circuit};

    #[fixture]
    fn rx_circ() -> Circuit {
        build_simple_circuit(|circ| {
            circ.append_with_params(GateKind::RX, [0], [1.2])?;
            circ.measurement(MeasurementProcess::expval(Observable::z(0)));
            circ.measurement(MeasurementProcess::probs(MeasurementTarget::wires([0, 1])));
            Ok(())
        })
        .unwrap()
    }

    #[rstest]
    fn analytic_simulation(rx_circ: Circuit) {
        let res = simulate(&rx_circ, &SimulationConfig::default()).unwrap();
        let res = res.measurements().unwrap();
        assert!(approx_eq(res[0].as_scalar().unwrap(), 1.2f64.cos(), 1e-12));
        let probs = res[1].as_probabilities().unwrap();
        let p0 = (0.6f64).cos().powi(2);
        assert!(approx_eq(probs[0], p0, 1e-12));
        assert!(approx_eq(probs[1], 0.0, 1e-12));
        assert!(approx_eq(probs[2], 1.0 - p0, 1e-12));
    }

    #[rstest]
    fn seeded_sampling_is_reproducible(rx_circ: Circuit) {
        let circ = rx_circ.with_shots(500usize);
        let config = SimulationConfig::seeded(42);
        let a = simulate(&circ, &config).unwrap();
        let b = simulate(&circ, &config).unwrap();
        assert_eq!(a, b);
        let expval = a.measurements().unwrap()[0].as_scalar().unwrap();
        assert!((expval - 1.2f64.cos()).abs() < 0.15);
    }

    #[test]
    fn analytic_mid_measure_fails() {
        let circ = build_simple_circuit(|circ| {
            circ.append(GateKind::Hadamard, [0])?;
            circ.measure(MidMeasure::new(0))?;
            circ.measurement(MeasurementProcess::expval(Observable::z(0)));
            Ok(())
        })
        .unwrap();
        assert_matches!(
            simulate(&circ, &SimulationConfig::default()),
            Err(SimulationError::AnalyticMidMeasure)
        );
    }

    #[test]
    fn broadcast_simulation() {
        let circ = build_simple_circuit(|circ| {
            let ry = Operation::new(GateKind::RY, [0]).with_param(vec![0.0, std::f64::consts::PI]);
            circ.append_op(ry)?;
            circ.measurement(MeasurementProcess::expval(Observable::z(0)));
            Ok(())
        })
        .unwrap();
        let res = simulate(&circ, &SimulationConfig::default()).unwrap();
        let parts = res.parts().unwrap();
        assert_eq!(parts.len(), 2);
        let expvals = parts
            .iter()
            .map(|p| p.single().unwrap().as_scalar().unwrap())
            .collect::<Vec<_>>();
        assert!(approx_eq(expvals[0], 1.0, 1e-12));
        assert!(approx_eq(expvals[1], -1.0, 1e-12));
    }

    #[test]
    fn unresolved_conditional() {
        let foreign = MidMeasure::new(0);
        let circ = build_simple_circuit(|circ| {
            circ.cond(&foreign.value(), Operation::new(GateKind::PauliX, [0]))?;
            circ.measurement(MeasurementProcess::probs(MeasurementTarget::wires([0])));
            Ok(())
        })
        .unwrap();
        assert_matches!(
            simulate(&circ, &SimulationConfig::default()),
            Err(SimulationError::UnresolvedMidMeasure { id }) => assert_eq!(id, foreign.id())
        );
    }
}
