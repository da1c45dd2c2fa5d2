//! Exact measurement of a state vector.

use super::{SimulationError, StateVector};
use crate::measurements::{
    MeasurementKind, MeasurementProcess, MeasurementResult, MeasurementTarget, Observable,
};

/// Compute a measurement exactly from the state.
pub fn measure(
    mp: &MeasurementProcess,
    state: &StateVector,
) -> Result<MeasurementResult, SimulationError> {
    let kind = mp.kind();
    let unsupported = || SimulationError::UnsupportedMeasurement {
        kind: kind.name(),
        context: "in analytic mode",
    };
    match (kind, mp.target()) {
        (MeasurementKind::State, _) => Ok(MeasurementResult::State(state.amplitudes().to_vec())),
        (MeasurementKind::Probs, MeasurementTarget::Wires(wires)) => {
            Ok(MeasurementResult::Probabilities(state.probabilities(wires)?))
        }
        (MeasurementKind::Probs, MeasurementTarget::Observable(obs)) => {
            Ok(MeasurementResult::Probabilities(observable_probabilities(state, obs)?))
        }
        (MeasurementKind::Expval, MeasurementTarget::Observable(obs)) => {
            let (mean, _) = moments(state, obs)?;
            Ok(MeasurementResult::Scalar(mean))
        }
        (MeasurementKind::Var, MeasurementTarget::Observable(obs)) => {
            let (mean, second) = moments(state, obs)?;
            Ok(MeasurementResult::Scalar(second - mean * mean))
        }
        (MeasurementKind::Sample | MeasurementKind::Counts { .. }, _) => {
            Err(SimulationError::UnsupportedMeasurement {
                kind: kind.name(),
                context: "without shots",
            })
        }
        _ => Err(unsupported()),
    }
}

/// Probabilities of the computational basis outcomes on the observable
/// wires, after rotating to its eigenbasis.
pub(crate) fn observable_probabilities(
    state: &StateVector,
    obs: &Observable,
) -> Result<Vec<f64>, SimulationError> {
    if obs.terms().is_empty() {
        return Ok(vec![1.0]);
    }
    let rotated = diagonalized(state, obs)?;
    rotated.probabilities(&obs.wires())
}

/// A copy of the state rotated by the diagonalizing gates of `obs`.
pub(crate) fn diagonalized(
    state: &StateVector,
    obs: &Observable,
) -> Result<StateVector, SimulationError> {
    let mut rotated = state.clone();
    for gate in obs.diagonalizing_gates() {
        rotated.apply_operation(&gate)?;
    }
    Ok(rotated)
}

/// First and second moments of the observable.
fn moments(state: &StateVector, obs: &Observable) -> Result<(f64, f64), SimulationError> {
    let probs = observable_probabilities(state, obs)?;
    let eigvals = obs.eigvals();
    let mean = probs.iter().zip(&eigvals).map(|(p, e)| p * e).sum();
    let second = probs.iter().zip(&eigvals).map(|(p, e)| p * e * e).sum();
    Ok((mean, second))
}

#[cfg(test)]
mod tests {
    use cool_asserts::assert_matches;
    use rstest::rstest;

    use super::*;
    use crate::ops::{GateKind, Operation, Pauli, Wire};

    fn plus_zero() -> StateVector {
        let mut state = StateVector::zero(vec![Wire::new(0), Wire::new(1)]);
        state
            .apply_operation(&Operation::new(GateKind::Hadamard, [0]))
            .unwrap();
        state
    }

    #[rstest]
    #[case(Observable::x(0), 1.0, 0.0)]
    #[case(Observable::z(0), 0.0, 1.0)]
    #[case(Observable::z(1), 1.0, 0.0)]
    #[case(Observable::y(0), 0.0, 1.0)]
    #[case(Observable::new([(0, Pauli::X), (1, Pauli::Z)]).scaled(2.0), 2.0, 0.0)]
    #[case(Observable::new(Vec::<(usize, Pauli)>::new()).scaled(3.0), 3.0, 0.0)]
    fn expval_and_var(#[case] obs: Observable, #[case] expval: f64, #[case] var: f64) {
        let state = plus_zero();
        let e = measure(&MeasurementProcess::expval(obs.clone()), &state).unwrap();
        let v = measure(&MeasurementProcess::var(obs), &state).unwrap();
        assert!((e.as_scalar().unwrap() - expval).abs() < 1e-12);
        assert!((v.as_scalar().unwrap() - var).abs() < 1e-12);
    }

    #[test]
    fn probs_in_observable_basis() {
        let state = plus_zero();
        let res = measure(&MeasurementProcess::probs(Observable::x(0)), &state).unwrap();
        let probs = res.as_probabilities().unwrap();
        assert!((probs[0] - 1.0).abs() < 1e-12);
        assert!(probs[1].abs() < 1e-12);
    }

    #[test]
    fn samples_need_shots() {
        let state = plus_zero();
        let mp = MeasurementProcess::sample(MeasurementTarget::wires([0]));
        assert_matches!(
            measure(&mp, &state),
            Err(SimulationError::UnsupportedMeasurement { kind: "Sample", .. })
        );
    }
}
