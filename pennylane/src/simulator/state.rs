//! Dense state vectors.

use itertools::Itertools;
use num_complex::Complex64;

use super::SimulationError;
use crate::ops::{GateKind, GateMatrix, Operation, StatePrep, Wire};

/// A dense state vector over an explicit ordered set of wires.
///
/// The wire at position 0 is the most significant bit of the amplitude
/// index.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    wires: Vec<Wire>,
    amplitudes: Vec<Complex64>,
}

impl StateVector {
    /// The all-zero state `|0…0>`.
    pub fn zero(wires: Vec<Wire>) -> Self {
        let mut amplitudes = vec![Complex64::ZERO; 1 << wires.len()];
        amplitudes[0] = Complex64::ONE;
        Self { wires, amplitudes }
    }

    /// A state prepared by `prep`; wires not touched by it are in `|0>`.
    pub fn prepared(wires: Vec<Wire>, prep: &StatePrep) -> Result<Self, SimulationError> {
        let mut state = Self::zero(wires);
        let shifts = state.shifts(prep.wires())?;
        state.amplitudes[0] = Complex64::ZERO;
        match prep {
            StatePrep::Basis { bits, .. } => {
                let idx = shifts
                    .iter()
                    .zip(bits)
                    .fold(0, |acc, (s, &b)| acc | (usize::from(b) << s));
                state.amplitudes[idx] = Complex64::ONE;
            }
            StatePrep::Amplitudes { amplitudes, .. } => {
                for (local, amp) in amplitudes.iter().enumerate() {
                    state.amplitudes[scatter(local, &shifts)] = *amp;
                }
            }
        }
        Ok(state)
    }

    /// The wire order.
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// The number of wires.
    pub fn num_wires(&self) -> usize {
        self.wires.len()
    }

    /// The amplitudes.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Bit offset of each wire within the amplitude index.
    fn shifts(&self, wires: &[Wire]) -> Result<Vec<usize>, SimulationError> {
        let n = self.wires.len();
        wires
            .iter()
            .map(|w| {
                self.wires
                    .iter()
                    .position(|x| x == w)
                    .map(|pos| n - 1 - pos)
                    .ok_or(SimulationError::UnknownWire { wire: *w })
            })
            .collect()
    }

    /// Apply a gate.
    pub fn apply_operation(&mut self, op: &Operation) -> Result<(), SimulationError> {
        match op.kind() {
            GateKind::Identity => Ok(()),
            GateKind::GlobalPhase => {
                // Acts as a scalar regardless of its wires.
                let phi = op.scalar_params()?.first().copied().unwrap_or_default();
                let phase = match op.is_adjoint() {
                    true => Complex64::from_polar(1.0, phi),
                    false => Complex64::from_polar(1.0, -phi),
                };
                self.amplitudes.iter_mut().for_each(|a| *a *= phase);
                Ok(())
            }
            _ => self.apply_matrix(&op.matrix()?, op.wires()),
        }
    }

    /// Apply a unitary acting on `wires`, the first wire being the most
    /// significant bit of the matrix index.
    pub fn apply_matrix(
        &mut self,
        matrix: &GateMatrix,
        wires: &[Wire],
    ) -> Result<(), SimulationError> {
        let shifts = self.shifts(wires)?;
        let dim = matrix.dim();
        debug_assert_eq!(dim, 1 << wires.len());
        let offsets = (0..dim).map(|local| scatter(local, &shifts)).collect_vec();
        let mask: usize = shifts.iter().map(|s| 1 << s).sum();
        let mut inputs = vec![Complex64::ZERO; dim];
        for base in (0..self.amplitudes.len()).filter(|i| i & mask == 0) {
            for (input, off) in inputs.iter_mut().zip(&offsets) {
                *input = self.amplitudes[base | off];
            }
            for (row, off) in offsets.iter().enumerate() {
                self.amplitudes[base | off] = inputs
                    .iter()
                    .enumerate()
                    .map(|(col, a)| matrix.get(row, col) * a)
                    .sum();
            }
        }
        Ok(())
    }

    /// The probability of measuring `outcome` on `wire`.
    pub fn outcome_probability(&self, wire: Wire, outcome: u8) -> Result<f64, SimulationError> {
        let probs = self.probabilities(&[wire])?;
        Ok(probs[usize::from(outcome)])
    }

    /// Zero the amplitudes inconsistent with `outcome` on `wire`.
    ///
    /// The result is not normalized.
    pub fn project(&mut self, wire: Wire, outcome: u8) -> Result<(), SimulationError> {
        let shift = self.shifts(&[wire])?[0];
        for (idx, amp) in self.amplitudes.iter_mut().enumerate() {
            if ((idx >> shift) & 1) as u8 != outcome {
                *amp = Complex64::ZERO;
            }
        }
        Ok(())
    }

    /// The 2-norm of the state.
    pub fn norm(&self) -> f64 {
        self.amplitudes
            .iter()
            .map(|a| a.norm_sqr())
            .sum::<f64>()
            .sqrt()
    }

    /// Divide the amplitudes by `norm`.
    pub fn scale(&mut self, norm: f64) {
        self.amplitudes.iter_mut().for_each(|a| *a /= norm);
    }

    /// Marginal probabilities of the computational basis outcomes of
    /// `wires`, in binary order with the first wire most significant.
    ///
    /// No wires means every wire of the state.
    pub fn probabilities(&self, wires: &[Wire]) -> Result<Vec<f64>, SimulationError> {
        let wires = match wires.is_empty() {
            true => self.wires.as_slice(),
            false => wires,
        };
        let shifts = self.shifts(wires)?;
        let mut probs = vec![0.0; 1 << shifts.len()];
        for (idx, amp) in self.amplitudes.iter().enumerate() {
            probs[gather(idx, &shifts)] += amp.norm_sqr();
        }
        Ok(probs)
    }
}

/// Place the bits of a local index (first wire most significant) at the
/// given global bit offsets.
fn scatter(local: usize, shifts: &[usize]) -> usize {
    let k = shifts.len();
    shifts
        .iter()
        .enumerate()
        .fold(0, |acc, (j, s)| acc | (((local >> (k - 1 - j)) & 1) << s))
}

/// Inverse of [`scatter`]: read the bits at the given offsets.
pub(crate) fn gather(global: usize, shifts: &[usize]) -> usize {
    let k = shifts.len();
    shifts
        .iter()
        .enumerate()
        .fold(0, |acc, (j, s)| acc | (((global >> s) & 1) << (k - 1 - j)))
}

#[cfg(test)]
mod tests {
    use cool_asserts::assert_matches;
    use rstest::{fixture, rstest};

    use super::*;

    fn wires(n: usize) -> Vec<Wire> {
        (0..n).map(Wire::new).collect()
    }

    fn assert_probs(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[fixture]
    fn bell() -> StateVector {
        let mut state = StateVector::zero(wires(2));
        state
            .apply_operation(&Operation::new(GateKind::Hadamard, [0]))
            .unwrap();
        state
            .apply_operation(&Operation::new(GateKind::CNOT, [0, 1]))
            .unwrap();
        state
    }

    #[rstest]
    fn bell_probabilities(bell: StateVector) {
        assert_probs(&bell.probabilities(&[]).unwrap(), &[0.5, 0.0, 0.0, 0.5]);
        assert_probs(&bell.probabilities(&[Wire::new(1)]).unwrap(), &[0.5, 0.5]);
        assert!((bell.norm() - 1.0).abs() < 1e-12);
    }

    #[rstest]
    fn projection(mut bell: StateVector) {
        bell.project(Wire::new(0), 1).unwrap();
        let norm = bell.norm();
        assert!((norm - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
        bell.scale(norm);
        assert!((bell.norm() - 1.0).abs() < 1e-8);
        assert_probs(&bell.probabilities(&[]).unwrap(), &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn wire_order() {
        // X on the least significant wire of a 3-wire register.
        let mut state = StateVector::zero(wires(3));
        state
            .apply_operation(&Operation::new(GateKind::PauliX, [2]))
            .unwrap();
        assert_eq!(state.amplitudes()[1], Complex64::ONE);
        // Reversed CNOT: control 2, target 0.
        state
            .apply_operation(&Operation::new(GateKind::CNOT, [2, 0]))
            .unwrap();
        assert_eq!(state.amplitudes()[0b101], Complex64::ONE);
        assert_probs(
            &state.probabilities(&[Wire::new(2), Wire::new(1)]).unwrap(),
            &[0.0, 0.0, 1.0, 0.0],
        );
    }

    #[test]
    fn prepared_states() {
        let prep = StatePrep::basis([1, 0], [2, 0]);
        let state = StateVector::prepared(wires(3), &prep).unwrap();
        assert_eq!(state.amplitudes()[0b001], Complex64::ONE);

        let h = std::f64::consts::FRAC_1_SQRT_2;
        let prep = StatePrep::amplitudes([Complex64::new(h, 0.), Complex64::new(h, 0.)], [1]);
        let state = StateVector::prepared(wires(2), &prep).unwrap();
        assert_probs(&state.probabilities(&[]).unwrap(), &[0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn unknown_wire() {
        let mut state = StateVector::zero(wires(1));
        assert_matches!(
            state.apply_operation(&Operation::new(GateKind::PauliX, [4])),
            Err(SimulationError::UnknownWire { .. })
        );
    }

    #[test]
    fn global_phase() {
        let mut state = StateVector::zero(wires(1));
        let phase = Operation::new(GateKind::GlobalPhase, Vec::<usize>::new()).with_param(0.5);
        state.apply_operation(&phase).unwrap();
        let expected = Complex64::from_polar(1.0, -0.5);
        assert!((state.amplitudes()[0] - expected).norm() < 1e-12);
    }
}
