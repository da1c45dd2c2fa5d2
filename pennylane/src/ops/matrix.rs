//! Dense unitaries of the named gates.
//!
//! Matrices are stored row-major. For multi-qubit gates the first wire of the
//! operation is the most significant bit of the row/column index.

use num_complex::Complex64;

use super::GateKind;

/// A square complex matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct GateMatrix {
    dim: usize,
    data: Vec<Complex64>,
}

impl GateMatrix {
    /// Create a matrix from row-major data.
    ///
    /// # Panics
    ///
    /// If `data` does not hold `dim * dim` entries.
    pub fn new(dim: usize, data: Vec<Complex64>) -> Self {
        assert_eq!(data.len(), dim * dim, "matrix data has the wrong size");
        Self { dim, data }
    }

    /// The identity on `dim` basis states.
    pub fn identity(dim: usize) -> Self {
        Self::diagonal((0..dim).map(|_| Complex64::ONE))
    }

    /// A diagonal matrix.
    pub fn diagonal(entries: impl IntoIterator<Item = Complex64>) -> Self {
        let entries: Vec<_> = entries.into_iter().collect();
        let dim = entries.len();
        let mut data = vec![Complex64::ZERO; dim * dim];
        for (i, e) in entries.into_iter().enumerate() {
            data[i * dim + i] = e;
        }
        Self { dim, data }
    }

    /// The matrix dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Entry at `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.data[row * self.dim + col]
    }

    /// The conjugate transpose.
    pub fn dagger(&self) -> Self {
        let mut data = vec![Complex64::ZERO; self.data.len()];
        for r in 0..self.dim {
            for c in 0..self.dim {
                data[c * self.dim + r] = self.get(r, c).conj();
            }
        }
        Self {
            dim: self.dim,
            data,
        }
    }

    /// Matrix product `self · other`.
    pub fn matmul(&self, other: &Self) -> Self {
        let dim = self.dim;
        let mut data = vec![Complex64::ZERO; dim * dim];
        for r in 0..dim {
            for k in 0..dim {
                let a = self.get(r, k);
                if a == Complex64::ZERO {
                    continue;
                }
                for c in 0..dim {
                    data[r * dim + c] += a * other.get(k, c);
                }
            }
        }
        Self { dim, data }
    }

    /// Whether two matrices agree entry-wise up to `tol`.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        self.dim == other.dim
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).norm() <= tol)
    }

    /// Whether two matrices agree up to a global phase.
    pub fn approx_eq_up_to_phase(&self, other: &Self, tol: f64) -> bool {
        if self.dim != other.dim {
            return false;
        }
        let Some((a, b)) = self
            .data
            .iter()
            .zip(&other.data)
            .find(|(a, _)| a.norm() > tol)
        else {
            return other.data.iter().all(|b| b.norm() <= tol);
        };
        if b.norm() <= tol {
            return false;
        }
        let phase = b / a;
        self.data
            .iter()
            .zip(&other.data)
            .all(|(a, b)| (a * phase - b).norm() <= tol)
    }
}

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

fn expi(phi: f64) -> Complex64 {
    Complex64::from_polar(1.0, phi)
}

fn single(entries: [Complex64; 4]) -> GateMatrix {
    GateMatrix {
        dim: 2,
        data: entries.to_vec(),
    }
}

/// Controlled version of a single-qubit unitary, control on the first wire.
fn controlled(target: &GateMatrix) -> GateMatrix {
    let mut data = vec![Complex64::ZERO; 16];
    data[0] = Complex64::ONE;
    data[5] = Complex64::ONE;
    for r in 0..2 {
        for col in 0..2 {
            data[(2 + r) * 4 + 2 + col] = target.get(r, col);
        }
    }
    GateMatrix { dim: 4, data }
}

/// The matrix of `kind` with the given scalar parameters, acting on
/// `num_wires` wires.
///
/// The number of parameters must match [`GateKind::num_params`]; missing
/// parameters are read as zero.
pub fn gate_matrix(kind: GateKind, params: &[f64], num_wires: usize) -> GateMatrix {
    let p = |i: usize| params.get(i).copied().unwrap_or(0.0);
    let (zero, one) = (Complex64::ZERO, Complex64::ONE);
    let i = Complex64::I;
    let h = std::f64::consts::FRAC_1_SQRT_2;
    match kind {
        GateKind::Identity => GateMatrix::identity(1 << num_wires),
        GateKind::Hadamard => single([c(h, 0.), c(h, 0.), c(h, 0.), c(-h, 0.)]),
        GateKind::PauliX => single([zero, one, one, zero]),
        GateKind::PauliY => single([zero, -i, i, zero]),
        GateKind::PauliZ => GateMatrix::diagonal([one, -one]),
        GateKind::S => GateMatrix::diagonal([one, i]),
        GateKind::T => GateMatrix::diagonal([one, expi(std::f64::consts::FRAC_PI_4)]),
        GateKind::SX => single([c(0.5, 0.5), c(0.5, -0.5), c(0.5, -0.5), c(0.5, 0.5)]),
        GateKind::RX => {
            let (s, co) = (p(0) / 2.).sin_cos();
            single([c(co, 0.), c(0., -s), c(0., -s), c(co, 0.)])
        }
        GateKind::RY => {
            let (s, co) = (p(0) / 2.).sin_cos();
            single([c(co, 0.), c(-s, 0.), c(s, 0.), c(co, 0.)])
        }
        GateKind::RZ => rz(p(0)),
        GateKind::PhaseShift => GateMatrix::diagonal([one, expi(p(0))]),
        GateKind::Rot => {
            let ry = gate_matrix(GateKind::RY, &[p(1)], 1);
            rz(p(2)).matmul(&ry).matmul(&rz(p(0)))
        }
        GateKind::CNOT => controlled(&gate_matrix(GateKind::PauliX, &[], 1)),
        GateKind::CZ => GateMatrix::diagonal([one, one, one, -one]),
        GateKind::CY => controlled(&gate_matrix(GateKind::PauliY, &[], 1)),
        GateKind::SWAP => {
            let mut m = GateMatrix::diagonal([one, zero, zero, one]);
            m.data[6] = one;
            m.data[9] = one;
            m
        }
        GateKind::CRZ => controlled(&rz(p(0))),
        GateKind::Toffoli => {
            let mut m = GateMatrix::diagonal([one, one, one, one, one, one, zero, zero]);
            m.data[6 * 8 + 7] = one;
            m.data[7 * 8 + 6] = one;
            m
        }
        GateKind::MultiRZ => GateMatrix::diagonal((0..1usize << num_wires).map(|b| {
            let parity = if b.count_ones() % 2 == 0 { 1.0 } else { -1.0 };
            expi(-parity * p(0) / 2.)
        })),
        GateKind::GlobalPhase => {
            let phase = expi(-p(0));
            GateMatrix::diagonal((0..1usize << num_wires).map(|_| phase))
        }
    }
}

fn rz(theta: f64) -> GateMatrix {
    GateMatrix::diagonal([expi(-theta / 2.), expi(theta / 2.)])
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn all_gates_unitary() {
        for kind in GateKind::iter() {
            let wires = kind.num_wires().unwrap_or(3);
            let params = [0.3, -1.2, 2.1];
            let m = gate_matrix(kind, &params[..kind.num_params()], wires);
            assert_eq!(m.dim(), 1 << wires);
            let prod = m.matmul(&m.dagger());
            assert!(prod.approx_eq(&GateMatrix::identity(m.dim()), TOL), "{kind}");
        }
    }

    #[rstest]
    #[case(GateKind::RX, std::f64::consts::PI, GateKind::PauliX)]
    #[case(GateKind::RY, std::f64::consts::PI, GateKind::PauliY)]
    #[case(GateKind::RZ, std::f64::consts::PI, GateKind::PauliZ)]
    #[case(GateKind::PhaseShift, std::f64::consts::FRAC_PI_2, GateKind::S)]
    fn rotations_match_paulis(#[case] rot: GateKind, #[case] angle: f64, #[case] gate: GateKind) {
        let lhs = gate_matrix(rot, &[angle], 1);
        let rhs = gate_matrix(gate, &[], 1);
        assert!(lhs.approx_eq_up_to_phase(&rhs, TOL));
    }

    #[test]
    fn sx_squared_is_x() {
        let sx = gate_matrix(GateKind::SX, &[], 1);
        let x = gate_matrix(GateKind::PauliX, &[], 1);
        assert!(sx.matmul(&sx).approx_eq(&x, TOL));
    }

    #[test]
    fn cnot_flips_target() {
        let m = gate_matrix(GateKind::CNOT, &[], 2);
        // |10> -> |11>
        assert_eq!(m.get(3, 2), Complex64::ONE);
        assert_eq!(m.get(2, 2), Complex64::ZERO);
    }
}
