//! Pauli-word observables.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::ops::{Operation, Pauli, Wire};

/// A scaled tensor product of Pauli operators, e.g. `0.5 · X(0) Z(2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observable {
    coeff: f64,
    terms: Vec<(Wire, Pauli)>,
}

impl Observable {
    /// A Pauli word. Identity factors are dropped.
    pub fn new(terms: impl IntoIterator<Item = (usize, Pauli)>) -> Self {
        Self {
            coeff: 1.0,
            terms: terms
                .into_iter()
                .filter(|(_, p)| *p != Pauli::I)
                .map(|(w, p)| (Wire::new(w), p))
                .collect(),
        }
    }

    /// Pauli Z on a single wire.
    pub fn z(wire: usize) -> Self {
        Self::new([(wire, Pauli::Z)])
    }

    /// Pauli X on a single wire.
    pub fn x(wire: usize) -> Self {
        Self::new([(wire, Pauli::X)])
    }

    /// Pauli Y on a single wire.
    pub fn y(wire: usize) -> Self {
        Self::new([(wire, Pauli::Y)])
    }

    /// Scale the observable.
    pub fn scaled(mut self, coeff: f64) -> Self {
        self.coeff *= coeff;
        self
    }

    /// The coefficient.
    pub fn coeff(&self) -> f64 {
        self.coeff
    }

    /// The Pauli factors.
    pub fn terms(&self) -> &[(Wire, Pauli)] {
        &self.terms
    }

    /// The wires the observable acts on.
    pub fn wires(&self) -> Vec<Wire> {
        self.terms.iter().map(|(w, _)| *w).collect()
    }

    /// Gates rotating the observable eigenbasis onto the computational basis.
    pub fn diagonalizing_gates(&self) -> Vec<Operation> {
        self.terms
            .iter()
            .flat_map(|(w, p)| p.diagonalizing_gates(*w))
            .collect()
    }

    /// The eigenvalue for a computational basis outcome on
    /// [`Observable::wires`], after diagonalization.
    pub fn eigenvalue(&self, bits: &[u8]) -> f64 {
        let parity = bits.iter().map(|&b| usize::from(b)).sum::<usize>() % 2;
        match parity {
            0 => self.coeff,
            _ => -self.coeff,
        }
    }

    /// The eigenvalues in binary order of the outcomes on
    /// [`Observable::wires`].
    pub fn eigvals(&self) -> Vec<f64> {
        let n = self.terms.len();
        (0..1usize << n)
            .map(|idx| match idx.count_ones() % 2 {
                0 => self.coeff,
                _ => -self.coeff,
            })
            .collect_vec()
    }
}
