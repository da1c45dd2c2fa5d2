//! Cost of a decomposition.

use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use derive_more::From;

/// A non-negative gate weight, totally ordered.
#[derive(Clone, Copy, Default, PartialEq, From)]
pub struct Weight(f64);

impl Weight {
    /// The weight as a float.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Eq for Weight {}

impl PartialOrd for Weight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Weight {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add for Weight {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Weight {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Debug for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cost that is ordered lexicographically.
///
/// An array of costs, where the first one is infinitely more important than
/// the second, which is infinitely more important than the third, etc.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, From)]
pub struct LexicographicCost<T, const N: usize>([T; N]);

/// A pair of major and minor cost.
///
/// This is used to order decompositions based on major cost first, then
/// minor cost.
pub type MajorMinorCost<T> = LexicographicCost<T, 2>;

/// The cost of reaching the target gate set: the total gate weight, then the
/// number of gates.
pub type DecompositionCost = MajorMinorCost<Weight>;

impl<T> From<(T, T)> for MajorMinorCost<T> {
    fn from((major, minor): (T, T)) -> Self {
        Self([major, minor])
    }
}

impl DecompositionCost {
    /// The cost of a single gate of the given weight.
    pub fn gate(weight: f64) -> Self {
        (Weight(weight), Weight(1.0)).into()
    }

    /// The total weight.
    pub fn weight(&self) -> f64 {
        self.0[0].value()
    }

    /// The number of gates.
    pub fn num_gates(&self) -> usize {
        self.0[1].value() as usize
    }

    /// The cost of `n` copies.
    pub fn times(self, n: usize) -> Self {
        (
            Weight(self.0[0].value() * n as f64),
            Weight(self.0[1].value() * n as f64),
        )
            .into()
    }
}

impl<const N: usize, T: Default + Copy> Default for LexicographicCost<T, N> {
    fn default() -> Self {
        Self([Default::default(); N])
    }
}

impl<T: Display, const N: usize> Debug for LexicographicCost<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

impl<T: Add<Output = T> + Copy, const N: usize> Add for LexicographicCost<T, N> {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        for i in 0..N {
            self.0[i] = self.0[i] + rhs.0[i];
        }
        self
    }
}

impl<T: AddAssign + Copy, const N: usize> AddAssign for LexicographicCost<T, N> {
    fn add_assign(&mut self, rhs: Self) {
        for i in 0..N {
            self.0[i] += rhs.0[i];
        }
    }
}

impl<T: Add<Output = T> + Default + Copy, const N: usize> Sum for LexicographicCost<T, N> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.reduce(|a, b| a + b).unwrap_or_default()
    }
}
