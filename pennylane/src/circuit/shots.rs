//! Shot specifications.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A run of identical shot bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShotCopies {
    /// Shots per bin.
    pub shots: usize,
    /// Number of consecutive bins with that many shots.
    pub copies: usize,
}

/// The number of executions of a circuit.
///
/// Either analytic (`None`, exact expectation values) or a shot vector of one
/// or more bins. A single bin is a plain shot count; several bins are
/// reported as a partitioned result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shots {
    vector: Option<Vec<ShotCopies>>,
}

impl Shots {
    /// Analytic execution.
    pub const fn analytic() -> Self {
        Self { vector: None }
    }

    /// A single bin of `shots` executions.
    pub fn new(shots: usize) -> Self {
        Self {
            vector: Some(vec![ShotCopies { shots, copies: 1 }]),
        }
    }

    /// A shot vector from per-bin shot counts.
    ///
    /// Consecutive equal entries are merged into a single [`ShotCopies`].
    pub fn from_bins(bins: impl IntoIterator<Item = usize>) -> Self {
        let vector = bins
            .into_iter()
            .dedup_with_count()
            .map(|(copies, shots)| ShotCopies { shots, copies })
            .collect_vec();
        match vector.is_empty() {
            true => Self::analytic(),
            false => Self {
                vector: Some(vector),
            },
        }
    }

    /// Whether the execution is analytic.
    pub fn is_analytic(&self) -> bool {
        self.vector.is_none()
    }

    /// Whether a finite number of shots is requested (possibly zero).
    pub fn is_finite(&self) -> bool {
        self.vector.is_some()
    }

    /// The total number of shots over all bins.
    pub fn total_shots(&self) -> Option<usize> {
        self.vector
            .as_ref()
            .map(|v| v.iter().map(|sc| sc.shots * sc.copies).sum())
    }

    /// The shot vector.
    pub fn shot_vector(&self) -> &[ShotCopies] {
        self.vector.as_deref().unwrap_or_default()
    }

    /// Whether the results are split into several bins.
    pub fn has_partitioned_shots(&self) -> bool {
        match self.vector.as_deref() {
            None => false,
            Some([single]) => single.copies > 1,
            Some(_) => true,
        }
    }

    /// The number of bins.
    pub fn num_bins(&self) -> usize {
        self.shot_vector().iter().map(|sc| sc.copies).sum()
    }

    /// The shot count of each bin, expanding the copies.
    pub fn bins(&self) -> impl Iterator<Item = usize> + '_ {
        self.shot_vector()
            .iter()
            .flat_map(|sc| std::iter::repeat_n(sc.shots, sc.copies))
    }
}

impl From<usize> for Shots {
    fn from(shots: usize) -> Self {
        Shots::new(shots)
    }
}

impl From<Option<usize>> for Shots {
    fn from(shots: Option<usize>) -> Self {
        shots.map_or_else(Shots::analytic, Shots::new)
    }
}

impl From<Vec<usize>> for Shots {
    fn from(bins: Vec<usize>) -> Self {
        Shots::from_bins(bins)
    }
}
