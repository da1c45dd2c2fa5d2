//! Resource estimates of decomposition rules.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;

use derive_more::{Display, Error, From};
use itertools::Itertools;
use smol_str::SmolStr;

use super::{parse_operator_name, translate_op_alias};
use crate::ops::{GateKind, Operation, ResourceParams};

/// An operator type together with the parameters its decompositions depend
/// on.
///
/// Operators whose resources do not depend on the instance are represented
/// by their name alone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressedResourceOp {
    name: SmolStr,
    params: ResourceParams,
}

impl CompressedResourceOp {
    /// The representation of an operator type without resource parameters.
    pub fn new(name: &str) -> Self {
        Self {
            name: SmolStr::new(translate_op_alias(name)),
            params: ResourceParams::new(),
        }
    }

    /// The representation of a concrete operation.
    pub fn of(op: &Operation) -> Self {
        Self {
            name: op.name(),
            params: op.resource_params(),
        }
    }

    /// The operator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resource parameters.
    pub fn params(&self) -> &ResourceParams {
        &self.params
    }
}

impl fmt::Display for CompressedResourceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            return write!(f, "{}", self.name);
        }
        let params = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .join(", ");
        write!(f, "{}({params})", self.name)
    }
}

/// Build the resource representation of an operator with explicit resource
/// parameters.
pub fn resource_rep<'a>(
    name: &str,
    params: impl IntoIterator<Item = (&'a str, usize)>,
) -> CompressedResourceOp {
    CompressedResourceOp {
        name: SmolStr::new(translate_op_alias(name)),
        params: params
            .into_iter()
            .map(|(k, v)| (SmolStr::new(k), v))
            .collect(),
    }
}

/// A key of a raw resource estimate, before canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, From)]
pub enum ResourceKey {
    /// A gate type.
    Gate(GateKind),
    /// An explicit resource representation.
    Rep(CompressedResourceOp),
    /// An operator name, e.g. `"Adjoint(S)"`.
    Name(SmolStr),
}

impl From<&str> for ResourceKey {
    fn from(name: &str) -> Self {
        Self::Name(SmolStr::new(name))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Gate(kind) => write!(f, "{kind}"),
            ResourceKey::Rep(rep) => write!(f, "{rep}"),
            ResourceKey::Name(name) => write!(f, "{name}"),
        }
    }
}

impl ResourceKey {
    /// The canonical representation of the key.
    ///
    /// Gate types with non-empty resource keys are ambiguous and must be
    /// given as an explicit [`resource_rep`].
    pub fn canonicalize(&self) -> Result<CompressedResourceOp, ResourceError> {
        match self {
            ResourceKey::Rep(rep) => Ok(rep.clone()),
            ResourceKey::Gate(kind) => bare_rep(*kind, kind.name()),
            ResourceKey::Name(name) => match parse_operator_name(name) {
                Some((kind, _)) => bare_rep(kind, &translate_op_alias(name)),
                None => Err(ResourceError::InvalidKey { key: name.clone() }),
            },
        }
    }
}

fn bare_rep(kind: GateKind, name: &str) -> Result<CompressedResourceOp, ResourceError> {
    if !kind.resource_keys().is_empty() {
        return Err(ResourceError::NonEmptyResourceKeys {
            name: SmolStr::new(name),
        });
    }
    Ok(CompressedResourceOp::new(name))
}

/// The gates needed by a decomposition, with their multiplicity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    gate_counts: BTreeMap<CompressedResourceOp, usize>,
}

impl Resources {
    /// Resources with the given counts. Zero counts are dropped and repeated
    /// entries are summed.
    pub fn new(counts: impl IntoIterator<Item = (CompressedResourceOp, usize)>) -> Self {
        let mut gate_counts = BTreeMap::new();
        for (rep, count) in counts.into_iter().filter(|(_, c)| *c > 0) {
            *gate_counts.entry(rep).or_insert(0) += count;
        }
        Self { gate_counts }
    }

    /// The resources of a raw estimate, canonicalizing every key.
    pub fn from_raw(
        raw: impl IntoIterator<Item = (ResourceKey, usize)>,
    ) -> Result<Self, ResourceError> {
        let counts = raw
            .into_iter()
            .filter(|(_, c)| *c > 0)
            .map(|(key, count)| Ok((key.canonicalize()?, count)))
            .collect::<Result<Vec<_>, ResourceError>>()?;
        Ok(Self::new(counts))
    }

    /// A single occurrence of one operator.
    pub fn single(rep: CompressedResourceOp) -> Self {
        Self::new([(rep, 1)])
    }

    /// The count of every operator.
    pub fn gate_counts(&self) -> &BTreeMap<CompressedResourceOp, usize> {
        &self.gate_counts
    }

    /// The total number of gates.
    pub fn num_gates(&self) -> usize {
        self.gate_counts.values().sum()
    }

    /// The count of a gate by name, summed over its resource parameters.
    pub fn count(&self, name: &str) -> usize {
        let name = translate_op_alias(name);
        self.gate_counts
            .iter()
            .filter(|(rep, _)| rep.name() == name)
            .map(|(_, c)| c)
            .sum()
    }

    /// The resources repeated `n` times.
    pub fn scale(&self, n: usize) -> Self {
        Self::new(self.gate_counts.iter().map(|(rep, c)| (rep.clone(), c * n)))
    }
}

impl Add for Resources {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        for (rep, count) in rhs.gate_counts {
            *self.gate_counts.entry(rep).or_insert(0) += count;
        }
        self
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self
            .gate_counts
            .iter()
            .map(|(rep, c)| format!("{rep}: {c}"))
            .join(", ");
        write!(f, "num_gates={}, gate_counts={{{counts}}}", self.num_gates())
    }
}

/// An error computing the resources of a decomposition rule.
#[derive(Display, Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum ResourceError {
    /// The rule has no resource estimate.
    #[display("No resource estimation found for this decomposition rule.")]
    MissingEstimate,
    /// A key of the estimate is not an operator.
    #[display("The keys of the resource estimate must be operators or representations constructed with resource_rep, found {key}.")]
    InvalidKey {
        /// The offending key.
        key: SmolStr,
    },
    /// A gate type whose resources depend on its parameters was used as a
    /// bare key.
    #[display("Operator {name} has non-empty resource_keys. A resource representation must be explicitly constructed using resource_rep.")]
    NonEmptyResourceKeys {
        /// The operator name.
        name: SmolStr,
    },
}
