//! Decomposition rules and the graph-based selection of rules.
//!
//! A [`DecompositionRule`] rewrites an operation into a sequence of other
//! operations, and declares the gates that sequence uses as a resource
//! estimate. Rules are collected per operator name in a
//! [`DecompositionRegistry`]. Given a target gate set, a
//! [`DecompositionGraph`] picks for every operator the rule that reaches the
//! target gates at the lowest total cost.
//!
//! # Example
//!
//! ```
//! use pennylane::decomposition::{register_resources, DecompositionRegistry};
//! use pennylane::ops::{GateKind, Operation};
//!
//! let registry = DecompositionRegistry::new();
//! let rule = register_resources([(GateKind::RX, 1)], |op: &Operation| {
//!     vec![Operation::new(GateKind::RX, op.wires().iter().copied())
//!         .with_param(std::f64::consts::PI)]
//! });
//! registry.add_decomps("X", [rule]).unwrap();
//!
//! assert!(registry.has_decomp("PauliX"));
//! ```

pub mod builtin;
pub mod cost;
pub mod graph;
pub mod registry;
pub mod resources;
pub mod rule;

use std::borrow::Cow;

use derive_more::{Display, Error, From};
use smol_str::SmolStr;

use crate::ops::GateKind;

pub use cost::DecompositionCost;
pub use graph::{DecompositionGraph, GateWeights};
pub use registry::{add_decomps, global_registry, has_decomp, list_decomps, DecompositionRegistry};
pub use resources::{resource_rep, CompressedResourceOp, ResourceError, ResourceKey, Resources};
pub use rule::{
    null_decomp, register_condition, register_resources, DecompositionRule, ResourceSpec,
    RuleBuilder,
};

/// Log target for decomposition events.
pub const LOG_TARGET: &str = "pennylane::decompose";

/// Short names accepted in place of the canonical operator names.
const OP_NAME_ALIASES: &[(&str, &str)] = &[
    ("I", "Identity"),
    ("H", "Hadamard"),
    ("X", "PauliX"),
    ("Y", "PauliY"),
    ("Z", "PauliZ"),
    ("CX", "CNOT"),
    ("SqrtX", "SX"),
    ("Phase", "PhaseShift"),
];

/// Translate an operator alias to its canonical name.
///
/// Aliases are resolved inside `Adjoint(..)` too, so `"Adjoint(X)"` becomes
/// `"Adjoint(PauliX)"`. Unknown names are returned unchanged.
pub fn translate_op_alias(name: &str) -> Cow<'_, str> {
    if let Some(&(_, canonical)) = OP_NAME_ALIASES.iter().find(|(alias, _)| *alias == name) {
        return Cow::Borrowed(canonical);
    }
    if let Some(inner) = name
        .strip_prefix("Adjoint(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let translated = translate_op_alias(inner);
        if translated != inner {
            return Cow::Owned(format!("Adjoint({translated})"));
        }
    }
    Cow::Borrowed(name)
}

/// Split an operator name into its gate kind and adjoint flag.
///
/// Aliases are accepted.
pub fn parse_operator_name(name: &str) -> Option<(GateKind, bool)> {
    let name = translate_op_alias(name);
    match name
        .strip_prefix("Adjoint(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => inner.parse().ok().map(|kind| (kind, true)),
        None => name.parse().ok().map(|kind| (kind, false)),
    }
}

/// An error while registering or selecting decomposition rules.
#[derive(Display, Debug, Clone, Error, PartialEq, From)]
#[non_exhaustive]
pub enum DecompositionError {
    /// The resources of a rule could not be computed.
    #[display("{_0}")]
    #[from]
    Resource(ResourceError),
    /// A rule without a resource estimate was added to a registry.
    #[display("A decomposition rule must be a rewrite with a resource estimate registered using register_resources. Rule {rule} has none.")]
    MissingResources {
        /// The name of the rule.
        rule: SmolStr,
    },
    /// Fixed or alternative rules were given without the graph system.
    #[display("The options fixed_decomps and alt_decomps are only available with the graph-based decomposition system.")]
    RulesWithoutGraph,
    /// A gate set and a stopping condition were given without the graph
    /// system.
    #[display("Specifying both gate_set and stopping_condition is only supported with the graph-based decomposition system.")]
    StoppingConditionWithoutGraph,
    /// A weighted gate set was given without the graph system.
    #[display("Specifying the gate_set with operator weights is only supported with the graph-based decomposition system.")]
    WeightsWithoutGraph,
    /// A gate set weight is negative.
    #[display("Negative gate weights provided to gate_set are not supported.")]
    NegativeWeight,
    /// A predicate gate set was given with the graph system.
    #[display(
        "Specifying gate_set as a function is not supported with the graph-based decomposition system enabled."
    )]
    PredicateWithGraph,
    /// The graph found no way to reach the gate set from an operator.
    #[display("No decomposition of {name} into the target gate set was found.")]
    Unsolved {
        /// The operator name.
        name: SmolStr,
    },
    /// The decomposition recursed too deeply.
    #[display("Reached recursion limit trying to decompose operations. Operator decomposition may have entered an infinite loop. Setting max_expansion will terminate the decomposition at a fixed recursion depth.")]
    RecursionLimit,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("CX", "CNOT")]
    #[case("H", "Hadamard")]
    #[case("RX", "RX")]
    #[case("Adjoint(X)", "Adjoint(PauliX)")]
    #[case("Adjoint(S)", "Adjoint(S)")]
    #[case("NotAGate", "NotAGate")]
    fn aliases(#[case] alias: &str, #[case] canonical: &str) {
        assert_eq!(translate_op_alias(alias), canonical);
    }

    #[test]
    fn operator_names() {
        assert_eq!(parse_operator_name("CX"), Some((GateKind::CNOT, false)));
        assert_eq!(parse_operator_name("Adjoint(T)"), Some((GateKind::T, true)));
        assert_eq!(parse_operator_name("Adjoint(Z)"), Some((GateKind::PauliZ, true)));
        assert_eq!(parse_operator_name("Adjoint(Foo)"), None);
        assert_eq!(GateKind::from_name("Y"), Some(GateKind::PauliY));
    }
}
