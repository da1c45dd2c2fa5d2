//! Rewrite the operations of a circuit into a target gate set.
//!
//! Operations outside the gate set are replaced by their decompositions,
//! recursively, until every operation is accepted. Two systems pick the
//! decompositions:
//!
//! - the legacy system uses the fixed [`Operation::decomposition`] of every
//!   operator. Operators without a decomposition are kept, with a warning.
//! - the graph system builds a [`DecompositionGraph`] from the registered
//!   rules and uses the cheapest rule of every operator. Operators that
//!   cannot reach the gate set are an error.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use fxhash::FxHashSet;
use indexmap::IndexMap;
use smol_str::SmolStr;
use strum::IntoEnumIterator;

use super::{TransformError, TransformOutput};
use crate::circuit::Circuit;
use crate::decomposition::{
    global_registry, translate_op_alias, DecompositionError, DecompositionGraph,
    DecompositionRegistry, DecompositionRule, GateWeights, LOG_TARGET,
};
use crate::ops::{Conditional, GateKind, Operation, Operator};

/// Recursion depth at which a decomposition is assumed to loop forever.
const MAX_DECOMPOSITION_DEPTH: usize = 1000;

/// A predicate on operations.
pub type OpPredicate = Arc<dyn Fn(&Operation) -> bool + Send + Sync>;

/// The operations accepted by [`decompose`].
#[derive(Clone)]
pub enum GateSet {
    /// Operator names, e.g. `"Adjoint(S)"`.
    Names(BTreeSet<SmolStr>),
    /// Operator names with a weight for the graph solver.
    Weighted(GateWeights),
    /// An arbitrary predicate. Not supported by the graph system.
    Predicate(OpPredicate),
}

impl GateSet {
    /// A gate set of operator names. Aliases are accepted.
    pub fn names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::Names(
            names
                .into_iter()
                .map(|n| SmolStr::new(translate_op_alias(n.as_ref())))
                .collect(),
        )
    }

    /// A gate set of weighted operator names. Aliases are accepted.
    pub fn weighted<S: AsRef<str>>(weights: impl IntoIterator<Item = (S, f64)>) -> Self {
        Self::Weighted(
            weights
                .into_iter()
                .map(|(n, w)| (SmolStr::new(translate_op_alias(n.as_ref())), w))
                .collect(),
        )
    }

    /// A gate set given by a predicate.
    pub fn predicate(f: impl Fn(&Operation) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Every named gate and its adjoint.
    pub fn all() -> Self {
        Self::Names(
            GateKind::iter()
                .flat_map(|kind| {
                    [
                        SmolStr::new_static(kind.name()),
                        SmolStr::from(format!("Adjoint({})", kind.name())),
                    ]
                })
                .collect(),
        )
    }

    /// Whether the operation is in the gate set.
    pub fn contains(&self, op: &Operation) -> bool {
        match self {
            GateSet::Names(names) => names.contains(&op.name()),
            GateSet::Weighted(weights) => weights.contains_key(&op.name()),
            GateSet::Predicate(f) => f(op),
        }
    }

    /// The weight of every gate, or `None` for predicates.
    pub fn weights(&self) -> Option<GateWeights> {
        match self {
            GateSet::Names(names) => Some(names.iter().map(|n| (n.clone(), 1.0)).collect()),
            GateSet::Weighted(weights) => Some(weights.clone()),
            GateSet::Predicate(_) => None,
        }
    }
}

impl fmt::Debug for GateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateSet::Names(names) => f.debug_tuple("Names").field(names).finish(),
            GateSet::Weighted(weights) => f.debug_tuple("Weighted").field(weights).finish(),
            GateSet::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl<S: AsRef<str>, const N: usize> From<[S; N]> for GateSet {
    fn from(names: [S; N]) -> Self {
        Self::names(names)
    }
}

/// Configuration options for [`decompose`].
#[derive(Clone, Default)]
pub struct DecomposeOptions {
    /// The target gate set. Defaults to every named gate.
    pub gate_set: Option<GateSet>,
    /// Additional operations to accept. Combining it with a gate set needs
    /// the graph system.
    pub stopping_condition: Option<OpPredicate>,
    /// Maximum number of nested decompositions applied to an operation.
    pub max_expansion: Option<usize>,
    /// A single rule to use for an operator. Graph system only.
    pub fixed_decomps: IndexMap<SmolStr, DecompositionRule>,
    /// Rules considered on top of the registered ones. Graph system only.
    pub alt_decomps: IndexMap<SmolStr, Vec<DecompositionRule>>,
    /// Use the graph-based decomposition system.
    pub graph: bool,
    /// The registry of the graph system. Defaults to the
    /// [`global_registry`].
    pub registry: Option<Arc<DecompositionRegistry>>,
}

impl fmt::Debug for DecomposeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecomposeOptions")
            .field("gate_set", &self.gate_set)
            .field("stopping_condition", &self.stopping_condition.is_some())
            .field("max_expansion", &self.max_expansion)
            .field("fixed_decomps", &self.fixed_decomps)
            .field("alt_decomps", &self.alt_decomps)
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl DecomposeOptions {
    /// Options targeting a gate set.
    pub fn with_gate_set(gate_set: impl Into<GateSet>) -> Self {
        Self {
            gate_set: Some(gate_set.into()),
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<(), DecompositionError> {
        if !self.graph && !(self.fixed_decomps.is_empty() && self.alt_decomps.is_empty()) {
            return Err(DecompositionError::RulesWithoutGraph);
        }
        if !self.graph && self.gate_set.is_some() && self.stopping_condition.is_some() {
            return Err(DecompositionError::StoppingConditionWithoutGraph);
        }
        match &self.gate_set {
            Some(GateSet::Weighted(weights)) => {
                if weights.values().any(|&w| w < 0.0) {
                    return Err(DecompositionError::NegativeWeight);
                }
                if !self.graph {
                    return Err(DecompositionError::WeightsWithoutGraph);
                }
            }
            Some(GateSet::Predicate(_)) if self.graph => {
                return Err(DecompositionError::PredicateWithGraph)
            }
            _ => {}
        }
        Ok(())
    }
}

/// Decompose the operations of a circuit into a gate set.
///
/// Mid-circuit measurements and state preparations are kept. Conditional
/// operations are decomposed and every resulting operation keeps the
/// condition.
#[tracing::instrument(skip_all, fields(operations = circuit.operations().len(), graph = options.graph))]
pub fn decompose(
    circuit: &Circuit,
    options: &DecomposeOptions,
) -> Result<TransformOutput, TransformError> {
    options.validate()?;
    let mut decomposer = Decomposer {
        gate_set: options.gate_set.clone().unwrap_or_else(GateSet::all),
        stopping_condition: options.stopping_condition.clone(),
        max_expansion: options.max_expansion,
        graph_enabled: options.graph,
        graph: None,
        warned: FxHashSet::default(),
    };

    let gates: Vec<&Operation> = circuit
        .operations()
        .iter()
        .filter_map(|op| match op {
            Operator::Gate(g) => Some(g),
            Operator::Conditional(c) => Some(c.op()),
            _ => None,
        })
        .collect();
    if gates.iter().all(|op| decomposer.stopping_condition(op)) {
        return Ok(TransformOutput::identity(circuit.clone()));
    }

    if options.graph {
        let registry = options
            .registry
            .as_deref()
            .unwrap_or_else(|| global_registry());
        let weights = decomposer.gate_set.weights().unwrap_or_default();
        let mut graph = DecompositionGraph::new(
            gates.iter().copied(),
            weights,
            &options.fixed_decomps,
            &options.alt_decomps,
            registry,
        )?;
        graph.solve();
        decomposer.graph = Some(graph);
    }

    let mut ops = Vec::with_capacity(circuit.operations().len());
    for op in circuit.operations() {
        match op {
            Operator::Gate(gate) => {
                let mut out = Vec::new();
                decomposer.expand(gate, 0, &mut out)?;
                ops.extend(out.into_iter().map(Operator::Gate));
            }
            Operator::Conditional(c) => {
                let mut out = Vec::new();
                decomposer.expand(c.op(), 0, &mut out)?;
                ops.extend(out.into_iter().map(|o| {
                    Operator::Conditional(Conditional::new(c.condition().clone(), o))
                }));
            }
            other => ops.push(other.clone()),
        }
    }
    tracing::debug!(
        target: LOG_TARGET,
        before = circuit.operations().len(),
        after = ops.len(),
        "decomposed circuit"
    );
    Ok(TransformOutput::identity(circuit.with_operations(ops)))
}

struct Decomposer {
    gate_set: GateSet,
    stopping_condition: Option<OpPredicate>,
    max_expansion: Option<usize>,
    graph_enabled: bool,
    graph: Option<DecompositionGraph>,
    /// Operators already warned about.
    warned: FxHashSet<SmolStr>,
}

impl Decomposer {
    fn accepts(&self, op: &Operation) -> bool {
        self.gate_set.contains(op) || self.stopping_condition.as_ref().is_some_and(|f| f(op))
    }

    /// Whether the operation is kept as is.
    ///
    /// Without the graph system, operations that cannot be decomposed are
    /// kept too.
    fn stopping_condition(&mut self, op: &Operation) -> bool {
        if self.graph_enabled || op.has_decomposition() {
            return self.accepts(op);
        }
        if !self.accepts(op) && self.warned.insert(op.name()) {
            tracing::warn!(
                target: LOG_TARGET,
                "Operator {name} does not define a decomposition and was not found in the target gate set. To remove this warning, add the operator name ({name}) to the gate set.",
                name = op.name()
            );
        }
        true
    }

    fn expand(
        &mut self,
        op: &Operation,
        depth: usize,
        out: &mut Vec<Operation>,
    ) -> Result<(), DecompositionError> {
        if depth > MAX_DECOMPOSITION_DEPTH {
            return Err(DecompositionError::RecursionLimit);
        }
        let max_depth_reached = self.max_expansion.is_some_and(|max| max <= depth);
        if max_depth_reached || self.stopping_condition(op) {
            out.push(op.clone());
            return Ok(());
        }
        let decomposition = match &self.graph {
            Some(graph) => graph
                .decomposition(op)
                .ok_or_else(|| DecompositionError::Unsolved { name: op.name() })?
                .apply(op),
            None => op.decomposition().unwrap_or_default(),
        };
        for sub_op in &decomposition {
            self.expand(sub_op, depth + 1, out)?;
        }
        Ok(())
    }
}
