//! Selection of decomposition rules by a shortest-path search.
//!
//! The graph has a node for every operator representation reachable from
//! the decomposed operations, and a node for every applicable rule of those
//! operators. A rule node has an edge from each operator it produces,
//! weighted by its multiplicity, and an edge to the operator it decomposes.
//!
//! Operators in the target gate set are reached at the cost of their weight.
//! A rule is reached once all the operators it produces have been reached,
//! at the sum of their costs. This is a Dijkstra search where rule nodes
//! wait for all their predecessors.

use std::collections::{BTreeMap, VecDeque};

use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use priority_queue::DoublePriorityQueue;
use smol_str::SmolStr;

use super::cost::DecompositionCost;
use super::registry::DecompositionRegistry;
use super::resources::{CompressedResourceOp, Resources};
use super::rule::DecompositionRule;
use super::{translate_op_alias, DecompositionError, LOG_TARGET};
use crate::ops::Operation;

/// The target gate set, with the weight of every gate.
pub type GateWeights = BTreeMap<SmolStr, f64>;

#[derive(Debug, Clone)]
enum GraphNode {
    Op(CompressedResourceOp),
    Rule(DecompositionRule),
}

/// The cheapest way found to reach the target gate set from an operator.
#[derive(Debug, Clone)]
struct Solution {
    cost: DecompositionCost,
    /// `None` for operators in the target gate set.
    rule: Option<DecompositionRule>,
    /// The target gates used.
    resources: Resources,
}

/// A graph of operators and the rules that decompose them.
///
/// Build it with [`DecompositionGraph::new`], then call
/// [`DecompositionGraph::solve`] before querying decompositions.
#[derive(Debug, Clone)]
pub struct DecompositionGraph {
    graph: DiGraph<GraphNode, usize>,
    op_nodes: FxHashMap<CompressedResourceOp, NodeIndex>,
    gate_set: GateWeights,
    solutions: FxHashMap<NodeIndex, Solution>,
}

impl DecompositionGraph {
    /// Build the graph of the rules reachable from `operations`.
    ///
    /// Rules of an operator are taken from `fixed_decomps` if it has an
    /// entry there, otherwise from `alt_decomps` followed by the registry.
    /// Operators in the gate set are not decomposed further.
    pub fn new<'a>(
        operations: impl IntoIterator<Item = &'a Operation>,
        gate_set: GateWeights,
        fixed_decomps: &IndexMap<SmolStr, DecompositionRule>,
        alt_decomps: &IndexMap<SmolStr, Vec<DecompositionRule>>,
        registry: &DecompositionRegistry,
    ) -> Result<Self, DecompositionError> {
        let gate_set: GateWeights = gate_set
            .into_iter()
            .map(|(name, w)| (SmolStr::new(translate_op_alias(&name)), w))
            .collect();
        let fixed: FxHashMap<SmolStr, &DecompositionRule> = fixed_decomps
            .iter()
            .map(|(name, rule)| (SmolStr::new(translate_op_alias(name)), rule))
            .collect();
        let mut alt: FxHashMap<SmolStr, Vec<DecompositionRule>> = FxHashMap::default();
        for (name, rules) in alt_decomps {
            alt.entry(SmolStr::new(translate_op_alias(name)))
                .or_default()
                .extend(rules.iter().cloned());
        }

        let mut this = Self {
            graph: DiGraph::new(),
            op_nodes: FxHashMap::default(),
            gate_set,
            solutions: FxHashMap::default(),
        };
        let mut pending = VecDeque::new();
        for op in operations {
            this.op_node(CompressedResourceOp::of(op), &mut pending);
        }
        while let Some(op_idx) = pending.pop_front() {
            let GraphNode::Op(rep) = &this.graph[op_idx] else {
                continue;
            };
            let rep = rep.clone();
            if this.gate_set.contains_key(rep.name()) {
                continue;
            }
            let candidates = match fixed.get(rep.name()) {
                Some(rule) => vec![(*rule).clone()],
                None => alt
                    .get(rep.name())
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .chain(registry.list_decomps(rep.name()))
                    .collect(),
            };
            for rule in candidates {
                if !rule.is_applicable(rep.params()) {
                    continue;
                }
                let resources = rule.compute_resources(rep.params())?;
                let rule_idx = this.graph.add_node(GraphNode::Rule(rule));
                this.graph.add_edge(rule_idx, op_idx, 1);
                for (child, &count) in resources.gate_counts() {
                    let child_idx = this.op_node(child.clone(), &mut pending);
                    this.graph.add_edge(child_idx, rule_idx, count);
                }
            }
        }
        Ok(this)
    }

    /// The node of an operator, adding it to the graph and to `pending` if it
    /// is new.
    fn op_node(
        &mut self,
        rep: CompressedResourceOp,
        pending: &mut VecDeque<NodeIndex>,
    ) -> NodeIndex {
        if let Some(&idx) = self.op_nodes.get(&rep) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::Op(rep.clone()));
        self.op_nodes.insert(rep, idx);
        pending.push_back(idx);
        idx
    }

    /// Find the cheapest decomposition of every operator in the graph.
    #[tracing::instrument(skip_all, fields(nodes = self.graph.node_count()))]
    pub fn solve(&mut self) {
        self.solutions.clear();
        let mut queue: DoublePriorityQueue<NodeIndex, DecompositionCost> =
            DoublePriorityQueue::new();
        let mut settled: FxHashSet<NodeIndex> = FxHashSet::default();
        let mut waiting: FxHashMap<NodeIndex, usize> = FxHashMap::default();

        for idx in self.graph.node_indices() {
            match &self.graph[idx] {
                GraphNode::Op(rep) => {
                    if let Some(&weight) = self.gate_set.get(rep.name()) {
                        let cost = DecompositionCost::gate(weight);
                        self.solutions.insert(
                            idx,
                            Solution {
                                cost,
                                rule: None,
                                resources: Resources::single(rep.clone()),
                            },
                        );
                        queue.push(idx, cost);
                    }
                }
                GraphNode::Rule(_) => {
                    let inputs = self.graph.edges_directed(idx, Direction::Incoming).count();
                    waiting.insert(idx, inputs);
                }
            }
        }
        // Rules producing nothing are reached immediately.
        let mut empty_rules: Vec<_> = waiting
            .iter()
            .filter(|(_, &n)| n == 0)
            .map(|(&idx, _)| idx)
            .collect();
        empty_rules.sort();
        for rule_idx in empty_rules {
            self.relax(rule_idx, &settled, &mut queue);
        }

        while let Some((idx, _)) = queue.pop_min() {
            settled.insert(idx);
            let rules: Vec<NodeIndex> = self
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .map(|e| e.target())
                .collect();
            for rule_idx in rules {
                let Some(n) = waiting.get_mut(&rule_idx) else {
                    continue;
                };
                *n -= 1;
                if *n == 0 {
                    self.relax(rule_idx, &settled, &mut queue);
                }
            }
        }
        tracing::debug!(
            target: LOG_TARGET,
            ops = self.op_nodes.len(),
            solved = self.solutions.len(),
            "solved decomposition graph"
        );
    }

    /// Offer the decomposition through a fully reached rule to its operator.
    fn relax(
        &mut self,
        rule_idx: NodeIndex,
        settled: &FxHashSet<NodeIndex>,
        queue: &mut DoublePriorityQueue<NodeIndex, DecompositionCost>,
    ) {
        let GraphNode::Rule(rule) = &self.graph[rule_idx] else {
            return;
        };
        let Some(op_idx) = self
            .graph
            .neighbors_directed(rule_idx, Direction::Outgoing)
            .next()
        else {
            return;
        };
        if settled.contains(&op_idx) {
            return;
        }
        let mut cost = DecompositionCost::default();
        let mut resources = Resources::default();
        for edge in self.graph.edges_directed(rule_idx, Direction::Incoming) {
            let Some(child) = self.solutions.get(&edge.source()) else {
                return;
            };
            cost += child.cost.times(*edge.weight());
            resources = resources + child.resources.scale(*edge.weight());
        }
        if self
            .solutions
            .get(&op_idx)
            .is_some_and(|current| current.cost <= cost)
        {
            return;
        }
        let rule = rule.clone();
        self.solutions.insert(
            op_idx,
            Solution {
                cost,
                rule: Some(rule),
                resources,
            },
        );
        queue.push(op_idx, cost);
    }

    fn solution(&self, op: &Operation) -> Option<&Solution> {
        let idx = self.op_nodes.get(&CompressedResourceOp::of(op))?;
        self.solutions.get(idx)
    }

    /// Whether the target gate set can be reached from the operation.
    pub fn is_solved_for(&self, op: &Operation) -> bool {
        self.solution(op).is_some()
    }

    /// The rule chosen for the operation.
    ///
    /// Returns `None` for unsolved operations and for operations in the
    /// target gate set.
    pub fn decomposition(&self, op: &Operation) -> Option<&DecompositionRule> {
        self.solution(op)?.rule.as_ref()
    }

    /// The target gates the operation decomposes into.
    pub fn resource_estimate(&self, op: &Operation) -> Option<&Resources> {
        Some(&self.solution(op)?.resources)
    }

    /// The cost of decomposing the operation.
    pub fn cost(&self, op: &Operation) -> Option<DecompositionCost> {
        Some(self.solution(op)?.cost)
    }
}
