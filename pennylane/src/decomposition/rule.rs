//! Decomposition rules.

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use super::resources::{ResourceError, ResourceKey, Resources};
use crate::ops::{Operation, ResourceParams};

type RewriteFn = Arc<dyn Fn(&Operation) -> Vec<Operation> + Send + Sync>;
type ResourceFn = Arc<dyn Fn(&ResourceParams) -> Vec<(ResourceKey, usize)> + Send + Sync>;
type ConditionFn = Arc<dyn Fn(&ResourceParams) -> bool + Send + Sync>;

/// The resource estimate of a rule, fixed or computed from the resource
/// parameters of the decomposed operator.
#[derive(Clone)]
pub enum ResourceSpec {
    /// The same gates for every operator instance.
    Static(Vec<(ResourceKey, usize)>),
    /// Gates depending on the resource parameters.
    Dynamic(ResourceFn),
}

impl ResourceSpec {
    /// A resource estimate computed from the resource parameters.
    pub fn dynamic(
        f: impl Fn(&ResourceParams) -> Vec<(ResourceKey, usize)> + Send + Sync + 'static,
    ) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    fn into_fn(self) -> ResourceFn {
        match self {
            ResourceSpec::Static(counts) => Arc::new(move |_: &ResourceParams| counts.clone()),
            ResourceSpec::Dynamic(f) => f,
        }
    }
}

impl<K: Into<ResourceKey>, const N: usize> From<[(K, usize); N]> for ResourceSpec {
    fn from(counts: [(K, usize); N]) -> Self {
        Self::Static(counts.into_iter().map(|(k, c)| (k.into(), c)).collect())
    }
}

impl From<Vec<(ResourceKey, usize)>> for ResourceSpec {
    fn from(counts: Vec<(ResourceKey, usize)>) -> Self {
        Self::Static(counts)
    }
}

/// A rewrite of an operator into other operators, with the resources it
/// uses and the operator instances it applies to.
///
/// Cloning a rule is cheap; the rewrite and estimate functions are shared.
#[derive(Clone)]
pub struct DecompositionRule {
    name: SmolStr,
    rewrite: RewriteFn,
    resources: Option<ResourceFn>,
    condition: Option<ConditionFn>,
}

impl DecompositionRule {
    /// Start building a rule around a rewrite function.
    ///
    /// The rule is named after the function.
    pub fn builder<F>(rewrite: F) -> RuleBuilder
    where
        F: Fn(&Operation) -> Vec<Operation> + Send + Sync + 'static,
    {
        RuleBuilder {
            rule: DecompositionRule {
                name: function_name::<F>(),
                rewrite: Arc::new(rewrite),
                resources: None,
                condition: None,
            },
        }
    }

    /// The name of the rule.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rewrite an operation.
    pub fn apply(&self, op: &Operation) -> Vec<Operation> {
        (self.rewrite)(op)
    }

    /// Whether the rule carries a resource estimate.
    pub fn has_resources(&self) -> bool {
        self.resources.is_some()
    }

    /// The resources of the rule for an operator with the given resource
    /// parameters.
    pub fn compute_resources(&self, params: &ResourceParams) -> Result<Resources, ResourceError> {
        let f = self
            .resources
            .as_ref()
            .ok_or(ResourceError::MissingEstimate)?;
        Resources::from_raw(f(params))
    }

    /// Whether the rule applies to an operator with the given resource
    /// parameters. Rules without a condition always apply.
    pub fn is_applicable(&self, params: &ResourceParams) -> bool {
        self.condition.as_ref().is_none_or(|c| c(params))
    }

    /// Replace the applicability condition.
    pub fn set_condition(
        &mut self,
        condition: impl Fn(&ResourceParams) -> bool + Send + Sync + 'static,
    ) {
        self.condition = Some(Arc::new(condition));
    }

    /// Replace the resource estimate.
    pub fn set_resources(&mut self, resources: impl Into<ResourceSpec>) {
        self.resources = Some(resources.into().into_fn());
    }
}

impl fmt::Debug for DecompositionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecompositionRule")
            .field("name", &self.name)
            .field("has_resources", &self.resources.is_some())
            .field("has_condition", &self.condition.is_some())
            .finish()
    }
}

impl PartialEq for DecompositionRule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.rewrite, &other.rewrite)
    }
}

/// Builder for [`DecompositionRule`].
#[derive(Clone, Debug)]
#[must_use]
pub struct RuleBuilder {
    rule: DecompositionRule,
}

impl RuleBuilder {
    /// Set the resource estimate.
    pub fn with_resources(mut self, resources: impl Into<ResourceSpec>) -> Self {
        self.rule.set_resources(resources);
        self
    }

    /// Restrict the operator instances the rule applies to.
    pub fn with_condition(
        mut self,
        condition: impl Fn(&ResourceParams) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.rule.set_condition(condition);
        self
    }

    /// Override the name of the rule.
    pub fn with_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.rule.name = name.into();
        self
    }

    /// Finish the rule.
    pub fn build(self) -> DecompositionRule {
        self.rule
    }
}

/// Bind a rewrite function to its resource estimate.
pub fn register_resources<F>(resources: impl Into<ResourceSpec>, rewrite: F) -> DecompositionRule
where
    F: Fn(&Operation) -> Vec<Operation> + Send + Sync + 'static,
{
    DecompositionRule::builder(rewrite)
        .with_resources(resources)
        .build()
}

/// Bind a rewrite function to an applicability condition.
///
/// The rule still needs a resource estimate, set with
/// [`DecompositionRule::set_resources`], before it can be added to a
/// registry.
pub fn register_condition<F, C>(condition: C, rewrite: F) -> DecompositionRule
where
    F: Fn(&Operation) -> Vec<Operation> + Send + Sync + 'static,
    C: Fn(&ResourceParams) -> bool + Send + Sync + 'static,
{
    DecompositionRule::builder(rewrite)
        .with_condition(condition)
        .build()
}

/// A rule that removes the operator.
pub fn null_decomp() -> DecompositionRule {
    DecompositionRule::builder(|_: &Operation| Vec::new())
        .with_resources(ResourceSpec::Static(Vec::new()))
        .with_name("null_decomp")
        .build()
}

/// The last path segment of a function's type name.
fn function_name<F>() -> SmolStr {
    let full = std::any::type_name::<F>();
    let name = full
        .split("::")
        .filter(|seg| !seg.starts_with('{'))
        .last()
        .unwrap_or(full);
    SmolStr::new(name)
}

#[cfg(test)]
mod tests {
    use cool_asserts::assert_matches;

    use super::*;
    use crate::decomposition::resource_rep;
    use crate::ops::decompositions::{cnot_to_cz, multirz_single_wire, multirz_to_cnot};
    use crate::ops::GateKind;

    fn params(num_wires: usize) -> ResourceParams {
        [(SmolStr::new("num_wires"), num_wires)].into_iter().collect()
    }

    #[test]
    fn static_resources_ignore_params() {
        let rule = register_resources([(GateKind::Hadamard, 2), (GateKind::CZ, 1)], cnot_to_cz);
        assert_eq!(rule.name(), "cnot_to_cz");
        let a = rule.compute_resources(&ResourceParams::new()).unwrap();
        let b = rule.compute_resources(&params(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.count("Hadamard"), 2);
        assert_eq!(a.count("CZ"), 1);
    }

    #[test]
    fn dynamic_resources() {
        let rule = register_resources(
            ResourceSpec::dynamic(|p| {
                let n = p.get("num_wires").copied().unwrap_or(1);
                vec![
                    (ResourceKey::from(GateKind::CNOT), 2 * (n - 1)),
                    (ResourceKey::from(GateKind::RZ), 1),
                ]
            }),
            multirz_to_cnot,
        );
        let res = rule.compute_resources(&params(3)).unwrap();
        assert_eq!(res.count("CNOT"), 4);
        assert_eq!(res.num_gates(), 5);
        let res = rule.compute_resources(&params(1)).unwrap();
        assert_eq!(res.num_gates(), 1);
    }

    #[test]
    fn conditions() {
        let mut rule = register_condition(
            |p: &ResourceParams| p.get("num_wires") == Some(&1),
            multirz_single_wire,
        );
        assert!(rule.is_applicable(&params(1)));
        assert!(!rule.is_applicable(&params(2)));
        assert_matches!(
            rule.compute_resources(&params(1)),
            Err(ResourceError::MissingEstimate)
        );
        rule.set_resources([(GateKind::RZ, 1)]);
        assert!(rule.has_resources());
        assert_eq!(rule.compute_resources(&params(1)).unwrap().num_gates(), 1);
    }

    #[test]
    fn invalid_keys_fail_on_compute() {
        let rule = register_resources([(GateKind::MultiRZ, 1)], multirz_single_wire);
        assert_matches!(
            rule.compute_resources(&params(1)),
            Err(ResourceError::NonEmptyResourceKeys { .. })
        );
        let rule = register_resources(
            [(ResourceKey::from(resource_rep("MultiRZ", [("num_wires", 1)])), 1)],
            multirz_single_wire,
        );
        assert!(rule.compute_resources(&params(1)).is_ok());
    }

    #[test]
    fn null_rule() {
        let rule = null_decomp();
        let op = Operation::new(GateKind::Identity, [0]);
        assert!(rule.apply(&op).is_empty());
        assert_eq!(
            rule.compute_resources(&ResourceParams::new()),
            Ok(Resources::default())
        );
    }
}
