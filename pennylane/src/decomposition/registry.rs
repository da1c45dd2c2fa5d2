//! Collections of decomposition rules, keyed by operator name.

use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use lazy_static::lazy_static;
use smol_str::SmolStr;

use super::rule::DecompositionRule;
use super::{builtin, translate_op_alias, DecompositionError};

/// Decomposition rules per operator name, in registration order.
///
/// Rules are only ever appended. A registry can be shared between threads,
/// but registration is expected to come from a single writer.
#[derive(Debug, Default)]
pub struct DecompositionRegistry {
    rules: RwLock<IndexMap<SmolStr, Vec<DecompositionRule>>>,
}

impl DecompositionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in rules of every gate.
    pub fn with_builtin_rules() -> Self {
        let registry = Self::new();
        builtin::register_builtin_rules(&registry);
        registry
    }

    /// Append rules for an operator. Aliases are accepted, e.g. `"CX"`.
    ///
    /// Fails without registering anything if some rule has no resource
    /// estimate.
    pub fn add_decomps(
        &self,
        op_name: &str,
        rules: impl IntoIterator<Item = DecompositionRule>,
    ) -> Result<(), DecompositionError> {
        let rules: Vec<_> = rules.into_iter().collect();
        if let Some(rule) = rules.iter().find(|r| !r.has_resources()) {
            return Err(DecompositionError::MissingResources {
                rule: SmolStr::new(rule.name()),
            });
        }
        self.insert(op_name, rules);
        Ok(())
    }

    pub(super) fn insert(&self, op_name: &str, rules: impl IntoIterator<Item = DecompositionRule>) {
        let mut map = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(SmolStr::new(translate_op_alias(op_name)))
            .or_default()
            .extend(rules);
    }

    /// The rules registered for an operator.
    pub fn list_decomps(&self, op_name: &str) -> Vec<DecompositionRule> {
        let map = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&*translate_op_alias(op_name))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any rule is registered for an operator.
    pub fn has_decomp(&self, op_name: &str) -> bool {
        let map = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&*translate_op_alias(op_name))
            .is_some_and(|rules| !rules.is_empty())
    }

    /// The names of the operators with registered rules.
    pub fn operators(&self) -> Vec<SmolStr> {
        let map = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        map.keys().cloned().collect()
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: DecompositionRegistry = DecompositionRegistry::with_builtin_rules();
}

/// The process-wide registry, holding the built-in rules and every rule added
/// with [`add_decomps`].
pub fn global_registry() -> &'static DecompositionRegistry {
    &GLOBAL_REGISTRY
}

/// Append rules for an operator to the process-wide registry.
pub fn add_decomps(
    op_name: &str,
    rules: impl IntoIterator<Item = DecompositionRule>,
) -> Result<(), DecompositionError> {
    global_registry().add_decomps(op_name, rules)
}

/// The rules of an operator in the process-wide registry.
pub fn list_decomps(op_name: &str) -> Vec<DecompositionRule> {
    global_registry().list_decomps(op_name)
}

/// Whether the process-wide registry has rules for an operator.
pub fn has_decomp(op_name: &str) -> bool {
    global_registry().has_decomp(op_name)
}
