//! The decomposition rules every registry created with
//! [`DecompositionRegistry::with_builtin_rules`] starts with.
//!
//! The first rule of every gate is the one used by
//! [`Operation::decomposition`]; later ones are alternatives for the graph
//! solver.

use smol_str::SmolStr;

use super::registry::DecompositionRegistry;
use super::resources::{resource_rep, ResourceKey};
use super::rule::{null_decomp, DecompositionRule, ResourceSpec};
use crate::ops::decompositions::*;
use crate::ops::{GateKind, Operation, ResourceParams};

fn num_wires(params: &ResourceParams) -> usize {
    params.get("num_wires").copied().unwrap_or(1)
}

fn rule<F>(resources: impl Into<ResourceSpec>, rewrite: F) -> DecompositionRule
where
    F: Fn(&Operation) -> Vec<Operation> + Send + Sync + 'static,
{
    DecompositionRule::builder(rewrite)
        .with_resources(resources)
        .build()
}

fn adjoint_gate(op: &Operation) -> Vec<Operation> {
    adjoint_decomposition(op).unwrap_or_default()
}

/// A rule for `Adjoint(kind)`.
fn adjoint_rule(kind: GateKind, resources: impl Into<ResourceSpec>) -> DecompositionRule {
    DecompositionRule::builder(adjoint_gate)
        .with_resources(resources)
        .with_name(format!("adjoint_{}", kind.name().to_lowercase()))
        .build()
}

/// Register the built-in rules.
pub(super) fn register_builtin_rules(registry: &DecompositionRegistry) {
    use GateKind::*;

    registry.insert("Identity", [null_decomp()]);
    registry.insert("GlobalPhase", [null_decomp()]);
    registry.insert(
        "Hadamard",
        [
            rule([(PhaseShift, 2), (RX, 1)], hadamard_to_phase_rx),
            rule([(RZ, 2), (RX, 1), (GlobalPhase, 1)], hadamard_to_rz_rx),
        ],
    );
    registry.insert(
        "PauliX",
        [
            rule([(PhaseShift, 2), (RX, 1)], paulix_to_phase_rx),
            rule([(RX, 1), (GlobalPhase, 1)], paulix_to_rx),
        ],
    );
    registry.insert(
        "PauliY",
        [
            rule([(PhaseShift, 2), (RY, 1)], pauliy_to_phase_ry),
            rule([(RY, 1), (GlobalPhase, 1)], pauliy_to_ry),
        ],
    );
    registry.insert(
        "PauliZ",
        [
            rule([(PhaseShift, 1)], pauliz_to_phase),
            rule([(RZ, 1), (GlobalPhase, 1)], pauliz_to_rz),
        ],
    );
    registry.insert("S", [rule([(PhaseShift, 1)], s_to_phase)]);
    registry.insert("T", [rule([(PhaseShift, 1)], t_to_phase)]);
    registry.insert("SX", [rule([(RX, 1), (GlobalPhase, 1)], sx_to_rx)]);
    registry.insert("RX", [rule([(RZ, 2), (RY, 1)], rx_to_rz_ry)]);
    registry.insert("RY", [rule([(RZ, 2), (RX, 1)], ry_to_rz_rx)]);
    registry.insert(
        "PhaseShift",
        [rule([(RZ, 1), (GlobalPhase, 1)], phaseshift_to_rz)],
    );
    registry.insert("Rot", [rule([(RZ, 2), (RY, 1)], rot_to_rz_ry)]);
    registry.insert("CNOT", [rule([(Hadamard, 2), (CZ, 1)], cnot_to_cz)]);
    registry.insert("CZ", [rule([(Hadamard, 2), (CNOT, 1)], cz_to_cnot)]);
    registry.insert(
        "CY",
        [rule(
            [
                (ResourceKey::from("Adjoint(S)"), 1),
                (ResourceKey::from(CNOT), 1),
                (ResourceKey::from(S), 1),
            ],
            cy_to_cnot,
        )],
    );
    registry.insert("SWAP", [rule([(CNOT, 3)], swap_to_cnot)]);
    registry.insert("CRZ", [rule([(PhaseShift, 2), (CNOT, 2)], crz_to_cnot)]);
    registry.insert(
        "Toffoli",
        [rule(
            [
                (ResourceKey::from(Hadamard), 2),
                (ResourceKey::from(CNOT), 6),
                (ResourceKey::from(T), 4),
                (ResourceKey::from("Adjoint(T)"), 3),
            ],
            toffoli_to_cnot,
        )],
    );
    registry.insert(
        "MultiRZ",
        [
            rule(
                ResourceSpec::dynamic(|p| {
                    vec![
                        (ResourceKey::from(CNOT), 2 * (num_wires(p) - 1)),
                        (ResourceKey::from(RZ), 1),
                    ]
                }),
                multirz_to_cnot,
            ),
            DecompositionRule::builder(multirz_single_wire)
                .with_resources([(RZ, 1)])
                .with_condition(|p| num_wires(p) == 1)
                .build(),
        ],
    );

    for kind in [
        Identity, Hadamard, PauliX, PauliY, PauliZ, CNOT, CZ, CY, SWAP, Toffoli,
    ] {
        registry.insert(&adjoint_name(kind), [adjoint_rule(kind, [(kind, 1)])]);
    }
    for kind in [RX, RY, RZ, PhaseShift, Rot, CRZ, GlobalPhase] {
        registry.insert(&adjoint_name(kind), [adjoint_rule(kind, [(kind, 1)])]);
    }
    registry.insert("Adjoint(S)", [adjoint_rule(S, [(PhaseShift, 1)])]);
    registry.insert("Adjoint(T)", [adjoint_rule(T, [(PhaseShift, 1)])]);
    registry.insert("Adjoint(SX)", [adjoint_rule(SX, [(RX, 1), (GlobalPhase, 1)])]);
    registry.insert(
        "Adjoint(MultiRZ)",
        [adjoint_rule(
            MultiRZ,
            ResourceSpec::dynamic(|p| {
                vec![(
                    ResourceKey::from(resource_rep("MultiRZ", [("num_wires", num_wires(p))])),
                    1,
                )]
            }),
        )],
    );
}

fn adjoint_name(kind: GateKind) -> SmolStr {
    SmolStr::from(format!("Adjoint({})", kind.name()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::decomposition::{CompressedResourceOp, Resources};

    /// An instance of an operator, with arbitrary parameters.
    fn sample_op(kind: GateKind, adjoint: bool, num_wires: usize) -> Operation {
        let wires = kind.num_wires().unwrap_or(num_wires);
        let op = Operation::new(kind, 0..wires)
            .with_params((0..kind.num_params()).map(|i| 0.3 + i as f64));
        match adjoint {
            true => op.adjoint(),
            false => op,
        }
    }

    /// Every rule declares exactly the gates its rewrite produces.
    #[rstest]
    #[case(1)]
    #[case(3)]
    fn resources_match_rewrites(#[case] wires: usize) {
        let registry = DecompositionRegistry::with_builtin_rules();
        let mut checked = 0;
        for kind in GateKind::iter() {
            for adjoint in [false, true] {
                let op = sample_op(kind, adjoint, wires);
                let rep = CompressedResourceOp::of(&op);
                for rule in registry.list_decomps(&op.name()) {
                    if !rule.is_applicable(rep.params()) {
                        continue;
                    }
                    let declared = rule.compute_resources(rep.params()).unwrap();
                    let actual = Resources::new(
                        rule.apply(&op)
                            .iter()
                            .map(|o| (CompressedResourceOp::of(o), 1)),
                    );
                    assert_eq!(declared, actual, "rule {} of {}", rule.name(), op.name());
                    checked += 1;
                }
            }
        }
        assert!(checked > 40);
    }

    #[test]
    fn every_gate_but_rz_has_rules() {
        let registry = DecompositionRegistry::with_builtin_rules();
        for kind in GateKind::iter() {
            assert_eq!(registry.has_decomp(kind.name()), kind != GateKind::RZ, "{kind}");
            assert!(registry.has_decomp(&adjoint_name(kind)), "{kind}");
        }
    }

    #[test]
    fn single_wire_multirz() {
        let registry = DecompositionRegistry::with_builtin_rules();
        let rules = registry.list_decomps("MultiRZ");
        let op = sample_op(GateKind::MultiRZ, false, 1);
        let rep = CompressedResourceOp::of(&op);
        assert!(rules.iter().all(|r| r.is_applicable(rep.params())));
        let op = sample_op(GateKind::MultiRZ, false, 2);
        let rep = CompressedResourceOp::of(&op);
        assert!(!rules[1].is_applicable(rep.params()));
        assert_eq!(rules[1].name(), "multirz_single_wire");
    }
}
