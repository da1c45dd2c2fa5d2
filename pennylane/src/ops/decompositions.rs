//! Rewrite functions for the named gates.
//!
//! Each function takes the operation to rewrite and returns the replacing
//! sequence, in circuit order. They are used both by the fixed
//! [`Operation::decomposition`] and by the rules registered in
//! [`crate::decomposition::builtin`].

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use super::{GateKind, Operation, Param, Wire};

fn op1(kind: GateKind, wire: Wire) -> Operation {
    Operation::new(kind, [wire])
}

fn rot(kind: GateKind, param: impl Into<Param>, wire: Wire) -> Operation {
    Operation::new(kind, [wire]).with_param(param)
}

fn cnot(control: Wire, target: Wire) -> Operation {
    Operation::new(GateKind::CNOT, [control, target])
}

fn global_phase(param: impl Into<Param>, wires: &[Wire]) -> Operation {
    Operation::new(GateKind::GlobalPhase, wires.iter().copied()).with_param(param)
}

/// The decomposition used when no rule system is involved.
pub(crate) fn default_decomposition(op: &Operation) -> Option<Vec<Operation>> {
    if op.is_adjoint() {
        return adjoint_decomposition(op);
    }
    let ops = match op.kind() {
        GateKind::Identity => vec![],
        GateKind::Hadamard => hadamard_to_phase_rx(op),
        GateKind::PauliX => paulix_to_phase_rx(op),
        GateKind::PauliY => pauliy_to_phase_ry(op),
        GateKind::PauliZ => pauliz_to_phase(op),
        GateKind::S => s_to_phase(op),
        GateKind::T => t_to_phase(op),
        GateKind::SX => sx_to_rx(op),
        GateKind::RX => rx_to_rz_ry(op),
        GateKind::RY => ry_to_rz_rx(op),
        GateKind::PhaseShift => phaseshift_to_rz(op),
        GateKind::Rot => rot_to_rz_ry(op),
        GateKind::CNOT => cnot_to_cz(op),
        GateKind::CZ => cz_to_cnot(op),
        GateKind::CY => cy_to_cnot(op),
        GateKind::SWAP => swap_to_cnot(op),
        GateKind::CRZ => crz_to_cnot(op),
        GateKind::Toffoli => toffoli_to_cnot(op),
        GateKind::MultiRZ => multirz_to_cnot(op),
        GateKind::RZ | GateKind::GlobalPhase => return None,
    };
    Some(ops)
}

/// Rewrite an adjoint operation in terms of non-adjoint gates.
pub(crate) fn adjoint_decomposition(op: &Operation) -> Option<Vec<Operation>> {
    let kind = op.kind();
    let wires = op.wires();
    if kind.is_self_inverse() {
        return Some(vec![Operation::new(kind, wires.iter().copied())]);
    }
    let ops = match kind {
        GateKind::S => vec![rot(GateKind::PhaseShift, -FRAC_PI_2, wires[0])],
        GateKind::T => vec![rot(GateKind::PhaseShift, -FRAC_PI_4, wires[0])],
        GateKind::SX => vec![
            rot(GateKind::RX, -FRAC_PI_2, wires[0]),
            global_phase(FRAC_PI_4, wires),
        ],
        GateKind::Rot => {
            let [phi, theta, omega] = op.params() else {
                return None;
            };
            vec![Operation::new(GateKind::Rot, [wires[0]]).with_params([
                omega.neg(),
                theta.neg(),
                phi.neg(),
            ])]
        }
        GateKind::RX
        | GateKind::RY
        | GateKind::RZ
        | GateKind::PhaseShift
        | GateKind::CRZ
        | GateKind::MultiRZ
        | GateKind::GlobalPhase => {
            vec![Operation::new(kind, wires.iter().copied())
                .with_params(op.params().iter().map(Param::neg))]
        }
        _ => return None,
    };
    Some(ops)
}

/// `H = PhaseShift(π/2) RX(π/2) PhaseShift(π/2)` up to a global phase.
pub fn hadamard_to_phase_rx(op: &Operation) -> Vec<Operation> {
    let w = op.wires()[0];
    vec![
        rot(GateKind::PhaseShift, FRAC_PI_2, w),
        rot(GateKind::RX, FRAC_PI_2, w),
        rot(GateKind::PhaseShift, FRAC_PI_2, w),
    ]
}

/// `H = RZ(π/2) RX(π/2) RZ(π/2)` with an explicit global phase.
pub fn hadamard_to_rz_rx(op: &Operation) -> Vec<Operation> {
    let w = op.wires()[0];
    vec![
        rot(GateKind::RZ, FRAC_PI_2, w),
        rot(GateKind::RX, FRAC_PI_2, w),
        rot(GateKind::RZ, FRAC_PI_2, w),
        global_phase(-FRAC_PI_2, op.wires()),
    ]
}

/// `X = PhaseShift(π/2) RX(π) PhaseShift(π/2)`.
pub fn paulix_to_phase_rx(op: &Operation) -> Vec<Operation> {
    let w = op.wires()[0];
    vec![
        rot(GateKind::PhaseShift, FRAC_PI_2, w),
        rot(GateKind::RX, PI, w),
        rot(GateKind::PhaseShift, FRAC_PI_2, w),
    ]
}

/// `X = RX(π)` with an explicit global phase.
pub fn paulix_to_rx(op: &Operation) -> Vec<Operation> {
    vec![
        rot(GateKind::RX, PI, op.wires()[0]),
        global_phase(-FRAC_PI_2, op.wires()),
    ]
}

/// `Y = PhaseShift(π/2) RY(π) PhaseShift(π/2)`.
pub fn pauliy_to_phase_ry(op: &Operation) -> Vec<Operation> {
    let w = op.wires()[0];
    vec![
        rot(GateKind::PhaseShift, FRAC_PI_2, w),
        rot(GateKind::RY, PI, w),
        rot(GateKind::PhaseShift, FRAC_PI_2, w),
    ]
}

/// `Y = RY(π)` with an explicit global phase.
pub fn pauliy_to_ry(op: &Operation) -> Vec<Operation> {
    vec![
        rot(GateKind::RY, PI, op.wires()[0]),
        global_phase(-FRAC_PI_2, op.wires()),
    ]
}

/// `Z = PhaseShift(π)`.
pub fn pauliz_to_phase(op: &Operation) -> Vec<Operation> {
    vec![rot(GateKind::PhaseShift, PI, op.wires()[0])]
}

/// `Z = RZ(π)` with an explicit global phase.
pub fn pauliz_to_rz(op: &Operation) -> Vec<Operation> {
    vec![
        rot(GateKind::RZ, PI, op.wires()[0]),
        global_phase(-FRAC_PI_2, op.wires()),
    ]
}

/// `S = PhaseShift(π/2)`.
pub fn s_to_phase(op: &Operation) -> Vec<Operation> {
    vec![rot(GateKind::PhaseShift, FRAC_PI_2, op.wires()[0])]
}

/// `T = PhaseShift(π/4)`.
pub fn t_to_phase(op: &Operation) -> Vec<Operation> {
    vec![rot(GateKind::PhaseShift, FRAC_PI_4, op.wires()[0])]
}

/// `SX = RX(π/2)` with an explicit global phase.
pub fn sx_to_rx(op: &Operation) -> Vec<Operation> {
    vec![
        rot(GateKind::RX, FRAC_PI_2, op.wires()[0]),
        global_phase(-FRAC_PI_4, op.wires()),
    ]
}

/// `RX(θ) = RZ(-π/2) RY(θ) RZ(π/2)`.
pub fn rx_to_rz_ry(op: &Operation) -> Vec<Operation> {
    let w = op.wires()[0];
    vec![
        rot(GateKind::RZ, FRAC_PI_2, w),
        rot(GateKind::RY, op.params()[0].clone(), w),
        rot(GateKind::RZ, -FRAC_PI_2, w),
    ]
}

/// `RY(θ) = RZ(π/2) RX(θ) RZ(-π/2)`.
pub fn ry_to_rz_rx(op: &Operation) -> Vec<Operation> {
    let w = op.wires()[0];
    vec![
        rot(GateKind::RZ, -FRAC_PI_2, w),
        rot(GateKind::RX, op.params()[0].clone(), w),
        rot(GateKind::RZ, FRAC_PI_2, w),
    ]
}

/// `PhaseShift(φ) = RZ(φ)` with a global phase of `φ/2`.
pub fn phaseshift_to_rz(op: &Operation) -> Vec<Operation> {
    let phi = &op.params()[0];
    vec![
        rot(GateKind::RZ, phi.clone(), op.wires()[0]),
        global_phase(phi.map(|v| -v / 2.0), op.wires()),
    ]
}

/// `Rot(φ, θ, ω) = RZ(ω) RY(θ) RZ(φ)`.
pub fn rot_to_rz_ry(op: &Operation) -> Vec<Operation> {
    let w = op.wires()[0];
    let p = op.params();
    vec![
        rot(GateKind::RZ, p[0].clone(), w),
        rot(GateKind::RY, p[1].clone(), w),
        rot(GateKind::RZ, p[2].clone(), w),
    ]
}

/// `CNOT = H CZ H` on the target.
pub fn cnot_to_cz(op: &Operation) -> Vec<Operation> {
    let (c, t) = (op.wires()[0], op.wires()[1]);
    vec![
        op1(GateKind::Hadamard, t),
        Operation::new(GateKind::CZ, [c, t]),
        op1(GateKind::Hadamard, t),
    ]
}

/// `CZ = H CNOT H` on the target.
pub fn cz_to_cnot(op: &Operation) -> Vec<Operation> {
    let (c, t) = (op.wires()[0], op.wires()[1]);
    vec![
        op1(GateKind::Hadamard, t),
        cnot(c, t),
        op1(GateKind::Hadamard, t),
    ]
}

/// `CY = S CNOT S†` on the target.
pub fn cy_to_cnot(op: &Operation) -> Vec<Operation> {
    let (c, t) = (op.wires()[0], op.wires()[1]);
    vec![
        op1(GateKind::S, t).adjoint(),
        cnot(c, t),
        op1(GateKind::S, t),
    ]
}

/// `SWAP` as three alternating CNOTs.
pub fn swap_to_cnot(op: &Operation) -> Vec<Operation> {
    let (a, b) = (op.wires()[0], op.wires()[1]);
    vec![cnot(a, b), cnot(b, a), cnot(a, b)]
}

/// `CRZ(φ)` with two CNOTs and two phase shifts on the target.
pub fn crz_to_cnot(op: &Operation) -> Vec<Operation> {
    let (c, t) = (op.wires()[0], op.wires()[1]);
    let phi = &op.params()[0];
    vec![
        rot(GateKind::PhaseShift, phi.map(|v| v / 2.0), t),
        cnot(c, t),
        rot(GateKind::PhaseShift, phi.map(|v| -v / 2.0), t),
        cnot(c, t),
    ]
}

/// The textbook Toffoli circuit: 6 CNOTs, 2 Hadamards and 7 T/T† gates.
pub fn toffoli_to_cnot(op: &Operation) -> Vec<Operation> {
    let (a, b, c) = (op.wires()[0], op.wires()[1], op.wires()[2]);
    let t = |w| op1(GateKind::T, w);
    let tdg = |w| op1(GateKind::T, w).adjoint();
    vec![
        op1(GateKind::Hadamard, c),
        cnot(b, c),
        tdg(c),
        cnot(a, c),
        t(c),
        cnot(b, c),
        tdg(c),
        cnot(a, c),
        t(b),
        t(c),
        op1(GateKind::Hadamard, c),
        cnot(a, b),
        t(a),
        tdg(b),
        cnot(a, b),
    ]
}

/// `MultiRZ(θ)` as a CNOT parity ladder around a single `RZ(θ)`.
pub fn multirz_to_cnot(op: &Operation) -> Vec<Operation> {
    let wires = op.wires();
    let n = wires.len();
    let ladder_down = (1..n).rev().map(|i| cnot(wires[i], wires[i - 1]));
    let ladder_up = (1..n).map(|i| cnot(wires[i], wires[i - 1]));
    ladder_down
        .chain([rot(GateKind::RZ, op.params()[0].clone(), wires[0])])
        .chain(ladder_up)
        .collect()
}

/// `MultiRZ(θ)` on a single wire is `RZ(θ)`.
pub fn multirz_single_wire(op: &Operation) -> Vec<Operation> {
    vec![rot(GateKind::RZ, op.params()[0].clone(), op.wires()[0])]
}
