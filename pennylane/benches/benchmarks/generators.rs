use pennylane::circuit::{Circuit, CircuitBuilder, CircuitError};
use pennylane::measurements::{MeasurementProcess, MeasurementTarget, Observable};
use pennylane::ops::{GateKind, MidMeasure, Operation};

/// Run `layers` on a fresh builder. Generated circuits are always valid.
fn generate(layers: impl FnOnce(&mut CircuitBuilder) -> Result<(), CircuitError>) -> Circuit {
    let mut builder = Circuit::builder();
    layers(&mut builder).unwrap();
    builder.build().unwrap()
}

/// Create a circuit with layers of CNOTs.
///
/// - In each odd layer, we apply CNOTs between qubits `2i` and `2i+1` for each possible `i`.
/// - In each even layer, we apply CNOTs between qubits `2i+1` and `2i+2` for each possible `i`.
///
/// Every qubit starts with a Hadamard, and the last one is measured.
pub fn make_cnot_layers(num_qubits: usize, layers: usize) -> Circuit {
    generate(|circ| {
        for q in 0..num_qubits {
            circ.append(GateKind::Hadamard, [q])?;
        }
        for layer in 0..layers {
            let start = layer % 2;
            let cnot_count = (num_qubits - start) / 2;
            for i in 0..cnot_count {
                let q = i * 2 + start;
                circ.append(GateKind::CNOT, [q, q + 1])?;
            }
        }
        circ.measurement(MeasurementProcess::expval(Observable::z(num_qubits - 1)));
        Ok(())
    })
}

/// Create a circuit measuring every qubit mid-circuit, each measurement
/// conditioning a rotation of the next qubit.
pub fn make_mcm_chain(num_qubits: usize, shots: usize) -> Circuit {
    generate(|circ| {
        circ.append(GateKind::Hadamard, [0])?;
        for q in 0..num_qubits - 1 {
            let m = circ.measure(MidMeasure::new(q))?;
            circ.cond(&m, Operation::new(GateKind::RY, [q + 1]).with_param(0.8))?;
            circ.append(GateKind::Hadamard, [q + 1])?;
        }
        circ.measurement(MeasurementProcess::probs(MeasurementTarget::all_wires()));
        circ.shots(shots);
        Ok(())
    })
}
