//! Statevector simulation of quantum circuits with native mid-circuit
//! measurements, and graph-based decomposition of circuits into a gate set.
//!
//! A [`Circuit`] is an ordered list of operators (gates, mid-circuit
//! measurements, state preparations and classically conditioned gates)
//! followed by terminal measurements, executed with a number of [`Shots`].
//!
//! - [`simulate`] runs a circuit. With finite shots, mid-circuit measurements
//!   are simulated by exploring the tree of measurement outcomes, splitting
//!   the shots between the branches ([`simulator::tree_mcm`]), or shot by shot
//!   through the [`transforms::dynamic_one_shot`] transform.
//! - [`transforms::decompose`] rewrites a circuit into a target gate set,
//!   either with the fixed decomposition of every gate or with the cheapest
//!   combination of registered rules ([`decomposition`]).
//! - [`serialize`] loads circuits from a JSON format.
//!
//! # Example
//!
//! ```
//! use pennylane::circuit::Circuit;
//! use pennylane::measurements::{MeasurementProcess, Observable};
//! use pennylane::ops::{GateKind, MidMeasure};
//! use pennylane::simulator::{simulate, SimulationConfig};
//! use pennylane::transforms::{decompose, DecomposeOptions};
//!
//! let mut builder = Circuit::builder();
//! builder.append(GateKind::Hadamard, [0]).unwrap();
//! let m0 = builder.measure(MidMeasure::new(0).with_postselect(1)).unwrap();
//! builder.append(GateKind::CNOT, [0, 1]).unwrap();
//! builder.measurement(MeasurementProcess::expval(Observable::z(1)));
//! builder.measurement(MeasurementProcess::expval(m0));
//! builder.shots(1000usize);
//! let circ = builder.build().unwrap();
//!
//! // Only the branch where wire 0 is measured as 1 survives.
//! let result = simulate(&circ, &SimulationConfig::seeded(42)).unwrap();
//! let values = result.measurements().unwrap();
//! assert_eq!(values[0].as_scalar(), Some(-1.0));
//! assert_eq!(values[1].as_scalar(), Some(1.0));
//!
//! // Rewrite the CNOT into Hadamards and a CZ.
//! let options = DecomposeOptions::with_gate_set(["H", "CZ"]);
//! let out = decompose(&circ, &options).unwrap();
//! assert_eq!(out.circuits[0].num_operations(), 5);
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod circuit;
pub mod decomposition;
pub mod measurements;
pub mod ops;
pub mod serialize;
pub mod simulator;
pub mod transforms;

#[cfg(test)]
mod utils;

pub use circuit::{Circuit, CircuitError, Shots};
pub use decomposition::{DecompositionError, DecompositionRule};
pub use measurements::{MeasurementProcess, MeasurementValue, Observable, SimulationResult};
pub use ops::{GateKind, MidMeasure, Operation, Operator, Pauli};
pub use simulator::{simulate, SimulationConfig, SimulationError};
pub use transforms::{TransformError, TransformOutput};
