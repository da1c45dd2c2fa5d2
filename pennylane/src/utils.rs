//! Utility functions for the library tests.

use crate::circuit::{Circuit, CircuitBuilder, CircuitError};

/// Utility for building simple circuits in tests.
pub(crate) fn build_simple_circuit<F>(f: F) -> Result<Circuit, CircuitError>
where
    F: FnOnce(&mut CircuitBuilder) -> Result<(), CircuitError>,
{
    let mut builder = Circuit::builder();
    f(&mut builder)?;
    builder.build()
}

/// Whether two floats agree up to an absolute tolerance.
///
/// NaN compares equal to NaN, matching the placeholder results of branches
/// without shots.
pub(crate) fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a.is_nan() && b.is_nan()) || (a - b).abs() <= tol
}
