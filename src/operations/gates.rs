//! Standard gate catalogue.
//!
//! Single- and two-qubit gates are [`QubitsMatrixOperation`]s; multi-qubit
//! controlled gates are [`ControlledOperation`]s over a `[control, target]`
//! Space-tree, so `cx()` is rendered with the control first.

use crate::operation::IntoOp;
use crate::operations::{ControlledOperation, QubitsMatrixOperation};
use ndarray::{Array2, arr2};
use num_complex::Complex64;
use std::f64::consts::PI;

fn gate(name: &str, matrix: Array2<Complex64>) -> QubitsMatrixOperation {
    QubitsMatrixOperation::new(matrix)
        .expect("built-in gate matrices are 2^n square")
        .with_name(name)
}

fn controlled(name: &str, bullet: QubitsMatrixOperation) -> ControlledOperation {
    ControlledOperation::new(bullet.into_op(), 1)
        .expect("broadcast keys are never empty")
        .with_name(name)
}

/// Creates an Identity gate.
pub fn i() -> QubitsMatrixOperation {
    gate(
        "I",
        arr2(&[
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
        ]),
    )
}

/// Creates a Pauli-X gate.
pub fn x() -> QubitsMatrixOperation {
    gate(
        "X",
        arr2(&[
            [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
        ]),
    )
}

/// Pauli-X under its classical name.
pub fn not() -> QubitsMatrixOperation {
    x().with_name("NOT")
}

/// Creates a Pauli-Y gate.
pub fn y() -> QubitsMatrixOperation {
    gate(
        "Y",
        arr2(&[
            [Complex64::new(0.0, 0.0), Complex64::new(0.0, -1.0)],
            [Complex64::new(0.0, 1.0), Complex64::new(0.0, 0.0)],
        ]),
    )
}

/// Creates a Pauli-Z gate.
pub fn z() -> QubitsMatrixOperation {
    gate(
        "Z",
        arr2(&[
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(-1.0, 0.0)],
        ]),
    )
}

/// Creates a Hadamard gate.
pub fn h() -> QubitsMatrixOperation {
    let factor = 1.0 / 2.0_f64.sqrt();
    gate(
        "H",
        arr2(&[
            [Complex64::new(factor, 0.0), Complex64::new(factor, 0.0)],
            [Complex64::new(factor, 0.0), Complex64::new(-factor, 0.0)],
        ]),
    )
}

/// Creates an S gate (Phase gate, Z^1/2).
pub fn s() -> QubitsMatrixOperation {
    gate(
        "S",
        arr2(&[
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(0.0, 1.0)],
        ]),
    )
}

/// Creates a T gate (Z^1/4).
pub fn t() -> QubitsMatrixOperation {
    let angle = PI / 4.0;
    gate(
        "T",
        arr2(&[
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::from_polar(1.0, angle)],
        ]),
    )
}

/// Rotation about X by `theta`.
pub fn rx(theta: f64) -> QubitsMatrixOperation {
    let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    gate(
        "Rx",
        arr2(&[
            [Complex64::new(c, 0.0), Complex64::new(0.0, -s)],
            [Complex64::new(0.0, -s), Complex64::new(c, 0.0)],
        ]),
    )
}

/// Rotation about Y by `theta`.
pub fn ry(theta: f64) -> QubitsMatrixOperation {
    let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    gate(
        "Ry",
        arr2(&[
            [Complex64::new(c, 0.0), Complex64::new(-s, 0.0)],
            [Complex64::new(s, 0.0), Complex64::new(c, 0.0)],
        ]),
    )
}

/// Rotation about Z by `theta`.
pub fn rz(theta: f64) -> QubitsMatrixOperation {
    gate(
        "Rz",
        arr2(&[
            [Complex64::from_polar(1.0, -theta / 2.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::from_polar(1.0, theta / 2.0)],
        ]),
    )
}

/// Creates a SWAP gate.
pub fn swap() -> QubitsMatrixOperation {
    let mut matrix = Array2::<Complex64>::zeros((4, 4));
    for (row, col) in [(0, 0), (1, 2), (2, 1), (3, 3)] {
        matrix[[row, col]] = Complex64::new(1.0, 0.0);
    }
    gate("SWAP", matrix)
}

/// Controlled-NOT.
pub fn cx() -> ControlledOperation {
    controlled("CX", x())
}

/// Controlled-Z.
pub fn cz() -> ControlledOperation {
    controlled("CZ", z())
}

/// Doubly controlled NOT; expects two control spaces.
pub fn toffoli() -> ControlledOperation {
    controlled("Toffoli", x())
}
