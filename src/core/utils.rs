//! Utility functions shared by the tensor backend and the operations.
//!
//! This module contains helpers for:
//! - Numerical tolerance and matrix checks (trace, completeness).
//! - Power-of-two sizes for qubit registers.
//! - Duplicate detection in index lists.

use ndarray::Array2;
use num_complex::Complex64;
use std::collections::HashSet;
use std::hash::Hash;

/// Absolute tolerance used by every numerical validity check.
pub const TOLERANCE: f64 = 1e-9;

/// Computes the trace of a matrix (sum of diagonal elements).
pub fn trace(matrix: &Array2<Complex64>) -> Complex64 {
    matrix.diag().sum()
}

/// Find the first repeated item of a slice
pub fn find_duplicate<T: Eq + Hash + Copy>(items: &[T]) -> Option<T> {
    let mut seen = HashSet::new();
    items.iter().find(|&&item| !seen.insert(item)).copied()
}

/// Returns `n` such that `size == 2^n`, or `None` when `size` is not a power of two.
pub fn log2_exact(size: usize) -> Option<usize> {
    size.is_power_of_two().then(|| size.trailing_zeros() as usize)
}

/// Checks completeness relation for Kraus operators.
///
/// Verifies if $\sum K_k^\dagger K_k = I$.
pub fn check_completeness(ops: &[Array2<Complex64>], dim: usize) -> bool {
    let eye = Array2::<Complex64>::eye(dim);
    let sum = ops
        .iter()
        .fold(Array2::<Complex64>::zeros((dim, dim)), |acc, op| {
            let dag = op.t().mapv(|c| c.conj());
            acc + dag.dot(op)
        });
    sum.iter()
        .zip(eye.iter())
        .all(|(a, b)| (a - b).norm() < TOLERANCE)
}

/// Checks if a matrix is unitary (U U† = I).
pub fn is_unitary(matrix: &Array2<Complex64>) -> bool {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return false;
    }
    let u_dagger = matrix.t().mapv(|x| x.conj());
    let product = matrix.dot(&u_dagger);
    product
        .iter()
        .zip(Array2::<Complex64>::eye(rows).iter())
        .all(|(a, b)| (a - b).norm() < TOLERANCE)
}
