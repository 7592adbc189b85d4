use crate::core::errors::{OperationError, TensorError};
use crate::core::utils;
use crate::core::{OperatorTensor, SpaceTree};
use crate::operation::{CapabilityRegistry, OPERATION, Op, OpKind, QOperation, TensorImpl, downcast};
use ndarray::Array2;
use num_complex::Complex64;
use std::any::Any;

pub static MATRIX: OpKind = OpKind::new("MatrixOperation", Some(&OPERATION));
pub static QUBITS_MATRIX: OpKind = OpKind::new("QubitsMatrixOperation", Some(&MATRIX));

/// Operation given by an explicit square matrix.
///
/// The matrix is laid out over the flattened target spaces with the first
/// space as the most significant index. It does not have to be unitary.
#[derive(Clone, Debug)]
pub struct MatrixOperation {
    matrix: Array2<Complex64>,
    name: Option<String>,
}

impl MatrixOperation {
    /// Creates a new `MatrixOperation`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::NotSquareMatrix` if the matrix is not square.
    pub fn new(matrix: Array2<Complex64>) -> Result<Self, OperationError> {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(TensorError::NotSquareMatrix.into());
        }
        Ok(Self { matrix, name: None })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn matrix(&self) -> &Array2<Complex64> {
        &self.matrix
    }

    /// Row (and column) count of the matrix.
    pub fn size(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_unitary(&self) -> bool {
        utils::is_unitary(&self.matrix)
    }
}

impl QOperation for MatrixOperation {
    fn kind(&self) -> &'static OpKind {
        &MATRIX
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matrix operation acting on `n` qubits, i.e. a 2^n × 2^n matrix.
#[derive(Clone, Debug)]
pub struct QubitsMatrixOperation {
    inner: MatrixOperation,
    num_qubits: usize,
}

impl QubitsMatrixOperation {
    /// # Errors
    ///
    /// Returns `OperationError::NotPowerOfTwo` if the matrix size is not `2^n`.
    pub fn new(matrix: Array2<Complex64>) -> Result<Self, OperationError> {
        let inner = MatrixOperation::new(matrix)?;
        let num_qubits = utils::log2_exact(inner.size())
            .ok_or(OperationError::NotPowerOfTwo(inner.size()))?;
        Ok(Self { inner, num_qubits })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.inner = self.inner.with_name(name);
        self
    }

    pub fn matrix(&self) -> &Array2<Complex64> {
        self.inner.matrix()
    }

    /// Number of qubits acted on.
    pub fn n(&self) -> usize {
        self.num_qubits
    }

    /// Matrix size, `2^n`.
    #[allow(non_snake_case)]
    pub fn N(&self) -> usize {
        self.inner.size()
    }

    pub fn is_unitary(&self) -> bool {
        self.inner.is_unitary()
    }
}

impl QOperation for QubitsMatrixOperation {
    fn kind(&self) -> &'static OpKind {
        &QUBITS_MATRIX
    }

    fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<QubitsMatrixOperation> for MatrixOperation {
    fn from(op: QubitsMatrixOperation) -> Self {
        op.inner
    }
}

fn matrix_of(op: &Op) -> Result<&Array2<Complex64>, OperationError> {
    if let Some(op) = downcast::<MatrixOperation>(op.as_ref()) {
        return Ok(op.matrix());
    }
    if let Some(op) = downcast::<QubitsMatrixOperation>(op.as_ref()) {
        return Ok(op.matrix());
    }
    Err(OperationError::InvalidOperand(format!("{op} carries no matrix")))
}

/// Renders a matrix operation over the flattened target spaces.
pub struct MatrixToTensor;

impl TensorImpl for MatrixToTensor {
    fn to_tensor(
        &self,
        _registry: &CapabilityRegistry,
        op: &Op,
        spaces: &SpaceTree,
    ) -> Result<OperatorTensor, OperationError> {
        let matrix = matrix_of(op)?;
        let spaces = spaces.flatten();
        let size: usize = spaces.iter().map(|s| s.dim()).product();
        if size != matrix.nrows() {
            return Err(OperationError::DimensionMismatch {
                expected: matrix.nrows(),
                got: size,
            });
        }
        Ok(OperatorTensor::from_matrix(matrix, &spaces)?)
    }
}
