//! The concrete operation kinds and the providers that give them behavior.
//!
//! Leaves ([`MatrixOperation`], [`QubitsMatrixOperation`], [`KrausOperation`])
//! hold numbers. Structural combinators ([`SequentialOperation`],
//! [`ControlledOperation`], [`RemappedOperation`]) hold other operations and
//! render by asking the registry for their children's capabilities.

mod channels;
pub mod gates;
mod matrix;
mod structural;

pub use channels::{KRAUS, KrausOperation, KrausToKraus};
pub use matrix::{MATRIX, MatrixOperation, MatrixToTensor, QUBITS_MATRIX, QubitsMatrixOperation};
pub use structural::{
    CONTROLLED, ControlKeys, ControlledOperation, ControlledToTensor, REMAPPED, RemappedForward,
    RemappedOperation, SEQUENTIAL, SequentialOperation, SequentialToTensor, SpaceMapping,
};

use crate::core::errors::OperationError;
use crate::operation::{Op, QOperation, downcast};

/// The concrete `T` behind `op`, or an invalid-operand error naming it.
pub(crate) fn operand<T: QOperation>(op: &Op) -> Result<&T, OperationError> {
    downcast::<T>(op.as_ref()).ok_or_else(|| {
        OperationError::InvalidOperand(format!(
            "{op} is not a {}",
            std::any::type_name::<T>().rsplit("::").next().unwrap_or_default()
        ))
    })
}
