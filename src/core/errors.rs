use ndarray::ShapeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Trees have different nesting shapes")]
    ShapeMismatch,

    #[error("Expected {expected} values to restore the tree, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

#[derive(Error, Debug, Clone)]
pub enum TensorError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Matrix must be square")]
    NotSquareMatrix,

    #[error("Axis {0} appears more than once")]
    DuplicateAxis(String),

    #[error("Tensors are defined over different spaces")]
    AxisMismatch,

    #[error("Tensor has no axis {0}")]
    MissingAxis(String),

    #[error("Value {value} is out of range for a space of dimension {dim}")]
    ValueOutOfRange { value: usize, dim: usize },

    #[error("Reshape failed: {0}")]
    Shape(#[from] ShapeError),

    #[error("Vector is not normalized. Norm squared: {0}")]
    NotNormalized(f64),

    #[error("Trace is not unity: {0}")]
    InvalidTrace(f64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Operation kind {kind} already has a provider for {capability}")]
    Ambiguous {
        kind: &'static str,
        capability: &'static str,
    },
}

#[derive(Error, Debug, Clone)]
pub enum OperationError {
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Matrix size {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("Operation {operation} does not support {capability}")]
    UnsupportedCapability {
        operation: String,
        capability: &'static str,
    },

    #[error("Expected a {expected} state, the model holds a {got} state")]
    StateVariantMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("Space {0} is used as both control and target")]
    ControlTargetOverlap(String),

    #[error("Every measurement outcome has zero probability")]
    VanishingState,

    #[error("Kraus operators do not sum to Identity (Trace preserving relation failed)")]
    NotComplete,

    #[error("Invalid probability: {0}. Must be between 0.0 and 1.0")]
    InvalidProbability(f64),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),
}
