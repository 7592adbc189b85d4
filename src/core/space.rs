use crate::core::errors::TensorError;
use crate::core::tensor::{OperatorTensor, PureStateTensor};
use crate::core::tree::Tree;
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SPACE_ID: AtomicU64 = AtomicU64::new(0);

/// Handle to one quantum subsystem.
///
/// Every call to [`KetSpace::new`] yields a distinct subsystem, even for equal
/// dimensions. Copies of a handle refer to the same subsystem.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct KetSpace {
    id: u64,
    dim: usize,
}

/// Nested grouping of subsystems used to address operations.
pub type SpaceTree = Tree<KetSpace>;

impl KetSpace {
    /// Creates a new subsystem of dimension `dim` (at least 1).
    pub fn new(dim: usize) -> Self {
        debug_assert!(dim > 0, "space dimension must be positive");
        Self {
            id: NEXT_SPACE_ID.fetch_add(1, Ordering::Relaxed),
            dim,
        }
    }

    /// Creates a two-level subsystem.
    pub fn qubit() -> Self {
        Self::new(2)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Ket-side axis of this subsystem.
    pub fn ket(&self) -> SpaceAxis {
        SpaceAxis::Ket(*self)
    }

    /// Bra-side (adjoint) axis of this subsystem.
    pub fn ct(&self) -> SpaceAxis {
        SpaceAxis::Bra(*self)
    }

    pub fn identity(&self) -> OperatorTensor {
        OperatorTensor::diagonal(*self, |_| Complex64::new(1.0, 0.0))
    }

    /// |v⟩⟨v| on this subsystem.
    pub fn projector(&self, value: usize) -> Result<OperatorTensor, TensorError> {
        self.check_value(value)?;
        let mut matrix = Array2::<Complex64>::zeros((self.dim, self.dim));
        matrix[[value, value]] = Complex64::new(1.0, 0.0);
        OperatorTensor::from_matrix(&matrix, &[*self])
    }

    /// Basis state |v⟩.
    pub fn eigenstate(&self, value: usize) -> Result<PureStateTensor, TensorError> {
        self.check_value(value)?;
        let mut vector = Array1::<Complex64>::zeros(self.dim);
        vector[value] = Complex64::new(1.0, 0.0);
        PureStateTensor::from_vector(&vector, &[*self])
    }

    fn check_value(&self, value: usize) -> Result<(), TensorError> {
        if value >= self.dim {
            return Err(TensorError::ValueOutOfRange {
                value,
                dim: self.dim,
            });
        }
        Ok(())
    }
}

impl fmt::Display for KetSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}[{}]", self.id, self.dim)
    }
}

/// One labelled axis of a tensor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SpaceAxis {
    Ket(KetSpace),
    Bra(KetSpace),
}

impl SpaceAxis {
    pub fn space(&self) -> KetSpace {
        match self {
            SpaceAxis::Ket(space) | SpaceAxis::Bra(space) => *space,
        }
    }

    pub fn dim(&self) -> usize {
        self.space().dim()
    }

    /// The same subsystem on the opposite side.
    pub fn flipped(&self) -> SpaceAxis {
        match self {
            SpaceAxis::Ket(space) => SpaceAxis::Bra(*space),
            SpaceAxis::Bra(space) => SpaceAxis::Ket(*space),
        }
    }
}

impl fmt::Display for SpaceAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceAxis::Ket(space) => write!(f, "|{space}>"),
            SpaceAxis::Bra(space) => write!(f, "<{space}|"),
        }
    }
}
