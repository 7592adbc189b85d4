//! Composable quantum operations.
//!
//! Operations are immutable values: matrix leaves, Kraus channels, the
//! structural combinators [`SequentialOperation`], [`ControlledOperation`] and
//! [`RemappedOperation`], and [`ProjectiveMeasurement`]. What an operation can
//! do is resolved at runtime through a [`CapabilityRegistry`]:
//!
//! ```no_run
//! use qsynth::{CapabilityRegistry, IntoOp, KetSpace, QModel, Tree, gates};
//! use rand::SeedableRng;
//!
//! let registry = CapabilityRegistry::standard();
//! let (c, t) = (KetSpace::qubit(), KetSpace::qubit());
//! let mut model = QModel::pure_zeros(Tree::node([Tree::leaf(c), Tree::leaf(t)])).unwrap();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! registry.apply_on_model(&gates::cx().into_op(), &mut model, &mut rng).unwrap();
//! ```

mod core;
pub mod measure;
pub mod operation;
pub mod operations;
mod sampler;

pub use crate::core::{
    KetSpace, MixedStateTensor, OperatorTensor, PureStateTensor, QModel, SpaceAxis, SpaceTree,
    StateTensor, Tensor, Tree, errors, prod, sum, tree, utils,
};
pub use crate::measure::{MeasurementResult, ProjectiveMeasurement, outcome_probabilities};
pub use crate::operation::{
    ApplyOnMixedState, ApplyOnPureState, Capability, CapabilityKind, CapabilityRegistry, IntoOp,
    Op, OpKind, Provider, QOperation, RegistryBuilder, SideEffect, ToKraus, ToTensor,
};
pub use crate::operations::{
    ControlKeys, ControlledOperation, KrausOperation, MatrixOperation, QubitsMatrixOperation,
    RemappedOperation, SequentialOperation, gates,
};
pub use crate::sampler::Sampler;
