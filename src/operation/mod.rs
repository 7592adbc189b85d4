//! Operation values and the machinery that finds their behaviors.
//!
//! An operation is an immutable description with a name and a runtime
//! [`OpKind`]. It carries no behavior itself: what it can do (render as an
//! operator, as a Kraus set, apply to a pure or mixed state) is looked up in a
//! [`CapabilityRegistry`] keyed by its kind.

mod capability;
mod registry;

pub use capability::{
    ApplyOnMixedState, ApplyOnPureState, Capability, CapabilityKind, ForwardImpl, KrausImpl,
    MixedStateImpl, Provider, PureStateImpl, SideEffect, TensorImpl, ToKraus, ToTensor,
};
pub use registry::{CapabilityRegistry, RegistryBuilder};

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Runtime variant of an operation.
///
/// Kinds form single-inheritance chains through `parent`: a kind is a
/// specialization of every kind above it. Two kinds are equal only if they
/// are the same `static` item.
#[derive(Debug)]
pub struct OpKind {
    name: &'static str,
    parent: Option<&'static OpKind>,
}

impl OpKind {
    pub const fn new(name: &'static str, parent: Option<&'static OpKind>) -> Self {
        Self { name, parent }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static OpKind> {
        self.parent
    }

    /// This kind followed by its parent, grandparent, and so on.
    pub fn ancestors(&'static self) -> impl Iterator<Item = &'static OpKind> {
        std::iter::successors(Some(self), |kind| kind.parent)
    }

    /// Number of parent steps from `self` up to `ancestor`, if it is one.
    pub fn distance_to(&'static self, ancestor: &OpKind) -> Option<usize> {
        self.ancestors().position(|kind| kind == ancestor)
    }
}

impl PartialEq for OpKind {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for OpKind {}

impl Hash for OpKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Root of every kind chain.
pub static OPERATION: OpKind = OpKind::new("QOperation", None);

/// A composable quantum operation.
pub trait QOperation: Any + fmt::Debug + Send + Sync {
    fn kind(&self) -> &'static OpKind;

    fn name(&self) -> Option<&str>;

    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an operation. Combinators own their children through it.
pub type Op = Arc<dyn QOperation>;

impl fmt::Display for dyn QOperation + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({name})", self.kind()),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// Moves an operation behind a shared handle.
pub trait IntoOp {
    fn into_op(self) -> Op;
}

impl<T: QOperation> IntoOp for T {
    fn into_op(self) -> Op {
        Arc::new(self)
    }
}

/// Concrete view of an operation, if it is a `T`.
pub fn downcast<T: QOperation>(op: &dyn QOperation) -> Option<&T> {
    op.as_any().downcast_ref::<T>()
}
