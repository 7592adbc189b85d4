use crate::core::errors::OperationError;
use crate::core::{OperatorTensor, SpaceTree, prod};
use crate::operation::{CapabilityRegistry, OPERATION, Op, OpKind, QOperation, TensorImpl};
use crate::operations::operand;
use std::any::Any;

pub static SEQUENTIAL: OpKind = OpKind::new("SequentialOperation", Some(&OPERATION));

/// Ordered list of operations over the same target spaces.
///
/// Renders as `steps[0] @ steps[1] @ ...`, the product in list order.
#[derive(Clone, Debug)]
pub struct SequentialOperation {
    steps: Vec<Op>,
    name: Option<String>,
}

impl SequentialOperation {
    /// # Errors
    ///
    /// Returns `OperationError::InvalidOperand` if `steps` is empty.
    pub fn new(steps: impl IntoIterator<Item = Op>) -> Result<Self, OperationError> {
        let steps: Vec<Op> = steps.into_iter().collect();
        if steps.is_empty() {
            return Err(OperationError::InvalidOperand(
                "sequential operation needs at least one step".to_string(),
            ));
        }
        Ok(Self { steps, name: None })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn steps(&self) -> &[Op] {
        &self.steps
    }
}

impl QOperation for SequentialOperation {
    fn kind(&self) -> &'static OpKind {
        &SEQUENTIAL
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct SequentialToTensor;

impl TensorImpl for SequentialToTensor {
    fn to_tensor(
        &self,
        registry: &CapabilityRegistry,
        op: &Op,
        spaces: &SpaceTree,
    ) -> Result<OperatorTensor, OperationError> {
        let sequential = operand::<SequentialOperation>(op)?;
        let mut rendered = Vec::with_capacity(sequential.steps.len());
        for step in &sequential.steps {
            rendered.push(registry.to_tensor(step)?.to_tensor(spaces)?.into_tensor());
        }
        Ok(OperatorTensor::of(prod(rendered)?))
    }
}
