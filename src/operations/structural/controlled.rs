use crate::core::errors::{OperationError, TreeError};
use crate::core::{KetSpace, OperatorTensor, SpaceTree, Tree, prod};
use crate::operation::{CapabilityRegistry, OPERATION, Op, OpKind, QOperation, TensorImpl};
use crate::operations::operand;
use std::any::Any;

pub static CONTROLLED: OpKind = OpKind::new("ControlledOperation", Some(&OPERATION));

/// Values the control subsystems must hold for the target operation to act.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlKeys {
    /// The same value on every control space.
    Broadcast(usize),
    /// One value per control space, shaped like the control Space-tree.
    PerSpace(Tree<usize>),
}

impl Default for ControlKeys {
    fn default() -> Self {
        ControlKeys::Broadcast(1)
    }
}

impl From<usize> for ControlKeys {
    fn from(key: usize) -> Self {
        ControlKeys::Broadcast(key)
    }
}

impl From<Tree<usize>> for ControlKeys {
    fn from(keys: Tree<usize>) -> Self {
        ControlKeys::PerSpace(keys)
    }
}

impl From<Vec<usize>> for ControlKeys {
    fn from(keys: Vec<usize>) -> Self {
        ControlKeys::PerSpace(Tree::flat(keys))
    }
}

impl ControlKeys {
    /// Pairs each control space with the value it is conditioned on.
    pub fn pairs(&self, control: &SpaceTree) -> Result<Vec<(KetSpace, usize)>, TreeError> {
        match self {
            ControlKeys::Broadcast(key) => Ok(control.iter().map(|&space| (space, *key)).collect()),
            ControlKeys::PerSpace(keys) => Ok(control
                .zip_flatten(keys)?
                .into_iter()
                .map(|(&space, &key)| (space, key))
                .collect()),
        }
    }
}

/// Applies `bullet` to the target spaces when the control spaces hold `keys`.
///
/// Its Space-tree is a two-element node `[control, target]`. The rendered
/// operator is `on ⊗ U + (I - on) ⊗ I`, where `on` is the product of the
/// projectors `|k⟩⟨k|` over the control spaces.
#[derive(Clone, Debug)]
pub struct ControlledOperation {
    bullet: Op,
    keys: ControlKeys,
    name: Option<String>,
}

impl ControlledOperation {
    /// # Errors
    ///
    /// Returns `OperationError::InvalidOperand` if `keys` is an empty per-space tree.
    pub fn new(bullet: Op, keys: impl Into<ControlKeys>) -> Result<Self, OperationError> {
        let keys = keys.into();
        if let ControlKeys::PerSpace(tree) = &keys {
            if tree.is_empty() {
                return Err(OperationError::InvalidOperand(
                    "control keys must name at least one value".to_string(),
                ));
            }
        }
        Ok(Self {
            bullet,
            keys,
            name: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn bullet(&self) -> &Op {
        &self.bullet
    }

    pub fn keys(&self) -> &ControlKeys {
        &self.keys
    }
}

impl QOperation for ControlledOperation {
    fn kind(&self) -> &'static OpKind {
        &CONTROLLED
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct ControlledToTensor;

impl TensorImpl for ControlledToTensor {
    fn to_tensor(
        &self,
        registry: &CapabilityRegistry,
        op: &Op,
        spaces: &SpaceTree,
    ) -> Result<OperatorTensor, OperationError> {
        let controlled = operand::<ControlledOperation>(op)?;
        let Some([control, target]) = spaces.children() else {
            return Err(TreeError::ShapeMismatch.into());
        };

        let target_on = registry.to_tensor(&controlled.bullet)?.to_tensor(target)?;
        let target_spaces = target_on.spaces();

        let pairs = controlled.keys.pairs(control)?;
        if let Some((space, _)) = pairs.iter().find(|(s, _)| target_spaces.contains(s)) {
            return Err(OperationError::ControlTargetOverlap(space.to_string()));
        }

        let projectors = pairs
            .iter()
            .map(|(space, key)| space.projector(*key).map(OperatorTensor::into_tensor))
            .collect::<Result<Vec<_>, _>>()?;
        let control_on = OperatorTensor::of(prod(projectors)?);
        let control_off = OperatorTensor::identity(&control.flatten()).sub(&control_on)?;
        let target_off = OperatorTensor::identity(&target_spaces);

        let on = control_on.matmul(&target_on)?;
        let off = control_off.matmul(&target_off)?;
        Ok(on.add(&off)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::TensorError;
    use crate::operation::IntoOp;
    use crate::operations::gates;
    use ndarray::{Array2, array};
    use num_complex::Complex64;

    fn c(re: f64) -> Complex64 {
        Complex64::new(re, 0.0)
    }

    fn render(
        op: &Op,
        spaces: &SpaceTree,
        order: &[KetSpace],
    ) -> Result<Array2<Complex64>, OperationError> {
        let registry = CapabilityRegistry::standard();
        let tensor = registry.to_tensor(op)?.to_tensor(spaces)?;
        Ok(tensor.to_matrix(order)?)
    }

    #[test]
    fn test_controlled_not_is_cnot() {
        let (c0, t0) = (KetSpace::qubit(), KetSpace::qubit());
        let op = ControlledOperation::new(gates::not().into_op(), 1).unwrap().into_op();
        let spaces = Tree::node([Tree::leaf(c0), Tree::leaf(t0)]);
        let expected = array![
            [c(1.0), c(0.0), c(0.0), c(0.0)],
            [c(0.0), c(1.0), c(0.0), c(0.0)],
            [c(0.0), c(0.0), c(0.0), c(1.0)],
            [c(0.0), c(0.0), c(1.0), c(0.0)],
        ];
        assert_eq!(render(&op, &spaces, &[c0, t0]).unwrap(), expected);
    }

    #[test]
    fn test_control_on_zero() {
        let (c0, t0) = (KetSpace::qubit(), KetSpace::qubit());
        let op = ControlledOperation::new(gates::x().into_op(), 0).unwrap().into_op();
        let spaces = Tree::node([Tree::leaf(c0), Tree::leaf(t0)]);
        let m = render(&op, &spaces, &[c0, t0]).unwrap();
        assert_eq!(m[[0, 1]], c(1.0));
        assert_eq!(m[[2, 2]], c(1.0));
        assert_eq!(m[[0, 0]], c(0.0));
    }

    #[test]
    fn test_per_space_keys() {
        let (a, b, t) = (KetSpace::qubit(), KetSpace::qubit(), KetSpace::qubit());
        let op = ControlledOperation::new(gates::x().into_op(), vec![1, 0])
            .unwrap()
            .into_op();
        let spaces = Tree::node([Tree::flat([a, b]), Tree::leaf(t)]);
        let m = render(&op, &spaces, &[a, b, t]).unwrap();
        // |10⟩ control pattern flips the target: rows 4 and 5 swap
        assert_eq!(m[[4, 5]], c(1.0));
        assert_eq!(m[[5, 4]], c(1.0));
        assert_eq!(m[[6, 6]], c(1.0));
    }

    #[test]
    fn test_spaces_must_be_control_target_pair() {
        let q = KetSpace::qubit();
        let op = ControlledOperation::new(gates::x().into_op(), 1).unwrap().into_op();
        assert!(matches!(
            render(&op, &Tree::leaf(q), &[q]),
            Err(OperationError::Tree(TreeError::ShapeMismatch))
        ));
    }

    #[test]
    fn test_key_tree_must_match_control_shape() {
        let (a, b, t) = (KetSpace::qubit(), KetSpace::qubit(), KetSpace::qubit());
        let op = ControlledOperation::new(gates::x().into_op(), vec![1]).unwrap().into_op();
        let spaces = Tree::node([Tree::flat([a, b]), Tree::leaf(t)]);
        assert!(matches!(
            render(&op, &spaces, &[a, b, t]),
            Err(OperationError::Tree(TreeError::ShapeMismatch))
        ));
    }

    #[test]
    fn test_key_out_of_range() {
        let (c0, t0) = (KetSpace::qubit(), KetSpace::qubit());
        let op = ControlledOperation::new(gates::x().into_op(), 2).unwrap().into_op();
        let spaces = Tree::node([Tree::leaf(c0), Tree::leaf(t0)]);
        assert!(matches!(
            render(&op, &spaces, &[c0, t0]),
            Err(OperationError::Tensor(TensorError::ValueOutOfRange { value: 2, dim: 2 }))
        ));
    }

    #[test]
    fn test_control_target_overlap() {
        let q = KetSpace::qubit();
        let op = ControlledOperation::new(gates::x().into_op(), 1).unwrap().into_op();
        let spaces = Tree::node([Tree::leaf(q), Tree::leaf(q)]);
        assert!(matches!(
            render(&op, &spaces, &[q]),
            Err(OperationError::ControlTargetOverlap(_))
        ));
    }

    #[test]
    fn test_empty_key_tree_rejected() {
        assert!(matches!(
            ControlledOperation::new(gates::x().into_op(), Vec::<usize>::new()),
            Err(OperationError::InvalidOperand(_))
        ));
    }
}
