use crate::core::errors::TensorError;
use crate::core::space::{KetSpace, SpaceTree};
use crate::core::tensor::{MixedStateTensor, PureStateTensor, StateTensor};
use crate::core::utils;
use std::collections::HashSet;

/// Owned handle pairing a group of subsystems with their current state.
///
/// Applying an operation to a model replaces its state in place. A model is
/// not synchronised: callers must not apply operations to the same model
/// from several threads at once.
#[derive(Clone, Debug)]
pub struct QModel {
    spaces: SpaceTree,
    state: StateTensor,
}

impl QModel {
    /// Pairs `spaces` with `state`.
    ///
    /// # Arguments
    ///
    /// * `spaces` - The Space-tree operations applied to the model receive.
    /// * `state` - A pure or mixed state over exactly the leaves of `spaces`.
    ///
    /// # Errors
    ///
    /// * `TensorError::DuplicateAxis` - a space appears twice in `spaces`.
    /// * `TensorError::AxisMismatch` - the state is defined over a different
    ///   set of subsystems than the leaves of `spaces`.
    pub fn new(spaces: SpaceTree, state: impl Into<StateTensor>) -> Result<Self, TensorError> {
        let state = state.into();
        let leaves = spaces.flatten();
        if let Some(dup) = utils::find_duplicate(&leaves) {
            return Err(TensorError::DuplicateAxis(dup.ket().to_string()));
        }
        let expected: HashSet<KetSpace> = leaves.into_iter().collect();
        let held: HashSet<KetSpace> = state.spaces().into_iter().collect();
        if expected != held {
            return Err(TensorError::AxisMismatch);
        }
        Ok(Self { spaces, state })
    }

    /// Model with every subsystem in |0⟩.
    pub fn pure_zeros(spaces: SpaceTree) -> Result<Self, TensorError> {
        let state = PureStateTensor::zeros(&spaces.flatten())?;
        Self::new(spaces, state)
    }

    /// Density-operator model with every subsystem in |0⟩⟨0|.
    pub fn mixed_zeros(spaces: SpaceTree) -> Result<Self, TensorError> {
        let pure = PureStateTensor::zeros(&spaces.flatten())?;
        let state = MixedStateTensor::from_pure(&pure)?;
        Self::new(spaces, state)
    }

    pub fn spaces(&self) -> &SpaceTree {
        &self.spaces
    }

    pub fn state(&self) -> &StateTensor {
        &self.state
    }

    pub fn set_state(&mut self, state: impl Into<StateTensor>) {
        self.state = state.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tree;

    #[test]
    fn test_new_requires_state_over_model_spaces() {
        let (a, b) = (KetSpace::qubit(), KetSpace::qubit());
        let state = PureStateTensor::zeros(&[a]).unwrap();
        assert!(QModel::new(Tree::leaf(a), state.clone()).is_ok());
        assert!(matches!(
            QModel::new(Tree::leaf(b), state.clone()),
            Err(TensorError::AxisMismatch)
        ));
        assert!(matches!(
            QModel::new(Tree::flat([a, b]), state),
            Err(TensorError::AxisMismatch)
        ));
    }

    #[test]
    fn test_new_accepts_any_leaf_order_and_rejects_repeats() {
        let (a, b) = (KetSpace::qubit(), KetSpace::qubit());
        let rho = MixedStateTensor::from_pure(&PureStateTensor::zeros(&[a, b]).unwrap()).unwrap();
        let nested = Tree::node([Tree::leaf(b), Tree::flat([a])]);
        let model = QModel::new(nested, rho.clone()).unwrap();
        assert_eq!(model.state().variant_name(), "mixed");
        assert!(matches!(
            QModel::new(Tree::flat([a, b, a]), rho),
            Err(TensorError::DuplicateAxis(_))
        ));
    }
}
