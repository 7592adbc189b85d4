use crate::core::errors::OperationError;
use crate::core::{KetSpace, SpaceTree, Tree};
use crate::operation::{ForwardImpl, OPERATION, Op, OpKind, QOperation, downcast};
use crate::operations::operand;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub static REMAPPED: OpKind = OpKind::new("RemappedOperation", Some(&OPERATION));

/// Relabels the Space-tree an operation is given before the original sees it.
pub type SpaceMapping = Arc<dyn Fn(&SpaceTree) -> Result<SpaceTree, OperationError> + Send + Sync>;

/// `original` evaluated on `mapping(spaces)`.
///
/// Every capability of the original is available on the remapped operation,
/// so a remapped measurement still measures and a remapped Kraus channel is
/// still only a channel.
#[derive(Clone)]
pub struct RemappedOperation {
    original: Op,
    mapping: SpaceMapping,
    name: Option<String>,
}

impl RemappedOperation {
    pub fn new(
        original: Op,
        mapping: impl Fn(&SpaceTree) -> Result<SpaceTree, OperationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            original,
            mapping: Arc::new(mapping),
            name: None,
        }
    }

    /// Picks the leaves at `indices` (in depth-first order) and hands them to
    /// `original` as a flat tree.
    pub fn select(original: Op, indices: Vec<usize>) -> Self {
        Self::new(original, move |spaces: &SpaceTree| {
            let leaves: Vec<KetSpace> = spaces.flatten();
            let picked = indices
                .iter()
                .map(|&i| {
                    leaves.get(i).copied().ok_or_else(|| {
                        OperationError::InvalidOperand(format!(
                            "index {i} is out of range for {} spaces",
                            leaves.len()
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Tree::flat(picked))
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn original(&self) -> &Op {
        &self.original
    }

    pub fn map_spaces(&self, spaces: &SpaceTree) -> Result<SpaceTree, OperationError> {
        (self.mapping)(spaces)
    }
}

impl fmt::Debug for RemappedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemappedOperation")
            .field("original", &self.original)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl QOperation for RemappedOperation {
    fn kind(&self) -> &'static OpKind {
        &REMAPPED
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Hands every capability request to the original operation.
pub struct RemappedForward;

impl ForwardImpl for RemappedForward {
    fn inner<'a>(&self, op: &'a Op) -> Option<&'a Op> {
        downcast::<RemappedOperation>(op.as_ref()).map(RemappedOperation::original)
    }

    fn map_spaces(&self, op: &Op, spaces: &SpaceTree) -> Result<SpaceTree, OperationError> {
        operand::<RemappedOperation>(op)?.map_spaces(spaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PureStateTensor;
    use crate::measure::ProjectiveMeasurement;
    use crate::operation::{CapabilityKind, CapabilityRegistry, IntoOp};
    use crate::operations::{KrausOperation, gates};
    use num_complex::Complex64;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn reversed(spaces: &SpaceTree) -> Result<SpaceTree, OperationError> {
        let mut leaves = spaces.flatten();
        leaves.reverse();
        Ok(Tree::flat(leaves))
    }

    #[test]
    fn test_remapped_renders_original_on_mapped_spaces() {
        let registry = CapabilityRegistry::standard();
        let (a, b) = (KetSpace::qubit(), KetSpace::qubit());
        let cx = gates::cx().into_op();
        let remapped = RemappedOperation::new(cx.clone(), reversed).into_op();

        let direct = registry
            .to_tensor(&cx)
            .unwrap()
            .to_tensor(&Tree::node([Tree::leaf(b), Tree::leaf(a)]))
            .unwrap();
        let via_remap = registry
            .to_tensor(&remapped)
            .unwrap()
            .to_tensor(&Tree::node([Tree::leaf(a), Tree::leaf(b)]))
            .unwrap();
        assert_eq!(
            direct.to_matrix(&[a, b]).unwrap(),
            via_remap.to_matrix(&[a, b]).unwrap()
        );
    }

    #[test]
    fn test_remapped_follows_original_capabilities() {
        let registry = CapabilityRegistry::standard();
        let bit_flip = KrausOperation::bit_flip(0.2).unwrap().into_op();
        let channel = RemappedOperation::new(bit_flip, reversed).into_op();
        assert!(registry.supports(&channel, CapabilityKind::ApplyOnMixedState));
        assert!(!registry.supports(&channel, CapabilityKind::ToTensor));

        let measure = ProjectiveMeasurement::new().into_op();
        let measure = RemappedOperation::new(measure, reversed).into_op();
        assert!(registry.supports(&measure, CapabilityKind::ApplyOnPureState));
        assert!(!registry.supports(&measure, CapabilityKind::ToKraus));
    }

    #[test]
    fn test_select_picks_subsystems() {
        let registry = CapabilityRegistry::standard();
        let spaces: Vec<KetSpace> = (0..3).map(|_| KetSpace::qubit()).collect();
        let op = RemappedOperation::select(gates::x().into_op(), vec![2]).into_op();
        let state = PureStateTensor::zeros(&spaces).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let (out, _) = registry
            .apply_on_pure_state(&op)
            .unwrap()
            .apply_on_pure_state_tensor(&Tree::flat(spaces.clone()), &state, &mut rng)
            .unwrap();
        let v = out.to_vector(&spaces).unwrap();
        assert_eq!(v[1], Complex64::new(1.0, 0.0));
        assert_eq!(v[0], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_select_out_of_range() {
        let registry = CapabilityRegistry::standard();
        let q = KetSpace::qubit();
        let op = RemappedOperation::select(gates::x().into_op(), vec![3]).into_op();
        let result = registry.to_tensor(&op).unwrap().to_tensor(&Tree::leaf(q));
        assert!(matches!(result, Err(OperationError::InvalidOperand(_))));
    }

    #[test]
    fn test_nested_remaps_compose() {
        let registry = CapabilityRegistry::standard();
        let (a, b) = (KetSpace::qubit(), KetSpace::qubit());
        let inner = RemappedOperation::new(gates::cx().into_op(), reversed).into_op();
        let outer = RemappedOperation::new(inner, reversed).into_op();
        let spaces = Tree::node([Tree::leaf(a), Tree::leaf(b)]);
        let twice = registry.to_tensor(&outer).unwrap().to_tensor(&spaces).unwrap();
        let plain = registry
            .to_tensor(&gates::cx().into_op())
            .unwrap()
            .to_tensor(&spaces)
            .unwrap();
        assert_eq!(twice.to_matrix(&[a, b]).unwrap(), plain.to_matrix(&[a, b]).unwrap());
    }
}
