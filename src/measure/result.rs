use crate::core::Tree;
use crate::operation::Op;

/// Record of one sampled measurement outcome.
#[derive(Clone, Debug)]
pub struct MeasurementResult {
    /// Observed basis value of each measured space, shaped like the target Space-tree.
    pub values: Tree<usize>,
    /// Normalized probability of this outcome before collapse.
    pub probability: f64,
    /// The measurement that produced it.
    pub operation: Op,
}
