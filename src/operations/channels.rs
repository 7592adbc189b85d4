use crate::core::errors::{OperationError, TensorError};
use crate::core::utils;
use crate::core::{OperatorTensor, SpaceTree};
use crate::operation::{CapabilityRegistry, KrausImpl, OPERATION, Op, OpKind, QOperation};
use crate::operations::operand;
use ndarray::{Array2, array};
use num_complex::Complex64;
use std::any::Any;

pub static KRAUS: OpKind = OpKind::new("KrausOperation", Some(&OPERATION));

/// Quantum channel given by its Kraus operators, ρ ↦ Σ K ρ K†.
#[derive(Clone, Debug)]
pub struct KrausOperation {
    kraus_ops: Vec<Array2<Complex64>>,
    name: Option<String>,
}

impl KrausOperation {
    /// # Errors
    ///
    /// - `InvalidOperand` if the set is empty.
    /// - `NotSquareMatrix` / `DimensionMismatch` if the operators are not square or differ in size.
    /// - `NotComplete` if Σ K†K ≠ I.
    pub fn new(kraus_ops: Vec<Array2<Complex64>>) -> Result<Self, OperationError> {
        let Some(first) = kraus_ops.first() else {
            return Err(OperationError::InvalidOperand(
                "Kraus set must hold at least one operator".to_string(),
            ));
        };

        let (rows, cols) = first.dim();
        if rows != cols {
            return Err(TensorError::NotSquareMatrix.into());
        }

        for op in &kraus_ops {
            if op.dim() != (rows, cols) {
                return Err(OperationError::DimensionMismatch {
                    expected: rows,
                    got: op.nrows(),
                });
            }
        }

        if !utils::check_completeness(&kraus_ops, rows) {
            return Err(OperationError::NotComplete);
        }

        Ok(Self {
            kraus_ops,
            name: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kraus_ops(&self) -> &[Array2<Complex64>] {
        &self.kraus_ops
    }

    /// Side length of each Kraus operator.
    pub fn size(&self) -> usize {
        self.kraus_ops[0].nrows()
    }

    /// Channel applying `self` first and then `other`.
    pub fn compose(&self, other: &KrausOperation) -> Result<KrausOperation, OperationError> {
        if self.size() != other.size() {
            return Err(OperationError::DimensionMismatch {
                expected: self.size(),
                got: other.size(),
            });
        }

        let new_ops = other
            .kraus_ops
            .iter()
            .flat_map(|op_b| self.kraus_ops.iter().map(move |op_a| op_b.dot(op_a)))
            .collect();

        Ok(KrausOperation {
            kraus_ops: new_ops,
            name: None,
        })
    }

    /// Convex combination: `self` with weight 1-p, `other` with weight p.
    pub fn mix(&self, other: &KrausOperation, p: f64) -> Result<KrausOperation, OperationError> {
        if self.size() != other.size() {
            return Err(OperationError::DimensionMismatch {
                expected: self.size(),
                got: other.size(),
            });
        }

        validate_prob(p)?;

        let scale_self = Complex64::new((1.0 - p).sqrt(), 0.0);
        let scale_other = Complex64::new(p.sqrt(), 0.0);

        let kraus_ops = self
            .kraus_ops
            .iter()
            .map(|op| op * scale_self)
            .chain(other.kraus_ops.iter().map(|op| op * scale_other))
            .collect();

        Ok(KrausOperation {
            kraus_ops,
            name: None,
        })
    }

    /// Bit Flip Channel -> X
    pub fn bit_flip(p: f64) -> Result<KrausOperation, OperationError> {
        validate_prob(p)?;

        let p_stay = (1.0 - p).sqrt();
        let p_flip = p.sqrt();

        let k0 = array![
            [Complex64::new(p_stay, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(p_stay, 0.0)]
        ];

        let k1 = array![
            [Complex64::new(0.0, 0.0), Complex64::new(p_flip, 0.0)],
            [Complex64::new(p_flip, 0.0), Complex64::new(0.0, 0.0)]
        ];

        Ok(KrausOperation::new(vec![k0, k1])?.with_name("bit_flip"))
    }

    /// Phase Flip Channel -> Z
    pub fn phase_flip(p: f64) -> Result<KrausOperation, OperationError> {
        validate_prob(p)?;

        let p_stay = (1.0 - p).sqrt();
        let p_flip = p.sqrt();

        let k0 = array![
            [Complex64::new(p_stay, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(p_stay, 0.0)]
        ];

        let k1 = array![
            [Complex64::new(p_flip, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(-p_flip, 0.0)]
        ];

        Ok(KrausOperation::new(vec![k0, k1])?.with_name("phase_flip"))
    }

    /// Depolarizing Channel, p is the total error probability.
    pub fn depolarizing(p: f64) -> Result<KrausOperation, OperationError> {
        validate_prob(p)?;

        let weight_i = (1.0 - 0.75 * p).sqrt();
        let weight_xyz = (p / 4.0).sqrt();

        let k0 = array![
            // ~ I
            [Complex64::new(weight_i, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(weight_i, 0.0)]
        ];

        let k1 = array![
            // ~ X
            [Complex64::new(0.0, 0.0), Complex64::new(weight_xyz, 0.0)],
            [Complex64::new(weight_xyz, 0.0), Complex64::new(0.0, 0.0)]
        ];

        let k2 = array![
            // ~ Y
            [Complex64::new(0.0, 0.0), Complex64::new(0.0, -weight_xyz)],
            [Complex64::new(0.0, weight_xyz), Complex64::new(0.0, 0.0)]
        ];

        let k3 = array![
            // ~ Z
            [Complex64::new(weight_xyz, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(-weight_xyz, 0.0)]
        ];

        Ok(KrausOperation::new(vec![k0, k1, k2, k3])?.with_name("depolarizing"))
    }

    /// Amplitude Damping -> T1 relaxation
    pub fn amplitude_damping(gamma: f64) -> Result<KrausOperation, OperationError> {
        validate_prob(gamma)?;

        let g_sqrt = gamma.sqrt();
        let one_minus_g_sqrt = (1.0 - gamma).sqrt();

        let k0 = array![
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(one_minus_g_sqrt, 0.0)]
        ];

        let k1 = array![
            [Complex64::new(0.0, 0.0), Complex64::new(g_sqrt, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)]
        ];

        Ok(KrausOperation::new(vec![k0, k1])?.with_name("amplitude_damping"))
    }

    /// Phase Damping -> T2 relaxation
    pub fn phase_damping(lambda: f64) -> Result<KrausOperation, OperationError> {
        validate_prob(lambda)?;

        let sqrt_one_minus_lambda = (1.0 - lambda).sqrt();
        let sqrt_lambda = lambda.sqrt();

        let k0 = array![
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(sqrt_one_minus_lambda, 0.0)]
        ];

        let k1 = array![
            [Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(sqrt_lambda, 0.0)]
        ];

        Ok(KrausOperation::new(vec![k0, k1])?.with_name("phase_damping"))
    }
}

impl QOperation for KrausOperation {
    fn kind(&self) -> &'static OpKind {
        &KRAUS
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Validate probability parameter
fn validate_prob(p: f64) -> Result<(), OperationError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(OperationError::InvalidProbability(p));
    }
    Ok(())
}

/// Renders each Kraus matrix over the flattened target spaces.
pub struct KrausToKraus;

impl KrausImpl for KrausToKraus {
    fn to_kraus(
        &self,
        _registry: &CapabilityRegistry,
        op: &Op,
        spaces: &SpaceTree,
    ) -> Result<Vec<OperatorTensor>, OperationError> {
        let channel = operand::<KrausOperation>(op)?;
        let spaces = spaces.flatten();
        let size: usize = spaces.iter().map(|s| s.dim()).product();
        if size != channel.size() {
            return Err(OperationError::DimensionMismatch {
                expected: channel.size(),
                got: size,
            });
        }
        channel
            .kraus_ops
            .iter()
            .map(|k| OperatorTensor::from_matrix(k, &spaces).map_err(OperationError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KetSpace, MixedStateTensor, Tree};
    use crate::operation::{CapabilityKind, IntoOp};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_incomplete_set_fails() {
        let k = Array2::<Complex64>::eye(2) * Complex64::new(0.5, 0.0);
        assert!(matches!(KrausOperation::new(vec![k]), Err(OperationError::NotComplete)));
        assert!(matches!(
            KrausOperation::new(vec![]),
            Err(OperationError::InvalidOperand(_))
        ));
    }

    #[test]
    fn test_invalid_probability() {
        assert!(matches!(
            KrausOperation::bit_flip(1.5),
            Err(OperationError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_library_channels_are_complete() {
        for channel in [
            KrausOperation::bit_flip(0.3),
            KrausOperation::phase_flip(0.2),
            KrausOperation::depolarizing(0.5),
            KrausOperation::amplitude_damping(0.7),
            KrausOperation::phase_damping(0.1),
        ] {
            let channel = channel.unwrap();
            assert!(utils::check_completeness(channel.kraus_ops(), 2));
        }
    }

    #[test]
    fn test_compose_and_mix_stay_complete() {
        let a = KrausOperation::bit_flip(0.3).unwrap();
        let b = KrausOperation::phase_flip(0.4).unwrap();
        let composed = a.compose(&b).unwrap();
        assert_eq!(composed.kraus_ops().len(), 4);
        assert!(utils::check_completeness(composed.kraus_ops(), 2));
        let mixed = a.mix(&b, 0.25).unwrap();
        assert!(utils::check_completeness(mixed.kraus_ops(), 2));
    }

    #[test]
    fn test_kraus_only_capabilities() {
        let registry = CapabilityRegistry::standard();
        let op = KrausOperation::bit_flip(0.1).unwrap().into_op();
        assert!(registry.supports(&op, CapabilityKind::ToKraus));
        assert!(registry.supports(&op, CapabilityKind::ApplyOnMixedState));
        assert!(!registry.supports(&op, CapabilityKind::ToTensor));
        assert!(!registry.supports(&op, CapabilityKind::ApplyOnPureState));
    }

    #[test]
    fn test_amplitude_damping_on_excited_state() {
        let registry = CapabilityRegistry::standard();
        let op = KrausOperation::amplitude_damping(0.25).unwrap().into_op();
        let q = KetSpace::qubit();
        let rho = MixedStateTensor::from_pure(&q.eigenstate(1).unwrap()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let (out, _) = registry
            .apply_on_mixed_state(&op)
            .unwrap()
            .apply_on_mixed_state_tensor(&Tree::leaf(q), &rho, &mut rng)
            .unwrap();
        let m = out.to_matrix(&[q]).unwrap();
        assert_abs_diff_eq!(m[[0, 0]].re, 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(m[[1, 1]].re, 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(out.norm().unwrap(), 1.0, epsilon = 1e-12);
    }
}
