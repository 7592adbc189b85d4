use crate::core::errors::OperationError;
use crate::core::utils;
use crate::core::{
    KetSpace, MixedStateTensor, PureStateTensor, SpaceAxis, SpaceTree, StateTensor, Tensor, Tree,
    prod,
};
use crate::measure::MeasurementResult;
use crate::operation::{
    CapabilityRegistry, MixedStateImpl, OPERATION, Op, OpKind, PureStateImpl, QOperation,
    SideEffect,
};
use rand::{Rng, RngCore};
use std::any::Any;
use tracing::debug;

pub static MEASUREMENT: OpKind = OpKind::new("Measurement", Some(&OPERATION));
pub static PROJECTIVE_MEASUREMENT: OpKind =
    OpKind::new("ProjectiveMeasurement", Some(&MEASUREMENT));

/// Measures every target space in its computational basis.
///
/// Applying it samples one outcome with Born-rule probability, collapses the
/// state onto that outcome and reports it as a [`MeasurementResult`].
/// It has no operator form and no Kraus form.
#[derive(Clone, Debug, Default)]
pub struct ProjectiveMeasurement {
    name: Option<String>,
}

impl ProjectiveMeasurement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl QOperation for ProjectiveMeasurement {
    fn kind(&self) -> &'static OpKind {
        &PROJECTIVE_MEASUREMENT
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One basis assignment of the measured spaces and the part of the state it selects.
struct Case {
    values: Vec<usize>,
    component: Tensor,
    probability: f64,
}

fn measured_spaces(spaces: &SpaceTree) -> Result<Vec<KetSpace>, OperationError> {
    let measured = spaces.flatten();
    if let Some(dup) = utils::find_duplicate(&measured) {
        return Err(OperationError::InvalidOperand(format!(
            "space {dup} is measured more than once"
        )));
    }
    Ok(measured)
}

/// Every basis assignment of `spaces`, the last space varying fastest.
fn assignments(spaces: &[KetSpace]) -> Vec<Vec<usize>> {
    spaces.iter().fold(vec![Vec::new()], |prefixes, space| {
        prefixes
            .into_iter()
            .flat_map(|prefix| {
                (0..space.dim()).map(move |value| {
                    let mut next = prefix.clone();
                    next.push(value);
                    next
                })
            })
            .collect()
    })
}

fn pure_cases(state: &PureStateTensor, spaces: &[KetSpace]) -> Result<Vec<Case>, OperationError> {
    assignments(spaces)
        .into_iter()
        .map(|values| {
            let fixes: Vec<(SpaceAxis, usize)> =
                spaces.iter().zip(&values).map(|(s, &v)| (s.ket(), v)).collect();
            let component = state.tensor().slice(&fixes)?;
            let probability = component.norm_sqr();
            Ok::<_, OperationError>(Case {
                values,
                component,
                probability,
            })
        })
        .collect()
}

fn mixed_cases(state: &MixedStateTensor, spaces: &[KetSpace]) -> Result<Vec<Case>, OperationError> {
    assignments(spaces)
        .into_iter()
        .map(|values| {
            let fixes: Vec<(SpaceAxis, usize)> = spaces
                .iter()
                .zip(&values)
                .flat_map(|(s, &v)| [(s.ket(), v), (s.ct(), v)])
                .collect();
            let component = state.tensor().slice(&fixes)?;
            let probability = component.trace()?.re.max(0.0);
            Ok::<_, OperationError>(Case {
                values,
                component,
                probability,
            })
        })
        .collect()
}

/// Due to float, renormalization of probabilities to ensure completeness
fn renormalize(cases: &mut [Case]) -> Result<(), OperationError> {
    let total: f64 = cases.iter().map(|c| c.probability).sum();
    if total.is_nan() || total <= 0.0 {
        return Err(OperationError::VanishingState);
    }
    for case in cases {
        case.probability /= total;
    }
    Ok(())
}

/// Randomly selects an index weighted by `probs`.
fn pick_outcome(probs: &[f64], rng: &mut dyn RngCore) -> usize {
    let roll: f64 = rng.random();

    let mut cumulative = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumulative += p;
        if roll < cumulative {
            return i;
        }
    }
    // rounding left the roll past the last bucket
    probs.iter().rposition(|&p| p > 0.0).unwrap_or(0)
}

fn sample(mut cases: Vec<Case>, rng: &mut dyn RngCore) -> Result<Case, OperationError> {
    renormalize(&mut cases)?;
    let probs: Vec<f64> = cases.iter().map(|c| c.probability).collect();
    let index = pick_outcome(&probs, rng);
    let case = cases.swap_remove(index);
    debug!(
        outcomes = probs.len(),
        values = ?case.values,
        probability = case.probability,
        "sampled measurement outcome"
    );
    Ok(case)
}

/// Product basis ket |v0 v1 ...⟩ over `spaces`.
fn basis_ket(spaces: &[KetSpace], values: &[usize]) -> Result<Tensor, OperationError> {
    let kets = spaces
        .iter()
        .zip(values)
        .map(|(s, &v)| s.eigenstate(v).map(PureStateTensor::into_tensor))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(prod(kets)?)
}

/// Probability of every outcome of measuring `spaces`, without sampling.
///
/// Outcomes are listed with the last measured space varying fastest and
/// their probabilities sum to one.
///
/// # Errors
///
/// Returns `OperationError::VanishingState` if every outcome has zero weight.
pub fn outcome_probabilities(
    state: &StateTensor,
    spaces: &SpaceTree,
) -> Result<Vec<(Tree<usize>, f64)>, OperationError> {
    let measured = measured_spaces(spaces)?;
    let mut cases = match state {
        StateTensor::Pure(state) => pure_cases(state, &measured)?,
        StateTensor::Mixed(state) => mixed_cases(state, &measured)?,
    };
    renormalize(&mut cases)?;
    cases
        .into_iter()
        .map(|case| Ok::<_, OperationError>((spaces.restore(case.values)?, case.probability)))
        .collect()
}

/// Collapses pure and mixed states for [`ProjectiveMeasurement`].
pub struct ProjectiveMeasure;

impl ProjectiveMeasure {
    fn result(
        op: &Op,
        spaces: &SpaceTree,
        case: &Case,
    ) -> Result<MeasurementResult, OperationError> {
        Ok(MeasurementResult {
            values: spaces.restore(case.values.iter().copied())?,
            probability: case.probability,
            operation: op.clone(),
        })
    }
}

impl PureStateImpl for ProjectiveMeasure {
    fn apply_on_pure_state_tensor(
        &self,
        _registry: &CapabilityRegistry,
        op: &Op,
        spaces: &SpaceTree,
        tensor: &PureStateTensor,
        rng: &mut dyn RngCore,
    ) -> Result<(PureStateTensor, SideEffect), OperationError> {
        let measured = measured_spaces(spaces)?;
        let case = sample(pure_cases(tensor, &measured)?, rng)?;

        // |v⟩ ⊗ normalized remainder
        let ket = basis_ket(&measured, &case.values)?;
        let component = PureStateTensor::of(case.component.clone()).normalize();
        let collapsed = PureStateTensor::of(ket.matmul(component.tensor())?);

        let result = Self::result(op, spaces, &case)?;
        Ok((collapsed, SideEffect::Measurement(result)))
    }
}

impl MixedStateImpl for ProjectiveMeasure {
    fn apply_on_mixed_state_tensor(
        &self,
        _registry: &CapabilityRegistry,
        op: &Op,
        spaces: &SpaceTree,
        tensor: &MixedStateTensor,
        rng: &mut dyn RngCore,
    ) -> Result<(MixedStateTensor, SideEffect), OperationError> {
        let measured = measured_spaces(spaces)?;
        let case = sample(mixed_cases(tensor, &measured)?, rng)?;

        // |v⟩ ⊗ normalized remainder ⊗ ⟨v|
        let ket = basis_ket(&measured, &case.values)?;
        let component = MixedStateTensor::of(case.component.clone()).normalize()?;
        let collapsed = ket.matmul(component.tensor())?.matmul(&ket.ct())?;

        let result = Self::result(op, spaces, &case)?;
        Ok((MixedStateTensor::of(collapsed), SideEffect::Measurement(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::IntoOp;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use num_complex::Complex64;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn c(re: f64) -> Complex64 {
        Complex64::new(re, 0.0)
    }

    #[test]
    fn test_assignments_order() {
        let (a, b) = (KetSpace::qubit(), KetSpace::new(3));
        let all = assignments(&[a, b]);
        assert_eq!(all.len(), 6);
        assert_eq!(all[0], vec![0, 0]);
        assert_eq!(all[1], vec![0, 1]);
        assert_eq!(all[5], vec![1, 2]);
        assert_eq!(assignments(&[]), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_pick_outcome_skips_zero_weight() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(pick_outcome(&[0.0, 1.0, 0.0], &mut rng), 1);
        }
    }

    #[test]
    fn test_probabilities_of_bell_pair() {
        let (a, b) = (KetSpace::qubit(), KetSpace::qubit());
        let r = 1.0 / 2.0_f64.sqrt();
        let bell = array![c(r), c(0.0), c(0.0), c(r)];
        let state = PureStateTensor::from_vector(&bell, &[a, b]).unwrap();
        let table = outcome_probabilities(&state.into(), &Tree::flat([a, b])).unwrap();
        let probs: Vec<f64> = table.iter().map(|(_, p)| *p).collect();
        assert_abs_diff_eq!(probs[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(probs[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(probs[2], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(probs[3], 0.5, epsilon = 1e-12);
        assert_eq!(table[3].0, Tree::flat([1, 1]));
    }

    #[test]
    fn test_partial_measurement_collapses_pure_state() {
        let registry = CapabilityRegistry::standard();
        let (a, b) = (KetSpace::qubit(), KetSpace::qubit());
        let r = 1.0 / 2.0_f64.sqrt();
        let bell = array![c(r), c(0.0), c(0.0), c(r)];
        let state = PureStateTensor::from_vector(&bell, &[a, b]).unwrap();
        let op = ProjectiveMeasurement::new().into_op();
        let mut rng = StdRng::seed_from_u64(11);
        let (collapsed, effect) = registry
            .apply_on_pure_state(&op)
            .unwrap()
            .apply_on_pure_state_tensor(&Tree::leaf(a), &state, &mut rng)
            .unwrap();
        let result = effect.into_measurement().unwrap();
        let Tree::Leaf(v) = result.values else {
            panic!("leaf target yields a leaf value");
        };
        assert_abs_diff_eq!(result.probability, 0.5, epsilon = 1e-12);
        let vector = collapsed.to_vector(&[a, b]).unwrap();
        let hit = if v == 0 { 0 } else { 3 };
        assert_abs_diff_eq!(vector[hit].norm(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(collapsed.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mixed_measurement_collapses() {
        let registry = CapabilityRegistry::standard();
        let q = KetSpace::qubit();
        let matrix = array![[c(0.25), c(0.1)], [c(0.1), c(0.75)]];
        let rho = MixedStateTensor::from_matrix(&matrix, &[q]).unwrap();
        let op = ProjectiveMeasurement::new().into_op();
        let mut rng = StdRng::seed_from_u64(5);
        let (collapsed, effect) = registry
            .apply_on_mixed_state(&op)
            .unwrap()
            .apply_on_mixed_state_tensor(&Tree::leaf(q), &rho, &mut rng)
            .unwrap();
        let result = effect.into_measurement().unwrap();
        let v = result.values.flatten()[0];
        let expected = if v == 0 { 0.25 } else { 0.75 };
        assert_abs_diff_eq!(result.probability, expected, epsilon = 1e-12);
        let m = collapsed.to_matrix(&[q]).unwrap();
        assert_abs_diff_eq!(m[[v, v]].re, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m[[0, 1]].norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vanishing_state() {
        let q = KetSpace::qubit();
        let zero = PureStateTensor::of(q.eigenstate(0).unwrap().tensor().scale(c(0.0)));
        assert!(matches!(
            outcome_probabilities(&zero.into(), &Tree::leaf(q)),
            Err(OperationError::VanishingState)
        ));
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let q = KetSpace::qubit();
        let state = q.eigenstate(0).unwrap();
        assert!(matches!(
            outcome_probabilities(&state.into(), &Tree::flat([q, q])),
            Err(OperationError::InvalidOperand(_))
        ));
    }
}
