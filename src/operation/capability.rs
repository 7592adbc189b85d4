use crate::core::errors::{OperationError, TensorError};
use crate::core::{
    MixedStateTensor, OperatorTensor, PureStateTensor, QModel, SpaceTree, StateTensor, Tensor, sum,
};
use crate::measure::MeasurementResult;
use crate::operation::{CapabilityRegistry, Op};
use rand::RngCore;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// The behaviors an operation may support, strongest first.
///
/// Rendering as an operator implies every other capability, rendering as a
/// Kraus set implies applying to a mixed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    ToTensor,
    ToKraus,
    ApplyOnPureState,
    ApplyOnMixedState,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 4] = [
        CapabilityKind::ToTensor,
        CapabilityKind::ToKraus,
        CapabilityKind::ApplyOnPureState,
        CapabilityKind::ApplyOnMixedState,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CapabilityKind::ToTensor => "ToTensor",
            CapabilityKind::ToKraus => "ToKraus",
            CapabilityKind::ApplyOnPureState => "ApplyOnPureState",
            CapabilityKind::ApplyOnMixedState => "ApplyOnMixedState",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value an apply produces besides the new state.
#[derive(Clone, Debug, Default)]
pub enum SideEffect {
    #[default]
    None,
    Measurement(MeasurementResult),
}

impl SideEffect {
    pub fn measurement(&self) -> Option<&MeasurementResult> {
        match self {
            SideEffect::Measurement(result) => Some(result),
            SideEffect::None => None,
        }
    }

    pub fn into_measurement(self) -> Option<MeasurementResult> {
        match self {
            SideEffect::Measurement(result) => Some(result),
            SideEffect::None => None,
        }
    }
}

/// Renders an operation of one kind as a single operator.
pub trait TensorImpl: Send + Sync {
    fn to_tensor(
        &self,
        registry: &CapabilityRegistry,
        op: &Op,
        spaces: &SpaceTree,
    ) -> Result<OperatorTensor, OperationError>;
}

/// Renders an operation of one kind as a set of Kraus operators.
pub trait KrausImpl: Send + Sync {
    fn to_kraus(
        &self,
        registry: &CapabilityRegistry,
        op: &Op,
        spaces: &SpaceTree,
    ) -> Result<Vec<OperatorTensor>, OperationError>;
}

/// Applies an operation of one kind to a state vector.
pub trait PureStateImpl: Send + Sync {
    fn apply_on_pure_state_tensor(
        &self,
        registry: &CapabilityRegistry,
        op: &Op,
        spaces: &SpaceTree,
        tensor: &PureStateTensor,
        rng: &mut dyn RngCore,
    ) -> Result<(PureStateTensor, SideEffect), OperationError>;
}

/// Applies an operation of one kind to a density operator.
pub trait MixedStateImpl: Send + Sync {
    fn apply_on_mixed_state_tensor(
        &self,
        registry: &CapabilityRegistry,
        op: &Op,
        spaces: &SpaceTree,
        tensor: &MixedStateTensor,
        rng: &mut dyn RngCore,
    ) -> Result<(MixedStateTensor, SideEffect), OperationError>;
}

/// Delegates every capability to a wrapped operation on relabelled spaces.
pub trait ForwardImpl: Send + Sync {
    fn inner<'a>(&self, op: &'a Op) -> Option<&'a Op>;

    fn map_spaces(&self, op: &Op, spaces: &SpaceTree) -> Result<SpaceTree, OperationError>;
}

/// One registered implementation, tagged by the strongest capability it provides.
#[derive(Clone)]
pub enum Provider {
    Tensor(Arc<dyn TensorImpl>),
    Kraus(Arc<dyn KrausImpl>),
    ApplyOnPureState(Arc<dyn PureStateImpl>),
    ApplyOnMixedState(Arc<dyn MixedStateImpl>),
    Forward(Arc<dyn ForwardImpl>),
}

impl Provider {
    pub fn tensor(imp: impl TensorImpl + 'static) -> Self {
        Provider::Tensor(Arc::new(imp))
    }

    pub fn kraus(imp: impl KrausImpl + 'static) -> Self {
        Provider::Kraus(Arc::new(imp))
    }

    pub fn pure_state(imp: impl PureStateImpl + 'static) -> Self {
        Provider::ApplyOnPureState(Arc::new(imp))
    }

    pub fn mixed_state(imp: impl MixedStateImpl + 'static) -> Self {
        Provider::ApplyOnMixedState(Arc::new(imp))
    }

    pub fn forward(imp: impl ForwardImpl + 'static) -> Self {
        Provider::Forward(Arc::new(imp))
    }

    /// Every capability this provider satisfies, directly or by derivation.
    pub fn satisfies(&self) -> &'static [CapabilityKind] {
        match self {
            Provider::Tensor(_) | Provider::Forward(_) => &CapabilityKind::ALL,
            Provider::Kraus(_) => &[CapabilityKind::ToKraus, CapabilityKind::ApplyOnMixedState],
            Provider::ApplyOnPureState(_) => &[CapabilityKind::ApplyOnPureState],
            Provider::ApplyOnMixedState(_) => &[CapabilityKind::ApplyOnMixedState],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Provider::Tensor(_) => "Tensor",
            Provider::Kraus(_) => "Kraus",
            Provider::ApplyOnPureState(_) => "ApplyOnPureState",
            Provider::ApplyOnMixedState(_) => "ApplyOnMixedState",
            Provider::Forward(_) => "Forward",
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider::{}", self.label())
    }
}

/// The operation a capability ends up evaluating, after following forwards.
#[derive(Clone)]
pub(crate) struct Target<'a> {
    pub(crate) op: &'a Op,
    /// Outermost first.
    pub(crate) remaps: Vec<(&'a Op, &'a dyn ForwardImpl)>,
}

impl Target<'_> {
    fn spaces<'s>(&self, spaces: &'s SpaceTree) -> Result<Cow<'s, SpaceTree>, OperationError> {
        self.remaps
            .iter()
            .try_fold(Cow::Borrowed(spaces), |spaces, (op, forward)| {
                forward.map_spaces(op, &spaces).map(Cow::Owned)
            })
    }
}

/// Render-as-operator, bound to one operation.
#[derive(Clone)]
pub struct ToTensor<'a> {
    pub(crate) registry: &'a CapabilityRegistry,
    pub(crate) target: Target<'a>,
    pub(crate) imp: &'a dyn TensorImpl,
}

impl<'a> ToTensor<'a> {
    /// The operation whose implementation was selected.
    pub fn operation(&self) -> &'a Op {
        self.target.op
    }

    pub fn to_tensor(&self, spaces: &SpaceTree) -> Result<OperatorTensor, OperationError> {
        let spaces = self.target.spaces(spaces)?;
        self.imp.to_tensor(self.registry, self.target.op, &spaces)
    }

    /// The one-element Kraus set holding the rendered operator.
    pub fn to_kraus(&self, spaces: &SpaceTree) -> Result<Vec<OperatorTensor>, OperationError> {
        Ok(vec![self.to_tensor(spaces)?])
    }

    pub fn as_kraus(&self) -> ToKraus<'a> {
        ToKraus {
            registry: self.registry,
            target: self.target.clone(),
            source: KrausSource::Tensor(self.imp),
        }
    }

    pub fn as_pure_state(&self) -> ApplyOnPureState<'a> {
        ApplyOnPureState {
            registry: self.registry,
            target: self.target.clone(),
            source: PureSource::Tensor(self.imp),
        }
    }

    pub fn as_mixed_state(&self) -> ApplyOnMixedState<'a> {
        self.as_kraus().as_mixed_state()
    }
}

#[derive(Clone, Copy)]
pub(crate) enum KrausSource<'a> {
    Tensor(&'a dyn TensorImpl),
    Kraus(&'a dyn KrausImpl),
}

/// Render-as-Kraus-set, bound to one operation.
#[derive(Clone)]
pub struct ToKraus<'a> {
    pub(crate) registry: &'a CapabilityRegistry,
    pub(crate) target: Target<'a>,
    pub(crate) source: KrausSource<'a>,
}

impl<'a> ToKraus<'a> {
    pub fn operation(&self) -> &'a Op {
        self.target.op
    }

    pub fn to_kraus(&self, spaces: &SpaceTree) -> Result<Vec<OperatorTensor>, OperationError> {
        let spaces = self.target.spaces(spaces)?;
        match self.source {
            KrausSource::Tensor(imp) => {
                Ok(vec![imp.to_tensor(self.registry, self.target.op, &spaces)?])
            }
            KrausSource::Kraus(imp) => imp.to_kraus(self.registry, self.target.op, &spaces),
        }
    }

    pub fn as_mixed_state(&self) -> ApplyOnMixedState<'a> {
        ApplyOnMixedState {
            registry: self.registry,
            target: self.target.clone(),
            source: MixedSource::Kraus(self.source),
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) enum PureSource<'a> {
    Tensor(&'a dyn TensorImpl),
    Direct(&'a dyn PureStateImpl),
}

/// Apply-to-pure-state, bound to one operation.
#[derive(Clone)]
pub struct ApplyOnPureState<'a> {
    pub(crate) registry: &'a CapabilityRegistry,
    pub(crate) target: Target<'a>,
    pub(crate) source: PureSource<'a>,
}

impl<'a> ApplyOnPureState<'a> {
    pub fn operation(&self) -> &'a Op {
        self.target.op
    }

    pub fn apply_on_pure_state_tensor(
        &self,
        spaces: &SpaceTree,
        tensor: &PureStateTensor,
        rng: &mut dyn RngCore,
    ) -> Result<(PureStateTensor, SideEffect), OperationError> {
        let spaces = self.target.spaces(spaces)?;
        match self.source {
            PureSource::Tensor(imp) => {
                let operator = imp.to_tensor(self.registry, self.target.op, &spaces)?;
                check_support(operator.tensor(), tensor.tensor())?;
                let applied = operator.tensor().matmul(tensor.tensor())?;
                Ok((PureStateTensor::of(applied), SideEffect::None))
            }
            PureSource::Direct(imp) => {
                imp.apply_on_pure_state_tensor(self.registry, self.target.op, &spaces, tensor, rng)
            }
        }
    }

    /// Applies to the model's state over the model's own spaces and stores the result.
    ///
    /// The model is left untouched when it does not hold a pure state or the apply fails.
    pub fn apply_on_pure_state_model(
        &self,
        model: &mut QModel,
        rng: &mut dyn RngCore,
    ) -> Result<SideEffect, OperationError> {
        let StateTensor::Pure(state) = model.state() else {
            return Err(OperationError::StateVariantMismatch {
                expected: "pure",
                got: model.state().variant_name(),
            });
        };
        let (state, side_effect) = self.apply_on_pure_state_tensor(model.spaces(), state, rng)?;
        model.set_state(state);
        Ok(side_effect)
    }
}

#[derive(Clone, Copy)]
pub(crate) enum MixedSource<'a> {
    Kraus(KrausSource<'a>),
    Direct(&'a dyn MixedStateImpl),
}

/// Apply-to-mixed-state, bound to one operation.
#[derive(Clone)]
pub struct ApplyOnMixedState<'a> {
    pub(crate) registry: &'a CapabilityRegistry,
    pub(crate) target: Target<'a>,
    pub(crate) source: MixedSource<'a>,
}

impl<'a> ApplyOnMixedState<'a> {
    pub fn operation(&self) -> &'a Op {
        self.target.op
    }

    pub fn apply_on_mixed_state_tensor(
        &self,
        spaces: &SpaceTree,
        tensor: &MixedStateTensor,
        rng: &mut dyn RngCore,
    ) -> Result<(MixedStateTensor, SideEffect), OperationError> {
        match self.source {
            MixedSource::Kraus(source) => {
                let kraus = ToKraus {
                    registry: self.registry,
                    target: self.target.clone(),
                    source,
                };
                let ops = kraus.to_kraus(spaces)?;
                Ok((apply_kraus(&ops, tensor)?, SideEffect::None))
            }
            MixedSource::Direct(imp) => {
                let spaces = self.target.spaces(spaces)?;
                imp.apply_on_mixed_state_tensor(self.registry, self.target.op, &spaces, tensor, rng)
            }
        }
    }

    /// Applies to the model's state over the model's own spaces and stores the result.
    ///
    /// The model is left untouched when it does not hold a mixed state or the apply fails.
    pub fn apply_on_mixed_state_model(
        &self,
        model: &mut QModel,
        rng: &mut dyn RngCore,
    ) -> Result<SideEffect, OperationError> {
        let StateTensor::Mixed(state) = model.state() else {
            return Err(OperationError::StateVariantMismatch {
                expected: "mixed",
                got: model.state().variant_name(),
            });
        };
        let (state, side_effect) = self.apply_on_mixed_state_tensor(model.spaces(), state, rng)?;
        model.set_state(state);
        Ok(side_effect)
    }
}

/// ρ' = Σ_k K_k ρ K_k†
pub(crate) fn apply_kraus(
    ops: &[OperatorTensor],
    rho: &MixedStateTensor,
) -> Result<MixedStateTensor, OperationError> {
    if ops.is_empty() {
        return Err(OperationError::InvalidOperand(
            "Kraus set must hold at least one operator".to_string(),
        ));
    }
    let mut terms = Vec::with_capacity(ops.len());
    for k in ops {
        check_support(k.tensor(), rho.tensor())?;
        terms.push(k.tensor().matmul(rho.tensor())?.matmul(k.ct().tensor())?);
    }
    Ok(MixedStateTensor::of(sum(terms)?))
}

/// Fails unless every subsystem `operator` acts on is a subsystem of `state`.
fn check_support(operator: &Tensor, state: &Tensor) -> Result<(), TensorError> {
    let kets = state.kets();
    match operator.bras().into_iter().find(|space| !kets.contains(space)) {
        Some(space) => Err(TensorError::MissingAxis(space.ket().to_string())),
        None => Ok(()),
    }
}

/// A capability resolved by kind.
#[derive(Clone)]
pub enum Capability<'a> {
    ToTensor(ToTensor<'a>),
    ToKraus(ToKraus<'a>),
    ApplyOnPureState(ApplyOnPureState<'a>),
    ApplyOnMixedState(ApplyOnMixedState<'a>),
}

impl Capability<'_> {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::ToTensor(_) => CapabilityKind::ToTensor,
            Capability::ToKraus(_) => CapabilityKind::ToKraus,
            Capability::ApplyOnPureState(_) => CapabilityKind::ApplyOnPureState,
            Capability::ApplyOnMixedState(_) => CapabilityKind::ApplyOnMixedState,
        }
    }
}
