use crate::core::errors::{OperationError, RegistryError};
use crate::core::{QModel, StateTensor};
use crate::measure::{PROJECTIVE_MEASUREMENT, ProjectiveMeasure};
use crate::operation::capability::{
    ApplyOnMixedState, ApplyOnPureState, Capability, CapabilityKind, KrausSource, MixedSource,
    Provider, PureSource, SideEffect, Target, ToKraus, ToTensor,
};
use crate::operation::{OPERATION, Op, OpKind, QOperation};
use crate::operations::{
    CONTROLLED, ControlledToTensor, KRAUS, KrausToKraus, MATRIX, MatrixToTensor, REMAPPED,
    RemappedForward, SEQUENTIAL, SequentialToTensor,
};
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Collects provider registrations and rejects equally specific duplicates.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    direct: HashMap<&'static OpKind, Vec<Provider>>,
    declared: HashSet<&'static OpKind>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` for operations of `kind` and all its specializations.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Ambiguous` if a provider already registered for
    /// exactly this kind satisfies one of the same capabilities.
    pub fn register(
        &mut self,
        kind: &'static OpKind,
        provider: Provider,
    ) -> Result<&mut Self, RegistryError> {
        let existing = self.direct.entry(kind).or_default();
        for capability in provider.satisfies() {
            if existing.iter().any(|p| p.satisfies().contains(capability)) {
                return Err(RegistryError::Ambiguous {
                    kind: kind.name(),
                    capability: capability.name(),
                });
            }
        }
        existing.push(provider);
        Ok(self)
    }

    /// Makes `kind` known to the registry so its lookups are precomputed.
    pub fn declare(&mut self, kind: &'static OpKind) -> &mut Self {
        self.declared.insert(kind);
        self
    }

    /// Resolves every known kind against every capability once.
    pub fn build(&self) -> CapabilityRegistry {
        let known: HashSet<&'static OpKind> = self
            .direct
            .keys()
            .chain(&self.declared)
            .chain(std::iter::once(&&OPERATION))
            .flat_map(|kind| kind.ancestors())
            .collect();

        let mut resolved = HashMap::new();
        for &kind in &known {
            for capability in CapabilityKind::ALL {
                let found = kind.ancestors().find_map(|ancestor| {
                    self.direct
                        .get(ancestor)?
                        .iter()
                        .find(|p| p.satisfies().contains(&capability))
                        .map(|p| (ancestor, p.clone()))
                });
                if let Some((bound, provider)) = found {
                    trace!(
                        kind = kind.name(),
                        capability = capability.name(),
                        bound = bound.name(),
                        ?provider,
                        "resolved capability"
                    );
                    resolved.insert((kind, capability), provider);
                }
            }
        }

        debug!(
            kinds = known.len(),
            entries = resolved.len(),
            "built capability registry"
        );
        CapabilityRegistry { known, resolved }
    }
}

/// Lookup table from (operation kind, capability) to the most specific provider.
#[derive(Debug)]
pub struct CapabilityRegistry {
    known: HashSet<&'static OpKind>,
    resolved: HashMap<(&'static OpKind, CapabilityKind), Provider>,
}

impl CapabilityRegistry {
    /// Builder preloaded with the providers for every operation this crate defines.
    pub fn standard_builder() -> RegistryBuilder {
        let mut builder = RegistryBuilder::new();
        builder
            .register(&MATRIX, Provider::tensor(MatrixToTensor))
            .and_then(|b| b.register(&SEQUENTIAL, Provider::tensor(SequentialToTensor)))
            .and_then(|b| b.register(&CONTROLLED, Provider::tensor(ControlledToTensor)))
            .and_then(|b| b.register(&REMAPPED, Provider::forward(RemappedForward)))
            .and_then(|b| b.register(&KRAUS, Provider::kraus(KrausToKraus)))
            .and_then(|b| {
                b.register(&PROJECTIVE_MEASUREMENT, Provider::pure_state(ProjectiveMeasure))
            })
            .and_then(|b| {
                b.register(&PROJECTIVE_MEASUREMENT, Provider::mixed_state(ProjectiveMeasure))
            })
            .expect("built-in providers are registered on distinct kinds");
        builder
    }

    /// Process-wide registry holding the built-in providers.
    pub fn standard() -> &'static CapabilityRegistry {
        static STANDARD: OnceLock<CapabilityRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| Self::standard_builder().build())
    }

    fn lookup(
        &self,
        op: &dyn QOperation,
        capability: CapabilityKind,
    ) -> Result<&Provider, OperationError> {
        op.kind()
            .ancestors()
            .find(|kind| self.known.contains(kind))
            .and_then(|kind| self.resolved.get(&(kind, capability)))
            .ok_or_else(|| OperationError::UnsupportedCapability {
                operation: op.to_string(),
                capability: capability.name(),
            })
    }

    /// Follows forwarding providers down to the operation that implements `capability`.
    fn bind<'a>(
        &'a self,
        op: &'a Op,
        capability: CapabilityKind,
    ) -> Result<(Target<'a>, &'a Provider), OperationError> {
        let mut remaps = Vec::new();
        let mut current = op;
        loop {
            let provider = self.lookup(current.as_ref(), capability)?;
            trace!(operation = %current, capability = capability.name(), ?provider, "bind");
            match provider {
                Provider::Forward(forward) => {
                    let inner = forward.inner(current).ok_or_else(|| {
                        OperationError::InvalidOperand(format!(
                            "{current} does not wrap an operation"
                        ))
                    })?;
                    remaps.push((current, forward.as_ref()));
                    current = inner;
                }
                provider => return Ok((Target { op: current, remaps }, provider)),
            }
        }
    }

    fn unsupported(op: &Op, capability: CapabilityKind) -> OperationError {
        OperationError::UnsupportedCapability {
            operation: op.to_string(),
            capability: capability.name(),
        }
    }

    /// Whether `op` resolves to an implementation of `capability`.
    pub fn supports(&self, op: &Op, capability: CapabilityKind) -> bool {
        self.bind(op, capability).is_ok()
    }

    /// Binds render-as-operator for `op`.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::UnsupportedCapability` when no provider on the
    /// kind's ancestry can render `op` as a single operator.
    pub fn to_tensor<'a>(&'a self, op: &'a Op) -> Result<ToTensor<'a>, OperationError> {
        match self.bind(op, CapabilityKind::ToTensor)? {
            (target, Provider::Tensor(imp)) => Ok(ToTensor {
                registry: self,
                target,
                imp: imp.as_ref(),
            }),
            (target, _) => Err(Self::unsupported(target.op, CapabilityKind::ToTensor)),
        }
    }

    /// Binds render-as-Kraus-set for `op`, derived from render-as-operator when
    /// that is the nearest provider.
    pub fn to_kraus<'a>(&'a self, op: &'a Op) -> Result<ToKraus<'a>, OperationError> {
        let (target, provider) = self.bind(op, CapabilityKind::ToKraus)?;
        let source = match provider {
            Provider::Tensor(imp) => KrausSource::Tensor(imp.as_ref()),
            Provider::Kraus(imp) => KrausSource::Kraus(imp.as_ref()),
            _ => return Err(Self::unsupported(target.op, CapabilityKind::ToKraus)),
        };
        Ok(ToKraus {
            registry: self,
            target,
            source,
        })
    }

    pub fn apply_on_pure_state<'a>(
        &'a self,
        op: &'a Op,
    ) -> Result<ApplyOnPureState<'a>, OperationError> {
        let (target, provider) = self.bind(op, CapabilityKind::ApplyOnPureState)?;
        let source = match provider {
            Provider::Tensor(imp) => PureSource::Tensor(imp.as_ref()),
            Provider::ApplyOnPureState(imp) => PureSource::Direct(imp.as_ref()),
            _ => return Err(Self::unsupported(target.op, CapabilityKind::ApplyOnPureState)),
        };
        Ok(ApplyOnPureState {
            registry: self,
            target,
            source,
        })
    }

    /// Binds apply-to-mixed-state for `op`.
    ///
    /// # Arguments
    ///
    /// * `op` - The operation to bind. Forwarding wrappers are followed down
    ///   to the operation that provides the behavior.
    ///
    /// # Returns
    ///
    /// A bound capability that sums the Kraus terms when `op` renders as an
    /// operator or a Kraus set, and calls the direct implementation otherwise.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::UnsupportedCapability` if nothing on the kind's
    /// ancestry can act on a density operator.
    pub fn apply_on_mixed_state<'a>(
        &'a self,
        op: &'a Op,
    ) -> Result<ApplyOnMixedState<'a>, OperationError> {
        let (target, provider) = self.bind(op, CapabilityKind::ApplyOnMixedState)?;
        let source = match provider {
            Provider::Tensor(imp) => MixedSource::Kraus(KrausSource::Tensor(imp.as_ref())),
            Provider::Kraus(imp) => MixedSource::Kraus(KrausSource::Kraus(imp.as_ref())),
            Provider::ApplyOnMixedState(imp) => MixedSource::Direct(imp.as_ref()),
            _ => return Err(Self::unsupported(target.op, CapabilityKind::ApplyOnMixedState)),
        };
        Ok(ApplyOnMixedState {
            registry: self,
            target,
            source,
        })
    }

    /// Resolves `capability` for `op`.
    pub fn capability<'a>(
        &'a self,
        op: &'a Op,
        capability: CapabilityKind,
    ) -> Result<Capability<'a>, OperationError> {
        Ok(match capability {
            CapabilityKind::ToTensor => Capability::ToTensor(self.to_tensor(op)?),
            CapabilityKind::ToKraus => Capability::ToKraus(self.to_kraus(op)?),
            CapabilityKind::ApplyOnPureState => {
                Capability::ApplyOnPureState(self.apply_on_pure_state(op)?)
            }
            CapabilityKind::ApplyOnMixedState => {
                Capability::ApplyOnMixedState(self.apply_on_mixed_state(op)?)
            }
        })
    }

    /// Applies `op` to the model with whichever apply capability matches its state.
    ///
    /// # Arguments
    ///
    /// * `op` - The operation to apply.
    /// * `model` - The model whose state is replaced on success.
    /// * `rng` - Random source for operations that sample, such as measurements.
    ///
    /// # Returns
    ///
    /// The side effect reported by the operation.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::UnsupportedCapability` if `op` cannot act on the
    /// model's state variant, or any error raised while applying it. The model
    /// is unchanged on error.
    pub fn apply_on_model(
        &self,
        op: &Op,
        model: &mut QModel,
        rng: &mut dyn RngCore,
    ) -> Result<SideEffect, OperationError> {
        match model.state() {
            StateTensor::Pure(_) => self
                .apply_on_pure_state(op)?
                .apply_on_pure_state_model(model, rng),
            StateTensor::Mixed(_) => self
                .apply_on_mixed_state(op)?
                .apply_on_mixed_state_model(model, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::RegistryError;
    use crate::measure::{MEASUREMENT, ProjectiveMeasurement};
    use crate::operation::IntoOp;
    use crate::operations::{KrausOperation, QUBITS_MATRIX, gates};

    #[test]
    fn test_standard_registry_resolves_builtins() {
        let registry = CapabilityRegistry::standard();
        let gate = gates::h().into_op();
        let channel = KrausOperation::phase_flip(0.5).unwrap().into_op();
        let measure = ProjectiveMeasurement::new().into_op();

        let table = [
            (&gate, [true, true, true, true]),
            (&channel, [false, true, false, true]),
            (&measure, [false, false, true, true]),
        ];
        for (op, expected) in table {
            for (capability, want) in CapabilityKind::ALL.into_iter().zip(expected) {
                assert_eq!(registry.supports(op, capability), want, "{op} / {capability}");
            }
        }
    }

    #[test]
    fn test_resolution_prefers_nearest_ancestor() {
        let registry = CapabilityRegistry::standard();
        assert!(matches!(
            registry.resolved.get(&(&QUBITS_MATRIX, CapabilityKind::ToTensor)),
            Some(Provider::Tensor(_))
        ));
        assert!(registry.resolved.get(&(&MEASUREMENT, CapabilityKind::ApplyOnPureState)).is_none());
    }

    #[test]
    fn test_duplicate_builtin_registration_fails() {
        let mut builder = CapabilityRegistry::standard_builder();
        let err = builder
            .register(&MATRIX, Provider::kraus(KrausToKraus))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Ambiguous {
                kind: "MatrixOperation",
                capability: "ToKraus",
            }
        );
    }

    #[test]
    fn test_declared_kind_is_precomputed() {
        static CUSTOM: OpKind = OpKind::new("Custom", Some(&MATRIX));
        let mut builder = CapabilityRegistry::standard_builder();
        builder.declare(&CUSTOM);
        let registry = builder.build();
        assert!(registry.known.contains(&CUSTOM));
        assert!(registry.resolved.contains_key(&(&CUSTOM, CapabilityKind::ApplyOnMixedState)));
    }
}
