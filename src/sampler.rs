use crate::core::QModel;
use crate::core::errors::OperationError;
use crate::operation::{CapabilityRegistry, Op};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use tracing::debug;

/// Shot runner for operations that report measurement outcomes.
///
/// The `Sampler` applies an operation to fresh copies of a model many times,
/// optionally passing each copy through a noise channel first, and counts
/// the outcomes the operation reports.
#[derive(Debug, Clone, Default)]
pub struct Sampler {
    /// Optional operation applied to every copy before the sampled one.
    pub channel: Option<Op>,
    /// Seed for a reproducible random source; OS-seeded when `None`.
    pub seed: Option<u64>,
}

impl Sampler {
    /// Creates a new `Sampler` with no channel (noise-free) and an OS-seeded source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operation applied before each shot.
    pub fn with_channel(mut self, channel: Op) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Fixes the random source so runs are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Applies `op` to `num_shots` copies of `model`.
    ///
    /// # Returns
    ///
    /// A map from each flattened measurement outcome to the number of shots
    /// that produced it. Shots whose apply reports no measurement are not counted.
    ///
    /// # Errors
    ///
    /// Propagates the first error from applying the channel or `op`.
    pub fn run(
        &self,
        registry: &CapabilityRegistry,
        op: &Op,
        model: &QModel,
        num_shots: usize,
    ) -> Result<HashMap<Vec<usize>, usize>, OperationError> {
        let mut rng = self.rng();
        let mut counts = HashMap::new();

        for _ in 0..num_shots {
            let mut shot = model.clone();
            if let Some(channel) = &self.channel {
                registry.apply_on_model(channel, &mut shot, &mut rng)?;
            }
            let effect = registry.apply_on_model(op, &mut shot, &mut rng)?;
            if let Some(result) = effect.into_measurement() {
                *counts.entry(result.values.flatten()).or_insert(0) += 1;
            }
        }

        debug!(shots = num_shots, distinct = counts.len(), "sampler run finished");
        Ok(counts)
    }
}
