//! Optimizer step builder.
//!
//! One [`OptimizerStep`] owns the optimizer of one network and turns a scalar
//! loss into an update of that network's parameters only.
//!
//! Normalization statistics need no separate update op: burn's batch
//! normalization refreshes its running mean and variance during the training
//! forward pass, so they already reflect the current batch when the gradient
//! step is applied.

use std::marker::PhantomData;

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer, RmsPropConfig, SgdConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// First-moment decay used with Adam.
pub const ADAM_BETA_1: f32 = 0.5;
/// Second-moment decay used with Adam.
pub const ADAM_BETA_2: f32 = 0.9;

/// Adam with the WGAN moment decays (0.5, 0.9).
pub fn adam_config() -> AdamConfig {
    AdamConfig::new()
        .with_beta_1(ADAM_BETA_1)
        .with_beta_2(ADAM_BETA_2)
}

/// RMSprop with burn defaults.
pub fn rmsprop_config() -> RmsPropConfig {
    RmsPropConfig::new()
}

/// SGD with burn defaults.
pub fn sgd_config() -> SgdConfig {
    SgdConfig::new()
}

/// Applies gradient steps of one loss to one module.
pub struct OptimizerStep<B, M, O> {
    optimizer: O,
    learning_rate: f64,
    steps: usize,
    _marker: PhantomData<(B, M)>,
}

impl<B, M, O> OptimizerStep<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    /// Wrap an optimizer.
    pub fn new(optimizer: O, learning_rate: f64) -> Self {
        Self {
            optimizer,
            learning_rate,
            steps: 0,
            _marker: PhantomData,
        }
    }

    /// Backpropagate `loss` and update the parameters of `module`.
    ///
    /// Gradients reaching other modules are discarded. A module without
    /// trainable parameters is returned unchanged.
    pub fn step(&mut self, module: M, loss: Tensor<B, 1>) -> M {
        let grads = GradientsParams::from_grads(loss.backward(), &module);
        if grads.is_empty() {
            return module;
        }
        self.steps += 1;
        self.optimizer.step(self.learning_rate, module, grads)
    }

    /// Number of non-empty steps applied.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Optimizer state record, for checkpoints.
    pub fn to_record(&self) -> O::Record {
        self.optimizer.to_record()
    }

    /// Restore the optimizer state from a checkpoint record.
    pub fn load_record(mut self, record: O::Record) -> Self {
        self.optimizer = self.optimizer.load_record(record);
        self
    }
}
