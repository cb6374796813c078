//! Weight clipping of the critic.

use burn::prelude::*;

use crate::config::{LipschitzMode, CLIP_BOUND};
use crate::nn::{Critic, OwnedModule};

/// Clamps every critic kernel and bias into `[-bound, bound]` after each
/// critic update. Normalization parameters are left alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightClipper {
    bound: f32,
}

impl Default for WeightClipper {
    fn default() -> Self {
        Self { bound: CLIP_BOUND }
    }
}

impl WeightClipper {
    /// Create a clipper with a custom bound.
    pub fn new(bound: f32) -> Self {
        Self { bound: bound.abs() }
    }

    /// The clipper for a Lipschitz mode; `None` under gradient penalty.
    pub fn for_mode(mode: LipschitzMode) -> Option<Self> {
        mode.clips_weights().then(Self::default)
    }

    /// Clipping bound.
    pub fn bound(&self) -> f32 {
        self.bound
    }

    /// Clip the critic.
    pub fn apply<B: Backend>(&self, critic: Critic<B>) -> Critic<B> {
        critic.clip_weights(self.bound)
    }
}

/// Logs what weight decay and clipping will touch in a network.
pub(crate) fn log_param_groups<B: Backend, M: OwnedModule<B>>(
    module: &M,
    clipper: Option<&WeightClipper>,
) {
    let inventory = module.inventory();
    log::info!(
        "{}: {} parameters, {} kernels decayed, {} normalization tensors",
        M::OWNER.name(),
        module.num_params(),
        inventory.kernels,
        inventory.normalization,
    );
    if let Some(clipper) = clipper {
        log::info!(
            "{}: clipping {} tensors to [-{}, {}]",
            M::OWNER.name(),
            inventory.clipped(),
            clipper.bound(),
            clipper.bound()
        );
    }
}
