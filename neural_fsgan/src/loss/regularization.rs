//! Regularization terms: kernel weight decay and image distance.

use burn::prelude::*;

use crate::nn::OwnedModule;

/// L1 / L2 weight decay over the kernels of one network.
///
/// L1 is `sum |w|`, L2 is `sum w² / 2`. Biases and normalization parameters
/// are never decayed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightDecay {
    /// L1 coefficient.
    pub l1: f32,
    /// L2 coefficient.
    pub l2: f32,
}

impl WeightDecay {
    /// Create a new weight decay term.
    pub fn new(l1: f32, l2: f32) -> Self {
        Self { l1, l2 }
    }

    /// Weighted decay of `module`, or `None` when both coefficients are zero.
    pub fn loss<B: Backend, M: OwnedModule<B>>(&self, module: &M) -> Option<Tensor<B, 1>> {
        let l1 = (self.l1 != 0.0).then(|| module.kernel_l1().mul_scalar(self.l1));
        let l2 = (self.l2 != 0.0).then(|| module.kernel_l2().mul_scalar(self.l2));

        match (l1, l2) {
            (Some(l1), Some(l2)) => Some(l1 + l2),
            (l1, l2) => l1.or(l2),
        }
    }
}

/// Mean absolute difference between generated and source volumes.
///
/// Inputs: two batches of identical shape `[batch, depth, height, width, channels]`.
/// Output: scalar.
pub fn l1_image_distance<B: Backend>(generated: Tensor<B, 5>, source: Tensor<B, 5>) -> Tensor<B, 1> {
    (generated - source).abs().mean()
}

/// Sum optional loss terms onto a base loss.
///
/// The base tensor is returned unchanged when no term is present.
pub fn add_terms<B: Backend>(
    base: Tensor<B, 1>,
    terms: impl IntoIterator<Item = Option<Tensor<B, 1>>>,
) -> Tensor<B, 1> {
    terms.into_iter().flatten().fold(base, |acc, term| acc + term)
}
