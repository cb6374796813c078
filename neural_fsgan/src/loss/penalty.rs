//! Gradient penalty for the Wasserstein critic.
//!
//! The penalty is `scale * mean((‖∇x̂ D(x̂)‖ - 1)²)` over interpolates
//! `x̂ = eps * real + (1 - eps) * fake` with one `eps` per batch.
//!
//! Burn's autodiff is first order, so the norm cannot be differentiated
//! directly. Instead the input gradient is computed once (detached) to get the
//! unit direction `u`, and the norm is taken as the central difference
//! `(D(x̂ + h·u) - D(x̂ - h·u)) / 2h`, which is differentiable in the critic
//! parameters and matches the norm up to `O(h²)`.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// Guard against division by a zero gradient norm.
const NORM_EPSILON: f32 = 1e-12;

/// Gradient penalty term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientPenalty {
    /// Multiplier of the penalty.
    pub scale: f32,
    /// Finite-difference step along the gradient direction.
    pub step: f32,
}

impl GradientPenalty {
    /// Create a new gradient penalty.
    pub fn new(scale: f32, step: f32) -> Self {
        Self { scale, step }
    }

    /// Convex combination `eps * real + (1 - eps) * fake`.
    pub fn interpolate<B: Backend>(real: Tensor<B, 5>, fake: Tensor<B, 5>, eps: f32) -> Tensor<B, 5> {
        real.mul_scalar(eps) + fake.mul_scalar(1.0 - eps)
    }

    /// Compute the penalty.
    ///
    /// Inputs:
    /// - critic_fn: maps `[batch, d, h, w, c]` to `[batch, 1]`
    /// - interpolate: `[batch, d, h, w, c]`, typically from [`Self::interpolate`]
    ///
    /// Output: scalar loss, differentiable in the critic parameters.
    pub fn loss<B, F>(&self, critic_fn: F, interpolate: Tensor<B, 5>) -> Tensor<B, 1>
    where
        B: AutodiffBackend,
        F: Fn(Tensor<B, 5>) -> Tensor<B, 2>,
    {
        let interpolate = interpolate.detach();
        let gradient = input_gradient(&critic_fn, interpolate.clone());
        let direction = Tensor::<B, 5>::from_inner(unit_direction(gradient));

        let h = self.step;
        let ahead = critic_fn(interpolate.clone() + direction.clone().mul_scalar(h));
        let behind = critic_fn(interpolate - direction.mul_scalar(h));
        let norm = (ahead - behind).div_scalar(2.0 * h);

        let deviation = norm.sub_scalar(1.0);
        (deviation.clone() * deviation).mean().mul_scalar(self.scale)
    }
}

/// Gradient of `sum(critic_fn(x))` with respect to `x`, detached.
///
/// Each sample's output depends only on its own input (up to batch statistics),
/// so row `i` of the result is the gradient of `critic_fn(x)[i]`.
pub fn input_gradient<B, F>(critic_fn: &F, x: Tensor<B, 5>) -> Tensor<B::InnerBackend, 5>
where
    B: AutodiffBackend,
    F: Fn(Tensor<B, 5>) -> Tensor<B, 2>,
{
    let point = x.detach().require_grad();
    let grads = critic_fn(point.clone()).sum().backward();

    match point.grad(&grads) {
        Some(gradient) => gradient,
        None => point.inner().zeros_like(),
    }
}

/// Per-sample L2 norm over all non-batch axes.
///
/// Input: `[batch, d, h, w, c]`. Output: `[batch]`.
pub fn per_sample_norm<B: Backend>(x: Tensor<B, 5>) -> Tensor<B, 1> {
    let [batch, d, h, w, c] = x.dims();
    (x.clone() * x)
        .reshape([batch, d * h * w * c])
        .sum_dim(1)
        .sqrt()
        .reshape([batch])
}

/// Scale every sample to unit L2 norm; zero samples stay zero.
fn unit_direction<B: Backend>(x: Tensor<B, 5>) -> Tensor<B, 5> {
    let batch = x.dims()[0];
    let norm = per_sample_norm(x.clone())
        .add_scalar(NORM_EPSILON)
        .reshape([batch, 1, 1, 1, 1]);
    x / norm
}
