//! Loss functions for adversarial field-strength translation.
//!
//! This module provides:
//! - Wasserstein critic and generator losses with regularized totals
//! - Kernel weight decay (L1 / L2) and the generated-to-source image distance
//! - The gradient penalty used instead of weight clipping

mod adversarial;
mod penalty;
mod regularization;

pub use adversarial::{scalar, GanLosses, LossComposer, LossValues};
pub use penalty::{input_gradient, per_sample_norm, GradientPenalty};
pub use regularization::{add_terms, l1_image_distance, WeightDecay};
