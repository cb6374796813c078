//! Configuration types for neural_fsgan.
//!
//! Burn-style configuration structs for the networks, the loss composition,
//! and the training loop. All of them serialize to JSON; the resolved
//! training configuration is written next to the checkpoints of every run.

mod model;
mod training;

pub use model::ModelConfig;
pub use training::{
    CriticScheduleConfig, LipschitzMode, LossConfig, OptimizerFamily, TrainingConfig,
    CLIP_BOUND, DEFAULT_PENALTY_SCALE,
};
