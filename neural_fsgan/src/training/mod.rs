//! Training infrastructure for field-strength translation.
//!
//! This module provides:
//! - `GanTrainer`: the alternating critic / generator training loop
//! - Volume batch samplers and tensor conversion
//! - Optimizer steps and critic weight clipping
//! - Scalar summaries and training metrics
//! - Checkpoint save/load for training resumption and generation

mod batch;
mod checkpoint;
mod clip;
mod metrics;
mod optimizer;
mod summary;
mod trainer;

pub use batch::{
    tensor_to_volumes, uniform_noise, volumes_to_tensor, BatchPair, DomainSamplers, VolumeSampler,
};
pub use checkpoint::{
    checkpoint_candidates, checkpoint_exists, find_latest, load_generator, load_state,
    CheckpointState, CheckpointStore, GanModules,
};
pub use clip::WeightClipper;
pub use metrics::{Evaluation, StepMetrics, TrainReport, ValidationMetrics};
pub use optimizer::{
    adam_config, rmsprop_config, sgd_config, OptimizerStep, ADAM_BETA_1, ADAM_BETA_2,
};
pub use summary::{
    read_summaries, SummaryEvent, SummaryWriter, SUMMARY_FILE, TAG_D_LOSS, TAG_G_LOSS,
    TAG_IMAGE_DISTANCE, TAG_VAL_D_LOSS, TAG_VAL_G_LOSS,
};
pub use trainer::{has_previous_run, GanTrainer, CONFIG_FILE, CONTINUE_SUFFIX};
