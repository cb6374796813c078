//! Training configuration types.

use burn::config::Config;
use serde::{Deserialize, Serialize};

use fsgan_core::CriticSchedule;

use super::ModelConfig;
use crate::error::FsGanError;

/// Bound used by weight clipping.
pub const CLIP_BOUND: f32 = 0.01;

/// Default gradient penalty scale.
pub const DEFAULT_PENALTY_SCALE: f32 = 10.0;

/// How the critic is kept (approximately) 1-Lipschitz.
///
/// Exactly one mechanism is active per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum LipschitzMode {
    /// Clamp critic weights into `[-CLIP_BOUND, CLIP_BOUND]` after every
    /// critic update.
    #[default]
    Clipping,
    /// Penalize deviation of the critic's input-gradient norm from 1.
    GradientPenalty {
        /// Multiplier of the penalty term.
        scale: f32,
    },
}

impl LipschitzMode {
    /// Gradient penalty with the default scale.
    pub fn gradient_penalty() -> Self {
        Self::GradientPenalty {
            scale: DEFAULT_PENALTY_SCALE,
        }
    }

    /// Whether critic weights are clipped.
    pub fn clips_weights(&self) -> bool {
        matches!(self, Self::Clipping)
    }
}

/// Optimizer used for both networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerFamily {
    /// Adam with betas (0.5, 0.9).
    Adam,
    /// RMSprop with burn defaults.
    RmsProp,
    /// Plain stochastic gradient descent.
    Sgd,
}

/// Weights of the loss regularization terms.
#[derive(Config, Debug)]
pub struct LossConfig {
    /// L1 weight decay on generator kernels.
    #[config(default = 2.5e-5)]
    pub w_reg_gen_l1: f32,

    /// L1 weight decay on critic kernels.
    #[config(default = 2.5e-5)]
    pub w_reg_disc_l1: f32,

    /// L2 weight decay on generator kernels.
    #[config(default = 0.0)]
    pub w_reg_gen_l2: f32,

    /// L2 weight decay on critic kernels.
    #[config(default = 0.0)]
    pub w_reg_disc_l2: f32,

    /// Weight of the mean absolute difference between generated and source
    /// volumes in the generator loss.
    #[config(default = 0.0)]
    pub w_reg_img_dist_l1: f32,

    /// Lipschitz enforcement.
    #[config(default = "LipschitzMode::Clipping")]
    pub lipschitz: LipschitzMode,

    /// Step size of the finite difference used by the gradient penalty.
    #[config(default = 1e-2)]
    pub penalty_step: f32,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LossConfig {
    /// A configuration with every regularization weight set to zero.
    pub fn unregularized() -> Self {
        Self::new()
            .with_w_reg_gen_l1(0.0)
            .with_w_reg_disc_l1(0.0)
            .with_w_reg_gen_l2(0.0)
            .with_w_reg_disc_l2(0.0)
            .with_w_reg_img_dist_l1(0.0)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::error::Result<()> {
        let weights = [
            ("w_reg_gen_l1", self.w_reg_gen_l1),
            ("w_reg_disc_l1", self.w_reg_disc_l1),
            ("w_reg_gen_l2", self.w_reg_gen_l2),
            ("w_reg_disc_l2", self.w_reg_disc_l2),
            ("w_reg_img_dist_l1", self.w_reg_img_dist_l1),
        ];
        for (name, weight) in weights {
            if !(weight >= 0.0 && weight.is_finite()) {
                return Err(FsGanError::invalid_config(format!(
                    "{} must be finite and non-negative, got {}",
                    name, weight
                )));
            }
        }
        if let LipschitzMode::GradientPenalty { scale } = self.lipschitz {
            if !(scale > 0.0 && scale.is_finite()) {
                return Err(FsGanError::invalid_config(format!(
                    "gradient penalty scale must be positive, got {}",
                    scale
                )));
            }
            if !(self.penalty_step > 0.0) {
                return Err(FsGanError::invalid_config("penalty_step must be positive"));
            }
        }
        Ok(())
    }
}

/// Number of critic updates per generator update.
#[derive(Config, Debug)]
pub struct CriticScheduleConfig {
    /// Initial steps running `warmup_iters` critic updates.
    #[config(default = 25)]
    pub warmup_steps: usize,

    /// Critic updates during warm-up and on every `period`-th step.
    #[config(default = 100)]
    pub warmup_iters: usize,

    /// Period of the critic boost (0 disables it).
    #[config(default = 500)]
    pub period: usize,

    /// Critic updates on regular steps.
    #[config(default = 5)]
    pub iters: usize,
}

impl Default for CriticScheduleConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CriticScheduleConfig {
    /// The same number of critic updates on every step.
    pub fn constant(iters: usize) -> Self {
        Self::new()
            .with_warmup_steps(0)
            .with_warmup_iters(iters)
            .with_period(0)
            .with_iters(iters)
    }

    /// Build the schedule.
    pub fn schedule(&self) -> CriticSchedule {
        CriticSchedule {
            warmup_steps: self.warmup_steps,
            warmup_iters: self.warmup_iters,
            period: self.period,
            iters: self.iters,
        }
    }
}

/// Configuration of a training run.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Experiment name; also the name of the log directory.
    pub experiment_name: String,

    /// Network configuration.
    pub model: ModelConfig,

    /// Loss configuration.
    #[config(default = "LossConfig::new()")]
    pub loss: LossConfig,

    /// Critic iteration schedule.
    #[config(default = "CriticScheduleConfig::new()")]
    pub critic_schedule: CriticScheduleConfig,

    /// Optimizer family for both networks.
    #[config(default = "OptimizerFamily::Adam")]
    pub optimizer: OptimizerFamily,

    /// Learning rate for both networks.
    #[config(default = 1e-3)]
    pub learning_rate: f64,

    /// Images per batch.
    #[config(default = 2)]
    pub batch_size: usize,

    /// Exclusive upper bound of the step counter.
    #[config(default = 1_000_000)]
    pub max_steps: usize,

    /// Steps between training summaries.
    #[config(default = 10)]
    pub update_summary_frequency: usize,

    /// Steps between validations.
    #[config(default = 100)]
    pub validation_frequency: usize,

    /// Steps between "latest" checkpoints.
    #[config(default = 200)]
    pub save_frequency: usize,

    /// Batches averaged per validation.
    #[config(default = 20)]
    pub num_val_batches: usize,

    /// Checkpoints kept per lineage.
    #[config(default = 3)]
    pub max_to_keep: usize,

    /// Field strength (tesla) of the source domain.
    #[config(default = 1.5)]
    pub source_field_strength: f32,

    /// Field strength (tesla) of the target domain.
    #[config(default = 3.0)]
    pub target_field_strength: f32,

    /// Seed for batch sampling, interpolation coefficients, and noise.
    #[config(default = 42)]
    pub seed: u64,
}

impl TrainingConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.model.validate()?;
        self.loss.validate()?;

        if self.experiment_name.trim().is_empty() {
            return Err(FsGanError::invalid_config("experiment_name must not be empty"));
        }
        if self.learning_rate <= 0.0 {
            return Err(FsGanError::invalid_config("learning_rate must be positive"));
        }
        if self.batch_size == 0 {
            return Err(FsGanError::invalid_config("batch_size must be positive"));
        }
        if self.num_val_batches == 0 {
            return Err(FsGanError::invalid_config("num_val_batches must be positive"));
        }
        if self.max_to_keep == 0 {
            return Err(FsGanError::invalid_config("max_to_keep must be positive"));
        }
        if self.critic_schedule.iters == 0 {
            return Err(FsGanError::invalid_config(
                "critic_schedule.iters must be positive",
            ));
        }
        if (self.source_field_strength - self.target_field_strength).abs() < 1e-4 {
            return Err(FsGanError::invalid_config(
                "source and target field strengths must differ",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsgan_core::schedule::{
        DEFAULT_BOOST_PERIOD, DEFAULT_CRITIC_ITERS, DEFAULT_WARMUP_ITERS, DEFAULT_WARMUP_STEPS,
    };

    fn test_config() -> TrainingConfig {
        TrainingConfig::new("unit".to_string(), ModelConfig::new([4, 4, 4]))
    }

    #[test]
    fn test_default_training_config() {
        let config = test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_steps, 1_000_000);
        assert_eq!(config.optimizer, OptimizerFamily::Adam);
        assert_eq!(config.loss.lipschitz, LipschitzMode::Clipping);
    }

    #[test]
    fn test_default_schedule_matches_core() {
        let schedule = CriticScheduleConfig::default().schedule();
        assert_eq!(schedule, CriticSchedule::default());
        assert_eq!(schedule.warmup_steps, DEFAULT_WARMUP_STEPS);
        assert_eq!(schedule.warmup_iters, DEFAULT_WARMUP_ITERS);
        assert_eq!(schedule.period, DEFAULT_BOOST_PERIOD);
        assert_eq!(schedule.iters, DEFAULT_CRITIC_ITERS);

        let constant = CriticScheduleConfig::constant(1).schedule();
        assert!((0..1000).all(|step| constant.iterations(step) == 1));
    }

    #[test]
    fn test_builder_pattern() {
        let config = test_config()
            .with_learning_rate(5e-5)
            .with_optimizer(OptimizerFamily::RmsProp)
            .with_loss(LossConfig::unregularized().with_lipschitz(LipschitzMode::gradient_penalty()));

        assert_eq!(config.learning_rate, 5e-5);
        assert!(!config.loss.lipschitz.clips_weights());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        assert!(test_config().with_batch_size(0).validate().is_err());
        assert!(test_config()
            .with_target_field_strength(1.5)
            .validate()
            .is_err());
        assert!(test_config()
            .with_loss(LossConfig::new().with_w_reg_gen_l1(-1.0))
            .validate()
            .is_err());
        assert!(test_config()
            .with_loss(LossConfig::new().with_lipschitz(LipschitzMode::GradientPenalty { scale: 0.0 }))
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = test_config().with_loss(
            LossConfig::new().with_lipschitz(LipschitzMode::GradientPenalty { scale: 5.0 }),
        );
        let json = serde_json::to_string(&config).unwrap();
        let loaded: TrainingConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            loaded.loss.lipschitz,
            LipschitzMode::GradientPenalty { scale: 5.0 }
        );
        assert_eq!(loaded.model.image_size, [4, 4, 4]);
    }
}
