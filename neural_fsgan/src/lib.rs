//! # neural_fsgan
//!
//! Wasserstein GAN training and generation with Burn for translating 3D MRI
//! volumes between scanner field strengths.
//!
//! A generator maps source-domain volumes (e.g. 1.5 T) to the target domain
//! (e.g. 3 T); a critic estimates the Earth-Mover distance between generated
//! and real target volumes. The critic's Lipschitz constraint is enforced by
//! weight clipping or by a gradient penalty, chosen once per run.
//!
//! ## Features
//!
//! - **Networks**: residual 3D convolutional generator with optional noise
//!   input, strided 3D convolutional critic
//! - **Losses**: Wasserstein losses with kernel weight decay, image distance,
//!   and gradient penalty
//! - **Training**: scheduled critic iterations, validation, two checkpoint
//!   lineages with bounded retention, resumable runs
//! - **Generation**: restores a generator and writes generated and difference
//!   volumes as NIfTI
//!
//! ## Quick Start
//!
//! ```ignore
//! use neural_fsgan::prelude::*;
//! use burn::backend::{Autodiff, NdArray};
//!
//! type MyBackend = Autodiff<NdArray>;
//!
//! let dataset = fsgan_io::load_dataset("data/manifest.json")?;
//! let config = TrainingConfig::new("wgan_bn".into(), ModelConfig::new([64, 80, 64]));
//! let device = Default::default();
//!
//! let mut trainer = GanTrainer::<MyBackend>::new(config, "logs", &device)?;
//! let report = trainer.fit(&dataset, false)?;
//! println!("last step: {:?}", report.last_step);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! fsgan_core (sampling, schedules, checkpoint naming)
//!     │
//!     ├──────────────────┐
//!     ▼                  ▼
//! fsgan_io          neural_fsgan
//! (NIfTI, datasets)  (training, generation)
//!     │                  │
//!     └──────────────────┘
//!        .nii.gz volumes
//! ```
//!
//! ## Feature Flags
//!
//! - `ndarray` (default): CPU backend using ndarray
//! - `wgpu`: GPU acceleration via WebGPU

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod inference;
pub mod loss;
pub mod nn;
pub mod training;

// Re-export key types for convenience
pub use config::{LipschitzMode, LossConfig, ModelConfig, OptimizerFamily, TrainingConfig};
pub use error::{FsGanError, Result};
pub use inference::{generate_images, GenerationConfig, ImageTranslator};
pub use loss::LossComposer;
pub use nn::{Critic, Generator};
pub use training::{GanTrainer, TrainReport};

// Re-export from fsgan_core and fsgan_io for convenience
pub use fsgan_core::{CancellationToken, Lineage, RunPhase};
pub use fsgan_io::{FieldStrengthDataset, Volume};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        CriticScheduleConfig, LipschitzMode, LossConfig, ModelConfig, OptimizerFamily,
        TrainingConfig,
    };
    pub use crate::error::{FsGanError, Result};
    pub use crate::inference::{
        generate_images, CheckpointChoice, GenerationConfig, GenerationReport, ImageTranslator,
        Translation,
    };
    pub use crate::loss::{GanLosses, GradientPenalty, LossComposer, LossValues, WeightDecay};
    pub use crate::nn::{Critic, Generator, OwnedModule, Owner};
    pub use crate::training::{
        find_latest, load_generator, CheckpointStore, GanTrainer, SummaryWriter, TrainReport,
        WeightClipper,
    };

    pub use fsgan_core::{CancellationToken, Lineage, RunPhase};
    pub use fsgan_io::{FieldStrengthDataset, Split, Volume};
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_public_api() {
        let model = ModelConfig::new([4, 4, 4]);
        let config = TrainingConfig::new("api".to_string(), model);
        assert!(config.validate().is_ok());
        let _loss = LossConfig::default();
        let _generation = GenerationConfig::new();
    }

    #[test]
    fn test_trainer_creation() {
        let device = Default::default();
        let config = TrainingConfig::new("api".to_string(), ModelConfig::new([4, 4, 4]));
        let trainer = GanTrainer::<TestBackend>::new(config, "logs", &device).unwrap();

        assert_eq!(trainer.phase(), RunPhase::Init);
        assert!(trainer.continuation_dir().ends_with("api_cont"));
    }
}
