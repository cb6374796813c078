//! Batch generation from a trained run.
//!
//! Output layout under `out_dir`:
//!
//! ```text
//! source/source_img_1.5T_<idx>.nii.gz
//! <experiment>_1.5T_source/image_test<idx>/
//!     source_img.nii.gz
//!     generated_img_noise_<k>.nii.gz
//!     difference_img_noise_<k>.nii.gz
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use fsgan_core::Lineage;
use fsgan_io::{save_volume, FieldStrengthDataset, Split, Volume};

use crate::config::TrainingConfig;
use crate::error::{FsGanError, Result as FsResult};
use crate::training::{find_latest, CONTINUE_SUFFIX};

use super::translate::ImageTranslator;

/// Which checkpoint lineage to generate from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointChoice {
    /// Most recent periodic checkpoint.
    #[default]
    Latest,
    /// Checkpoint with the lowest validation critic loss.
    BestDiscriminatorLoss,
}

impl From<CheckpointChoice> for Lineage {
    fn from(choice: CheckpointChoice) -> Self {
        match choice {
            CheckpointChoice::Latest => Lineage::Latest,
            CheckpointChoice::BestDiscriminatorLoss => Lineage::BestDiscriminatorLoss,
        }
    }
}

/// Options of a generation run.
#[derive(Config, Debug)]
pub struct GenerationConfig {
    /// Checkpoint lineage to restore.
    #[config(default = "CheckpointChoice::Latest")]
    pub checkpoint: CheckpointChoice,

    /// Split the source volumes are taken from.
    #[config(default = "Split::Test")]
    pub split: Split,

    /// Positions within the source domain to translate; empty means all.
    #[config(default = "Vec::new()")]
    pub image_indices: Vec<usize>,

    /// Uniform noise vectors drawn in addition to the all-zero vector.
    #[config(default = 0)]
    pub random_noise_samples: usize,

    /// Seed for the random noise vectors.
    #[config(default = 0)]
    pub seed: u64,
}

/// Summary of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// Checkpoint the generator was restored from.
    pub checkpoint: PathBuf,
    /// Step of that checkpoint.
    pub step: usize,
    /// Dataset indices of the translated volumes.
    pub images: Vec<usize>,
    /// Noise vectors applied to every image.
    pub noise_samples: usize,
    /// Directory holding the per-image folders.
    pub output_dir: PathBuf,
}

/// Field strength as it appears in file names, e.g. `1.5T`.
pub fn field_strength_tag(field_strength: f32) -> String {
    format!("{:.1}T", field_strength)
}

/// Noise vectors for generation: zeros first, then uniform `[-1, 1)` draws.
///
/// Empty when the model takes no noise.
pub fn noise_list(training: &TrainingConfig, options: &GenerationConfig) -> Vec<Vec<f32>> {
    let model = &training.model;
    if !model.use_noise {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(options.seed);
    std::iter::once(vec![0.0; model.noise_dim])
        .chain((0..options.random_noise_samples).map(|_| {
            (0..model.noise_dim)
                .map(|_| rng.gen_range(-1.0..1.0))
                .collect()
        }))
        .collect()
}

/// Translate the selected source volumes of `dataset` with the generator of
/// the latest checkpoint of the chosen lineage under `log_root`.
pub fn generate_images<B: Backend>(
    training: &TrainingConfig,
    options: &GenerationConfig,
    log_root: &Path,
    dataset: &FieldStrengthDataset,
    out_dir: &Path,
    device: &B::Device,
) -> FsResult<GenerationReport> {
    let experiment = &training.experiment_name;
    let dirs = [
        log_root.join(experiment),
        log_root.join(format!("{}{}", experiment, CONTINUE_SUFFIX)),
    ];
    let (checkpoint, step) = find_latest(&dirs, options.checkpoint.into()).ok_or_else(|| {
        FsGanError::CheckpointNotFound {
            dir: dirs[0].clone(),
        }
    })?;
    log::info!("Generating with {:?} (step {})", checkpoint, step);
    let translator = ImageTranslator::<B>::from_checkpoint(training.model.clone(), &checkpoint, device)?;

    let split = dataset.split(options.split);
    let field_strength = training.source_field_strength;
    let partition = split.partition(field_strength, training.target_field_strength);
    let sources = partition.source();
    if sources.is_empty() {
        return Err(FsGanError::EmptyDomain {
            domain: "source",
            field_strength,
            split: split_name(options.split),
        });
    }
    log::info!(
        "{} source / {} target images in the {} split",
        sources.len(),
        partition.target().len(),
        split_name(options.split)
    );

    let mut positions = if options.image_indices.is_empty() {
        (0..sources.len()).collect::<Vec<_>>()
    } else {
        options.image_indices.clone()
    };
    positions.sort_unstable();
    positions.dedup();
    let images = positions
        .iter()
        .map(|&position| {
            sources.get(position).copied().ok_or_else(|| {
                FsGanError::invalid_config(format!(
                    "image index {} out of range for {} source images",
                    position,
                    sources.len()
                ))
            })
        })
        .collect::<FsResult<Vec<_>>>()?;

    let shape = dataset.volume_shape();
    let volume = |index: usize| -> FsResult<Volume> {
        let data = split.images.image(index).ok_or_else(|| {
            FsGanError::invalid_config(format!("no image at index {}", index))
        })?;
        Ok(Volume::new(shape, data.to_vec())?)
    };

    let source_dir = out_dir.join("source");
    fs::create_dir_all(&source_dir)?;
    for &index in &images {
        let name = format!("source_img_{}_{}.nii.gz", field_strength_tag(field_strength), index);
        save_volume(&volume(index)?, source_dir.join(&name))?;
        log::debug!("{} saved", name);
    }

    let output_dir = out_dir.join(format!("{}_{}_source", experiment, field_strength_tag(field_strength)));
    let noises = noise_list(training, options);
    let noise_inputs: Vec<Option<&[f32]>> = if noises.is_empty() {
        vec![None]
    } else {
        noises.iter().map(|n| Some(n.as_slice())).collect()
    };

    for &index in &images {
        let image_dir = output_dir.join(format!("image_test{}", index));
        fs::create_dir_all(&image_dir)?;
        let source = volume(index)?;
        save_volume(&source, image_dir.join("source_img.nii.gz"))?;

        for (k, noise) in noise_inputs.iter().enumerate() {
            let translation = translator.translate(&source, *noise)?;
            save_volume(
                &translation.generated,
                image_dir.join(format!("generated_img_noise_{}.nii.gz", k)),
            )?;
            save_volume(
                &translation.difference,
                image_dir.join(format!("difference_img_noise_{}.nii.gz", k)),
            )?;
        }
        log::info!("Generated image_test{}", index);
    }

    log::info!("Generated {} images for {}", images.len(), experiment);
    Ok(GenerationReport {
        checkpoint,
        step,
        images,
        noise_samples: noise_inputs.len(),
        output_dir,
    })
}

fn split_name(split: Split) -> &'static str {
    match split {
        Split::Train => "train",
        Split::Validation => "validation",
        Split::Test => "test",
    }
}
