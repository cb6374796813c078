//! Generate target-domain volumes from a trained experiment.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin generate_images -- \
//!   --log-root logs --experiment wgan_gp \
//!   --manifest data/manifest.json \
//!   --out generated --best --noise-samples 4
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use burn::backend::NdArray;
use burn::config::Config;
use clap::Parser;

use neural_fsgan::inference::CheckpointChoice;
use neural_fsgan::training::CONFIG_FILE;
use neural_fsgan::{generate_images, GenerationConfig, TrainingConfig};

/// Generate volumes with the generator of a trained experiment
#[derive(Parser, Debug)]
#[command(name = "generate_images")]
#[command(about = "Translate source-domain volumes with a trained generator")]
struct Args {
    /// Root directory of the experiment log directories
    #[arg(long, default_value = "logs")]
    log_root: PathBuf,

    /// Experiment name
    #[arg(long)]
    experiment: String,

    /// Dataset manifest (JSON)
    #[arg(long)]
    manifest: PathBuf,

    /// Output directory
    #[arg(long)]
    out: PathBuf,

    /// Use the checkpoint with the lowest validation discriminator loss
    #[arg(long)]
    best: bool,

    /// Source image positions to translate (default: all)
    #[arg(long, value_delimiter = ',')]
    images: Vec<usize>,

    /// Random noise vectors per image in addition to the zero vector
    #[arg(long, default_value = "0")]
    noise_samples: usize,

    /// Seed for the noise vectors
    #[arg(long, default_value = "0")]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config_path = args.log_root.join(&args.experiment).join(CONFIG_FILE);
    let training = TrainingConfig::load(&config_path)
        .map_err(|e| anyhow!("failed to load {}: {}", config_path.display(), e))?;

    let dataset = fsgan_io::load_dataset(&args.manifest)
        .with_context(|| format!("failed to load dataset {}", args.manifest.display()))?;

    let checkpoint = if args.best {
        CheckpointChoice::BestDiscriminatorLoss
    } else {
        CheckpointChoice::Latest
    };
    let options = GenerationConfig::new()
        .with_checkpoint(checkpoint)
        .with_image_indices(args.images)
        .with_random_noise_samples(args.noise_samples)
        .with_seed(args.seed);

    let device = Default::default();
    let report = generate_images::<NdArray>(
        &training,
        &options,
        &args.log_root,
        &dataset,
        &args.out,
        &device,
    )?;

    log::info!(
        "Wrote {} images x {} noise samples from step {} to {:?}",
        report.images.len(),
        report.noise_samples,
        report.step,
        report.output_dir
    );
    Ok(())
}
