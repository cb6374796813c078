//! Train a field-strength translation GAN.
//!
//! Continues the previous run of the experiment when its log directory
//! already holds one, unless `--fresh` is given.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release --bin train_gan -- \
//!   --config experiments/wgan_gp.json \
//!   --manifest data/manifest.json \
//!   --log-root logs
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use clap::Parser;

use neural_fsgan::training::has_previous_run;
use neural_fsgan::{GanTrainer, TrainingConfig};

type TrainBackend = Autodiff<NdArray>;

/// Train a WGAN translating MRI volumes between field strengths
#[derive(Parser, Debug)]
#[command(name = "train_gan")]
#[command(about = "Train a field-strength translation GAN")]
struct Args {
    /// Training configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Dataset manifest (JSON)
    #[arg(long)]
    manifest: PathBuf,

    /// Root directory of the experiment log directories
    #[arg(long, default_value = "logs")]
    log_root: PathBuf,

    /// Start from scratch, discarding the checkpoints of a previous run
    #[arg(long)]
    fresh: bool,

    /// Override the configured number of steps
    #[arg(long)]
    max_steps: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = TrainingConfig::load(&args.config)
        .map_err(|e| anyhow!("failed to load {}: {}", args.config.display(), e))?;
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps;
    }

    let dataset = fsgan_io::load_dataset(&args.manifest)
        .with_context(|| format!("failed to load dataset {}", args.manifest.display()))?;

    let device = Default::default();
    let mut trainer = GanTrainer::<TrainBackend>::new(config, &args.log_root, &device)?;
    let continue_run = !args.fresh && has_previous_run(&trainer.run_dir());
    if continue_run {
        log::info!("Found a previous run in {:?}, continuing", trainer.run_dir());
    }

    let report = trainer.fit(&dataset, continue_run)?;
    match report.last_step {
        Some(step) => log::info!(
            "Finished at step {} (started at {}), logs in {:?}",
            step,
            report.init_step,
            report.log_dir
        ),
        None => log::info!("No steps run, logs in {:?}", report.log_dir),
    }
    if let Some(best) = report.best_d_loss {
        log::info!("Best validation discriminator loss: {:.6}", best);
    }
    Ok(())
}
