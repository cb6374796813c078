//! Adversarial training loop.
//!
//! One outer step runs a scheduled number of critic updates followed by one
//! generator update, then the logging, validation, and checkpoint cadences:
//!
//! ```text
//! Init ─▶ Running ─▶ Validating ─▶ Running ─▶ ... ─▶ Terminated
//! ```
//!
//! The run ends at `max_steps` or when the cancellation token fires; the token
//! is checked once per outer step.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use fsgan_core::{
    Cadence, CancellationToken, DomainPartition, ImageCollection, Lineage, RetentionPolicy,
    RunPhase, TrainingProgress,
};
use fsgan_io::{FieldStrengthDataset, Split, SplitData};

use crate::config::{ModelConfig, OptimizerFamily, TrainingConfig};
use crate::error::{FsGanError, Result};
use crate::loss::{l1_image_distance, scalar, GradientPenalty, LossComposer};
use crate::nn::{Critic, Generator};

use super::batch::{uniform_noise, BatchPair, DomainSamplers};
use super::checkpoint::{checkpoint_candidates, load_state, CheckpointStore, GanModules};
use super::clip::{log_param_groups, WeightClipper};
use super::metrics::{Evaluation, StepMetrics, TrainReport, ValidationMetrics};
use super::optimizer::{adam_config, rmsprop_config, sgd_config};
use super::summary::{
    SummaryWriter, TAG_D_LOSS, TAG_G_LOSS, TAG_IMAGE_DISTANCE, TAG_VAL_D_LOSS, TAG_VAL_G_LOSS,
};

/// Suffix of the log directory a continued run writes into.
pub const CONTINUE_SUFFIX: &str = "_cont";
/// Name of the configuration copy in every log directory.
pub const CONFIG_FILE: &str = "config.json";

/// Trains a generator / critic pair to translate source-domain volumes into
/// the target domain.
pub struct GanTrainer<B: AutodiffBackend> {
    config: TrainingConfig,
    log_root: PathBuf,
    device: B::Device,
    cancel: CancellationToken,
    phase: RunPhase,
}

impl<B: AutodiffBackend> GanTrainer<B> {
    /// Create a trainer logging under `log_root/<experiment_name>`.
    ///
    /// Fails with [`FsGanError::InvalidConfig`] on an invalid configuration.
    pub fn new(config: TrainingConfig, log_root: impl Into<PathBuf>, device: &B::Device) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            log_root: log_root.into(),
            device: device.clone(),
            cancel: CancellationToken::new(),
            phase: RunPhase::Init,
        })
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run after the current step.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Training configuration.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Log directory of a fresh run.
    pub fn run_dir(&self) -> PathBuf {
        self.log_root.join(&self.config.experiment_name)
    }

    /// Log directory of a continued run.
    pub fn continuation_dir(&self) -> PathBuf {
        self.log_root
            .join(format!("{}{}", self.config.experiment_name, CONTINUE_SUFFIX))
    }

    /// Train on `dataset`.
    ///
    /// With `continue_run`, the latest checkpoint of this experiment (original
    /// or continued) is restored and the run resumes at the following step,
    /// writing into the continuation directory. Unreadable checkpoints are
    /// skipped. Without any checkpoint the run starts fresh in the run
    /// directory; if none of them loads, it starts fresh in the continuation
    /// directory. A fresh run discards the checkpoints of the directory it
    /// writes to.
    pub fn fit(&mut self, dataset: &FieldStrengthDataset, continue_run: bool) -> Result<TrainReport> {
        let lr = self.config.learning_rate;
        match self.config.optimizer {
            OptimizerFamily::Adam => self.run(
                dataset,
                continue_run,
                adam_config().init::<B, Generator<B>>(),
                adam_config().init::<B, Critic<B>>(),
                lr,
            ),
            OptimizerFamily::RmsProp => self.run(
                dataset,
                continue_run,
                rmsprop_config().init::<B, Generator<B>>(),
                rmsprop_config().init::<B, Critic<B>>(),
                lr,
            ),
            OptimizerFamily::Sgd => self.run(
                dataset,
                continue_run,
                sgd_config().init::<B, Generator<B>>(),
                sgd_config().init::<B, Critic<B>>(),
                lr,
            ),
        }
    }

    fn run<OG, OD>(
        &mut self,
        dataset: &FieldStrengthDataset,
        continue_run: bool,
        optim_gen: OG,
        optim_critic: OD,
        learning_rate: f64,
    ) -> Result<TrainReport>
    where
        OG: Optimizer<Generator<B>, B> + Clone,
        OD: Optimizer<Critic<B>, B> + Clone,
    {
        let config = self.config.clone();
        let device = self.device.clone();
        log::info!("Experiment: {}", config.experiment_name);

        if dataset.volume_shape() != config.model.volume_shape() {
            return Err(FsGanError::invalid_config(format!(
                "dataset volumes are {:?} but the model expects {:?}",
                dataset.volume_shape(),
                config.model.volume_shape()
            )));
        }

        let train = dataset.split(Split::Train);
        let validation = dataset.split(Split::Validation);
        let train_partition = domain_partition(&config, train, "train")?;
        let val_partition = domain_partition(&config, validation, "validation")?;
        log::info!(
            "Domains: {} source / {} target training images, {} / {} validation images",
            train_partition.source().len(),
            train_partition.target().len(),
            val_partition.source().len(),
            val_partition.target().len(),
        );

        B::seed(config.seed);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut samplers = DomainSamplers::new(&train_partition, config.batch_size, &mut rng)?;
        // fail early on a validation split too small for one batch
        DomainSamplers::new(&val_partition, config.batch_size, &mut rng)?;

        let fresh = || {
            GanModules::init(
                &config.model,
                optim_gen.clone(),
                optim_critic.clone(),
                learning_rate,
                &device,
            )
        };
        let mut modules = fresh();
        let mut progress = TrainingProgress::default();
        let mut init_step = 0;
        let mut resumed_from = None;
        let mut log_dir = self.run_dir();

        if continue_run {
            match self.resume(&fresh, &device) {
                Ok(Some((restored, state, path))) => {
                    modules = restored;
                    progress = state;
                    init_step = state.step + 1;
                    log_dir = self.continuation_dir();
                    log::info!(
                        "Continuing from {:?} at step {}, writing to {:?}",
                        path,
                        init_step,
                        log_dir
                    );
                    resumed_from = Some(path);
                }
                Ok(None) => {
                    log::warn!(
                        "No checkpoint found for {}, starting a fresh run",
                        config.experiment_name
                    );
                }
                Err(err) => {
                    log_dir = self.continuation_dir();
                    log::warn!(
                        "Could not restore any checkpoint ({}), starting a fresh run in {:?}",
                        err,
                        log_dir
                    );
                }
            }
        }

        fs::create_dir_all(&log_dir)?;
        config.save(log_dir.join(CONFIG_FILE))?;
        let mut summaries = SummaryWriter::open(&log_dir)?;
        let policy = RetentionPolicy::new(config.max_to_keep);
        let mut store = CheckpointStore::new(&log_dir, policy);
        if resumed_from.is_some() {
            store.recover(init_step)?;
        } else {
            // a fresh run must not leave older checkpoints for a later resume
            let mut stale = vec![log_dir.clone()];
            if log_dir == self.run_dir() {
                stale.push(self.continuation_dir());
            }
            for dir in stale {
                let removed = CheckpointStore::new(&dir, policy).discard_all()?;
                if removed > 0 {
                    log::warn!("Removed {} checkpoints of an earlier run in {:?}", removed, dir);
                }
            }
        }

        let composer = LossComposer::new(&config.loss);
        let clipper = WeightClipper::for_mode(config.loss.lipschitz);
        log_param_groups(&modules.generator, None);
        log_param_groups(&modules.critic, clipper.as_ref());

        let schedule = config.critic_schedule.schedule();
        let summary_cadence = Cadence(config.update_summary_frequency);
        let validation_cadence = Cadence(config.validation_frequency);
        let save_cadence = Cadence(config.save_frequency);

        let mut last_step = None;
        let mut cancelled = false;
        self.phase = RunPhase::Running;

        for step in init_step..config.max_steps {
            if self.cancel.is_cancelled() {
                log::info!("Cancelled before step {}", step);
                cancelled = true;
                break;
            }

            let critic_iters = schedule.iterations(step);
            let start = Instant::now();
            for _ in 0..critic_iters {
                let batch = samplers.next_pair::<B>(&train.images, &device)?;
                modules = critic_step(modules, batch, &composer, clipper, &config.model, &mut rng);
            }
            let critic_secs = start.elapsed().as_secs_f32();

            let batch = samplers.next_pair::<B>(&train.images, &device)?;
            modules = generator_step(modules, batch, &composer, &config.model);
            progress.step = step;

            if summary_cadence.is_due(step) {
                let generator = modules.generator.valid();
                let critic = modules.critic.valid();
                let batch = samplers.next_pair::<B::InnerBackend>(&train.images, &device)?;
                let evaluation = evaluate(&generator, &critic, batch, &composer, &config.model);

                summaries.scalar(step, TAG_D_LOSS, evaluation.losses.d_loss_no_reg)?;
                summaries.scalar(step, TAG_G_LOSS, evaluation.losses.g_loss_no_reg)?;
                summaries.scalar(step, TAG_IMAGE_DISTANCE, evaluation.image_distance)?;
                summaries.flush()?;

                StepMetrics {
                    step,
                    critic_iters,
                    critic_secs,
                    evaluation,
                }
                .log();
            }

            if validation_cadence.is_due(step) {
                self.phase = RunPhase::Validating;
                let metrics = validate(
                    &modules,
                    &validation.images,
                    &val_partition,
                    &composer,
                    &config,
                    step,
                    &mut rng,
                    &device,
                )?;
                metrics.log();
                summaries.scalar(step, TAG_VAL_D_LOSS, metrics.d_loss)?;
                summaries.scalar(step, TAG_VAL_G_LOSS, metrics.g_loss)?;
                summaries.flush()?;

                if progress.record_validation(metrics.d_loss) {
                    log::info!("New best validation critic loss {:.6} at step {}", metrics.d_loss, step);
                    store.save(Lineage::BestDiscriminatorLoss, &modules, progress)?;
                }
                self.phase = RunPhase::Running;
            }

            if save_cadence.is_due(step) {
                store.save(Lineage::Latest, &modules, progress)?;
            }

            last_step = Some(step);
        }

        self.phase = RunPhase::Terminated;
        log::info!(
            "Training finished after step {:?} ({} generator / {} critic updates)",
            last_step,
            modules.optim_gen.steps(),
            modules.optim_critic.steps()
        );

        Ok(TrainReport {
            init_step,
            last_step,
            log_dir,
            resumed_from,
            best_d_loss: progress.best_d_loss.is_finite().then_some(progress.best_d_loss),
            critic_updates: modules.optim_critic.steps(),
            generator_updates: modules.optim_gen.steps(),
            cancelled,
        })
    }

    /// Restore the most recent loadable checkpoint of this experiment.
    ///
    /// Checkpoints are tried from the highest step down; unreadable ones are
    /// skipped. Fails only if checkpoints exist and none of them loads.
    fn resume<OG, OD, F>(
        &self,
        fresh: F,
        device: &B::Device,
    ) -> Result<Option<(GanModules<B, OG, OD>, TrainingProgress, PathBuf)>>
    where
        OG: Optimizer<Generator<B>, B>,
        OD: Optimizer<Critic<B>, B>,
        F: Fn() -> GanModules<B, OG, OD>,
    {
        let dirs = [self.run_dir(), self.continuation_dir()];
        let mut last_err = None;

        for (path, step) in checkpoint_candidates(&dirs, Lineage::Latest) {
            let restored = load_state(&path).and_then(|state| {
                let modules = fresh().restore(&path, device)?;
                Ok((modules, TrainingProgress::from(state)))
            });
            match restored {
                Ok((modules, progress)) => return Ok(Some((modules, progress, path))),
                Err(err) => {
                    log::warn!("Skipping unreadable checkpoint {:?} at step {}: {}", path, step, err);
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

/// Source / target partition of one split; both domains must be non-empty.
fn domain_partition(
    config: &TrainingConfig,
    split: &SplitData,
    split_name: &'static str,
) -> Result<DomainPartition> {
    let partition = split.partition(config.source_field_strength, config.target_field_strength);
    if partition.source().is_empty() {
        return Err(FsGanError::EmptyDomain {
            domain: "source",
            field_strength: config.source_field_strength,
            split: split_name,
        });
    }
    if partition.target().is_empty() {
        return Err(FsGanError::EmptyDomain {
            domain: "target",
            field_strength: config.target_field_strength,
            split: split_name,
        });
    }
    Ok(partition)
}

fn noise<B: Backend>(model: &ModelConfig, batch_size: usize, device: &B::Device) -> Option<Tensor<B, 2>> {
    model
        .noise_shape(batch_size)
        .map(|shape| uniform_noise(shape, device))
}

/// One critic update on a fresh batch pair, followed by clipping if enabled.
fn critic_step<B, OG, OD>(
    mut modules: GanModules<B, OG, OD>,
    batch: BatchPair<B>,
    composer: &LossComposer,
    clipper: Option<WeightClipper>,
    model: &ModelConfig,
    rng: &mut StdRng,
) -> GanModules<B, OG, OD>
where
    B: AutodiffBackend,
    OG: Optimizer<Generator<B>, B>,
    OD: Optimizer<Critic<B>, B>,
{
    let batch_size = batch.source.dims()[0];
    let device = batch.source.device();
    let fake = modules
        .generator
        .forward(batch.source, noise(model, batch_size, &device))
        .detach();

    let critic = modules.critic;
    let penalty = composer.penalty().map(|penalty| {
        let interpolate = GradientPenalty::interpolate(batch.target.clone(), fake.clone(), rng.gen());
        penalty.loss(|x| critic.forward(x), interpolate)
    });
    let real_logits = critic.forward(batch.target);
    let fake_logits = critic.forward(fake);
    let loss = composer.critic_loss(real_logits, fake_logits, &critic, penalty);

    let mut critic = modules.optim_critic.step(critic, loss);
    if let Some(clipper) = clipper {
        critic = clipper.apply(critic);
    }
    modules.critic = critic;
    modules
}

/// One generator update on a fresh batch pair.
fn generator_step<B, OG, OD>(
    mut modules: GanModules<B, OG, OD>,
    batch: BatchPair<B>,
    composer: &LossComposer,
    model: &ModelConfig,
) -> GanModules<B, OG, OD>
where
    B: AutodiffBackend,
    OG: Optimizer<Generator<B>, B>,
    OD: Optimizer<Critic<B>, B>,
{
    let batch_size = batch.source.dims()[0];
    let device = batch.source.device();
    let generator = modules.generator;

    let fake = generator.forward(batch.source.clone(), noise(model, batch_size, &device));
    let fake_logits = modules.critic.forward(fake.clone());
    let distance = l1_image_distance(fake, batch.source);
    let loss = composer.generator_loss(fake_logits, &generator, distance);

    modules.generator = modules.optim_gen.step(generator, loss);
    modules
}

/// Unregularized losses of inference-mode networks on one batch pair.
fn evaluate<B: Backend>(
    generator: &Generator<B>,
    critic: &Critic<B>,
    batch: BatchPair<B>,
    composer: &LossComposer,
    model: &ModelConfig,
) -> Evaluation {
    let batch_size = batch.source.dims()[0];
    let device = batch.source.device();
    let fake = generator.forward(batch.source.clone(), noise(model, batch_size, &device));
    let real_logits = critic.forward(batch.target);
    let fake_logits = critic.forward(fake.clone());
    let distance = l1_image_distance(fake, batch.source);
    let image_distance = scalar(&distance);

    let losses = composer.compose(real_logits, fake_logits, distance, generator, critic, None);
    Evaluation {
        losses: losses.values(),
        image_distance,
    }
}

/// Average losses over `num_val_batches` batches from fresh validation samplers.
#[allow(clippy::too_many_arguments)]
fn validate<B, OG, OD>(
    modules: &GanModules<B, OG, OD>,
    images: &ImageCollection,
    partition: &DomainPartition,
    composer: &LossComposer,
    config: &TrainingConfig,
    step: usize,
    rng: &mut StdRng,
    device: &B::Device,
) -> Result<ValidationMetrics>
where
    B: AutodiffBackend,
    OG: Optimizer<Generator<B>, B>,
    OD: Optimizer<Critic<B>, B>,
{
    let generator = modules.generator.valid();
    let critic = modules.critic.valid();
    let mut samplers = DomainSamplers::new(partition, config.batch_size, rng)?;

    let mut evaluations = Vec::with_capacity(config.num_val_batches);
    for _ in 0..config.num_val_batches {
        let batch = samplers.next_pair::<B::InnerBackend>(images, device)?;
        evaluations.push(evaluate(&generator, &critic, batch, composer, &config.model));
    }
    Ok(ValidationMetrics::average(step, &evaluations))
}

/// Whether `dir` looks like the log directory of an earlier run.
pub fn has_previous_run(dir: &Path) -> bool {
    dir.join(CONFIG_FILE).is_file()
}
