//! Checkpoint save/load for training resumption and generation.
//!
//! Each checkpoint is a directory named after its lineage and step:
//!
//! ```text
//! model.ckpt-1500/
//!     generator.mpk
//!     critic.mpk
//!     optimizer_gen.mpk
//!     optimizer_critic.mpk
//!     state.json
//! ```
//!
//! `state.json` is written last, so a directory without it is an incomplete
//! write and is ignored when searching for checkpoints.

use std::fs;
use std::path::{Path, PathBuf};

use burn::optim::Optimizer;
use burn::prelude::*;
use burn::record::{CompactRecorder, Recorder};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use fsgan_core::{CheckpointName, Lineage, RetentionPolicy, TrainingProgress};

use crate::config::ModelConfig;
use crate::error::{FsGanError, Result};
use crate::nn::{Critic, Generator};

use super::optimizer::OptimizerStep;

const GENERATOR_FILE: &str = "generator";
const CRITIC_FILE: &str = "critic";
const OPTIMIZER_GEN_FILE: &str = "optimizer_gen";
const OPTIMIZER_CRITIC_FILE: &str = "optimizer_critic";
const STATE_FILE: &str = "state.json";

/// Training state stored next to the records.
///
/// An infinite best loss (no validation yet) is stored as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Step the checkpoint was written at.
    pub step: usize,
    /// Best averaged validation critic loss so far.
    pub best_d_loss: Option<f32>,
}

impl From<TrainingProgress> for CheckpointState {
    fn from(progress: TrainingProgress) -> Self {
        Self {
            step: progress.step,
            best_d_loss: progress.best_d_loss.is_finite().then_some(progress.best_d_loss),
        }
    }
}

impl From<CheckpointState> for TrainingProgress {
    fn from(state: CheckpointState) -> Self {
        Self {
            step: state.step,
            best_d_loss: state.best_d_loss.unwrap_or(f32::INFINITY),
        }
    }
}

/// Both networks and their optimizers: everything a checkpoint restores.
pub struct GanModules<B, OG, OD>
where
    B: AutodiffBackend,
    OG: Optimizer<Generator<B>, B>,
    OD: Optimizer<Critic<B>, B>,
{
    /// The generator.
    pub generator: Generator<B>,
    /// The critic.
    pub critic: Critic<B>,
    /// Generator optimizer.
    pub optim_gen: OptimizerStep<B, Generator<B>, OG>,
    /// Critic optimizer.
    pub optim_critic: OptimizerStep<B, Critic<B>, OD>,
}

impl<B, OG, OD> GanModules<B, OG, OD>
where
    B: AutodiffBackend,
    OG: Optimizer<Generator<B>, B>,
    OD: Optimizer<Critic<B>, B>,
{
    /// Freshly initialized networks and optimizers.
    pub fn init(
        model: &ModelConfig,
        optim_gen: OG,
        optim_critic: OD,
        learning_rate: f64,
        device: &B::Device,
    ) -> Self {
        Self {
            generator: model.init_generator(device),
            critic: model.init_critic(device),
            optim_gen: OptimizerStep::new(optim_gen, learning_rate),
            optim_critic: OptimizerStep::new(optim_critic, learning_rate),
        }
    }

    /// Write all records into `dir`.
    fn record(&self, dir: &Path) -> Result<()> {
        let recorder = CompactRecorder::new();
        self.generator
            .clone()
            .save_file(dir.join(GENERATOR_FILE), &recorder)?;
        self.critic
            .clone()
            .save_file(dir.join(CRITIC_FILE), &recorder)?;
        recorder.record(self.optim_gen.to_record(), dir.join(OPTIMIZER_GEN_FILE))?;
        recorder.record(self.optim_critic.to_record(), dir.join(OPTIMIZER_CRITIC_FILE))?;
        Ok(())
    }

    /// Load all records from the checkpoint directory `dir`.
    pub fn restore(self, dir: &Path, device: &B::Device) -> Result<Self> {
        let recorder = CompactRecorder::new();
        let generator = self
            .generator
            .load_file(dir.join(GENERATOR_FILE), &recorder, device)?;
        let critic = self
            .critic
            .load_file(dir.join(CRITIC_FILE), &recorder, device)?;
        let record = recorder.load(dir.join(OPTIMIZER_GEN_FILE), device)?;
        let optim_gen = self.optim_gen.load_record(record);
        let record = recorder.load(dir.join(OPTIMIZER_CRITIC_FILE), device)?;
        let optim_critic = self.optim_critic.load_record(record);

        Ok(Self {
            generator,
            critic,
            optim_gen,
            optim_critic,
        })
    }
}

/// Checkpoint directory of one run with bounded retention per lineage.
///
/// Retention only ever evicts checkpoints this store wrote or adopted with
/// [`CheckpointStore::recover`]; anything else in the directory is left alone.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    policy: RetentionPolicy,
    latest: Vec<usize>,
    best: Vec<usize>,
}

impl CheckpointStore {
    /// Create a store writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>, policy: RetentionPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
            latest: Vec::new(),
            best: Vec::new(),
        }
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory of checkpoint `name`.
    pub fn path(&self, name: CheckpointName) -> PathBuf {
        self.dir.join(name.to_string())
    }

    /// Steps this store manages for `lineage`, in write order.
    pub fn managed(&self, lineage: Lineage) -> &[usize] {
        match lineage {
            Lineage::Latest => &self.latest,
            Lineage::BestDiscriminatorLoss => &self.best,
        }
    }

    fn managed_mut(&mut self, lineage: Lineage) -> &mut Vec<usize> {
        match lineage {
            Lineage::Latest => &mut self.latest,
            Lineage::BestDiscriminatorLoss => &mut self.best,
        }
    }

    /// Adopt the complete checkpoints already in the directory with a step
    /// below `next_step`, so that retention covers them as well.
    pub fn recover(&mut self, next_step: usize) -> Result<()> {
        for lineage in [Lineage::Latest, Lineage::BestDiscriminatorLoss] {
            let steps: Vec<usize> = self
                .steps(lineage)?
                .into_iter()
                .filter(|&step| step < next_step)
                .collect();
            if !steps.is_empty() {
                log::debug!("Adopted {:?} checkpoints {:?} in {:?}", lineage, steps, self.dir);
            }
            *self.managed_mut(lineage) = steps;
        }
        Ok(())
    }

    /// Save a checkpoint of `lineage` at `progress.step`, then evict the
    /// oldest managed checkpoints of that lineage beyond the retention limit.
    pub fn save<B, OG, OD>(
        &mut self,
        lineage: Lineage,
        modules: &GanModules<B, OG, OD>,
        progress: TrainingProgress,
    ) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        OG: Optimizer<Generator<B>, B>,
        OD: Optimizer<Critic<B>, B>,
    {
        let path = self.path(CheckpointName::new(lineage, progress.step));
        fs::create_dir_all(&path)?;
        modules.record(&path)?;

        let state = CheckpointState::from(progress);
        fs::write(path.join(STATE_FILE), serde_json::to_string_pretty(&state)?)?;
        log::info!("Saved checkpoint {:?}", path);

        let managed = self.managed_mut(lineage);
        managed.retain(|&step| step != progress.step);
        managed.push(progress.step);
        let kept = managed.clone();
        let evictions = self.policy.evictions(&kept);
        self.managed_mut(lineage).retain(|step| !evictions.contains(step));

        for step in evictions {
            let stale = self.path(CheckpointName::new(lineage, step));
            match fs::remove_dir_all(&stale) {
                Ok(()) => log::debug!("Removed checkpoint {:?}", stale),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(path)
    }

    /// Steps of the complete checkpoints of `lineage` on disk, ascending.
    ///
    /// A missing store directory has no checkpoints.
    pub fn steps(&self, lineage: Lineage) -> Result<Vec<usize>> {
        let mut steps: Vec<usize> = self
            .entries()?
            .into_iter()
            .filter(|(path, name)| name.lineage == lineage && checkpoint_exists(path))
            .map(|(_, name)| name.step)
            .collect();
        steps.sort_unstable();
        Ok(steps)
    }

    /// The most recent checkpoint of `lineage`.
    pub fn latest(&self, lineage: Lineage) -> Result<Option<(PathBuf, usize)>> {
        Ok(self
            .steps(lineage)?
            .last()
            .map(|&step| (self.path(CheckpointName::new(lineage, step)), step)))
    }

    /// Delete every checkpoint directory of both lineages, complete or not.
    ///
    /// Returns the number of directories removed.
    pub fn discard_all(&mut self) -> Result<usize> {
        let entries = self.entries()?;
        for (path, _) in &entries {
            fs::remove_dir_all(path)?;
        }
        self.latest.clear();
        self.best.clear();
        Ok(entries.len())
    }

    /// Checkpoint-named directories in the store.
    fn entries(&self) -> Result<Vec<(PathBuf, CheckpointName)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut found = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str());
            if let Some(Ok(name)) = name.map(CheckpointName::parse) {
                found.push((path, name));
            }
        }
        Ok(found)
    }
}

/// Whether `dir` holds a complete checkpoint.
pub fn checkpoint_exists(dir: &Path) -> bool {
    dir.is_dir() && dir.join(STATE_FILE).is_file()
}

/// The highest-step checkpoint of `lineage` across several run directories.
///
/// Unreadable directories are skipped.
pub fn find_latest(dirs: &[PathBuf], lineage: Lineage) -> Option<(PathBuf, usize)> {
    dirs.iter()
        .filter_map(|dir| {
            CheckpointStore::new(dir, RetentionPolicy::default())
                .latest(lineage)
                .ok()
                .flatten()
        })
        .max_by_key(|(_, step)| *step)
}

/// Complete checkpoints of `lineage` across several run directories, highest
/// step first. On equal steps the later directory comes first.
///
/// Unreadable directories are skipped.
pub fn checkpoint_candidates(dirs: &[PathBuf], lineage: Lineage) -> Vec<(PathBuf, usize)> {
    let mut candidates: Vec<(usize, usize, PathBuf)> = dirs
        .iter()
        .enumerate()
        .flat_map(|(order, dir)| {
            let store = CheckpointStore::new(dir, RetentionPolicy::default());
            store
                .steps(lineage)
                .unwrap_or_default()
                .into_iter()
                .map(move |step| (step, order, store.path(CheckpointName::new(lineage, step))))
        })
        .collect();
    candidates.sort_unstable_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
    candidates
        .into_iter()
        .map(|(step, _, path)| (path, step))
        .collect()
}

/// Read `state.json` of a checkpoint.
pub fn load_state(dir: &Path) -> Result<CheckpointState> {
    let contents = fs::read_to_string(dir.join(STATE_FILE))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Load just the generator of a checkpoint, for inference.
pub fn load_generator<B: Backend>(
    dir: &Path,
    model: &ModelConfig,
    device: &B::Device,
) -> Result<Generator<B>> {
    if !checkpoint_exists(dir) {
        return Err(FsGanError::CheckpointNotFound {
            dir: dir.to_path_buf(),
        });
    }
    let generator = model
        .init_generator::<B>(device)
        .load_file(dir.join(GENERATOR_FILE), &CompactRecorder::new(), device)?;
    log::info!("Loaded generator from {:?}", dir);
    Ok(generator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::optimizer::adam_config;
    use burn::backend::{Autodiff, NdArray};
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    fn modules(
        model: &ModelConfig,
    ) -> GanModules<
        TestBackend,
        impl Optimizer<Generator<TestBackend>, TestBackend>,
        impl Optimizer<Critic<TestBackend>, TestBackend>,
    > {
        let device = Default::default();
        GanModules::init(model, adam_config().init(), adam_config().init(), 1e-3, &device)
    }

    fn progress(step: usize) -> TrainingProgress {
        TrainingProgress {
            step,
            best_d_loss: f32::INFINITY,
        }
    }

    #[test]
    fn test_state_infinite_best_is_null() {
        let state = CheckpointState::from(TrainingProgress::default());
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("null"));

        let restored: TrainingProgress = serde_json::from_str::<CheckpointState>(&json).unwrap().into();
        assert!(restored.best_d_loss.is_infinite());
    }

    #[test]
    fn test_retention_keeps_three_most_recent() {
        let dir = TempDir::new().unwrap();
        let model = ModelConfig::new([2, 2, 2]);
        let modules = modules(&model);
        let mut store = CheckpointStore::new(dir.path(), RetentionPolicy::new(3));

        for step in [0, 5, 10, 15, 20] {
            store.save(Lineage::Latest, &modules, progress(step)).unwrap();
        }
        store
            .save(Lineage::BestDiscriminatorLoss, &modules, progress(5))
            .unwrap();

        assert_eq!(store.steps(Lineage::Latest).unwrap(), vec![10, 15, 20]);
        assert_eq!(store.steps(Lineage::BestDiscriminatorLoss).unwrap(), vec![5]);
        assert!(!dir.path().join("model.ckpt-0").exists());
        assert!(dir.path().join("model_best_d_loss.ckpt-5").exists());
    }

    #[test]
    fn test_incomplete_checkpoints_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("model.ckpt-40")).unwrap();
        fs::create_dir_all(dir.path().join("unrelated")).unwrap();

        let store = CheckpointStore::new(dir.path(), RetentionPolicy::default());
        assert!(store.steps(Lineage::Latest).unwrap().is_empty());
        assert!(store.latest(Lineage::Latest).unwrap().is_none());
    }

    #[test]
    fn test_find_latest_across_directories() {
        let root = TempDir::new().unwrap();
        let run = root.path().join("exp");
        let cont = root.path().join("exp_cont");
        let modules = modules(&ModelConfig::new([2, 2, 2]));

        CheckpointStore::new(&run, RetentionPolicy::default())
            .save(Lineage::Latest, &modules, progress(4))
            .unwrap();
        CheckpointStore::new(&cont, RetentionPolicy::default())
            .save(Lineage::Latest, &modules, progress(9))
            .unwrap();

        let (path, step) = find_latest(&[run.clone(), cont.clone()], Lineage::Latest).unwrap();
        assert_eq!(step, 9);
        assert_eq!(path, cont.join("model.ckpt-9"));
        assert!(find_latest(&[run], Lineage::BestDiscriminatorLoss).is_none());
    }

    #[test]
    fn test_retention_ignores_foreign_checkpoints() {
        let dir = TempDir::new().unwrap();
        let modules = modules(&ModelConfig::new([2, 2, 2]));
        let mut earlier = CheckpointStore::new(dir.path(), RetentionPolicy::new(3));
        for step in [3, 4, 5] {
            earlier.save(Lineage::Latest, &modules, progress(step)).unwrap();
        }

        // a new store in the same directory starts over at step 1
        let mut store = CheckpointStore::new(dir.path(), RetentionPolicy::new(3));
        for step in [1, 2] {
            store.save(Lineage::Latest, &modules, progress(step)).unwrap();
        }

        assert_eq!(store.managed(Lineage::Latest), &[1, 2]);
        assert_eq!(store.steps(Lineage::Latest).unwrap(), vec![1, 2, 3, 4, 5]);

        store.save(Lineage::Latest, &modules, progress(6)).unwrap();
        store.save(Lineage::Latest, &modules, progress(7)).unwrap();
        assert_eq!(store.managed(Lineage::Latest), &[2, 6, 7]);
        assert_eq!(store.steps(Lineage::Latest).unwrap(), vec![2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_recover_adopts_earlier_checkpoints() {
        let dir = TempDir::new().unwrap();
        let modules = modules(&ModelConfig::new([2, 2, 2]));
        let mut earlier = CheckpointStore::new(dir.path(), RetentionPolicy::new(3));
        for step in [2, 4, 6, 8] {
            earlier.save(Lineage::Latest, &modules, progress(step)).unwrap();
        }

        let mut store = CheckpointStore::new(dir.path(), RetentionPolicy::new(3));
        store.recover(7).unwrap();
        assert_eq!(store.managed(Lineage::Latest), &[4, 6]);
        assert!(store.managed(Lineage::BestDiscriminatorLoss).is_empty());

        store.save(Lineage::Latest, &modules, progress(7)).unwrap();
        store.save(Lineage::Latest, &modules, progress(9)).unwrap();
        // step 8 was never adopted and stays on disk
        assert_eq!(store.steps(Lineage::Latest).unwrap(), vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_resave_same_step_counts_once() {
        let dir = TempDir::new().unwrap();
        let modules = modules(&ModelConfig::new([2, 2, 2]));
        let mut store = CheckpointStore::new(dir.path(), RetentionPolicy::new(2));

        for step in [1, 2, 2] {
            store.save(Lineage::Latest, &modules, progress(step)).unwrap();
        }
        assert_eq!(store.managed(Lineage::Latest), &[1, 2]);
        assert_eq!(store.steps(Lineage::Latest).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_discard_all_removes_both_lineages() {
        let dir = TempDir::new().unwrap();
        let modules = modules(&ModelConfig::new([2, 2, 2]));
        let mut store = CheckpointStore::new(dir.path(), RetentionPolicy::default());
        store.save(Lineage::Latest, &modules, progress(1)).unwrap();
        store
            .save(Lineage::BestDiscriminatorLoss, &modules, progress(1))
            .unwrap();
        fs::create_dir_all(dir.path().join("model.ckpt-9")).unwrap();
        fs::write(dir.path().join("events.csv"), "step\n").unwrap();

        assert_eq!(store.discard_all().unwrap(), 3);
        assert!(store.steps(Lineage::Latest).unwrap().is_empty());
        assert!(store.managed(Lineage::Latest).is_empty());
        assert!(dir.path().join("events.csv").exists());
        assert!(!dir.path().join("model.ckpt-9").exists());

        let mut missing = CheckpointStore::new(dir.path().join("nope"), RetentionPolicy::default());
        assert_eq!(missing.discard_all().unwrap(), 0);
    }

    #[test]
    fn test_candidates_highest_step_first() {
        let root = TempDir::new().unwrap();
        let run = root.path().join("exp");
        let cont = root.path().join("exp_cont");
        let modules = modules(&ModelConfig::new([2, 2, 2]));

        let mut run_store = CheckpointStore::new(&run, RetentionPolicy::default());
        for step in [3, 5] {
            run_store.save(Lineage::Latest, &modules, progress(step)).unwrap();
        }
        let mut cont_store = CheckpointStore::new(&cont, RetentionPolicy::default());
        for step in [4, 5] {
            cont_store.save(Lineage::Latest, &modules, progress(step)).unwrap();
        }

        let candidates = checkpoint_candidates(&[run.clone(), cont.clone()], Lineage::Latest);
        assert_eq!(
            candidates,
            vec![
                (cont.join("model.ckpt-5"), 5),
                (run.join("model.ckpt-5"), 5),
                (cont.join("model.ckpt-4"), 4),
                (run.join("model.ckpt-3"), 3),
            ]
        );
        assert!(checkpoint_candidates(&[run], Lineage::BestDiscriminatorLoss).is_empty());
    }

    #[test]
    fn test_save_restore_roundtrip() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let model = ModelConfig::new([2, 2, 2]);
        let saved = modules(&model);
        let mut store = CheckpointStore::new(dir.path(), RetentionPolicy::default());
        let path = store
            .save(
                Lineage::Latest,
                &saved,
                TrainingProgress {
                    step: 7,
                    best_d_loss: 0.5,
                },
            )
            .unwrap();

        let restored = modules(&model).restore(&path, &device).unwrap();
        let expected: Vec<f32> = saved.critic.output.weight.val().into_data().to_vec().unwrap();
        let actual: Vec<f32> = restored.critic.output.weight.val().into_data().to_vec().unwrap();
        for (a, b) in expected.iter().zip(&actual) {
            assert!((a - b).abs() < 1e-2);
        }

        let state = load_state(&path).unwrap();
        assert_eq!(state.step, 7);
        assert_eq!(state.best_d_loss, Some(0.5));
    }

    #[test]
    fn test_load_generator_missing_checkpoint() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let result = load_generator::<NdArray>(
            &dir.path().join("model.ckpt-3"),
            &ModelConfig::new([2, 2, 2]),
            &device,
        );
        assert!(matches!(result, Err(FsGanError::CheckpointNotFound { .. })));
    }
}
