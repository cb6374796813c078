//! Training metrics and run reports.

use std::path::PathBuf;

use crate::loss::LossValues;

/// Losses of one evaluation batch, in inference mode.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Evaluation {
    /// Regularized and unregularized losses.
    pub losses: LossValues,
    /// Mean absolute difference between generated and source volumes.
    pub image_distance: f32,
}

/// Metrics logged at a summary step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepMetrics {
    /// Global step.
    pub step: usize,
    /// Critic updates run this step.
    pub critic_iters: usize,
    /// Wall time of the critic phase in seconds.
    pub critic_secs: f32,
    /// Evaluation of a fresh training batch.
    pub evaluation: Evaluation,
}

impl StepMetrics {
    /// Log the metrics.
    pub fn log(&self) {
        log::info!(
            "step={} g_loss={:.6} d_loss={:.6} l1={:.6} critic_iters={} critic_time={:.2}s",
            self.step,
            self.evaluation.losses.g_loss_no_reg,
            self.evaluation.losses.d_loss_no_reg,
            self.evaluation.image_distance,
            self.critic_iters,
            self.critic_secs,
        );
    }
}

/// Averaged validation losses.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValidationMetrics {
    /// Global step.
    pub step: usize,
    /// Number of batches averaged.
    pub batches: usize,
    /// Mean unregularized critic loss.
    pub d_loss: f32,
    /// Mean unregularized generator loss.
    pub g_loss: f32,
}

impl ValidationMetrics {
    /// Average evaluations of several validation batches.
    pub fn average(step: usize, evaluations: &[Evaluation]) -> Self {
        let batches = evaluations.len();
        if batches == 0 {
            return Self {
                step,
                ..Default::default()
            };
        }
        let n = batches as f32;
        Self {
            step,
            batches,
            d_loss: evaluations.iter().map(|e| e.losses.d_loss_no_reg).sum::<f32>() / n,
            g_loss: evaluations.iter().map(|e| e.losses.g_loss_no_reg).sum::<f32>() / n,
        }
    }

    /// Log the metrics.
    pub fn log(&self) {
        log::info!(
            "validation step={} g_loss={:.6} d_loss={:.6} ({} batches)",
            self.step,
            self.g_loss,
            self.d_loss,
            self.batches,
        );
    }
}

/// Outcome of [`GanTrainer::fit`](super::GanTrainer::fit).
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    /// First step of this run.
    pub init_step: usize,
    /// Last completed step, if any step ran.
    pub last_step: Option<usize>,
    /// Directory the run logged and checkpointed into.
    pub log_dir: PathBuf,
    /// Checkpoint the run resumed from.
    pub resumed_from: Option<PathBuf>,
    /// Best averaged validation critic loss, if a validation ran.
    pub best_d_loss: Option<f32>,
    /// Critic updates applied in this run.
    pub critic_updates: usize,
    /// Generator updates applied in this run.
    pub generator_updates: usize,
    /// Whether the run stopped on cancellation.
    pub cancelled: bool,
}
