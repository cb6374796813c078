//! Persistent training progress and run control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Training state persisted with every checkpoint.
///
/// `best_d_loss` only ever decreases; it starts at positive infinity so the
/// first validation always counts as an improvement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingProgress {
    /// Global step of the most recent completed iteration.
    pub step: usize,
    /// Lowest averaged validation critic loss seen so far.
    pub best_d_loss: f32,
}

impl Default for TrainingProgress {
    fn default() -> Self {
        Self {
            step: 0,
            best_d_loss: f32::INFINITY,
        }
    }
}

impl TrainingProgress {
    /// Record a validation critic loss.
    ///
    /// Returns `true` when the loss is no worse than the best so far (ties
    /// count as improvements), in which case it becomes the new best.
    pub fn record_validation(&mut self, d_loss: f32) -> bool {
        if d_loss <= self.best_d_loss {
            self.best_d_loss = d_loss;
            true
        } else {
            false
        }
    }
}

/// Lifecycle of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Models built, nothing trained yet.
    Init,
    /// Alternating critic and generator updates.
    Running,
    /// Averaging losses over validation batches.
    Validating,
    /// Step bound reached or run cancelled.
    Terminated,
}

/// Shared flag checked once per outer training iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
