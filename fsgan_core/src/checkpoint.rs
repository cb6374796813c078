//! Checkpoint naming and bounded retention.
//!
//! Two independent lineages are kept per run: a rolling "latest" lineage
//! written on a fixed cadence and a "best" lineage written whenever the
//! validation critic loss improves. Each checkpoint is named
//! `<prefix>-<step>`.

use std::fmt;

use crate::error::{CoreError, Result};

/// Number of checkpoints kept per lineage.
pub const DEFAULT_MAX_TO_KEEP: usize = 3;

/// A checkpoint lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lineage {
    /// Rolling checkpoints written every `save_frequency` steps.
    Latest,
    /// Checkpoints written when the validation critic loss improves.
    BestDiscriminatorLoss,
}

impl Lineage {
    /// File-name prefix for this lineage.
    pub const fn prefix(&self) -> &'static str {
        match self {
            Lineage::Latest => "model.ckpt",
            Lineage::BestDiscriminatorLoss => "model_best_d_loss.ckpt",
        }
    }

    /// All lineages.
    pub const ALL: [Lineage; 2] = [Lineage::Latest, Lineage::BestDiscriminatorLoss];
}

/// Name of one checkpoint: a lineage plus the step it was written at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheckpointName {
    /// Lineage the checkpoint belongs to.
    pub lineage: Lineage,
    /// Global step at which it was written.
    pub step: usize,
}

impl CheckpointName {
    /// Create a checkpoint name.
    pub const fn new(lineage: Lineage, step: usize) -> Self {
        Self { lineage, step }
    }

    /// Parse a name such as `model.ckpt-1500`.
    pub fn parse(name: &str) -> Result<Self> {
        for lineage in Lineage::ALL {
            let step = name
                .strip_prefix(lineage.prefix())
                .and_then(|rest| rest.strip_prefix('-'))
                .and_then(|digits| digits.parse::<usize>().ok());
            if let Some(step) = step {
                return Ok(Self { lineage, step });
            }
        }
        Err(CoreError::MalformedCheckpointName {
            name: name.to_string(),
        })
    }
}

impl fmt::Display for CheckpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lineage.prefix(), self.step)
    }
}

/// Keeps at most `max_to_keep` checkpoints per lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum number of checkpoints per lineage.
    pub max_to_keep: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_to_keep: DEFAULT_MAX_TO_KEEP,
        }
    }
}

impl RetentionPolicy {
    /// Create a policy keeping `max_to_keep` entries.
    pub const fn new(max_to_keep: usize) -> Self {
        Self { max_to_keep }
    }

    /// Steps to evict from one lineage, oldest first.
    ///
    /// Keeps the `max_to_keep` highest steps. Duplicates count once.
    pub fn evictions(&self, steps: &[usize]) -> Vec<usize> {
        let mut sorted = steps.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let excess = sorted.len().saturating_sub(self.max_to_keep);
        sorted.truncate(excess);
        sorted
    }
}

/// Highest step among the names belonging to `lineage`.
pub fn latest_step<'a, I>(names: I, lineage: Lineage) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter_map(|name| CheckpointName::parse(name).ok())
        .filter(|name| name.lineage == lineage)
        .map(|name| name.step)
        .max()
}
