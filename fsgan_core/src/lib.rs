//! # fsgan_core
//!
//! Backend-free building blocks for adversarial MRI field-strength translation.
//!
//! This crate holds the pieces of the training recipe that do not touch
//! tensors: volume shapes and in-memory image collections, the domain
//! partition, the endless minibatch index sampler, step cadences, checkpoint
//! naming and retention, and the persisted training progress.
//!
//! ## Modules
//!
//! - [`types`]: `VolumeShape`, `ImageCollection`, `DomainPartition`
//! - [`sampler`]: `IndexSampler`, an infinite shuffled batch iterator
//! - [`schedule`]: `CriticSchedule` and `Cadence`
//! - [`checkpoint`]: `Lineage`, `CheckpointName`, `RetentionPolicy`
//! - [`progress`]: `TrainingProgress`, `RunPhase`, `CancellationToken`
//! - [`error`]: Error types
//!
//! ## Usage
//!
//! ```
//! use fsgan_core::prelude::*;
//!
//! let labels = [1.5, 3.0, 1.5, 3.0];
//! let partition = DomainPartition::from_field_strengths(&labels, 1.5, 3.0);
//!
//! let mut sampler = IndexSampler::new(partition.source(), 1, 7).unwrap();
//! let batch = sampler.next_batch();
//! assert!(partition.source().contains(&batch[0]));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod error;
pub mod progress;
pub mod sampler;
pub mod schedule;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::checkpoint::{
        latest_step, CheckpointName, Lineage, RetentionPolicy, DEFAULT_MAX_TO_KEEP,
    };
    pub use crate::error::CoreError;
    pub use crate::progress::{CancellationToken, RunPhase, TrainingProgress};
    pub use crate::sampler::IndexSampler;
    pub use crate::schedule::{Cadence, CriticSchedule};
    pub use crate::types::{Domain, DomainPartition, ImageCollection, VolumeShape};
}

pub use checkpoint::{latest_step, CheckpointName, Lineage, RetentionPolicy, DEFAULT_MAX_TO_KEEP};
pub use error::{CoreError, Result};
pub use progress::{CancellationToken, RunPhase, TrainingProgress};
pub use sampler::IndexSampler;
pub use schedule::{Cadence, CriticSchedule};
pub use types::{Domain, DomainPartition, ImageCollection, VolumeShape};
