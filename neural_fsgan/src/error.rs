//! Error types for neural_fsgan.

use std::path::PathBuf;

use burn::record::RecorderError;
use thiserror::Error;

/// Errors that can occur while training or running the translation GAN.
#[derive(Error, Debug)]
pub enum FsGanError {
    /// Invalid configuration, detected when a trainer or generator is built.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// A domain has no images in the given split.
    #[error("no {domain} images ({field_strength:.1} T) in the {split} split")]
    EmptyDomain {
        /// "source" or "target".
        domain: &'static str,
        /// Field strength the domain was selected by.
        field_strength: f32,
        /// Split name.
        split: &'static str,
    },

    /// No checkpoint of the requested lineage exists.
    #[error("no checkpoint found under {dir:?}")]
    CheckpointNotFound {
        /// Directory that was searched.
        dir: PathBuf,
    },

    /// Tensor contents could not be read back.
    #[error("tensor data error: {0}")]
    TensorData(String),

    /// Error from the sampling / bookkeeping core.
    #[error("core error: {0}")]
    Core(#[from] fsgan_core::CoreError),

    /// Error reading or writing volumes and datasets.
    #[error("volume I/O error: {0}")]
    Volume(#[from] fsgan_io::VolumeIoError),

    /// Error writing or reading model / optimizer records.
    #[error("recorder error: {0}")]
    Recorder(#[from] RecorderError),

    /// Error (de)serializing checkpoint state or summaries.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsGanError {
    /// Shorthand for [`FsGanError::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type for neural_fsgan operations.
pub type Result<T> = std::result::Result<T, FsGanError>;
