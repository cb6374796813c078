//! Error types for fsgan_io operations.

use thiserror::Error;

/// Errors that can occur while reading or writing volumes and datasets.
#[derive(Error, Debug)]
pub enum VolumeIoError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a single-file NIfTI-1 image.
    #[error("invalid NIfTI header: {message}")]
    InvalidHeader {
        /// Description of the header problem.
        message: String,
    },

    /// The voxel datatype code is not supported.
    #[error("unsupported NIfTI datatype code {code}")]
    UnsupportedDatatype {
        /// NIfTI datatype code.
        code: i16,
    },

    /// A volume's shape differs from the expected one.
    #[error("volume shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected `[depth, height, width, channels]`.
        expected: [usize; 4],
        /// Actual `[depth, height, width, channels]`.
        got: [usize; 4],
    },

    /// The data buffer length does not match the declared shape.
    #[error("volume data has {got} values but shape needs {expected}")]
    DataLength {
        /// Number of values required by the shape.
        expected: usize,
        /// Number of values provided.
        got: usize,
    },

    /// The dataset manifest could not be parsed.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Result type alias for fsgan_io operations.
pub type Result<T> = std::result::Result<T, VolumeIoError>;
