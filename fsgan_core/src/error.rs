//! Error types for fsgan_core operations.
//!
//! A plain error enum with a hand-written `Display` so the core crate stays
//! free of error-handling dependencies.

use core::fmt;

/// Errors that can occur in fsgan_core.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A sampler was asked to draw from an empty selection.
    EmptySelection,
    /// Batch size of zero was requested.
    ZeroBatchSize,
    /// The batch size exceeds the number of selectable images.
    BatchLargerThanSelection {
        /// Requested batch size.
        batch_size: usize,
        /// Number of indices in the selection.
        selection: usize,
    },
    /// A selection index points outside the image collection.
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of images in the collection.
        len: usize,
    },
    /// A checkpoint name did not follow the `<prefix>-<step>` pattern.
    MalformedCheckpointName {
        /// The name that failed to parse.
        name: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::EmptySelection => write!(f, "selection index set is empty"),
            CoreError::ZeroBatchSize => write!(f, "batch size must be positive"),
            CoreError::BatchLargerThanSelection {
                batch_size,
                selection,
            } => write!(
                f,
                "batch size {} exceeds selection of {} images",
                batch_size, selection
            ),
            CoreError::IndexOutOfRange { index, len } => {
                write!(f, "index {} out of range for {} images", index, len)
            }
            CoreError::MalformedCheckpointName { name } => {
                write!(f, "malformed checkpoint name: {}", name)
            }
        }
    }
}

impl std::error::Error for CoreError {}

/// Result type alias for fsgan_core operations.
pub type Result<T> = core::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::BatchLargerThanSelection {
            batch_size: 8,
            selection: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains('8'));
        assert!(msg.contains('3'));

        assert_eq!(
            format!("{}", CoreError::ZeroBatchSize),
            "batch size must be positive"
        );
    }
}
