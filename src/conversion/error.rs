//! Error types for conversion and routing

use std::path::PathBuf;
use thiserror::Error;

/// Per-item failures of a conversion attempt
///
/// User cancellation is not an error; see `ConversionOutcome::CancelledByUser`.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Source file does not exist
    #[error("Source not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// ffmpeg binary could not be located
    #[error("Encoder not found: {reason}")]
    EncoderNotFound { reason: String },

    /// Encoder exited with a failure status
    #[error("Encoder failed: {diagnostic}")]
    EncoderFailure { diagnostic: String },

    /// Encoder reported success but produced nothing
    #[error("Encoder produced an empty output file")]
    EmptyOutput,

    /// Converted file could not be written to its final destination
    #[error("Failed to write {path}: {reason}")]
    DestinationWriteFailure { path: PathBuf, reason: String },

    /// Staging I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    pub fn destination_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DestinationWriteFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
