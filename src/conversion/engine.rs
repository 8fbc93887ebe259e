//! Staged single-file conversion
//!
//! The source is copied into a private work directory under a fixed name,
//! the encoder runs on that copy, and the staged output is copied to the
//! requested destination. Both staged files are removed on every exit path.
//!
//! The staging names are fixed, so only one conversion may use a work
//! directory at a time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::ConversionError;
use super::ffmpeg::{tail_excerpt, Encoder, EncoderRequest, EncoderStatus, MAX_DIAGNOSTIC_CHARS};
use super::format::{Quality, TargetFormat};

pub const STAGED_INPUT_NAME: &str = "staged_input";
pub const STAGED_OUTPUT_NAME: &str = "staged_output";

/// Result of converting one item
#[derive(Debug)]
pub enum ConversionOutcome {
    Success,
    CancelledByUser,
    Failed(ConversionError),
}

impl ConversionOutcome {
    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Staged input/output pair, deleted on drop
struct StagedFiles {
    input: PathBuf,
    output: PathBuf,
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for path in [&self.input, &self.output] {
            if let Err(e) = remove_if_exists(path) {
                log::warn!("Failed to remove staged file {:?}: {}", path, e);
            }
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Converts one source file at a time through a private work directory
pub struct ConversionEngine {
    encoder: Arc<dyn Encoder>,
    work_dir: PathBuf,
}

impl ConversionEngine {
    pub fn new(encoder: Arc<dyn Encoder>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            encoder,
            work_dir: work_dir.into(),
        }
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    #[cfg(test)]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Staged input path for a source, keeping the source's extension
    pub fn staged_input_path(&self, source: &Path) -> PathBuf {
        match source.extension().and_then(|e| e.to_str()) {
            Some(ext) if !ext.is_empty() => {
                self.work_dir.join(format!("{}.{}", STAGED_INPUT_NAME, ext))
            }
            _ => self.work_dir.join(STAGED_INPUT_NAME),
        }
    }

    pub fn staged_output_path(&self, format: TargetFormat) -> PathBuf {
        self.work_dir
            .join(format!("{}.{}", STAGED_OUTPUT_NAME, format.extension()))
    }

    /// Convert `source` into `destination`
    pub fn convert(
        &self,
        source: &Path,
        destination: &Path,
        format: TargetFormat,
        quality: Quality,
    ) -> ConversionOutcome {
        match self.try_convert(source, destination, format, quality) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Conversion of {} failed: {}", source.display(), e);
                ConversionOutcome::Failed(e)
            }
        }
    }

    fn try_convert(
        &self,
        source: &Path,
        destination: &Path,
        format: TargetFormat,
        quality: Quality,
    ) -> Result<ConversionOutcome, ConversionError> {
        if !source.is_file() {
            return Err(ConversionError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        fs::create_dir_all(&self.work_dir)?;

        let staged = StagedFiles {
            input: self.staged_input_path(source),
            output: self.staged_output_path(format),
        };

        // Leftovers from an interrupted run must not pass for fresh output
        remove_if_exists(&staged.input)?;
        remove_if_exists(&staged.output)?;
        fs::copy(source, &staged.input)?;

        let request = EncoderRequest {
            input: &staged.input,
            output: &staged.output,
            format,
            quality,
        };

        match self.encoder.invoke(&request) {
            EncoderStatus::Success => {
                let produced = fs::metadata(&staged.output).map(|m| m.len()).unwrap_or(0);
                if produced == 0 {
                    return Err(ConversionError::EmptyOutput);
                }

                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&staged.output, destination)?;

                log::info!("Converted {} -> {}", source.display(), destination.display());
                Ok(ConversionOutcome::Success)
            }
            EncoderStatus::Cancelled => {
                log::info!("Conversion of {} cancelled", source.display());
                Ok(ConversionOutcome::CancelledByUser)
            }
            EncoderStatus::Failure(diagnostic) => Err(ConversionError::EncoderFailure {
                diagnostic: tail_excerpt(&diagnostic, MAX_DIAGNOSTIC_CHARS),
            }),
        }
    }
}
