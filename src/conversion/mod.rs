//! Audio conversion module
//!
//! Transcodes one source file at a time through ffmpeg, staging both ends
//! in a private work directory.

mod engine;
mod error;
mod ffmpeg;
mod format;

pub use engine::{ConversionEngine, ConversionOutcome};
pub use error::ConversionError;
pub use ffmpeg::{Encoder, FfmpegEncoder};
#[cfg(test)]
pub use ffmpeg::{EncoderRequest, EncoderStatus};
pub use format::{Quality, TargetFormat};

use std::path::{Path, PathBuf};

#[cfg(windows)]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const FFMPEG_BINARY: &str = "ffmpeg";

/// Locate the ffmpeg binary
///
/// Looks, in order, at the explicit path, `resources/bin/ffmpeg` next to
/// the executable (and in a macOS bundle's `Resources`), the development
/// tree, then every directory on `PATH`.
pub fn find_ffmpeg(explicit: Option<&Path>) -> Result<PathBuf, ConversionError> {
    if let Some(path) = explicit {
        return verify_ffmpeg(path);
    }

    let mut candidates = Vec::new();

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join("resources").join("bin").join(FFMPEG_BINARY));
            // macOS app bundle: Contents/MacOS/../Resources/bin/ffmpeg
            candidates.push(
                exe_dir
                    .join("..")
                    .join("Resources")
                    .join("bin")
                    .join(FFMPEG_BINARY),
            );
        }
    }

    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        candidates.push(
            PathBuf::from(manifest_dir)
                .join("resources")
                .join("bin")
                .join(FFMPEG_BINARY),
        );
    }

    if let Some(search_path) = std::env::var_os("PATH") {
        candidates.extend(std::env::split_paths(&search_path).map(|dir| dir.join(FFMPEG_BINARY)));
    }

    for candidate in candidates {
        if candidate.is_file() && verify_ffmpeg(&candidate).is_ok() {
            log::info!("Found ffmpeg at {:?}", candidate);
            return Ok(candidate);
        }
    }

    Err(ConversionError::EncoderNotFound {
        reason: "ffmpeg binary not found next to the executable or on PATH".to_string(),
    })
}

/// Verify that ffmpeg exists and is executable
pub fn verify_ffmpeg(path: &Path) -> Result<PathBuf, ConversionError> {
    if !path.is_file() {
        return Err(ConversionError::EncoderNotFound {
            reason: format!("ffmpeg not found at {:?}", path),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path).map_err(|e| ConversionError::EncoderNotFound {
            reason: format!("Failed to get ffmpeg metadata: {}", e),
        })?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(ConversionError::EncoderNotFound {
                reason: format!("ffmpeg at {:?} is not executable", path),
            });
        }
    }

    Ok(path.to_path_buf())
}
