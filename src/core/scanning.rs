//! Audio file discovery
//!
//! Expands the user's input paths into a sorted list of audio files.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::audio::is_audio_file;

/// Expand files and directories into audio file paths
///
/// Files are taken as given even when the extension is unfamiliar, so the
/// user can still try to convert them. Directories are walked recursively
/// and only audio files are kept, sorted by path. Input order is preserved
/// across inputs and duplicates are dropped.
pub fn collect_audio_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_audio_file(p))
                .collect();
            found.sort();
            log::debug!("Found {} audio files under {}", found.len(), input.display());
            files.extend(found);
        } else if input.is_file() {
            if !is_audio_file(input) {
                log::warn!("{} does not look like an audio file", input.display());
            }
            files.push(input.clone());
        } else {
            log::warn!("Skipping missing input: {}", input.display());
        }
    }

    let mut seen = std::collections::HashSet::new();
    files.retain(|p| seen.insert(p.clone()));
    files
}

/// Size of a file in bytes, 0 when unreadable
pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Format a byte count for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1000;
    const MB: u64 = KB * 1000;
    const GB: u64 = MB * 1000;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
