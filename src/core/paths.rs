//! Application-private directories
//!
//! Everything the converter writes for itself lives under one root:
//! `dirs::data_local_dir()/Music Converter` unless overridden.

use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "Music Converter";

const CONVERTED_DIR: &str = "Converted";
const WORK_DIR: &str = "work";
const COVERS_DIR: &str = "covers";
const SETTINGS_FILE: &str = "app_settings.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    /// Platform default, or `None` when the data directory can't be determined
    pub fn platform_default() -> Option<Self> {
        dirs::data_local_dir().map(|dir| Self::under(dir.join(APP_DIR_NAME)))
    }

    /// Use `root` as the application directory
    pub fn under(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every successful conversion lands here first
    pub fn converted_dir(&self) -> PathBuf {
        self.root.join(CONVERTED_DIR)
    }

    /// Staging area for the encoder
    pub fn work_dir(&self) -> PathBuf {
        self.root.join(WORK_DIR)
    }

    pub fn cover_cache(&self) -> PathBuf {
        self.root.join(COVERS_DIR)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// Create every directory
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [self.converted_dir(), self.work_dir(), self.cover_cache()] {
            std::fs::create_dir_all(&dir)?;
        }
        log::debug!("App directories ready under {:?}", self.root);
        Ok(())
    }
}
