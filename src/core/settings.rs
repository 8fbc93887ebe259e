//! Persistent key-value settings
//!
//! Stored as a flat JSON object in `app_settings.json`. Missing or
//! unreadable files load as empty settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Last output directory the user granted
pub const OUTPUT_DIRECTORY_KEY: &str = "output_directory";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl SettingsStore {
    /// Load settings from disk, or start empty if not found
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match Self::try_load(&path) {
            Ok(values) => {
                log::debug!("Loaded settings from {:?}", path);
                values
            }
            Err(e) => {
                log::debug!("Using default settings: {}", e);
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    fn try_load(path: &Path) -> Result<BTreeMap<String, String>, String> {
        if !path.exists() {
            return Err("Settings file not found".to_string());
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| format!("Failed to read settings: {}", e))?;

        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse settings: {}", e))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set a value and save
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), SettingsError> {
        let value = value.into();
        if self.get(key) == Some(value.as_str()) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value);
        self.save()
    }

    /// Remove a value and save
    pub fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        if self.values.remove(key).is_none() {
            return Ok(());
        }
        self.save()
    }

    /// Write to a sibling temp file, then rename over the real one
    pub fn save(&self) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(&self.values)?;
        let write_err = |source| SettingsError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(write_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        log::debug!("Saved settings to {:?}", self.path);
        Ok(())
    }
}
