//! Core application state
//!
//! This module contains:
//! - The batch session's catalog of music items
//! - Input discovery for files and folders
//! - Application-private directories
//! - Persistent key-value settings

mod catalog;
mod paths;
mod scanning;
mod settings;

pub use catalog::{BatchEdit, BatchJob, Catalog, ItemId, MusicItem};
pub use paths::{AppPaths, APP_DIR_NAME};
pub use scanning::{collect_audio_files, format_size};
pub use settings::{SettingsStore, OUTPUT_DIRECTORY_KEY};
