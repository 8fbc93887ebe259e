//! The batch session's catalog of music items
//!
//! Items are created when a source is added, edited in place, and dropped
//! when removed. A run takes an owned [`BatchJob`] snapshot so edits made
//! while converting never reach the running batch.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::scanning::file_size;
use crate::audio::{detect_format, MetadataResolver, MusicMetadata};
use crate::conversion::{Quality, TargetFormat};

/// Opaque unique identity of a catalog item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new() -> Self {
        ItemId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One source file in the batch
#[derive(Debug, Clone, Serialize)]
pub struct MusicItem {
    pub id: ItemId,
    /// Display name, the source's file name
    pub name: String,
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Detected source format, e.g. "flac"
    pub format: String,
    pub metadata: MusicMetadata,
}

impl MusicItem {
    /// Inspect a source file and resolve its metadata
    pub fn from_path(path: &Path, resolver: &MetadataResolver) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            id: ItemId::new(),
            name,
            path: path.to_path_buf(),
            size: file_size(path),
            format: detect_format(path),
            metadata: resolver.resolve(path),
        }
    }

    /// Label shown while the item converts: its title, else its name
    pub fn label(&self) -> &str {
        match self.metadata.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.name,
        }
    }
}

/// Fields applied to every item at once. Blank fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct BatchEdit {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<String>,
    pub year: Option<String>,
}

impl BatchEdit {
    pub fn is_empty(&self) -> bool {
        [
            &self.title,
            &self.artist,
            &self.album,
            &self.track_number,
            &self.year,
        ]
        .iter()
        .all(|field| non_blank(field).is_none())
    }

    fn apply(&self, metadata: &mut MusicMetadata) {
        let fields = [
            (&self.title, &mut metadata.title),
            (&self.artist, &mut metadata.artist),
            (&self.album, &mut metadata.album),
            (&self.track_number, &mut metadata.track_number),
            (&self.year, &mut metadata.year),
        ];
        for (edit, target) in fields {
            if let Some(value) = non_blank(edit) {
                *target = Some(value.to_string());
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Owned snapshot handed to a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchJob {
    pub items: Vec<MusicItem>,
    pub target_format: TargetFormat,
    pub quality: Quality,
}

impl BatchJob {
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("No item with id {0}")]
    UnknownItem(ItemId),
}

/// Items of the current session plus the shared target parameters
#[derive(Debug, Default)]
pub struct Catalog {
    items: Vec<MusicItem>,
    target_format: TargetFormat,
    quality: Quality,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn items(&self) -> &[MusicItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[allow(dead_code)]
    pub fn get(&self, id: &ItemId) -> Option<&MusicItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Add a prepared item, returning its id
    pub fn push(&mut self, item: MusicItem) -> ItemId {
        let id = item.id.clone();
        self.items.push(item);
        id
    }

    /// Inspect and add a source file
    pub fn add_path(&mut self, path: &Path, resolver: &MetadataResolver) -> ItemId {
        let item = MusicItem::from_path(path, resolver);
        log::info!("Added {} ({}, {} bytes)", item.name, item.format, item.size);
        self.push(item)
    }

    #[allow(dead_code)]
    pub fn remove(&mut self, id: &ItemId) -> Result<MusicItem, CatalogError> {
        let index = self
            .items
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| CatalogError::UnknownItem(id.clone()))?;
        Ok(self.items.remove(index))
    }

    #[allow(dead_code)]
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Replace one item's metadata
    #[allow(dead_code)]
    pub fn edit_metadata(
        &mut self,
        id: &ItemId,
        metadata: MusicMetadata,
    ) -> Result<(), CatalogError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| CatalogError::UnknownItem(id.clone()))?;
        item.metadata = metadata;
        Ok(())
    }

    /// Apply the non-blank fields of `edit` to every item
    pub fn batch_edit(&mut self, edit: &BatchEdit) {
        if edit.is_empty() {
            return;
        }
        for item in &mut self.items {
            edit.apply(&mut item.metadata);
        }
        log::info!("Batch edit applied to {} items", self.items.len());
    }

    pub fn set_target_format(&mut self, format: TargetFormat) {
        self.target_format = format;
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    /// Snapshot for one run
    pub fn job(&self) -> BatchJob {
        BatchJob {
            items: self.items.clone(),
            target_format: self.target_format,
            quality: self.quality,
        }
    }
}
