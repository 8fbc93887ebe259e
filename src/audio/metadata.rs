//! Metadata resolution for source audio files
//!
//! Embedded tags win when they carry a title or an artist. Otherwise the
//! file name is parsed for "track - artist - title" style patterns.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use lofty::{Accessor, ItemKey, PictureType, Probe, Tag, TaggedFileExt};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resolved metadata for one music item
///
/// Every field is optional; nothing is authoritative until resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Kept as a string so "03" stays "03"
    pub track_number: Option<String>,
    pub year: Option<String>,
    /// Reference to a cached cover image on disk
    pub cover: Option<PathBuf>,
}

/// Raw fields read from a file's embedded tags
#[derive(Debug, Clone, Default)]
pub struct EmbeddedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<String>,
    pub year: Option<String>,
    pub cover: Option<Vec<u8>>,
}

/// Errors from tag reading and cover caching
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read tags from {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("Failed to cache cover image: {0}")]
    CoverCache(#[from] std::io::Error),
}

/// Reads embedded tags from an audio file
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<EmbeddedTags, MetadataError>;
}

/// Tag reader backed by lofty
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Result<EmbeddedTags, MetadataError> {
        let read_failed = |reason: String| MetadataError::ReadFailed {
            path: path.to_path_buf(),
            reason,
        };

        let tagged_file = Probe::open(path)
            .map_err(|e| read_failed(format!("Failed to open file: {}", e)))?
            .read()
            .map_err(|e| read_failed(format!("Failed to read file: {}", e)))?;

        match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            Some(tag) => Ok(tags_from_lofty(tag)),
            None => Ok(EmbeddedTags::default()),
        }
    }
}

fn non_blank(value: Option<Cow<'_, str>>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn tags_from_lofty(tag: &Tag) -> EmbeddedTags {
    // Raw strings first: the numeric accessors drop leading zeros
    let track_number = tag
        .get_string(&ItemKey::TrackNumber)
        .map(|raw| raw.split('/').next().unwrap_or(raw))
        .map(Cow::Borrowed)
        .and_then(|raw| non_blank(Some(raw)))
        .or_else(|| tag.track().map(|n| n.to_string()));

    let year = non_blank(tag.get_string(&ItemKey::Year).map(Cow::Borrowed))
        .or_else(|| non_blank(tag.get_string(&ItemKey::RecordingDate).map(Cow::Borrowed)))
        .or_else(|| tag.year().map(|y| y.to_string()));

    let cover = tag
        .pictures()
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| tag.pictures().first())
        .map(|p| p.data().to_vec());

    EmbeddedTags {
        title: non_blank(tag.title()),
        artist: non_blank(tag.artist()),
        album: non_blank(tag.album()),
        track_number,
        year,
        cover,
    }
}

/// Derives a [`MusicMetadata`] record for a source file
pub struct MetadataResolver {
    reader: Box<dyn TagReader>,
    cover_cache: PathBuf,
}

impl MetadataResolver {
    pub fn new(reader: Box<dyn TagReader>, cover_cache: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            cover_cache: cover_cache.into(),
        }
    }

    /// Resolver using lofty for embedded tags
    pub fn with_lofty(cover_cache: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(LoftyTagReader), cover_cache)
    }

    /// Resolve metadata for `path`. Never fails; falls back to the file name.
    pub fn resolve(&self, path: &Path) -> MusicMetadata {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let tags = match self.reader.read_tags(path) {
            Ok(tags) => tags,
            Err(e) => {
                log::debug!("No embedded tags for {}: {}", path.display(), e);
                return parse_from_filename(&file_name);
            }
        };

        let cover = tags.cover.as_deref().and_then(|data| {
            match save_cover(&self.cover_cache, data) {
                Ok(cover_path) => Some(cover_path),
                Err(e) => {
                    log::warn!("Could not cache cover for {}: {}", path.display(), e);
                    None
                }
            }
        });

        if tags.title.is_some() || tags.artist.is_some() {
            MusicMetadata {
                title: tags.title,
                artist: tags.artist,
                album: tags.album,
                track_number: tags.track_number,
                year: tags.year,
                cover,
            }
        } else {
            log::debug!("Tags of {} carry no title/artist, parsing file name", path.display());
            MusicMetadata {
                cover,
                ..parse_from_filename(&file_name)
            }
        }
    }
}

/// Write cover bytes into the cache under a name unique to this resolution
fn save_cover(cache_dir: &Path, data: &[u8]) -> Result<PathBuf, MetadataError> {
    const PNG_MAGIC: &[u8] = b"\x89PNG";

    let extension = if data.starts_with(PNG_MAGIC) { "png" } else { "jpg" };

    fs::create_dir_all(cache_dir)?;

    let filename = format!(
        "cover_{}_{}.{}",
        chrono::Utc::now().timestamp_millis(),
        &uuid::Uuid::new_v4().simple().to_string()[..8],
        extension
    );
    let cover_path = cache_dir.join(filename);
    fs::write(&cover_path, data)?;

    log::debug!("Cached cover image at {:?}", cover_path);
    Ok(cover_path)
}

/// Strip the last extension from a file name
///
/// A leading dot is not treated as an extension separator.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

struct FilenamePatterns {
    track_artist_title: Regex,
    artist_title: Regex,
    track_title: Regex,
}

fn filename_patterns() -> &'static FilenamePatterns {
    static PATTERNS: OnceLock<FilenamePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| FilenamePatterns {
        track_artist_title: Regex::new(r"^(\d+)\s*-\s*(.+?)\s*-\s*(.+)$")
            .expect("valid track/artist/title pattern"),
        artist_title: Regex::new(r"^(.+?)\s*-\s*(.+)$").expect("valid artist/title pattern"),
        track_title: Regex::new(r"^(\d+)\s+(.+)$").expect("valid track/title pattern"),
    })
}

fn group(caps: &regex_lite::Captures<'_>, index: usize) -> Option<String> {
    caps.get(index).map(|m| m.as_str().trim().to_string())
}

/// Guess metadata from a file name such as `03 - Artist - Title.mp3`
///
/// Patterns are tried in order, first match wins:
/// `<digits> - <artist> - <title>`, `<artist> - <title>`, `<digits> <title>`,
/// and finally the whole base name as title.
pub fn parse_from_filename(filename: &str) -> MusicMetadata {
    let base = strip_extension(filename);
    let patterns = filename_patterns();

    if let Some(caps) = patterns.track_artist_title.captures(base) {
        return MusicMetadata {
            track_number: group(&caps, 1),
            artist: group(&caps, 2),
            title: group(&caps, 3),
            ..Default::default()
        };
    }

    if let Some(caps) = patterns.artist_title.captures(base) {
        return MusicMetadata {
            artist: group(&caps, 1),
            title: group(&caps, 2),
            ..Default::default()
        };
    }

    if let Some(caps) = patterns.track_title.captures(base) {
        return MusicMetadata {
            track_number: group(&caps, 1),
            title: group(&caps, 2),
            ..Default::default()
        };
    }

    MusicMetadata {
        title: Some(base.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct StaticTagReader(Result<EmbeddedTags, ()>);

    impl TagReader for StaticTagReader {
        fn read_tags(&self, path: &Path) -> Result<EmbeddedTags, MetadataError> {
            self.0.clone().map_err(|_| MetadataError::ReadFailed {
                path: path.to_path_buf(),
                reason: "corrupt".to_string(),
            })
        }
    }

    fn resolver(tags: Result<EmbeddedTags, ()>, cache: &Path) -> MetadataResolver {
        MetadataResolver::new(Box::new(StaticTagReader(tags)), cache)
    }

    #[test]
    fn test_parse_track_artist_title() {
        let meta = parse_from_filename("03 - Daft Punk - One More Time.mp3");
        assert_eq!(meta.track_number.as_deref(), Some("03"));
        assert_eq!(meta.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(meta.title.as_deref(), Some("One More Time"));
        assert_eq!(meta.album, None);
    }

    #[test]
    fn test_parse_artist_title() {
        let meta = parse_from_filename("Daft Punk - One More Time.mp3");
        assert_eq!(meta.track_number, None);
        assert_eq!(meta.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(meta.title.as_deref(), Some("One More Time"));
    }

    #[test]
    fn test_parse_track_title() {
        let meta = parse_from_filename("07 Waterfall.mp3");
        assert_eq!(meta.track_number.as_deref(), Some("07"));
        assert_eq!(meta.title.as_deref(), Some("Waterfall"));
        assert_eq!(meta.artist, None);
    }

    #[test]
    fn test_parse_title_only() {
        let meta = parse_from_filename("Waterfall.mp3");
        assert_eq!(
            meta,
            MusicMetadata {
                title: Some("Waterfall".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_parse_extra_hyphens_go_to_title() {
        let meta = parse_from_filename("01 - Artist - Title - Live Version.flac");
        assert_eq!(meta.track_number.as_deref(), Some("01"));
        assert_eq!(meta.artist.as_deref(), Some("Artist"));
        assert_eq!(meta.title.as_deref(), Some("Title - Live Version"));

        let meta = parse_from_filename("A - B - C - D.mp3");
        assert_eq!(meta.artist.as_deref(), Some("A"));
        assert_eq!(meta.title.as_deref(), Some("B - C - D"));
    }

    #[test]
    fn test_parse_without_extension_and_tight_hyphens() {
        let meta = parse_from_filename("12-Artist-Title");
        assert_eq!(meta.track_number.as_deref(), Some("12"));
        assert_eq!(meta.artist.as_deref(), Some("Artist"));
        assert_eq!(meta.title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("song.mp3"), "song");
        assert_eq!(strip_extension("a.b.flac"), "a.b");
        assert_eq!(strip_extension("noext"), "noext");
        assert_eq!(strip_extension(".hidden"), ".hidden");
    }

    #[test]
    fn test_resolve_prefers_embedded_tags() {
        let cache = TempDir::new().unwrap();
        let tags = EmbeddedTags {
            title: Some("Around the World".to_string()),
            artist: Some("Daft Punk".to_string()),
            album: Some("Homework".to_string()),
            track_number: Some("07".to_string()),
            year: Some("1997".to_string()),
            cover: None,
        };
        let meta = resolver(Ok(tags), cache.path()).resolve(Path::new("/music/01 - X - Y.mp3"));
        assert_eq!(meta.title.as_deref(), Some("Around the World"));
        assert_eq!(meta.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(meta.album.as_deref(), Some("Homework"));
        assert_eq!(meta.track_number.as_deref(), Some("07"));
        assert_eq!(meta.year.as_deref(), Some("1997"));
        assert_eq!(meta.cover, None);
    }

    #[test]
    fn test_resolve_artist_only_is_enough() {
        let cache = TempDir::new().unwrap();
        let tags = EmbeddedTags {
            artist: Some("Air".to_string()),
            ..Default::default()
        };
        let meta = resolver(Ok(tags), cache.path()).resolve(Path::new("/music/07 Waterfall.mp3"));
        assert_eq!(meta.artist.as_deref(), Some("Air"));
        assert_eq!(meta.title, None);
        assert_eq!(meta.track_number, None);
    }

    #[test]
    fn test_resolve_falls_back_to_filename_but_keeps_cover() {
        let cache = TempDir::new().unwrap();
        let tags = EmbeddedTags {
            album: Some("Ignored".to_string()),
            cover: Some(b"\xFF\xD8\xFFjpeg-bytes".to_vec()),
            ..Default::default()
        };
        let meta = resolver(Ok(tags), cache.path())
            .resolve(Path::new("/music/03 - Daft Punk - One More Time.mp3"));

        assert_eq!(meta.track_number.as_deref(), Some("03"));
        assert_eq!(meta.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(meta.title.as_deref(), Some("One More Time"));
        assert_eq!(meta.album, None);

        let cover = meta.cover.expect("cover should be preserved");
        assert!(cover.starts_with(cache.path()));
        assert_eq!(cover.extension().and_then(|e| e.to_str()), Some("jpg"));
        assert_eq!(fs::read(&cover).unwrap(), b"\xFF\xD8\xFFjpeg-bytes");
    }

    #[test]
    fn test_resolve_reader_failure_uses_filename() {
        let cache = TempDir::new().unwrap();
        let meta = resolver(Err(()), cache.path()).resolve(Path::new("/music/Waterfall.ogg"));
        assert_eq!(meta.title.as_deref(), Some("Waterfall"));
        assert_eq!(meta.cover, None);
    }

    #[test]
    fn test_cover_names_are_unique() {
        let cache = TempDir::new().unwrap();
        let png = b"\x89PNG\r\n\x1a\nrest";
        let first = save_cover(cache.path(), png).unwrap();
        let second = save_cover(cache.path(), png).unwrap();
        assert_ne!(first, second);
        assert_eq!(first.extension().and_then(|e| e.to_str()), Some("png"));
    }

    #[test]
    fn test_cover_failure_is_not_fatal() {
        let cache = TempDir::new().unwrap();
        // A file where the cache directory should be makes create_dir_all fail
        let blocked = cache.path().join("blocked");
        fs::write(&blocked, "not a directory").unwrap();

        let tags = EmbeddedTags {
            title: Some("Title".to_string()),
            cover: Some(vec![1, 2, 3]),
            ..Default::default()
        };
        let meta = resolver(Ok(tags), &blocked).resolve(Path::new("/music/x.mp3"));
        assert_eq!(meta.title.as_deref(), Some("Title"));
        assert_eq!(meta.cover, None);
    }

    #[test]
    fn test_lofty_reader_rejects_missing_file() {
        let result = LoftyTagReader.read_tags(Path::new("/nonexistent/file.mp3"));
        assert!(result.is_err());
    }

    #[test]
    fn test_lofty_resolver_on_garbage_file_uses_filename() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("05 Garbage In.mp3");
        fs::write(&path, b"definitely not audio").unwrap();

        let meta = MetadataResolver::with_lofty(dir.path().join("covers")).resolve(&path);
        assert_eq!(meta.track_number.as_deref(), Some("05"));
        assert_eq!(meta.title.as_deref(), Some("Garbage In"));
    }
}
