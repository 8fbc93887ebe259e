//! Routing converted files to their final destination
//!
//! Every conversion first lands in the private `Converted` directory; the
//! policy decides where a copy goes from there.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::conversion::ConversionError;

/// Asks the platform's media library to pick up a new file
pub trait MediaIndexer: Send + Sync {
    fn scan_file(&self, path: &Path) -> Result<(), String>;
}

/// Runs an external command with the file path as its last argument
#[derive(Debug, Clone)]
pub struct CommandMediaIndexer {
    program: String,
    args: Vec<String>,
}

impl CommandMediaIndexer {
    /// Split a command line on whitespace; `None` if it is blank
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl MediaIndexer for CommandMediaIndexer {
    fn scan_file(&self, path: &Path) -> Result<(), String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| format!("Failed to execute {}: {}", self.program, e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

/// Indexer for platforms that watch their music folder on their own
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndexer;

impl MediaIndexer for NoopIndexer {
    fn scan_file(&self, path: &Path) -> Result<(), String> {
        log::debug!("No media indexer configured for {}", path.display());
        Ok(())
    }
}

/// Where converted files go after landing in `Converted`
#[derive(Clone)]
pub enum DestinationPolicy {
    /// Leave them in the private directory
    AppPrivate,
    /// Copy into a directory the user picked; never overwrites
    GrantedDirectory(PathBuf),
    /// Copy into the public music folder, overwriting, then rescan the file
    PublicMedia {
        music_dir: PathBuf,
        indexer: Arc<dyn MediaIndexer>,
    },
}

impl fmt::Debug for DestinationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppPrivate => write!(f, "AppPrivate"),
            Self::GrantedDirectory(dir) => f.debug_tuple("GrantedDirectory").field(dir).finish(),
            Self::PublicMedia { music_dir, .. } => f
                .debug_struct("PublicMedia")
                .field("music_dir", music_dir)
                .finish_non_exhaustive(),
        }
    }
}

impl DestinationPolicy {
    /// Route one converted file, returning where it ended up
    pub fn route(&self, converted: &Path, file_name: &str) -> Result<PathBuf, ConversionError> {
        match self {
            Self::AppPrivate => Ok(converted.to_path_buf()),
            Self::GrantedDirectory(dir) => {
                if !dir.is_dir() {
                    return Err(ConversionError::destination_write(
                        dir,
                        "output directory is not available",
                    ));
                }
                let (target, file) = create_unique(dir, file_name)
                    .map_err(|e| ConversionError::destination_write(dir.join(file_name), e))?;
                copy_or_discard(converted, file, &target)?;
                log::info!("Copied to {}", target.display());
                Ok(target)
            }
            Self::PublicMedia { music_dir, indexer } => {
                let target = music_dir.join(file_name);
                fs::create_dir_all(music_dir)
                    .map_err(|e| ConversionError::destination_write(music_dir, e))?;
                let file =
                    File::create(&target).map_err(|e| ConversionError::destination_write(&target, e))?;
                copy_or_discard(converted, file, &target)?;

                if let Err(e) = indexer.scan_file(&target) {
                    log::warn!("Media rescan of {} failed: {}", target.display(), e);
                }
                log::info!("Published {}", target.display());
                Ok(target)
            }
        }
    }
}

/// `file_name` with " (n)" before its extension; unchanged for n = 0
pub fn numbered_name(file_name: &str, n: u32) -> String {
    if n == 0 {
        return file_name.to_string();
    }
    let (stem, extension) = match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], &file_name[idx..]),
        _ => (file_name, ""),
    };
    format!("{} ({}){}", stem, n, extension)
}

/// Create a new file in `dir`, adding " (n)" before the extension on a clash
fn create_unique(dir: &Path, file_name: &str) -> io::Result<(PathBuf, File)> {
    for n in 0u32.. {
        let candidate = dir.join(numbered_name(file_name, n));

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {}", file_name),
    ))
}

/// Fill `target` from `source`; a failed copy removes the partial target
fn copy_or_discard(source: &Path, file: File, target: &Path) -> Result<u64, ConversionError> {
    stream_copy(source, file).map_err(|e| {
        if let Err(remove_err) = fs::remove_file(target) {
            log::warn!(
                "Failed to remove partial copy {}: {}",
                target.display(),
                remove_err
            );
        }
        ConversionError::destination_write(target, e)
    })
}

fn stream_copy(source: &Path, dest: File) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(source)?);
    let mut writer = BufWriter::new(dest);
    let copied = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    Ok(copied)
}
