//! Music Converter - batch audio conversion
//!
//! Converts a set of audio files to MP3, AAC, WAV or FLAC through ffmpeg,
//! one at a time, naming each output from its tags and copying it to the
//! chosen destination. Ctrl-C cancels after the current file.

mod audio;
mod batch;
mod conversion;
mod core;
mod logging;
#[cfg(test)]
mod test_fixtures;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;

use crate::audio::MetadataResolver;
use crate::batch::{
    destination_file_name, BatchEvent, BatchOrchestrator, BatchState, CommandMediaIndexer,
    DestinationPolicy, ItemResult, MediaIndexer, NoopIndexer,
};
use crate::conversion::{
    find_ffmpeg, ConversionEngine, Encoder, FfmpegEncoder, Quality, TargetFormat,
};
use crate::core::{
    collect_audio_files, format_size, AppPaths, BatchEdit, BatchJob, Catalog, SettingsStore,
    APP_DIR_NAME, OUTPUT_DIRECTORY_KEY,
};

/// Command-line arguments for music-converter
#[derive(Parser, Debug)]
#[command(name = "music-converter")]
#[command(about = "Convert audio files to MP3, AAC, WAV or FLAC")]
#[command(version)]
struct Args {
    /// Audio files or folders to convert
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Target format: mp3, aac, wav or flac
    #[arg(short, long, default_value = "mp3")]
    format: String,

    /// Bitrate for mp3 and aac (128k, 192k, 256k, 320k)
    #[arg(short, long, default_value = "192k", value_parser = Quality::parse)]
    quality: Quality,

    /// Copy converted files into this folder; remembered for later runs
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Forget the remembered output folder
    #[arg(long, conflicts_with = "output_dir")]
    forget_output_dir: bool,

    /// Publish converted files to the system music folder
    #[arg(long)]
    public_media: bool,

    /// Command run with each published file to refresh the media library
    #[arg(long, requires = "public_media")]
    rescan_command: Option<String>,

    /// Set the title of every file
    #[arg(long)]
    title: Option<String>,

    /// Set the artist of every file
    #[arg(long)]
    artist: Option<String>,

    /// Set the album of every file
    #[arg(long)]
    album: Option<String>,

    /// Set the track number of every file
    #[arg(long)]
    track: Option<String>,

    /// Set the year of every file
    #[arg(long)]
    year: Option<String>,

    /// Path to the ffmpeg binary
    #[arg(long, env = "MUSIC_CONVERTER_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// Folder for converted files, staging and settings
    #[arg(long, env = "MUSIC_CONVERTER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Show debug output in the terminal
    #[arg(short, long)]
    verbose: bool,

    /// Show what would be converted without running ffmpeg
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn batch_edit(&self) -> BatchEdit {
        BatchEdit {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            track_number: self.track.clone(),
            year: self.year.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    let paths = match &args.data_dir {
        Some(dir) => AppPaths::under(dir),
        None => AppPaths::platform_default().context("Could not determine the data directory")?,
    };
    paths
        .ensure()
        .with_context(|| format!("Failed to create app directories under {:?}", paths.root()))?;

    let mut settings = SettingsStore::load(paths.settings_file());
    let destination = choose_destination(&args, &mut settings)?;

    let files = collect_audio_files(&args.inputs);
    if files.is_empty() {
        bail!("No audio files found in the given inputs");
    }

    let resolver = MetadataResolver::with_lofty(paths.cover_cache());
    let mut catalog = Catalog::new();
    catalog.set_target_format(TargetFormat::from_code(&args.format));
    catalog.set_quality(args.quality);
    for file in &files {
        catalog.add_path(file, &resolver);
    }
    catalog.batch_edit(&args.batch_edit());
    log::info!("{} files in the batch", catalog.len());

    let job = catalog.job();

    if args.dry_run {
        print_plan(&job, &destination, &paths);
        return Ok(ExitCode::SUCCESS);
    }

    let ffmpeg = find_ffmpeg(args.ffmpeg.as_deref()).context("ffmpeg is required")?;
    let encoder: Arc<dyn Encoder> = Arc::new(FfmpegEncoder::new(ffmpeg));
    let engine = ConversionEngine::new(encoder, paths.work_dir());
    let orchestrator = Arc::new(BatchOrchestrator::new(engine, paths.converted_dir()));
    let cancel = orchestrator.cancel_handle();

    let total = job.len();
    let (tx, mut rx) = mpsc::unbounded_channel::<BatchEvent>();
    let worker = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::task::spawn_blocking(move || orchestrator.run(job, &destination, &tx))
    };

    let mut interrupts = Interrupts::default();
    let mut watch_ctrl_c = true;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => report(&event),
                None => break,
            },
            result = signal::ctrl_c(), if watch_ctrl_c => match result {
                Ok(()) => match interrupts.next() {
                    Interrupt::Cancel => {
                        println!("Cancelling after the current file... (Ctrl-C again to quit now)");
                        cancel.cancel();
                    }
                    Interrupt::Quit => {
                        log::warn!("Second Ctrl-C; exiting without waiting for the batch");
                        cancel.cancel();
                        // The runtime would wait on the blocking worker
                        std::process::exit(EXIT_INTERRUPTED);
                    }
                },
                Err(e) => {
                    watch_ctrl_c = false;
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                }
            },
        }
    }

    let state = worker.await.context("Batch worker failed")?;
    let outcomes = orchestrator.last_outcomes();

    let converted = outcomes
        .iter()
        .filter(|o| matches!(o.result, ItemResult::Converted(_)))
        .count();
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.result, ItemResult::Failed(_)))
        .count();
    let skipped = total - outcomes.len()
        + outcomes
            .iter()
            .filter(|o| o.result == ItemResult::Cancelled)
            .count();

    println!();
    println!(
        "{} of {} converted, {} failed, {} not converted",
        converted, total, failed, skipped
    );
    println!("Converted files: {}", paths.converted_dir().display());

    Ok(match state {
        BatchState::Completed { .. } => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// Exit code after a second Ctrl-C, as shells report SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Stop after the current file
    Cancel,
    /// Leave immediately
    Quit,
}

/// Counts Ctrl-C presses during a batch
#[derive(Debug, Default)]
struct Interrupts {
    received: u32,
}

impl Interrupts {
    fn next(&mut self) -> Interrupt {
        self.received += 1;
        if self.received == 1 {
            Interrupt::Cancel
        } else {
            Interrupt::Quit
        }
    }
}

/// Pick where converted files go
///
/// `--public-media` wins, then the output folder given now or remembered
/// from an earlier run, else files stay in the private `Converted` folder.
fn choose_destination(args: &Args, settings: &mut SettingsStore) -> Result<DestinationPolicy> {
    if args.forget_output_dir {
        settings
            .remove(OUTPUT_DIRECTORY_KEY)
            .context("Failed to forget the output folder")?;
        println!("Forgot the remembered output folder");
    }

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output folder {:?}", dir))?;
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.clone());
        settings
            .set(OUTPUT_DIRECTORY_KEY, dir.to_string_lossy())
            .context("Failed to remember the output folder")?;
        log::info!("Output folder set to {}", dir.display());
    }

    if args.public_media {
        let music_dir = dirs::audio_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Music")))
            .context("Could not determine the music folder")?
            .join(APP_DIR_NAME);
        let indexer: Arc<dyn MediaIndexer> = match args
            .rescan_command
            .as_deref()
            .and_then(CommandMediaIndexer::from_command_line)
        {
            Some(command) => Arc::new(command),
            None => Arc::new(NoopIndexer),
        };
        return Ok(DestinationPolicy::PublicMedia { music_dir, indexer });
    }

    match settings.get(OUTPUT_DIRECTORY_KEY).map(PathBuf::from) {
        Some(dir) if dir.is_dir() => Ok(DestinationPolicy::GrantedDirectory(dir)),
        Some(dir) => {
            log::warn!(
                "Remembered output folder {} is gone; keeping files in the app folder",
                dir.display()
            );
            Ok(DestinationPolicy::AppPrivate)
        }
        None => Ok(DestinationPolicy::AppPrivate),
    }
}

fn report(event: &BatchEvent) {
    match event {
        BatchEvent::ItemStarted { index, total, name } => {
            println!("[{}/{}] {}", index + 1, total, name)
        }
        BatchEvent::ItemSucceeded { output, .. } => println!("    -> {}", output.display()),
        BatchEvent::ItemFailed { name, reason, .. } => {
            println!("    failed: {}", name);
            println!("    {}", reason);
        }
        BatchEvent::RoutingFailed { name, reason, .. } => {
            println!("    could not copy {}: {}", name, reason)
        }
        BatchEvent::BatchFinished { total, .. } => println!("All {} files converted", total),
    }
}

fn destination_dir<'a>(destination: &'a DestinationPolicy, converted_dir: &'a Path) -> &'a Path {
    match destination {
        DestinationPolicy::AppPrivate => converted_dir,
        DestinationPolicy::GrantedDirectory(dir) => dir,
        DestinationPolicy::PublicMedia { music_dir, .. } => music_dir,
    }
}

fn print_plan(job: &BatchJob, destination: &DestinationPolicy, paths: &AppPaths) {
    let converted_dir = paths.converted_dir();
    let target_dir = destination_dir(destination, &converted_dir);

    println!(
        "{} files -> {} ({}) in {}",
        job.len(),
        job.target_format,
        if job.target_format.is_lossless() {
            "lossless".to_string()
        } else {
            job.quality.to_string()
        },
        target_dir.display()
    );

    for (index, item) in job.items.iter().enumerate() {
        let meta = &item.metadata;
        println!(
            "{:>3}. {} [{}, {}]",
            index + 1,
            item.name,
            item.format,
            format_size(item.size)
        );
        println!(
            "     artist: {}  title: {}  album: {}  track: {}  year: {}",
            meta.artist.as_deref().unwrap_or("-"),
            meta.title.as_deref().unwrap_or("-"),
            meta.album.as_deref().unwrap_or("-"),
            meta.track_number.as_deref().unwrap_or("-"),
            meta.year.as_deref().unwrap_or("-"),
        );
        println!("     -> {}", destination_file_name(item, job.target_format));
    }
}
