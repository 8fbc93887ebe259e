//! FFmpeg subprocess handling for audio conversion

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::format::{Quality, TargetFormat};

/// Longest encoder diagnostic carried in a failure, in characters
pub const MAX_DIAGNOSTIC_CHARS: usize = 300;

/// One encoder invocation
#[derive(Debug, Clone, Copy)]
pub struct EncoderRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub format: TargetFormat,
    pub quality: Quality,
}

/// How an encoder invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderStatus {
    Success,
    Cancelled,
    Failure(String),
}

/// An external encoder, invoked synchronously
pub trait Encoder: Send + Sync {
    /// Run one conversion and wait for it to finish
    fn invoke(&self, request: &EncoderRequest<'_>) -> EncoderStatus;

    /// Ask every in-flight invocation to stop. Best effort.
    ///
    /// The request sticks until [`Encoder::reset_cancel`]; an invocation
    /// started after it reports `Cancelled` without encoding.
    fn cancel_all(&self);

    /// Forget an earlier cancel request before a new batch
    fn reset_cancel(&self);
}

/// Keep the last `max_chars` characters of `text`
pub fn tail_excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim_end();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}

/// Build ffmpeg arguments for one request
///
/// -y               : overwrite output
/// -vn              : drop attached pictures, not every container takes them
/// -map_metadata 0  : carry tags over from the input
pub fn build_args(request: &EncoderRequest<'_>) -> Vec<String> {
    let params = request.format.params();

    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        request.input.to_string_lossy().to_string(),
        "-vn".to_string(),
        "-map_metadata".to_string(),
        "0".to_string(),
        "-codec:a".to_string(),
        params.codec.to_string(),
    ];

    if params.uses_bitrate {
        args.extend(["-b:a".to_string(), request.quality.ffmpeg_arg()]);
    }

    args.push(request.output.to_string_lossy().to_string());
    args
}

/// Classify a finished ffmpeg process
///
/// A non-zero exit after a cancel request counts as cancelled.
fn classify_exit(success: bool, cancel_requested: bool, stderr: &str) -> EncoderStatus {
    if success {
        EncoderStatus::Success
    } else if cancel_requested {
        EncoderStatus::Cancelled
    } else {
        let excerpt = tail_excerpt(stderr, MAX_DIAGNOSTIC_CHARS);
        if excerpt.is_empty() {
            EncoderStatus::Failure("ffmpeg failed without output".to_string())
        } else {
            EncoderStatus::Failure(excerpt)
        }
    }
}

/// Encoder running an `ffmpeg` executable
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
    /// PIDs of running ffmpeg processes, signalled on cancel
    running_pids: Mutex<HashSet<u32>>,
    cancel_requested: AtomicBool,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            running_pids: Mutex::new(HashSet::new()),
            cancel_requested: AtomicBool::new(false),
        }
    }

    fn register_pid(&self, pid: u32) {
        if let Ok(mut pids) = self.running_pids.lock() {
            pids.insert(pid);
        }
    }

    fn unregister_pid(&self, pid: u32) {
        if let Ok(mut pids) = self.running_pids.lock() {
            pids.remove(&pid);
        }
    }
}

impl Encoder for FfmpegEncoder {
    fn invoke(&self, request: &EncoderRequest<'_>) -> EncoderStatus {
        if self.cancel_requested.load(Ordering::SeqCst) {
            log::info!("Skipping ffmpeg for {}: cancelled", request.input.display());
            return EncoderStatus::Cancelled;
        }

        let args = build_args(request);
        log::info!(
            "Converting: {} -> {} as {} ({})",
            request.input.display(),
            request.output.display(),
            request.format,
            request.quality
        );
        log::debug!("ffmpeg {}", args.join(" "));

        let mut child = match Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return EncoderStatus::Failure(format!("Failed to spawn ffmpeg: {}", e)),
        };

        let pid = child.id();
        self.register_pid(pid);
        // A cancel between the check above and registration missed this PID
        if self.cancel_requested.load(Ordering::SeqCst) {
            signal_stop(pid);
        }

        // Drain stderr before waiting so a chatty ffmpeg can't fill the pipe
        let mut stderr = Vec::new();
        if let Some(mut pipe) = child.stderr.take() {
            if let Err(e) = pipe.read_to_end(&mut stderr) {
                log::debug!("Could not read ffmpeg stderr: {}", e);
            }
        }

        let wait_result = child.wait();
        self.unregister_pid(pid);

        let status = match wait_result {
            Ok(status) => status,
            Err(e) => return EncoderStatus::Failure(format!("Failed to wait for ffmpeg: {}", e)),
        };

        let result = classify_exit(
            status.success(),
            self.cancel_requested.load(Ordering::SeqCst),
            &String::from_utf8_lossy(&stderr),
        );

        match &result {
            EncoderStatus::Success => log::debug!("ffmpeg finished: {}", request.input.display()),
            EncoderStatus::Cancelled => log::info!("ffmpeg cancelled ({})", status),
            EncoderStatus::Failure(_) => log::warn!("ffmpeg exited with status {}", status),
        }
        result
    }

    fn cancel_all(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);

        let pids: Vec<u32> = match self.running_pids.lock() {
            Ok(pids) => pids.iter().copied().collect(),
            Err(_) => return,
        };

        for pid in pids {
            signal_stop(pid);
        }
    }

    fn reset_cancel(&self) {
        self.cancel_requested.store(false, Ordering::SeqCst);
    }
}

fn signal_stop(pid: u32) {
    log::info!("Signalling ffmpeg process {} to stop", pid);
    #[cfg(unix)]
    unsafe {
        // SIGTERM lets ffmpeg exit on its own terms
        libc::kill(pid as i32, libc::SIGTERM);
    }
    #[cfg(not(unix))]
    {
        // No portable way to signal by PID; the item runs to completion
        let _ = pid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(input: &'a Path, output: &'a Path, format: TargetFormat) -> EncoderRequest<'a> {
        EncoderRequest {
            input,
            output,
            format,
            quality: Quality::from_kbps(256),
        }
    }

    #[test]
    fn test_build_args_mp3_uses_bitrate() {
        let args = build_args(&request(
            Path::new("/work/staged_input.flac"),
            Path::new("/work/staged_output.mp3"),
            TargetFormat::Mp3,
        ));
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "/work/staged_input.flac",
                "-vn",
                "-map_metadata",
                "0",
                "-codec:a",
                "libmp3lame",
                "-b:a",
                "256k",
                "/work/staged_output.mp3",
            ]
        );
    }

    #[test]
    fn test_build_args_aac_uses_bitrate() {
        let args = build_args(&request(
            Path::new("in.wav"),
            Path::new("out.aac"),
            TargetFormat::Aac,
        ));
        assert!(args.windows(2).any(|w| w == ["-codec:a", "aac"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "256k"]));
    }

    #[test]
    fn test_build_args_lossless_ignores_bitrate() {
        for (format, codec) in [(TargetFormat::Wav, "pcm_s16le"), (TargetFormat::Flac, "flac")] {
            let args = build_args(&request(Path::new("in.mp3"), Path::new("out"), format));
            assert!(args.windows(2).any(|w| w == ["-codec:a", codec]));
            assert!(!args.iter().any(|a| a == "-b:a"));
            assert_eq!(args.last().map(String::as_str), Some("out"));
        }
    }

    #[test]
    fn test_tail_excerpt() {
        assert_eq!(tail_excerpt("short\n", 300), "short");
        let long = format!("{}END", "x".repeat(500));
        let excerpt = tail_excerpt(&long, 300);
        assert_eq!(excerpt.chars().count(), 300);
        assert!(excerpt.ends_with("END"));
    }

    #[test]
    fn test_tail_excerpt_respects_char_boundaries() {
        let text = "ş".repeat(400);
        assert_eq!(tail_excerpt(&text, 10), "ş".repeat(10));
    }

    #[test]
    fn test_classify_exit() {
        assert_eq!(classify_exit(true, true, ""), EncoderStatus::Success);
        assert_eq!(classify_exit(false, true, "killed"), EncoderStatus::Cancelled);
        assert_eq!(
            classify_exit(false, false, "line one\nInvalid data found\n"),
            EncoderStatus::Failure("line one\nInvalid data found".to_string())
        );
        assert!(matches!(classify_exit(false, false, ""), EncoderStatus::Failure(_)));
    }

    #[test]
    fn test_missing_binary_is_a_failure() {
        let encoder = FfmpegEncoder::new("/nonexistent/ffmpeg");
        let status = encoder.invoke(&request(
            Path::new("/tmp/in.flac"),
            Path::new("/tmp/out.mp3"),
            TargetFormat::Mp3,
        ));
        match status {
            EncoderStatus::Failure(msg) => assert!(msg.contains("Failed to spawn ffmpeg")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel_before_invoke_is_kept_until_reset() {
        let encoder = FfmpegEncoder::new("/nonexistent/ffmpeg");
        let req = request(
            Path::new("/tmp/in.flac"),
            Path::new("/tmp/out.mp3"),
            TargetFormat::Mp3,
        );

        encoder.cancel_all();
        assert_eq!(encoder.invoke(&req), EncoderStatus::Cancelled);
        assert_eq!(encoder.invoke(&req), EncoderStatus::Cancelled);

        encoder.reset_cancel();
        assert!(matches!(encoder.invoke(&req), EncoderStatus::Failure(_)));
    }

    #[test]
    fn test_cancel_without_running_process_is_harmless() {
        let encoder = FfmpegEncoder::new("/nonexistent/ffmpeg");
        encoder.cancel_all();
        encoder.cancel_all();
        assert!(encoder.running_pids.lock().unwrap().is_empty());
    }
}
