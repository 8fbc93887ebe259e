use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::{
    CodecType, CODEC_TYPE_AAC, CODEC_TYPE_ALAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP3,
    CODEC_TYPE_OPUS, CODEC_TYPE_VORBIS,
};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Check if a file is an audio file based on its extension
pub fn is_audio_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        matches!(
            ext.as_str(),
            "mp3" | "flac" | "wav" | "ogg" | "m4a" | "aac" | "aiff" | "opus" | "alac" | "wma"
        )
    } else {
        false
    }
}

/// Lower-cased extension of `path`, or "unknown"
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}

fn codec_name(codec: CodecType) -> Option<&'static str> {
    match codec {
        c if c == CODEC_TYPE_MP3 => Some("mp3"),
        c if c == CODEC_TYPE_FLAC => Some("flac"),
        c if c == CODEC_TYPE_AAC => Some("aac"),
        c if c == CODEC_TYPE_VORBIS => Some("ogg"),
        c if c == CODEC_TYPE_OPUS => Some("opus"),
        c if c == CODEC_TYPE_ALAC => Some("alac"),
        _ => None,
    }
}

/// Detect the source format of an audio file
///
/// Probes the container with symphonia and names the codec of the default
/// track. PCM and anything symphonia can't name fall back to the extension.
pub fn detect_format(path: &Path) -> String {
    probe_codec(path).unwrap_or_else(|| extension_of(path))
}

fn probe_codec(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .ok()?;

    let track = probed.format.default_track()?;
    let name = codec_name(track.codec_params.codec)?;
    log::debug!("Detected {} codec in {:?}", name, path.file_name());
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_recognizes_audio_formats() {
        assert!(is_audio_file(Path::new("test.mp3")));
        assert!(is_audio_file(Path::new("test.flac")));
        assert!(is_audio_file(Path::new("test.WAV")));
        assert!(is_audio_file(Path::new("test.m4a")));
    }

    #[test]
    fn test_rejects_non_audio() {
        assert!(!is_audio_file(Path::new("test.txt")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("test")));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("song.FLAC")), "flac");
        assert_eq!(extension_of(Path::new("song")), "unknown");
    }

    #[test]
    fn test_detect_format_falls_back_to_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not_really.ogg");
        std::fs::write(&path, b"plain text, not a container").unwrap();
        assert_eq!(detect_format(&path), "ogg");
    }

    #[test]
    fn test_detect_format_missing_file() {
        assert_eq!(detect_format(Path::new("/nonexistent/track.wav")), "wav");
    }
}
