//! Target formats and quality selection
//!
//! Every supported output format is a variant of [`TargetFormat`]; the
//! encoder parameters for each live in one exhaustive match.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Encoder settings for one target format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderParams {
    /// ffmpeg audio codec name
    pub codec: &'static str,
    /// Whether the quality/bitrate selector applies
    pub uses_bitrate: bool,
}

/// Output format shared by every item of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Mp3,
    Aac,
    Wav,
    Flac,
}

impl TargetFormat {
    #[cfg(test)]
    pub const ALL: [TargetFormat; 4] = [
        TargetFormat::Mp3,
        TargetFormat::Aac,
        TargetFormat::Wav,
        TargetFormat::Flac,
    ];

    /// Parse a format code. Unknown codes fall back to MP3.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "mp3" => Self::Mp3,
            "aac" => Self::Aac,
            "wav" => Self::Wav,
            "flac" => Self::Flac,
            other => {
                log::warn!("Unknown target format {:?}, using mp3", other);
                Self::Mp3
            }
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Wav => "wav",
            Self::Flac => "flac",
        }
    }

    /// File extension of converted output
    pub fn extension(self) -> &'static str {
        self.code()
    }

    pub fn params(self) -> EncoderParams {
        match self {
            Self::Mp3 => EncoderParams {
                codec: "libmp3lame",
                uses_bitrate: true,
            },
            Self::Aac => EncoderParams {
                codec: "aac",
                uses_bitrate: true,
            },
            // 16-bit PCM, bitrate is meaningless here
            Self::Wav => EncoderParams {
                codec: "pcm_s16le",
                uses_bitrate: false,
            },
            Self::Flac => EncoderParams {
                codec: "flac",
                uses_bitrate: false,
            },
        }
    }

    pub fn is_lossless(self) -> bool {
        !self.params().uses_bitrate
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Bitrate selector for lossy formats, in kbps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quality(u32);

impl Quality {
    /// Bitrates offered to the user
    #[cfg(test)]
    pub const PRESETS: [Quality; 4] = [Quality(128), Quality(192), Quality(256), Quality(320)];

    #[cfg(test)]
    pub fn from_kbps(kbps: u32) -> Self {
        Self(kbps)
    }

    #[cfg(test)]
    pub fn kbps(self) -> u32 {
        self.0
    }

    /// Parse "192k", "192K" or "192"
    pub fn parse(value: &str) -> Result<Self, String> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_suffix('k')
            .or_else(|| trimmed.strip_suffix('K'))
            .unwrap_or(trimmed);

        match digits.parse::<u32>() {
            Ok(0) => Err("Bitrate must be greater than zero".to_string()),
            Ok(kbps) => Ok(Self(kbps)),
            Err(_) => Err(format!("Invalid bitrate: {:?}", value)),
        }
    }

    /// Value for ffmpeg's `-b:a`
    pub fn ffmpeg_arg(self) -> String {
        format!("{}k", self.0)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(192)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.0)
    }
}
