// Audio module - source detection, metadata resolution and file naming

pub mod detection;
pub mod metadata;
pub mod sanitize;

pub use detection::{detect_format, is_audio_file};
pub use metadata::{strip_extension, MetadataResolver, MusicMetadata};
pub use sanitize::sanitize;
