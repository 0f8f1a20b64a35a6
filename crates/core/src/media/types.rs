//! Media item and format types shared by the library and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Container format of an encoded audio file.
///
/// The cache directory names files `<media_id>.<extension>`, so every
/// container has exactly one canonical extension and MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    Ogg,
    Mp3,
    Flac,
    Mp4,
    Aac,
    Webm,
    Wav,
}

impl Container {
    pub const ALL: [Container; 7] = [
        Self::Ogg,
        Self::Mp3,
        Self::Flac,
        Self::Mp4,
        Self::Aac,
        Self::Webm,
        Self::Wav,
    ];

    /// Maps a file extension (without the dot, any case) to a container.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ogg" | "oga" => Some(Self::Ogg),
            "mp3" => Some(Self::Mp3),
            "flac" => Some(Self::Flac),
            "m4a" | "mp4" => Some(Self::Mp4),
            "aac" => Some(Self::Aac),
            "webm" => Some(Self::Webm),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }

    /// Maps a file path to a container using its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Maps a MIME type to a container. Parameters (`;codecs=...`) are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "audio/ogg" | "application/ogg" => Some(Self::Ogg),
            "audio/mp3" | "audio/mpeg" => Some(Self::Mp3),
            "audio/flac" | "audio/x-flac" => Some(Self::Flac),
            "audio/mp4" | "audio/x-m4a" => Some(Self::Mp4),
            "audio/aac" => Some(Self::Aac),
            "audio/webm" => Some(Self::Webm),
            "audio/wav" | "audio/wave" | "audio/x-wav" => Some(Self::Wav),
            _ => None,
        }
    }

    /// Canonical file extension used for cache files.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Mp4 => "m4a",
            Self::Aac => "aac",
            Self::Webm => "webm",
            Self::Wav => "wav",
        }
    }

    /// MIME type sent to clients.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mp3",
            Self::Flac => "audio/flac",
            Self::Mp4 => "audio/mp4",
            Self::Aac => "audio/aac",
            Self::Webm => "audio/webm",
            Self::Wav => "audio/wav",
        }
    }

    /// Muxer name passed to ffmpeg with `-f`.
    pub fn ffmpeg_muxer(&self) -> &'static str {
        match self {
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Mp4 => "ipod",
            Self::Aac => "adts",
            Self::Webm => "webm",
            Self::Wav => "wav",
        }
    }

    /// Whether ffmpeg can write this container to a non-seekable pipe.
    pub fn is_streamable(&self) -> bool {
        !matches!(self, Self::Mp4)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Target audio codec of a transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    /// Ogg Vorbis
    Vorbis,
    /// Opus
    Opus,
    /// MPEG Audio Layer III
    Mp3,
    /// Advanced Audio Coding
    Aac,
    /// Free Lossless Audio Codec
    Flac,
    /// Uncompressed 16-bit little-endian PCM
    PcmS16le,
}

impl AudioCodec {
    /// Returns the ffmpeg encoder name for this codec.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Vorbis => "libvorbis",
            Self::Opus => "libopus",
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::PcmS16le => "pcm_s16le",
        }
    }

    /// Uncompressed codecs take no quality parameter.
    pub fn is_uncompressed(&self) -> bool {
        matches!(self, Self::PcmS16le)
    }

    /// Whether `container` can hold this codec.
    pub fn fits(&self, container: Container) -> bool {
        match self {
            Self::Vorbis | Self::Opus => matches!(container, Container::Ogg | Container::Webm),
            Self::Mp3 => container == Container::Mp3,
            Self::Aac => matches!(container, Container::Mp4 | Container::Aac),
            Self::Flac => matches!(container, Container::Flac | Container::Ogg),
            Self::PcmS16le => container == Container::Wav,
        }
    }
}

/// A media item from the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    pub name: String,
    pub path: PathBuf,
    /// Native MIME type of the source file.
    pub mime_type: String,
    pub size_bytes: u64,
    /// Length in whole seconds, if probing found a duration.
    pub length_secs: Option<u64>,
    /// Set by negotiation for the duration of one request, never persisted.
    #[serde(skip)]
    pub cached: bool,
}

impl MediaItem {
    /// Container of the native file, if it is one the engine knows.
    pub fn native_container(&self) -> Option<Container> {
        Container::from_mime(&self.mime_type).or_else(|| Container::from_path(&self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_table() {
        assert_eq!(Container::from_extension("ogg"), Some(Container::Ogg));
        assert_eq!(Container::from_extension("MP3"), Some(Container::Mp3));
        assert_eq!(Container::from_extension("m4a"), Some(Container::Mp4));
        assert_eq!(Container::from_extension("mp4"), Some(Container::Mp4));
        assert_eq!(Container::from_extension("webm"), Some(Container::Webm));
        assert_eq!(Container::from_extension("txt"), None);
    }

    #[test]
    fn test_mime_round_trip_for_all_containers() {
        for container in Container::ALL {
            assert_eq!(Container::from_mime(container.mime()), Some(container));
            assert_eq!(Container::from_extension(container.extension()), Some(container));
        }
    }

    #[test]
    fn test_mime_aliases_and_parameters() {
        assert_eq!(Container::from_mime("audio/mpeg"), Some(Container::Mp3));
        assert_eq!(
            Container::from_mime("audio/webm; codecs=vorbis"),
            Some(Container::Webm)
        );
        assert_eq!(Container::from_mime("video/mp4"), None);
    }

    #[test]
    fn test_codec_container_fit() {
        assert!(AudioCodec::Vorbis.fits(Container::Webm));
        assert!(AudioCodec::PcmS16le.fits(Container::Wav));
        assert!(!AudioCodec::PcmS16le.fits(Container::Ogg));
        assert!(!AudioCodec::Mp3.fits(Container::Webm));
    }

    #[test]
    fn test_uncompressed() {
        assert!(AudioCodec::PcmS16le.is_uncompressed());
        assert!(!AudioCodec::Vorbis.is_uncompressed());
    }

    #[test]
    fn test_native_container_falls_back_to_path() {
        let item = MediaItem {
            id: 1,
            name: "song".to_string(),
            path: PathBuf::from("/music/song.flac"),
            mime_type: "application/octet-stream".to_string(),
            size_bytes: 10,
            length_secs: None,
            cached: false,
        };
        assert_eq!(item.native_container(), Some(Container::Flac));
    }
}
