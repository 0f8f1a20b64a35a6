//! Testing utilities and mock implementations.
//!
//! This module provides a mock transcoder that runs real child processes
//! (shell scripts), so supervisor and engine tests exercise genuine exit
//! codes, pipes and kills without ffmpeg installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use tunecast_core::testing::{fixtures, MockTranscoder};
//!
//! let transcoder = Arc::new(MockTranscoder::slow(0.5));
//! let engine = Engine::start(transcoder.clone(), fixtures::transcode_config(cache.path()))?;
//! ```

mod mock_transcoder;

pub use mock_transcoder::{MockTranscoder, SCRIPT_FAILURE, SCRIPT_SUCCESS};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::media::MediaItem;
    use crate::transcoder::TranscodeConfig;

    /// Diagnostic output of a typical probe run.
    pub const PROBE_REPORT: &str = "\
Input #0, flac, from 'song.flac':
  Metadata:
    TITLE           : Blue in Green
    ARTIST          : Miles Davis
    album           : Kind of Blue
    DATE            : 1959
  Duration: 00:05:37.45, start: 0.000000, bitrate: 1411 kb/s
    Stream #0:0: Audio: flac, 44100 Hz, stereo, s16
";

    /// Transcode configuration rooted at `cache_dir` with a fast reaper.
    pub fn transcode_config(cache_dir: &Path) -> TranscodeConfig {
        TranscodeConfig::default()
            .with_cache_dir(cache_dir.to_path_buf())
            .with_reap_interval(10)
            .with_timeout(30)
    }

    /// Create a source audio file with some bytes in it.
    pub fn source_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"native-audio-bytes").unwrap();
        path
    }

    /// Create a media item for `path` with the given native MIME type.
    pub fn media_item(id: i64, path: &Path, mime_type: &str) -> MediaItem {
        MediaItem {
            id,
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: path.to_path_buf(),
            mime_type: mime_type.to_string(),
            size_bytes: 18,
            length_secs: Some(337),
            cached: false,
        }
    }
}
