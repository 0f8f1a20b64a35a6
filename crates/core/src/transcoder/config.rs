//! Configuration for transcoding and the transcode cache.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::media::{AudioCodec, Container};

use super::types::EncodeTarget;

/// Configuration for the ffmpeg-based transcoder and its supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Directory holding `<media_id>.<ext>` cache files.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// A job still running after this many seconds is killed.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// How often the supervisor polls running jobs, in milliseconds.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_ms: u64,

    /// Read size when streaming encoder output to a client.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Stream foreground transcodes while they are written to the cache.
    /// When false, foreground requests wait for the whole file.
    #[serde(default = "default_streaming")]
    pub streaming: bool,

    /// Long-term format used for prefetch requests.
    #[serde(default = "default_background")]
    pub background: EncodeTarget,

    /// Low-latency format used for interactive requests.
    #[serde(default = "default_foreground")]
    pub foreground: EncodeTarget,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_job_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_reap_interval() -> u64 {
    500
}

fn default_chunk_size() -> usize {
    4096
}

fn default_streaming() -> bool {
    true
}

fn default_background() -> EncodeTarget {
    EncodeTarget {
        codec: AudioCodec::Vorbis,
        container: Container::Webm,
        quality: Some("4".to_string()),
    }
}

fn default_foreground() -> EncodeTarget {
    EncodeTarget {
        codec: AudioCodec::PcmS16le,
        container: Container::Wav,
        quality: None,
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            job_timeout_secs: default_job_timeout(),
            reap_interval_ms: default_reap_interval(),
            chunk_size: default_chunk_size(),
            streaming: default_streaming(),
            background: default_background(),
            foreground: default_foreground(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl TranscodeConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the cache directory.
    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    /// Sets the job timeout in seconds.
    pub fn with_timeout(mut self, job_timeout_secs: u64) -> Self {
        self.job_timeout_secs = job_timeout_secs;
        self
    }

    /// Sets the reaper interval in milliseconds.
    pub fn with_reap_interval(mut self, reap_interval_ms: u64) -> Self {
        self.reap_interval_ms = reap_interval_ms;
        self
    }

    /// Selects streaming or blocking foreground delivery.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}
