use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::discover::DEFAULT_MAX_DEPTH;
use crate::transcoder::{EncodeTarget, TranscodeConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub transcode: TranscodeConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Media library configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub database: PathBuf,

    /// Directories searched for audio files.
    #[serde(default)]
    pub media_dirs: Vec<PathBuf>,

    /// Directory levels searched below each media directory.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Run discovery when the server starts.
    #[serde(default = "default_scan_on_startup")]
    pub scan_on_startup: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database: default_db_path(),
            media_dirs: Vec::new(),
            max_depth: default_max_depth(),
            scan_on_startup: default_scan_on_startup(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tunecast.db")
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_scan_on_startup() -> bool {
    true
}

/// Configuration safe to expose over the API (no filesystem paths).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub library: SanitizedLibraryConfig,
    pub transcode: SanitizedTranscodeConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLibraryConfig {
    pub media_dirs: usize,
    pub max_depth: usize,
    pub scan_on_startup: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTranscodeConfig {
    pub streaming: bool,
    pub job_timeout_secs: u64,
    pub reap_interval_ms: u64,
    pub background: EncodeTarget,
    pub foreground: EncodeTarget,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            library: SanitizedLibraryConfig {
                media_dirs: config.library.media_dirs.len(),
                max_depth: config.library.max_depth,
                scan_on_startup: config.library.scan_on_startup,
            },
            transcode: SanitizedTranscodeConfig {
                streaming: config.transcode.streaming,
                job_timeout_secs: config.transcode.job_timeout_secs,
                reap_interval_ms: config.transcode.reap_interval_ms,
                background: config.transcode.background.clone(),
                foreground: config.transcode.foreground.clone(),
            },
        }
    }
}
