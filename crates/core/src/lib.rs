pub mod cache;
pub mod config;
pub mod discover;
pub mod engine;
pub mod library;
pub mod media;
pub mod metrics;
pub mod probe;
pub mod supervisor;
pub mod testing;
pub mod transcoder;

pub use cache::{CacheEntry, CacheIndex};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LibraryConfig,
    SanitizedConfig, ServerConfig,
};
pub use discover::{DiscoveryReport, MediaDiscovery};
pub use engine::{Delivery, Engine, EngineError, Negotiation, RequestMode, TranscodeStream};
pub use library::{
    LibraryError, LibraryStats, MediaDetails, MediaLibrary, NewMediaItem, SqliteLibrary,
};
pub use media::{AcceptList, AudioCodec, Container, MediaItem};
pub use probe::{parse_duration, parse_probe_output, ProbeOutput};
pub use supervisor::{
    JobHandle, JobKey, JobMode, JobSnapshot, JobSpec, JobState, SupervisorHandle, TranscodeJob,
};
pub use transcoder::{
    EncodeTarget, FfmpegTranscoder, TranscodeConfig, TranscodeError, Transcoder,
};
