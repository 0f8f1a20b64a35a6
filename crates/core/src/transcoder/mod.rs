//! Transcoder module: the external probe/encode tool.
//!
//! The `Transcoder` trait launches encoder processes without waiting for
//! them; lifecycle management (polling, commit, cleanup) belongs to the
//! [`supervisor`](crate::supervisor).
//!
//! # Example
//!
//! ```ignore
//! use tunecast_core::transcoder::{FfmpegTranscoder, Transcoder, TranscodeConfig};
//!
//! let transcoder = FfmpegTranscoder::new(TranscodeConfig::default());
//! transcoder.validate().await?;
//!
//! let probe = transcoder.probe(Path::new("/music/song.flac")).await?;
//! println!("Duration: {:?} seconds", probe.duration_secs);
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::TranscodeConfig;
pub use error::TranscodeError;
pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;
pub use types::{EncodeOutput, EncodeRequest, EncodeTarget};
