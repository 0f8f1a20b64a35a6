//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::media::{AudioCodec, Container};

/// Codec, container and quality of an encoded representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeTarget {
    pub codec: AudioCodec,
    pub container: Container,
    /// Value passed to `-aq`; ignored for uncompressed codecs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl EncodeTarget {
    /// Quality argument actually sent to the encoder.
    pub fn effective_quality(&self) -> Option<&str> {
        if self.codec.is_uncompressed() {
            None
        } else {
            self.quality.as_deref()
        }
    }
}

/// Where the encoder writes its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeOutput {
    /// Written directly to a file.
    File(PathBuf),
    /// Written to stdout, which the caller reads.
    Pipe,
}

/// One encoder invocation.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input_path: PathBuf,
    pub target: EncodeTarget,
    pub output: EncodeOutput,
}
