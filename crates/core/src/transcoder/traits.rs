//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use tokio::process::Child;

use super::error::TranscodeError;
use super::types::EncodeRequest;
use crate::probe::ProbeOutput;

/// Front end to an external probe/encode tool.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Probes a media file for its tags and duration.
    async fn probe(&self, path: &Path) -> Result<ProbeOutput, TranscodeError>;

    /// Launches the encoder without waiting for it.
    ///
    /// The process's diagnostic stream is redirected to `diagnostics`. With
    /// [`EncodeOutput::Pipe`](super::EncodeOutput::Pipe) the child's stdout is
    /// piped and must be taken by the caller.
    fn spawn(&self, request: &EncodeRequest, diagnostics: File) -> Result<Child, TranscodeError>;

    /// Validates that the external tools are installed.
    async fn validate(&self) -> Result<(), TranscodeError>;
}
