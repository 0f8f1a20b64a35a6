//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing or transcoding.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    EncoderNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    ProbeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The probe exited non-zero.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// The encoder exited non-zero or produced no output.
    #[error("Transcode failed: {reason}")]
    Failed {
        reason: String,
        diagnostics: Option<String>,
    },

    /// The job exceeded its time limit and was killed.
    #[error("Transcode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The job was terminated before completion.
    #[error("Transcode cancelled")]
    Cancelled,

    /// The supervisor task is gone (shutdown in progress).
    #[error("Transcode supervisor is not running")]
    SupervisorUnavailable,

    /// I/O error around the encoder process or cache files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Creates a new transcode failed error with diagnostic output.
    pub fn failed(reason: impl Into<String>, diagnostics: Option<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            diagnostics,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled | Self::Io(_))
    }
}
