//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};

use super::config::TranscodeConfig;
use super::error::TranscodeError;
use super::traits::Transcoder;
use super::types::{EncodeOutput, EncodeRequest};
use crate::probe::{parse_probe_output, ProbeOutput};

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscodeConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscodeConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscodeConfig::default())
    }

    /// Builds ffmpeg arguments for an audio-only encode.
    fn build_args(&self, request: &EncodeRequest) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-nostdin".to_string(),
            "-hide_banner".to_string(),
            "-i".to_string(),
            request.input_path.to_string_lossy().to_string(),
            // Audio streams only, drops embedded cover art
            "-map".to_string(),
            "a".to_string(),
            "-acodec".to_string(),
            request.target.codec.ffmpeg_codec().to_string(),
        ];

        if let Some(quality) = request.target.effective_quality() {
            args.extend(["-aq".to_string(), quality.to_string()]);
        }

        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        args.extend([
            "-f".to_string(),
            request.target.container.ffmpeg_muxer().to_string(),
        ]);

        match &request.output {
            EncodeOutput::File(path) => args.push(path.to_string_lossy().to_string()),
            EncodeOutput::Pipe => args.push("pipe:1".to_string()),
        }

        args
    }

    fn not_found_or_io(err: std::io::Error, not_found: TranscodeError) -> TranscodeError {
        if err.kind() == std::io::ErrorKind::NotFound {
            not_found
        } else {
            TranscodeError::Io(err)
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeOutput, TranscodeError> {
        if !path.exists() {
            return Err(TranscodeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .arg("-hide_banner")
            .arg("-i")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                Self::not_found_or_io(
                    e,
                    TranscodeError::ProbeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    },
                )
            })?;

        // ffprobe writes its report to stderr
        let report = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(TranscodeError::probe_failed(format!(
                "ffprobe exited with code {:?}: {}",
                output.status.code(),
                report.trim()
            )));
        }

        Ok(parse_probe_output(&report))
    }

    fn spawn(&self, request: &EncodeRequest, diagnostics: File) -> Result<Child, TranscodeError> {
        let args = self.build_args(request);
        tracing::debug!("Running {:?} {}", self.config.ffmpeg_path, args.join(" "));

        let stdout = match request.output {
            EncodeOutput::File(_) => Stdio::null(),
            EncodeOutput::Pipe => Stdio::piped(),
        };

        Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::from(diagnostics))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Self::not_found_or_io(
                    e,
                    TranscodeError::EncoderNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    },
                )
            })
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| {
                Self::not_found_or_io(
                    e,
                    TranscodeError::EncoderNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    },
                )
            })?;

        Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| {
                Self::not_found_or_io(
                    e,
                    TranscodeError::ProbeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    },
                )
            })?;

        Ok(())
    }
}
