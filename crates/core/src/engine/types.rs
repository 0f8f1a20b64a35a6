use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stream::TranscodeStream;
use crate::supervisor::JobHandle;

/// Why a representation is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// A client is waiting to play it now.
    Foreground,
    /// Prefetch for later playback.
    Background,
}

/// Outcome of content negotiation for one request.
#[derive(Debug)]
pub struct Negotiation {
    /// MIME type the client will receive.
    pub mime: String,
    /// Whether a complete file is already available.
    pub cached: bool,
    /// Complete file to serve, when there is one.
    pub path: Option<PathBuf>,
    /// The job producing the representation, when it is not complete yet.
    pub job: Option<JobHandle>,
}

impl Negotiation {
    pub(crate) fn cached(mime: impl Into<String>, path: PathBuf) -> Self {
        Self {
            mime: mime.into(),
            cached: true,
            path: Some(path),
            job: None,
        }
    }

    pub fn job_id(&self) -> Option<Uuid> {
        self.job.as_ref().and_then(JobHandle::job_id)
    }

    /// Whether delivering this negotiation will stream from a running encoder.
    pub fn is_streaming(&self) -> bool {
        self.job.as_ref().is_some_and(JobHandle::has_output)
    }
}

/// What to send to the client.
pub enum Delivery {
    /// A complete file; supports ranges.
    File { path: PathBuf, mime: String },
    /// Bytes as the encoder produces them.
    Stream {
        mime: String,
        job_id: Uuid,
        stream: TranscodeStream,
    },
}

impl Delivery {
    pub fn mime(&self) -> &str {
        match self {
            Self::File { mime, .. } | Self::Stream { mime, .. } => mime,
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path, mime } => f
                .debug_struct("File")
                .field("path", path)
                .field("mime", mime)
                .finish(),
            Self::Stream { mime, job_id, .. } => f
                .debug_struct("Stream")
                .field("mime", mime)
                .field("job_id", job_id)
                .finish_non_exhaustive(),
        }
    }
}
