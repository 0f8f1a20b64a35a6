//! Types for the job supervisor.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs::File;
use tokio::process::ChildStdout;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use super::handle::SupervisorHandle;
use crate::media::Container;
use crate::transcoder::{EncodeTarget, TranscodeError};

/// At most one job is active per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobKey {
    pub media_id: i64,
    pub container: Container,
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.media_id, self.container)
    }
}

/// Where a job's encoded payload goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// The encoder writes the partial file itself.
    File,
    /// The encoder writes to a pipe; the caller copies it to the client and
    /// the partial file.
    Stream,
}

impl JobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Stream => "stream",
        }
    }
}

/// What to transcode.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub media_id: i64,
    pub source: PathBuf,
    pub target: EncodeTarget,
    pub mode: JobMode,
}

impl JobSpec {
    pub fn key(&self) -> JobKey {
        JobKey {
            media_id: self.media_id,
            container: self.target.container,
        }
    }
}

/// Lifecycle of a job. Every state but `Running` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Running,
    Completed {
        path: PathBuf,
    },
    Failed {
        reason: String,
        /// Set when the job was killed for exceeding its deadline.
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
    Terminated,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Terminated => "terminated",
        }
    }

    /// Converts a terminal state into the caller-facing result.
    fn result(&self) -> Option<Result<PathBuf, TranscodeError>> {
        match self {
            Self::Running => None,
            Self::Completed { path } => Some(Ok(path.clone())),
            Self::Failed {
                timeout_secs: Some(timeout_secs),
                ..
            } => Some(Err(TranscodeError::Timeout {
                timeout_secs: *timeout_secs,
            })),
            Self::Failed { reason, .. } => Some(Err(TranscodeError::failed(reason.clone(), None))),
            Self::Terminated => Some(Err(TranscodeError::Cancelled)),
        }
    }
}

/// A job known to the supervisor.
#[derive(Debug, Clone, Serialize)]
pub struct TranscodeJob {
    pub id: Uuid,
    pub key: JobKey,
    pub source: PathBuf,
    pub target: EncodeTarget,
    pub mode: JobMode,
    /// Final cache location, written on success.
    pub output_path: PathBuf,
    /// Location the payload is written to while the job runs.
    pub partial_path: PathBuf,
    /// File capturing the encoder's diagnostic output.
    pub scratch_path: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// How a stream copy ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The encoder hit end of output and everything was written.
    Complete,
    /// The client stopped reading.
    ClientGone,
    /// Writing the partial file failed.
    Failed(String),
}

/// Encoder output handed to the caller of a stream-mode job.
///
/// Dropping it before anyone has claimed it terminates the job.
#[derive(Debug)]
pub struct StreamOutput {
    pub stdout: ChildStdout,
    /// The job's partial file, opened for writing.
    pub sink: File,
    owner: Option<(SupervisorHandle, Uuid)>,
}

impl StreamOutput {
    pub(crate) fn new(
        stdout: ChildStdout,
        sink: File,
        owner: Option<(SupervisorHandle, Uuid)>,
    ) -> Self {
        Self {
            stdout,
            sink,
            owner,
        }
    }

    /// Takes over responsibility for ending the job.
    pub(crate) fn claim(&mut self) {
        self.owner = None;
    }
}

impl Drop for StreamOutput {
    fn drop(&mut self) {
        if let Some((supervisor, job_id)) = self.owner.take() {
            debug!("Output of job {} dropped unread", job_id);
            supervisor.terminate_soon(job_id);
        }
    }
}

/// Running job as seen by status queries.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub job: TranscodeJob,
    pub elapsed_secs: u64,
    /// Termination was requested but the process has not been reaped yet.
    pub terminating: bool,
}

/// Caller's view of a job.
///
/// `started` is true only for the request that launched the process. A
/// handle for a key that was already cached carries no job and is complete
/// from the start.
#[derive(Debug)]
pub struct JobHandle {
    pub key: JobKey,
    pub job: Option<TranscodeJob>,
    pub started: bool,
    state: watch::Receiver<JobState>,
    output: Option<StreamOutput>,
}

impl JobHandle {
    pub(crate) fn new(
        job: TranscodeJob,
        started: bool,
        state: watch::Receiver<JobState>,
        output: Option<StreamOutput>,
    ) -> Self {
        Self {
            key: job.key,
            job: Some(job),
            started,
            state,
            output,
        }
    }

    /// A handle for a representation that is already in the cache.
    pub(crate) fn ready(key: JobKey, path: PathBuf) -> Self {
        let (_tx, state) = watch::channel(JobState::Completed { path });
        Self {
            key,
            job: None,
            started: false,
            state,
            output: None,
        }
    }

    pub fn job_id(&self) -> Option<Uuid> {
        self.job.as_ref().map(|job| job.id)
    }

    /// Current state without waiting.
    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Takes the stream-mode output. Only the starting handle has one.
    pub fn take_output(&mut self) -> Option<StreamOutput> {
        self.output.take()
    }

    /// Waits for the job to reach a terminal state.
    ///
    /// Returns the committed cache path on success.
    pub async fn wait(&mut self) -> Result<PathBuf, TranscodeError> {
        loop {
            let current = self.state.borrow_and_update().result();
            if let Some(result) = current {
                return result;
            }
            if self.state.changed().await.is_err() {
                // Sender gone: the last value is final
                let last = self.state.borrow().result();
                return last.unwrap_or(Err(TranscodeError::SupervisorUnavailable));
            }
        }
    }
}
