use std::path::PathBuf;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::types::{JobHandle, JobSnapshot, JobSpec, StreamOutcome};
use crate::cache::CacheEntry;
use crate::media::Container;
use crate::transcoder::TranscodeError;

/// Requests understood by the supervisor task.
#[derive(Debug)]
pub(crate) enum Command {
    Lookup {
        media_id: i64,
        container: Container,
        reply: oneshot::Sender<Option<PathBuf>>,
    },
    Formats {
        media_id: i64,
        reply: oneshot::Sender<Vec<CacheEntry>>,
    },
    Register {
        media_id: i64,
        container: Container,
        path: PathBuf,
        reply: oneshot::Sender<()>,
    },
    Passthrough {
        media_id: i64,
        container: Container,
        source: PathBuf,
        reply: oneshot::Sender<Result<PathBuf, TranscodeError>>,
    },
    Start {
        spec: JobSpec,
        reply: oneshot::Sender<Result<JobHandle, TranscodeError>>,
    },
    Terminate {
        job_id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    StreamFinished {
        job_id: Uuid,
        outcome: StreamOutcome,
    },
    Check {
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<Vec<JobSnapshot>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle for talking to the supervisor task.
///
/// This is cheaply cloneable and can be shared across tasks. Every call is
/// a message to the task that owns the cache index and the job queue; if
/// that task is gone, calls fail with `SupervisorUnavailable`.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Command>,
}

impl SupervisorHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, TranscodeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| TranscodeError::SupervisorUnavailable)?;
        rx.await.map_err(|_| TranscodeError::SupervisorUnavailable)
    }

    /// Looks up a cached representation. Entries whose file has vanished
    /// are dropped and reported as a miss.
    pub async fn lookup(
        &self,
        media_id: i64,
        container: Container,
    ) -> Result<Option<PathBuf>, TranscodeError> {
        self.request(|reply| Command::Lookup {
            media_id,
            container,
            reply,
        })
        .await
    }

    /// All cached representations of an item that still exist on disk.
    pub async fn formats(&self, media_id: i64) -> Result<Vec<CacheEntry>, TranscodeError> {
        self.request(|reply| Command::Formats { media_id, reply })
            .await
    }

    pub async fn register(
        &self,
        media_id: i64,
        container: Container,
        path: PathBuf,
    ) -> Result<(), TranscodeError> {
        self.request(|reply| Command::Register {
            media_id,
            container,
            path,
            reply,
        })
        .await
    }

    /// Links a native source file into the cache directory and registers it.
    pub async fn passthrough(
        &self,
        media_id: i64,
        container: Container,
        source: PathBuf,
    ) -> Result<PathBuf, TranscodeError> {
        self.request(|reply| Command::Passthrough {
            media_id,
            container,
            source,
            reply,
        })
        .await?
    }

    /// Starts a job, or attaches to the running job for the same key.
    ///
    /// Returns as soon as the process is launched.
    pub async fn start(&self, spec: JobSpec) -> Result<JobHandle, TranscodeError> {
        self.request(|reply| Command::Start { spec, reply }).await?
    }

    /// Starts a job and waits for its terminal state.
    pub async fn run_and_wait(&self, spec: JobSpec) -> Result<PathBuf, TranscodeError> {
        let mut handle = self.start(spec).await?;
        handle.wait().await
    }

    /// Terminates a job. Returns false if the job is unknown.
    pub async fn terminate(&self, job_id: Uuid) -> Result<bool, TranscodeError> {
        self.request(|reply| Command::Terminate { job_id, reply })
            .await
    }

    /// Requests termination without waiting for the reply.
    ///
    /// Usable from `Drop`, where nothing can be awaited.
    pub(crate) fn terminate_soon(&self, job_id: Uuid) {
        let (reply, _) = oneshot::channel();
        match self.tx.try_send(Command::Terminate { job_id, reply }) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let tx = self.tx.clone();
                    runtime.spawn(async move {
                        let _ = tx.send(command).await;
                    });
                }
                Err(_) => tracing::warn!("Cannot terminate job {} outside a runtime", job_id),
            },
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Supervisor stopped before job {} was terminated", job_id)
            }
        }
    }

    /// Reports how the copy of a stream-mode job's output ended.
    pub async fn stream_finished(&self, job_id: Uuid, outcome: StreamOutcome) {
        if let Err(e) = self
            .tx
            .send(Command::StreamFinished { job_id, outcome })
            .await
        {
            tracing::warn!("Failed to report stream end for job {}: {}", job_id, e);
        }
    }

    /// Polls every queued job once. Returns whether any job is still running.
    pub async fn check(&self) -> Result<bool, TranscodeError> {
        self.request(|reply| Command::Check { reply }).await
    }

    /// Snapshot of the jobs currently queued.
    pub async fn status(&self) -> Result<Vec<JobSnapshot>, TranscodeError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Kills all running jobs and stops the supervisor task.
    pub async fn shutdown(&self) {
        if self.request(|reply| Command::Shutdown { reply }).await.is_err() {
            tracing::debug!("Supervisor already stopped");
        }
    }
}
