//! The supervisor task: owns the cache index and the queue of running jobs.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tempfile::NamedTempFile;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::handle::{Command, SupervisorHandle};
use super::types::{
    JobHandle, JobMode, JobSnapshot, JobSpec, JobState, StreamOutcome, StreamOutput,
    TranscodeJob,
};
use crate::cache::{CacheEntry, CacheIndex, PARTIAL_EXTENSION};
use crate::media::Container;
use crate::metrics;
use crate::transcoder::{
    EncodeOutput, EncodeRequest, TranscodeConfig, TranscodeError, Transcoder,
};

/// Why a job is being killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillReason {
    /// Client disconnect or explicit terminate request.
    Requested,
    /// Past the job deadline.
    Timeout,
    /// Supervisor shutting down.
    Shutdown,
    /// The copy of a stream-mode job's output failed.
    StreamFailed,
}

struct RunningJob {
    job: TranscodeJob,
    child: Child,
    /// Deleted when dropped.
    scratch: NamedTempFile,
    state_tx: watch::Sender<JobState>,
    started: Instant,
    deadline: Instant,
    killed: Option<KillReason>,
    exit: Option<ExitStatus>,
    stream: Option<StreamOutcome>,
}

impl RunningJob {
    fn kill(&mut self, reason: KillReason) {
        if self.killed.is_some() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            // Already exited processes report an error here
            debug!("Kill for job {} returned: {}", self.job.id, e);
        }
        self.killed = Some(reason);
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job: self.job.clone(),
            elapsed_secs: self.started.elapsed().as_secs(),
            terminating: self.killed.is_some(),
        }
    }

    fn scratch_text(&self) -> String {
        match fs::read(self.scratch.path()) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
            Err(e) => format!("<diagnostics unavailable: {}>", e),
        }
    }
}

/// Background task that runs transcode jobs and keeps the cache index.
///
/// Spawn with `tokio::spawn(supervisor.run())`. The task polls running jobs
/// every `reap_interval_ms` whether or not requests arrive, and stops when
/// asked to shut down or when every handle has been dropped.
pub struct Supervisor {
    rx: mpsc::Receiver<Command>,
    /// Lets unread stream output reach back to the task without keeping it alive.
    commands: mpsc::WeakSender<Command>,
    transcoder: Arc<dyn Transcoder>,
    config: TranscodeConfig,
    index: CacheIndex,
    queue: VecDeque<RunningJob>,
}

impl Supervisor {
    pub(crate) fn new(
        rx: mpsc::Receiver<Command>,
        commands: mpsc::WeakSender<Command>,
        transcoder: Arc<dyn Transcoder>,
        config: TranscodeConfig,
        index: CacheIndex,
    ) -> Self {
        Self {
            rx,
            commands,
            transcoder,
            config,
            index,
            queue: VecDeque::new(),
        }
    }

    /// Run the supervisor until shutdown.
    pub async fn run(mut self) {
        info!(
            "Transcode supervisor started ({} cached files, reaping every {}ms)",
            self.index.len(),
            self.config.reap_interval_ms
        );

        let mut reaper =
            tokio::time::interval(Duration::from_millis(self.config.reap_interval_ms.max(1)));
        reaper.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                _ = reaper.tick() => {
                    self.check();
                }
            }
        }

        info!("Transcode supervisor stopped");
    }

    /// Returns false once the supervisor should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Lookup {
                media_id,
                container,
                reply,
            } => {
                let _ = reply.send(self.lookup(media_id, container));
            }
            Command::Formats { media_id, reply } => {
                let _ = reply.send(self.formats(media_id));
            }
            Command::Register {
                media_id,
                container,
                path,
                reply,
            } => {
                self.index.register(media_id, container, path);
                let _ = reply.send(());
            }
            Command::Passthrough {
                media_id,
                container,
                source,
                reply,
            } => {
                let _ = reply.send(self.passthrough(media_id, container, &source));
            }
            Command::Start { spec, reply } => {
                let result = self.start(spec);
                if let Err(Ok(mut handle)) = reply.send(result) {
                    // Caller went away before the reply arrived
                    if let Some(job_id) = handle.job_id().filter(|_| handle.started) {
                        if let Some(mut output) = handle.take_output() {
                            output.claim();
                        }
                        self.terminate(job_id);
                    }
                }
            }
            Command::Terminate { job_id, reply } => {
                let _ = reply.send(self.terminate(job_id));
            }
            Command::StreamFinished { job_id, outcome } => self.stream_finished(job_id, outcome),
            Command::Check { reply } => {
                let _ = reply.send(self.check());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.queue.iter().map(RunningJob::snapshot).collect());
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// Index lookup with self-healing for vanished files.
    fn lookup(&mut self, media_id: i64, container: Container) -> Option<PathBuf> {
        let path = match self.index.lookup(media_id, container) {
            Some(path) => path.to_path_buf(),
            None => {
                metrics::CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
                return None;
            }
        };

        // exists() follows symlinks, so a dangling passthrough link is stale too
        if path.exists() {
            metrics::CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
            debug!("Cache hit for {}.{}: {:?}", media_id, container, path);
            Some(path)
        } else {
            warn!(
                "Cache entry for {}.{} points to missing file {:?}, dropping it",
                media_id, container, path
            );
            self.index.remove(media_id, container);
            metrics::CACHE_LOOKUPS.with_label_values(&["stale"]).inc();
            None
        }
    }

    fn formats(&mut self, media_id: i64) -> Vec<CacheEntry> {
        let mut live = Vec::new();
        for entry in self.index.formats(media_id) {
            if self.lookup(media_id, entry.container).is_some() {
                live.push(entry);
            }
        }
        live
    }

    fn passthrough(
        &mut self,
        media_id: i64,
        container: Container,
        source: &Path,
    ) -> Result<PathBuf, TranscodeError> {
        if !source.exists() {
            return Err(TranscodeError::InputNotFound {
                path: source.to_path_buf(),
            });
        }

        let link = self.index.output_path(media_id, container);
        if link != source {
            // A dangling link fails exists() but still occupies the name
            if fs::symlink_metadata(&link).is_ok() {
                fs::remove_file(&link)?;
            }
            link_file(source, &link)?;
        }

        self.index.register(media_id, container, link.clone());
        metrics::PASSTHROUGH_LINKS.inc();
        debug!("Linked {:?} into cache as {:?}", source, link);
        Ok(link)
    }

    fn start(&mut self, spec: JobSpec) -> Result<JobHandle, TranscodeError> {
        let key = spec.key();

        if let Some(path) = self.lookup(key.media_id, key.container) {
            return Ok(JobHandle::ready(key, path));
        }

        if let Some(running) = self
            .queue
            .iter()
            .find(|running| running.job.key == key && running.killed.is_none())
        {
            info!("Attaching to running job {} for {}", running.job.id, key);
            metrics::JOBS_DEDUPLICATED.inc();
            return Ok(JobHandle::new(
                running.job.clone(),
                false,
                running.state_tx.subscribe(),
                None,
            ));
        }

        if !spec.source.exists() {
            return Err(TranscodeError::InputNotFound { path: spec.source });
        }

        let id = Uuid::new_v4();
        let output_path = self.index.output_path(key.media_id, key.container);
        let partial_path = partial_path_for(&output_path, id);

        let scratch = tempfile::Builder::new()
            .prefix("tunecast-job-")
            .suffix(".log")
            .tempfile()?;
        let diagnostics = scratch.reopen()?;

        let (encode_output, sink) = match spec.mode {
            JobMode::File => (EncodeOutput::File(partial_path.clone()), None),
            JobMode::Stream => (EncodeOutput::Pipe, Some(fs::File::create(&partial_path)?)),
        };

        let request = EncodeRequest {
            input_path: spec.source.clone(),
            target: spec.target.clone(),
            output: encode_output,
        };

        let mut child = match self.transcoder.spawn(&request, diagnostics) {
            Ok(child) => child,
            Err(e) => {
                remove_if_exists(&partial_path);
                return Err(e);
            }
        };

        let output = match sink {
            Some(file) => match child.stdout.take() {
                Some(stdout) => Some(StreamOutput::new(
                    stdout,
                    tokio::fs::File::from_std(file),
                    self.commands
                        .upgrade()
                        .map(|tx| (SupervisorHandle::new(tx), id)),
                )),
                None => {
                    let _ = child.start_kill();
                    remove_if_exists(&partial_path);
                    return Err(TranscodeError::failed(
                        "encoder stdout was not captured",
                        None,
                    ));
                }
            },
            None => None,
        };

        let job = TranscodeJob {
            id,
            key,
            source: spec.source,
            target: spec.target,
            mode: spec.mode,
            output_path,
            partial_path,
            scratch_path: scratch.path().to_path_buf(),
            started_at: Utc::now(),
        };

        info!(
            "Started {} job {} for {} with {} ({})",
            spec.mode.as_str(),
            id,
            key,
            self.transcoder.name(),
            job.target.codec.ffmpeg_codec()
        );
        metrics::JOBS_STARTED
            .with_label_values(&[spec.mode.as_str()])
            .inc();

        let (state_tx, state_rx) = watch::channel(JobState::Running);
        let now = Instant::now();
        let handle = JobHandle::new(job.clone(), true, state_rx, output);

        self.queue.push_back(RunningJob {
            job,
            child,
            scratch,
            state_tx,
            started: now,
            deadline: now + Duration::from_secs(self.config.job_timeout_secs),
            killed: None,
            exit: None,
            stream: None,
        });

        Ok(handle)
    }

    fn terminate(&mut self, job_id: Uuid) -> bool {
        match self.queue.iter_mut().find(|running| running.job.id == job_id) {
            Some(running) => {
                debug!("Terminating job {} for {}", job_id, running.job.key);
                running.kill(KillReason::Requested);
                true
            }
            None => false,
        }
    }

    fn stream_finished(&mut self, job_id: Uuid, outcome: StreamOutcome) {
        let Some(running) = self.queue.iter_mut().find(|running| running.job.id == job_id) else {
            debug!("Stream end for finished job {} ignored", job_id);
            return;
        };

        match &outcome {
            StreamOutcome::ClientGone => {
                debug!("Client disconnected from job {}", job_id);
                running.kill(KillReason::Requested);
            }
            StreamOutcome::Failed(_) => running.kill(KillReason::StreamFailed),
            StreamOutcome::Complete => {}
        }
        running.stream = Some(outcome);
        // The client paced the job until now; the encoder only has to exit
        running.deadline = Instant::now() + Duration::from_secs(self.config.job_timeout_secs);
    }

    /// Drains the queue once, finalizing every job that has finished.
    ///
    /// Returns whether any job is still running.
    fn check(&mut self) -> bool {
        for _ in 0..self.queue.len() {
            let Some(mut running) = self.queue.pop_front() else {
                break;
            };
            match poll_job(&mut running, self.config.job_timeout_secs) {
                Some(state) => self.finalize(running, state),
                None => self.queue.push_back(running),
            }
        }
        !self.queue.is_empty()
    }

    /// Applies a terminal state. The job has already left the queue.
    fn finalize(&mut self, running: RunningJob, state: JobState) {
        let job = &running.job;
        let state = match state {
            JobState::Completed { .. } => {
                match fs::rename(&job.partial_path, &job.output_path) {
                    Ok(()) => {
                        self.index
                            .register(job.key.media_id, job.key.container, job.output_path.clone());
                        info!("Job {} completed: {:?}", job.id, job.output_path);
                        JobState::Completed {
                            path: job.output_path.clone(),
                        }
                    }
                    Err(e) => {
                        error!("Job {} finished but commit failed: {}", job.id, e);
                        remove_if_exists(&job.partial_path);
                        JobState::Failed {
                            reason: format!("failed to commit output: {}", e),
                            timeout_secs: None,
                        }
                    }
                }
            }
            JobState::Failed {
                reason,
                timeout_secs,
            } => {
                remove_if_exists(&job.partial_path);
                error!(
                    "Job {} for {} failed: {}\n{}",
                    job.id,
                    job.key,
                    reason,
                    running.scratch_text()
                );
                JobState::Failed {
                    reason,
                    timeout_secs,
                }
            }
            other => {
                remove_if_exists(&job.partial_path);
                debug!("Job {} for {} terminated", job.id, job.key);
                other
            }
        };

        let outcome = state.label();
        metrics::JOBS_FINISHED.with_label_values(&[outcome]).inc();
        metrics::JOB_DURATION
            .with_label_values(&[outcome])
            .observe(running.started.elapsed().as_secs_f64());

        running.state_tx.send_replace(state);
        // Dropping `running` deletes the scratch file
    }

    fn shutdown(&mut self) {
        if !self.queue.is_empty() {
            info!("Killing {} running jobs", self.queue.len());
        }
        while let Some(mut running) = self.queue.pop_front() {
            running.kill(KillReason::Shutdown);
            self.finalize(running, JobState::Terminated);
        }
    }
}

/// Polls one job without blocking. Returns its terminal state, if reached.
fn poll_job(running: &mut RunningJob, timeout_secs: u64) -> Option<JobState> {
    // A stream still being read runs at the client's pace
    let being_read = running.job.mode == JobMode::Stream && running.stream.is_none();
    if !being_read && Instant::now() >= running.deadline && running.killed.is_none() {
        warn!(
            "Job {} exceeded {}s, killing it",
            running.job.id, timeout_secs
        );
        running.kill(KillReason::Timeout);
    }

    if running.exit.is_none() {
        match running.child.try_wait() {
            Ok(Some(status)) => running.exit = Some(status),
            Ok(None) => return None,
            Err(e) => {
                let _ = running.child.start_kill();
                return Some(JobState::Failed {
                    reason: format!("failed to poll encoder: {}", e),
                    timeout_secs: None,
                });
            }
        }
    }
    let status = running.exit?;

    match running.killed {
        Some(KillReason::Requested) | Some(KillReason::Shutdown) => {
            return Some(JobState::Terminated)
        }
        Some(KillReason::Timeout) => {
            return Some(JobState::Failed {
                reason: format!("killed after {} seconds", timeout_secs),
                timeout_secs: Some(timeout_secs),
            })
        }
        Some(KillReason::StreamFailed) | None => {}
    }

    if let Some(StreamOutcome::Failed(reason)) = &running.stream {
        return Some(JobState::Failed {
            reason: reason.clone(),
            timeout_secs: None,
        });
    }

    if !status.success() {
        return Some(JobState::Failed {
            reason: format!("encoder exited with {}", status),
            timeout_secs: None,
        });
    }

    if running.job.mode == JobMode::Stream {
        match &running.stream {
            // The copy is still flushing the tail of the output
            None => return None,
            Some(StreamOutcome::ClientGone) => return Some(JobState::Terminated),
            Some(_) => {}
        }
    }

    Some(JobState::Completed {
        path: running.job.output_path.clone(),
    })
}

/// `<output>.<job id>.part`, unique per job so an old writer can never
/// clobber a newer one.
fn partial_path_for(output_path: &Path, id: Uuid) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.{}", id.simple(), PARTIAL_EXTENSION));
    output_path.with_file_name(name)
}

fn remove_if_exists(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove {:?}: {}", path, e);
        }
    }
}

#[cfg(unix)]
fn link_file(source: &Path, link: &Path) -> io::Result<()> {
    let source = source.canonicalize()?;
    std::os::unix::fs::symlink(source, link)
}

#[cfg(not(unix))]
fn link_file(source: &Path, link: &Path) -> io::Result<()> {
    fs::hard_link(source, link)
}

/// Create a transcode supervisor.
///
/// Returns:
/// - `SupervisorHandle` - for talking to the task (clone this to share across tasks)
/// - `Supervisor` - spawn this as a background task with `tokio::spawn(supervisor.run())`
pub fn create_supervisor(
    transcoder: Arc<dyn Transcoder>,
    config: TranscodeConfig,
    index: CacheIndex,
    buffer_size: usize,
) -> (SupervisorHandle, Supervisor) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let supervisor = Supervisor::new(rx, tx.downgrade(), transcoder, config, index);
    let handle = SupervisorHandle::new(tx);
    (handle, supervisor)
}

/// Creates the supervisor and spawns it on the current runtime.
pub fn spawn_supervisor(
    transcoder: Arc<dyn Transcoder>,
    config: TranscodeConfig,
    index: CacheIndex,
) -> SupervisorHandle {
    let (handle, supervisor) = create_supervisor(transcoder, config, index, 64);
    tokio::spawn(supervisor.run());
    handle
}
