//! Job supervisor: runs external encoder processes and commits their output.
//!
//! A single task owns the [`CacheIndex`](crate::cache::CacheIndex) and the
//! queue of running jobs. Request handlers talk to it through a cloneable
//! [`SupervisorHandle`]; nothing else touches the index or the processes.
//!
//! Each job goes `Running -> Completed | Failed | Terminated` and leaves the
//! queue exactly once, when the reaper first observes a terminal state:
//!
//! - exit 0: the partial file is renamed to `<media_id>.<ext>` and registered
//! - non-zero exit or timeout: the partial file is deleted and the
//!   encoder's diagnostics are logged as an error
//! - terminated (client disconnect): the partial file is deleted quietly
//!
//! # Example
//!
//! ```rust,ignore
//! let index = CacheIndex::load(&config.cache_dir)?;
//! let supervisor = spawn_supervisor(Arc::new(FfmpegTranscoder::new(config.clone())), config, index);
//!
//! let path = supervisor.run_and_wait(spec).await?;
//! ```

mod handle;
mod runner;
mod types;

pub use handle::SupervisorHandle;
pub use runner::{create_supervisor, spawn_supervisor, Supervisor};
pub use types::{
    JobHandle, JobKey, JobMode, JobSnapshot, JobSpec, JobState, StreamOutcome, StreamOutput,
    TranscodeJob,
};
