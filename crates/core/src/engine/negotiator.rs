//! Content negotiation and delivery.

use std::sync::Arc;

use tracing::{debug, info};

use super::error::EngineError;
use super::stream::tee;
use super::types::{Delivery, Negotiation, RequestMode};
use crate::cache::CacheIndex;
use crate::media::{AcceptList, MediaItem};
use crate::supervisor::{spawn_supervisor, JobMode, JobSpec, SupervisorHandle};
use crate::transcoder::{EncodeTarget, TranscodeConfig, TranscodeError, Transcoder};

/// The transcoding and delivery engine.
///
/// Constructed once at startup and shared with request handlers. The cache
/// index and running jobs live in the supervisor task; the engine only
/// holds a handle to it.
pub struct Engine {
    supervisor: SupervisorHandle,
    config: TranscodeConfig,
}

impl Engine {
    pub fn new(supervisor: SupervisorHandle, config: TranscodeConfig) -> Self {
        Self { supervisor, config }
    }

    /// Loads the cache index from `config.cache_dir` and spawns the supervisor.
    pub fn start(
        transcoder: Arc<dyn Transcoder>,
        config: TranscodeConfig,
    ) -> Result<Self, EngineError> {
        let index = CacheIndex::load(&config.cache_dir).map_err(TranscodeError::Io)?;
        let supervisor = spawn_supervisor(transcoder, config.clone(), index);
        Ok(Self::new(supervisor, config))
    }

    pub fn supervisor(&self) -> &SupervisorHandle {
        &self.supervisor
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    /// Decides how to satisfy a request for `item`.
    ///
    /// In order of preference:
    /// 1. the native file, if the client accepts its type (linked into the cache)
    /// 2. the cached representation the client prefers most
    /// 3. a new job in the background or foreground format for `mode`
    ///
    /// Sets `item.cached` to the result's `cached` flag.
    pub async fn negotiate(
        &self,
        item: &mut MediaItem,
        accept: &AcceptList,
        mode: RequestMode,
    ) -> Result<Negotiation, EngineError> {
        let negotiation = self.choose(item, accept, mode).await?;
        item.cached = negotiation.cached;
        debug!(
            "Negotiated {} for item {} ({:?}, cached={})",
            negotiation.mime, item.id, mode, negotiation.cached
        );
        Ok(negotiation)
    }

    async fn choose(
        &self,
        item: &MediaItem,
        accept: &AcceptList,
        mode: RequestMode,
    ) -> Result<Negotiation, EngineError> {
        let native = item.native_container();

        let native_accepted = accept.accepts(&item.mime_type)
            || native.is_some_and(|container| accept.accepts(container.mime()));
        if native_accepted {
            let path = match native {
                Some(container) => match self.supervisor.lookup(item.id, container).await? {
                    Some(path) => path,
                    None => {
                        self.supervisor
                            .passthrough(item.id, container, item.path.clone())
                            .await?
                    }
                },
                // Unknown container: nothing to name the cache file after
                None => item.path.clone(),
            };
            return Ok(Negotiation::cached(item.mime_type.clone(), path));
        }

        let best_cached = self
            .supervisor
            .formats(item.id)
            .await?
            .into_iter()
            .filter_map(|entry| {
                accept
                    .preference(entry.container.mime())
                    .map(|rank| (rank, entry))
            })
            .min_by_key(|(rank, _)| *rank);
        if let Some((_, entry)) = best_cached {
            return Ok(Negotiation::cached(entry.container.mime(), entry.path));
        }

        match mode {
            RequestMode::Background => {
                self.start_job(item, &self.config.background, JobMode::File)
                    .await
            }
            RequestMode::Foreground
                if self.config.streaming && self.config.foreground.container.is_streamable() =>
            {
                self.start_job(item, &self.config.foreground, JobMode::Stream)
                    .await
            }
            RequestMode::Foreground => {
                let target = &self.config.foreground;
                let path = self
                    .supervisor
                    .run_and_wait(self.spec(item, target, JobMode::File))
                    .await?;
                Ok(Negotiation {
                    mime: target.container.mime().to_string(),
                    cached: false,
                    path: Some(path),
                    job: None,
                })
            }
        }
    }

    async fn start_job(
        &self,
        item: &MediaItem,
        target: &EncodeTarget,
        mode: JobMode,
    ) -> Result<Negotiation, EngineError> {
        let mime = target.container.mime();
        let mut handle = self.supervisor.start(self.spec(item, target, mode)).await?;

        if handle.job.is_none() {
            // Already cached in the target format
            let path = handle.wait().await?;
            return Ok(Negotiation::cached(mime, path));
        }

        if handle.started {
            info!("Transcoding item {} to {}", item.id, target.container);
        }

        Ok(Negotiation {
            mime: mime.to_string(),
            cached: false,
            path: None,
            job: Some(handle),
        })
    }

    fn spec(&self, item: &MediaItem, target: &EncodeTarget, mode: JobMode) -> JobSpec {
        JobSpec {
            media_id: item.id,
            source: item.path.clone(),
            target: target.clone(),
            mode,
        }
    }

    /// Turns a negotiation into something the web layer can send.
    ///
    /// A stream-mode job is copied to the client and the cache as it runs. A
    /// job this request only attached to is awaited and served as a file.
    pub async fn deliver(
        &self,
        item: &MediaItem,
        negotiation: Negotiation,
    ) -> Result<Delivery, EngineError> {
        let Negotiation {
            mime, path, job, ..
        } = negotiation;

        if let Some(path) = path {
            return Ok(Delivery::File { path, mime });
        }

        let Some(mut handle) = job else {
            return Err(TranscodeError::failed("negotiation has neither file nor job", None).into());
        };

        if let (Some(job_id), Some(output)) = (handle.job_id(), handle.take_output()) {
            debug!("Streaming job {} for item {}", job_id, item.id);
            let stream = tee(
                self.supervisor.clone(),
                job_id,
                handle,
                output,
                self.config.chunk_size,
            );
            return Ok(Delivery::Stream {
                mime,
                job_id,
                stream,
            });
        }

        let path = handle.wait().await?;
        Ok(Delivery::File { path, mime })
    }

    /// Gives up on a negotiation without delivering it.
    ///
    /// A stream-mode job started for it is terminated, since nobody will
    /// read its output. Other jobs keep running.
    pub async fn discard(&self, negotiation: Negotiation) -> Result<(), EngineError> {
        if let Some(job_id) = negotiation.job_id().filter(|_| negotiation.is_streaming()) {
            self.supervisor.terminate(job_id).await?;
        }
        Ok(())
    }

    /// Polls running jobs once. Returns whether any is still running.
    pub async fn check_background(&self) -> Result<bool, EngineError> {
        Ok(self.supervisor.check().await?)
    }

    /// Kills running jobs and stops the supervisor.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }
}
