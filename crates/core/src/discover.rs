//! Media discovery: walks the configured directories and fills the library.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::library::{MediaLibrary, NewMediaItem};
use crate::media::Container;
use crate::metrics;
use crate::transcoder::Transcoder;

/// Default directory depth searched below each root.
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Result of one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Audio files found.
    pub scanned: usize,
    /// Files inserted or refreshed in the library.
    pub added: usize,
    /// Files that could not be probed or stored.
    pub skipped: usize,
}

/// A candidate file found by the walk.
#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    container: Container,
    size_bytes: u64,
}

/// Scans directories for audio files and records them in the library.
pub struct MediaDiscovery {
    library: Arc<dyn MediaLibrary>,
    transcoder: Arc<dyn Transcoder>,
    max_depth: usize,
}

impl MediaDiscovery {
    pub fn new(library: Arc<dyn MediaLibrary>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            library,
            transcoder,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets how many directory levels below each root are searched.
    /// Files directly in a root are at depth 1.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Walks `roots`, probes every audio file and upserts it.
    ///
    /// Files the probe rejects are skipped with a warning; the scan itself
    /// never fails.
    pub async fn scan(&self, roots: &[PathBuf]) -> DiscoveryReport {
        let roots = roots.to_vec();
        let max_depth = self.max_depth;
        let candidates = match tokio::task::spawn_blocking(move || walk(&roots, max_depth)).await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Discovery walk aborted: {}", e);
                Vec::new()
            }
        };

        let mut report = DiscoveryReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            if self.add(&candidate).await {
                report.added += 1;
                metrics::DISCOVERY_FILES.with_label_values(&["added"]).inc();
            } else {
                report.skipped += 1;
                metrics::DISCOVERY_FILES.with_label_values(&["skipped"]).inc();
            }
        }

        info!(
            "Discovery finished: {} scanned, {} added, {} skipped",
            report.scanned, report.added, report.skipped
        );
        report
    }

    async fn add(&self, candidate: &Candidate) -> bool {
        let probe = match self.transcoder.probe(&candidate.path).await {
            Ok(probe) => probe,
            Err(e) => {
                warn!("Skipping {:?}: {}", candidate.path, e);
                return false;
            }
        };

        let item = NewMediaItem {
            name: file_stem(&candidate.path),
            path: candidate.path.clone(),
            mime_type: candidate.container.mime().to_string(),
            size_bytes: candidate.size_bytes,
            length_secs: probe.duration_secs,
            tags: probe.tags,
        };

        match self.library.upsert(&item) {
            Ok(id) => {
                debug!("Indexed {:?} as {}", candidate.path, id);
                true
            }
            Err(e) => {
                warn!("Failed to store {:?}: {}", candidate.path, e);
                false
            }
        }
    }
}

fn walk(roots: &[PathBuf], max_depth: usize) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for root in roots {
        if !root.is_dir() {
            warn!("Media directory {:?} does not exist", root);
            continue;
        }

        let walker = WalkDir::new(root)
            .max_depth(max_depth)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(container) = Container::from_path(entry.path()) else {
                continue;
            };

            match entry.metadata() {
                Ok(metadata) => candidates.push(Candidate {
                    path: entry.path().to_path_buf(),
                    container,
                    size_bytes: metadata.len(),
                }),
                Err(e) => warn!("Failed to stat {:?}: {}", entry.path(), e),
            }
        }
    }

    candidates
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
