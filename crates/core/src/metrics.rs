//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job supervisor (jobs started, finished, attached, duration)
//! - Transcode cache (lookups by result)
//! - Library discovery

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Supervisor Metrics
// =============================================================================

/// Jobs started by mode.
pub static JOBS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tunecast_jobs_started_total", "Total transcode jobs started"),
        &["mode"], // "file", "stream"
    )
    .unwrap()
});

/// Jobs finished by outcome.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tunecast_jobs_finished_total",
            "Total transcode jobs finalized",
        ),
        &["outcome"], // "completed", "failed", "terminated"
    )
    .unwrap()
});

/// Requests that attached to an already running job.
pub static JOBS_DEDUPLICATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tunecast_jobs_deduplicated_total",
        "Start requests attached to an existing job",
    )
    .unwrap()
});

/// Job duration in seconds, from spawn to finalization.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tunecast_job_duration_seconds",
            "Duration of transcode jobs",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics
// =============================================================================

/// Cache lookups by result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tunecast_cache_lookups_total", "Transcode cache lookups"),
        &["result"], // "hit", "miss", "stale"
    )
    .unwrap()
});

/// Native files linked into the cache.
pub static PASSTHROUGH_LINKS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tunecast_passthrough_links_total",
        "Native files linked into the cache directory",
    )
    .unwrap()
});

// =============================================================================
// Discovery Metrics
// =============================================================================

/// Files seen by discovery, by result.
pub static DISCOVERY_FILES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tunecast_discovery_files_total", "Files examined by discovery"),
        &["result"], // "added", "skipped"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Supervisor
        Box::new(JOBS_STARTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOBS_DEDUPLICATED.clone()),
        Box::new(JOB_DURATION.clone()),
        // Cache
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(PASSTHROUGH_LINKS.clone()),
        // Discovery
        Box::new(DISCOVERY_FILES.clone()),
    ]
}
