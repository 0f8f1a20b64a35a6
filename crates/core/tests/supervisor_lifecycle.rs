//! Supervisor lifecycle integration tests.
//!
//! These tests run real child processes (shell scripts via MockTranscoder)
//! through the supervisor task:
//! running -> completed | failed | terminated

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use common::CapturedLogs;
use tempfile::TempDir;

use tunecast_core::{
    supervisor::{create_supervisor, spawn_supervisor},
    testing::{fixtures, MockTranscoder},
    CacheIndex, Container, EncodeTarget, JobMode, JobSpec, JobState, SupervisorHandle,
    TranscodeConfig, TranscodeError, AudioCodec,
};

const WAIT: Duration = Duration::from_secs(10);

/// Test helper owning the supervisor and its directories.
struct TestHarness {
    supervisor: SupervisorHandle,
    transcoder: Arc<MockTranscoder>,
    cache_dir: TempDir,
    music_dir: TempDir,
}

impl TestHarness {
    fn new(transcoder: MockTranscoder) -> Self {
        let cache_dir = TempDir::new().expect("Failed to create cache dir");
        let config = fixtures::transcode_config(cache_dir.path());
        Self::with_config(transcoder, cache_dir, config)
    }

    fn with_config(transcoder: MockTranscoder, cache_dir: TempDir, config: TranscodeConfig) -> Self {
        let music_dir = TempDir::new().expect("Failed to create music dir");
        let transcoder = Arc::new(transcoder);
        let index = CacheIndex::load(cache_dir.path()).expect("Failed to load cache index");
        let supervisor = spawn_supervisor(transcoder.clone(), config, index);

        Self {
            supervisor,
            transcoder,
            cache_dir,
            music_dir,
        }
    }

    fn spec(&self, media_id: i64, mode: JobMode) -> JobSpec {
        let source = self.music_dir.path().join(format!("{}.flac", media_id));
        if !source.exists() {
            std::fs::write(&source, b"flac").unwrap();
        }
        JobSpec {
            media_id,
            source,
            target: EncodeTarget {
                codec: AudioCodec::Vorbis,
                container: Container::Webm,
                quality: Some("4".to_string()),
            },
            mode,
        }
    }

    fn cache_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.cache_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

async fn wait_until_idle(supervisor: &SupervisorHandle) {
    tokio::time::timeout(WAIT, async {
        while supervisor.check().await.unwrap() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("jobs did not finish in time");
}

#[tokio::test]
async fn test_successful_job_is_committed_to_cache() {
    let harness = TestHarness::new(MockTranscoder::new());

    let mut handle = harness
        .supervisor
        .start(harness.spec(7, JobMode::File))
        .await
        .unwrap();
    assert!(handle.started);
    let job = handle.job.clone().unwrap();
    assert!(job.scratch_path.exists());

    let path = tokio::time::timeout(WAIT, handle.wait())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(path, harness.cache_dir.path().join("7.webm"));
    assert_eq!(std::fs::read(&path).unwrap(), b"encoded-audio");
    assert_eq!(
        harness.supervisor.lookup(7, Container::Webm).await.unwrap(),
        Some(path)
    );
    assert!(!job.scratch_path.exists());
    assert_eq!(harness.cache_files(), vec!["7.webm"]);
}

#[tokio::test]
async fn test_failed_job_leaves_nothing_behind() {
    let harness = TestHarness::new(MockTranscoder::with_script(
        "printf 'half' > \"$1\"; echo 'Invalid data found' >&2; exit 1",
    ));

    let mut handle = harness
        .supervisor
        .start(harness.spec(3, JobMode::File))
        .await
        .unwrap();
    let job = handle.job.clone().unwrap();

    let result = tokio::time::timeout(WAIT, handle.wait()).await.unwrap();

    assert!(matches!(result, Err(TranscodeError::Failed { .. })));
    assert!(matches!(handle.state(), JobState::Failed { timeout_secs: None, .. }));
    assert!(harness.supervisor.lookup(3, Container::Webm).await.unwrap().is_none());
    assert!(!job.partial_path.exists());
    assert!(!job.scratch_path.exists());
    assert!(harness.cache_files().is_empty());
}

#[tokio::test]
async fn test_terminated_job_removes_output() {
    let harness = TestHarness::new(MockTranscoder::with_script(
        "printf 'partial' > \"$1\"; sleep 5; printf 'rest' >> \"$1\"",
    ));

    let mut handle = harness
        .supervisor
        .start(harness.spec(11, JobMode::File))
        .await
        .unwrap();
    let job = handle.job.clone().unwrap();

    // Let the script write its first bytes
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(harness.supervisor.terminate(job.id).await.unwrap());

    let result = tokio::time::timeout(WAIT, handle.wait()).await.unwrap();

    assert!(matches!(result, Err(TranscodeError::Cancelled)));
    assert_eq!(handle.state(), JobState::Terminated);
    assert!(!job.partial_path.exists());
    assert!(harness.cache_files().is_empty());
    assert!(harness.supervisor.lookup(11, Container::Webm).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failure_logs_encoder_diagnostics() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let harness = TestHarness::new(MockTranscoder::with_script(
        "echo 'Invalid data found when processing input' >&2; exit 1",
    ));

    let mut handle = harness
        .supervisor
        .start(harness.spec(14, JobMode::File))
        .await
        .unwrap();
    let job_id = handle.job_id().unwrap();
    let _ = tokio::time::timeout(WAIT, handle.wait()).await.unwrap();

    let error = logs.first_error().expect("failure should be logged as an error");
    assert!(error.contains(&job_id.to_string()));
    assert!(error.contains("Invalid data found when processing input"));
}

#[tokio::test]
async fn test_termination_is_not_logged_as_error() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let harness = TestHarness::new(MockTranscoder::with_script(
        "echo 'Invalid data found' >&2; sleep 5",
    ));

    let mut handle = harness
        .supervisor
        .start(harness.spec(15, JobMode::File))
        .await
        .unwrap();
    let job_id = handle.job_id().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness.supervisor.terminate(job_id).await.unwrap();
    let _ = tokio::time::timeout(WAIT, handle.wait()).await.unwrap();

    assert!(logs.contents().contains(&format!("Job {} for 15.webm terminated", job_id)));
    assert_eq!(logs.first_error(), None);
    assert!(!logs.contents().contains("Invalid data found"));
}

#[tokio::test]
async fn test_terminate_unknown_job() {
    let harness = TestHarness::new(MockTranscoder::new());
    assert!(!harness
        .supervisor
        .terminate(uuid::Uuid::new_v4())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_job_past_deadline_is_killed() {
    let cache_dir = TempDir::new().unwrap();
    let config = fixtures::transcode_config(cache_dir.path()).with_timeout(1);
    let harness = TestHarness::with_config(MockTranscoder::slow(30.0), cache_dir, config);

    let mut handle = harness
        .supervisor
        .start(harness.spec(5, JobMode::File))
        .await
        .unwrap();

    let result = tokio::time::timeout(WAIT, handle.wait()).await.unwrap();

    assert!(matches!(
        result,
        Err(TranscodeError::Timeout { timeout_secs: 1 })
    ));
    assert!(harness.cache_files().is_empty());
}

#[tokio::test]
async fn test_concurrent_starts_share_one_job() {
    let harness = TestHarness::new(MockTranscoder::slow(0.3));
    let spec = harness.spec(21, JobMode::File);

    let (first, second) = tokio::join!(
        harness.supervisor.start(spec.clone()),
        harness.supervisor.start(spec.clone()),
    );
    let mut first = first.unwrap();
    let mut second = second.unwrap();

    assert_eq!(harness.transcoder.spawn_count(), 1);
    assert!(first.started != second.started);
    assert_eq!(first.job_id(), second.job_id());

    let a = tokio::time::timeout(WAIT, first.wait()).await.unwrap().unwrap();
    let b = tokio::time::timeout(WAIT, second.wait()).await.unwrap().unwrap();
    assert_eq!(a, b);

    // Once cached, a new start is ready immediately and spawns nothing
    let third = harness.supervisor.start(spec).await.unwrap();
    assert!(third.job.is_none());
    assert_eq!(harness.transcoder.spawn_count(), 1);
}

#[tokio::test]
async fn test_run_and_wait() {
    let harness = TestHarness::new(MockTranscoder::slow(0.1));

    let path = tokio::time::timeout(
        WAIT,
        harness.supervisor.run_and_wait(harness.spec(2, JobMode::File)),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(path.ends_with("2.webm"));
    assert!(path.exists());
}

#[tokio::test]
async fn test_check_reports_running_jobs() {
    let harness = TestHarness::new(MockTranscoder::slow(0.5));
    assert!(!harness.supervisor.check().await.unwrap());

    let _handle = harness
        .supervisor
        .start(harness.spec(9, JobMode::File))
        .await
        .unwrap();
    assert!(harness.supervisor.check().await.unwrap());

    let status = harness.supervisor.status().await.unwrap();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].job.key.media_id, 9);
    assert!(!status[0].terminating);

    wait_until_idle(&harness.supervisor).await;
    assert!(harness.supervisor.status().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_source_is_rejected() {
    let harness = TestHarness::new(MockTranscoder::new());
    let mut spec = harness.spec(1, JobMode::File);
    spec.source = PathBuf::from("/nonexistent/song.flac");

    let result = harness.supervisor.start(spec).await;

    assert!(matches!(result, Err(TranscodeError::InputNotFound { .. })));
    assert_eq!(harness.transcoder.spawn_count(), 0);
}

#[tokio::test]
async fn test_stale_entry_is_dropped_on_lookup() {
    let harness = TestHarness::new(MockTranscoder::new());
    let path = harness
        .supervisor
        .run_and_wait(harness.spec(4, JobMode::File))
        .await
        .unwrap();

    std::fs::remove_file(&path).unwrap();

    assert!(harness.supervisor.formats(4).await.unwrap().is_empty());
    assert!(harness.supervisor.lookup(4, Container::Webm).await.unwrap().is_none());

    // A new request transcodes again
    let handle = harness
        .supervisor
        .start(harness.spec(4, JobMode::File))
        .await
        .unwrap();
    assert!(handle.started);
}

#[tokio::test]
async fn test_register_then_lookup() {
    let harness = TestHarness::new(MockTranscoder::new());
    let path = harness.cache_dir.path().join("elsewhere.ogg");
    std::fs::write(&path, b"ogg").unwrap();

    harness
        .supervisor
        .register(30, Container::Ogg, path.clone())
        .await
        .unwrap();

    assert_eq!(
        harness.supervisor.lookup(30, Container::Ogg).await.unwrap(),
        Some(path)
    );
    assert!(harness.supervisor.lookup(30, Container::Mp3).await.unwrap().is_none());
}

#[tokio::test]
async fn test_passthrough_links_native_file() {
    let harness = TestHarness::new(MockTranscoder::new());
    let source = fixtures::source_file(harness.music_dir.path(), "song.mp3");

    let link = harness
        .supervisor
        .passthrough(8, Container::Mp3, source.clone())
        .await
        .unwrap();

    assert_eq!(link, harness.cache_dir.path().join("8.mp3"));
    assert_eq!(std::fs::read(&link).unwrap(), std::fs::read(&source).unwrap());
    assert_eq!(
        harness.supervisor.lookup(8, Container::Mp3).await.unwrap(),
        Some(link.clone())
    );

    // Linking again replaces the existing link
    let again = harness
        .supervisor
        .passthrough(8, Container::Mp3, source)
        .await
        .unwrap();
    assert_eq!(again, link);
}

#[tokio::test]
async fn test_passthrough_missing_source() {
    let harness = TestHarness::new(MockTranscoder::new());
    let result = harness
        .supervisor
        .passthrough(8, Container::Mp3, PathBuf::from("/nonexistent/a.mp3"))
        .await;
    assert!(matches!(result, Err(TranscodeError::InputNotFound { .. })));
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let harness = TestHarness::new(MockTranscoder::new());
    let path = harness
        .supervisor
        .run_and_wait(harness.spec(12, JobMode::File))
        .await
        .unwrap();
    harness.supervisor.shutdown().await;

    // A leftover partial from a crashed run
    std::fs::write(harness.cache_dir.path().join("13.webm.deadbeef.part"), b"x").unwrap();

    let index = CacheIndex::load(harness.cache_dir.path()).unwrap();
    assert_eq!(index.lookup(12, Container::Webm), Some(path.as_path()));
    assert!(!harness
        .cache_dir
        .path()
        .join("13.webm.deadbeef.part")
        .exists());
}

#[tokio::test]
async fn test_shutdown_terminates_running_jobs() {
    let harness = TestHarness::new(MockTranscoder::slow(30.0));
    let mut handle = harness
        .supervisor
        .start(harness.spec(40, JobMode::File))
        .await
        .unwrap();

    harness.supervisor.shutdown().await;

    let result = tokio::time::timeout(WAIT, handle.wait()).await.unwrap();
    assert!(matches!(result, Err(TranscodeError::Cancelled)));
    assert!(matches!(
        harness.supervisor.check().await,
        Err(TranscodeError::SupervisorUnavailable)
    ));
}

#[tokio::test]
async fn test_supervisor_stops_when_handles_dropped() {
    let cache_dir = TempDir::new().unwrap();
    let index = CacheIndex::load(cache_dir.path()).unwrap();
    let (handle, supervisor) = create_supervisor(
        Arc::new(MockTranscoder::new()),
        fixtures::transcode_config(cache_dir.path()),
        index,
        8,
    );

    let task = tokio::spawn(supervisor.run());
    drop(handle);

    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_partial_files_are_unique_per_job() {
    let harness = TestHarness::new(MockTranscoder::slow(0.2));
    let mut handle = harness
        .supervisor
        .start(harness.spec(50, JobMode::File))
        .await
        .unwrap();
    let job = handle.job.clone().unwrap();

    let name = job.partial_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("50.webm."));
    assert!(name.ends_with(".part"));
    assert!(name.contains(&job.id.simple().to_string()));
    assert_eq!(job.output_path, harness.cache_dir.path().join("50.webm"));

    tokio::time::timeout(WAIT, handle.wait()).await.unwrap().unwrap();
    assert!(!Path::new(&job.partial_path).exists());
}
