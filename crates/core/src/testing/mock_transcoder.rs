//! Mock transcoder for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::{Child, Command};

use crate::probe::ProbeOutput;
use crate::transcoder::{EncodeOutput, EncodeRequest, TranscodeError, Transcoder};

/// Script that writes a fixed payload to the output.
pub const SCRIPT_SUCCESS: &str = "printf 'encoded-audio' > \"$1\"";

/// Script that fails with a diagnostic message.
pub const SCRIPT_FAILURE: &str = "echo 'Invalid data found when processing input' >&2; exit 1";

/// Mock implementation of the Transcoder trait.
///
/// Encodes by running a shell script as a real child process, so the
/// supervisor sees genuine exit codes, pipes and kills:
/// - `$1` is the output path (`/dev/stdout` for pipe output)
/// - stderr goes to the job's diagnostics file
///
/// # Example
///
/// ```rust,ignore
/// use tunecast_core::testing::MockTranscoder;
///
/// let transcoder = MockTranscoder::new();
/// transcoder.set_script("sleep 1; printf 'slow' > \"$1\"");
/// transcoder.set_probe_result("/music/a.flac", ProbeOutput::default());
///
/// // Hand it to the supervisor...
/// assert_eq!(transcoder.spawn_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockTranscoder {
    script: Mutex<String>,
    requests: Mutex<Vec<EncodeRequest>>,
    probe_results: Mutex<HashMap<PathBuf, ProbeOutput>>,
    probe_failures: Mutex<HashSet<PathBuf>>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a mock whose jobs succeed immediately.
    pub fn new() -> Self {
        Self::with_script(SCRIPT_SUCCESS)
    }

    /// Create a mock running `script` for every job.
    pub fn with_script(script: &str) -> Self {
        Self {
            script: Mutex::new(script.to_string()),
            requests: Mutex::new(Vec::new()),
            probe_results: Mutex::new(HashMap::new()),
            probe_failures: Mutex::new(HashSet::new()),
        }
    }

    /// Create a mock whose jobs exit non-zero.
    pub fn failing() -> Self {
        Self::with_script(SCRIPT_FAILURE)
    }

    /// Create a mock whose jobs take `secs` seconds before writing output.
    pub fn slow(secs: f64) -> Self {
        Self::with_script(&format!("sleep {}; {}", secs, SCRIPT_SUCCESS))
    }

    /// Replace the script used by subsequent jobs.
    pub fn set_script(&self, script: &str) {
        *self.script.lock().unwrap() = script.to_string();
    }

    /// Set a probe result for a specific path.
    pub fn set_probe_result(&self, path: impl AsRef<Path>, output: ProbeOutput) {
        self.probe_results
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), output);
    }

    /// Make probing `path` fail.
    pub fn fail_probe(&self, path: impl AsRef<Path>) {
        self.probe_failures
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf());
    }

    /// Number of encoder processes launched.
    pub fn spawn_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// All encode requests received, in order.
    pub fn recorded_requests(&self) -> Vec<EncodeRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn default_probe(path: &Path) -> ProbeOutput {
        let mut tags = BTreeMap::new();
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            tags.insert("title".to_string(), stem.to_string());
        }
        ProbeOutput {
            tags,
            duration_secs: Some(180),
        }
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeOutput, TranscodeError> {
        if self.probe_failures.lock().unwrap().contains(path) {
            return Err(TranscodeError::probe_failed(format!(
                "{}: Invalid data found when processing input",
                path.display()
            )));
        }

        if let Some(output) = self.probe_results.lock().unwrap().get(path) {
            return Ok(output.clone());
        }

        Ok(Self::default_probe(path))
    }

    fn spawn(&self, request: &EncodeRequest, diagnostics: File) -> Result<Child, TranscodeError> {
        self.requests.lock().unwrap().push(request.clone());

        let (target, stdout) = match &request.output {
            EncodeOutput::File(path) => (path.clone(), Stdio::null()),
            EncodeOutput::Pipe => (PathBuf::from("/dev/stdout"), Stdio::piped()),
        };

        let script = self.script.lock().unwrap().clone();
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .arg("sh")
            .arg(target)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::from(diagnostics))
            .kill_on_drop(true)
            .spawn()
            .map_err(TranscodeError::Io)
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}
