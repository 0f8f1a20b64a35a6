//! Extraction of tags and duration from ffprobe's diagnostic output.
//!
//! ffprobe prints a human readable report on stderr:
//!
//! ```text
//! Input #0, flac, from 'song.flac':
//!   Metadata:
//!     ARTIST          : Some Artist
//!     TITLE           : Some Title
//!   Duration: 00:03:12.45, start: 0.000000, bitrate: 901 kb/s
//!   Stream #0:0: Audio: flac, 44100 Hz, stereo, s16
//! ```
//!
//! Only the first metadata block (the container tags) is read; the duration
//! is searched for right after it.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static METADATA_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+Metadata:\s*$").unwrap());
static TAG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+([A-Za-z0-9_\-]+)\s+: (.+)$").unwrap());
static DURATION_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+Duration: (\S+)").unwrap());

/// Tags and duration read from a probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutput {
    /// Tag name (lowercased) to value.
    pub tags: BTreeMap<String, String>,
    /// Duration in whole seconds.
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Seeking,
    Collecting,
    DurationSeeking,
}

/// Parses ffprobe's stderr report.
///
/// Duration detection only begins once the metadata block has ended, so a
/// report without a `Metadata:` marker yields no tags and no duration.
pub fn parse_probe_output(text: &str) -> ProbeOutput {
    let mut output = ProbeOutput::default();
    let mut state = ScanState::Seeking;

    for line in text.lines() {
        match state {
            ScanState::Seeking => {
                if METADATA_START.is_match(line) {
                    state = ScanState::Collecting;
                }
            }
            ScanState::Collecting => {
                if let Some(caps) = TAG_LINE.captures(line) {
                    output
                        .tags
                        .insert(caps[1].to_lowercase(), caps[2].trim().to_string());
                    continue;
                }
                // The line that closes the block is the first duration candidate.
                if let Some(secs) = match_duration(line) {
                    output.duration_secs = secs;
                    break;
                }
                state = ScanState::DurationSeeking;
            }
            ScanState::DurationSeeking => {
                if let Some(secs) = match_duration(line) {
                    output.duration_secs = secs;
                }
                break;
            }
        }
    }

    output
}

/// `Some(parsed)` when the line is a duration line, `None` otherwise.
fn match_duration(line: &str) -> Option<Option<u64>> {
    DURATION_LINE
        .captures(line)
        .map(|caps| parse_duration(caps[1].trim_end_matches(',')))
}

/// Parses `HH:MM:SS` (an optional fractional part is truncated) into seconds.
pub fn parse_duration(text: &str) -> Option<u64> {
    let whole = text.split('.').next()?;
    let mut parts = whole.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}
