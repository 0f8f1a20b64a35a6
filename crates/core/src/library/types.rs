//! Types for the media library.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::MediaItem;

/// An item to insert or refresh, keyed by its path.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMediaItem {
    pub name: String,
    pub path: PathBuf,
    pub mime_type: String,
    pub size_bytes: u64,
    pub length_secs: Option<u64>,
    pub tags: BTreeMap<String, String>,
}

/// An item together with its probed tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDetails {
    #[serde(flatten)]
    pub item: MediaItem,
    pub tags: BTreeMap<String, String>,
}

/// Library statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryStats {
    pub items: u64,
    pub total_size_bytes: u64,
    pub total_length_secs: u64,
}

/// Errors from library storage.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Media item not found: {0}")]
    NotFound(i64),
}

impl From<rusqlite::Error> for LibraryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
