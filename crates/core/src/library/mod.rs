//! Media library - the indexed audio files that can be streamed.
//!
//! The library is written by discovery and read by the delivery engine,
//! which never mutates it.

mod sqlite;
mod types;

pub use sqlite::SqliteLibrary;
pub use types::*;

use std::collections::BTreeMap;

use crate::media::MediaItem;

/// Trait for media library storage.
pub trait MediaLibrary: Send + Sync {
    /// Get one item by id.
    fn get_item(&self, id: i64) -> Result<MediaItem, LibraryError>;

    /// All items, ordered by name.
    fn list(&self) -> Result<Vec<MediaItem>, LibraryError>;

    /// Probed tags of an item.
    fn tags(&self, id: i64) -> Result<BTreeMap<String, String>, LibraryError>;

    /// Insert an item, or refresh the one with the same path.
    ///
    /// Refreshing keeps the existing id and replaces all tags.
    /// Returns the item id.
    fn upsert(&self, item: &NewMediaItem) -> Result<i64, LibraryError>;

    /// Number of items.
    fn count(&self) -> Result<u64, LibraryError>;

    /// Aggregate statistics.
    fn stats(&self) -> Result<LibraryStats, LibraryError>;
}
