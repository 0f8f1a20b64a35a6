//! In-memory index of transcoded files in the cache directory.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::media::Container;

/// Extension used for encoder output that has not been committed yet.
pub const PARTIAL_EXTENSION: &str = "part";

/// A registered cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub media_id: i64,
    pub container: Container,
    pub path: PathBuf,
}

/// Mapping media id -> container -> path.
///
/// Every path was a complete file when it was registered. The index does
/// not touch the filesystem on lookup; callers that find a registered path
/// missing on disk remove the entry and treat it as a miss.
#[derive(Debug, Default)]
pub struct CacheIndex {
    cache_dir: PathBuf,
    entries: BTreeMap<i64, BTreeMap<Container, PathBuf>>,
}

impl CacheIndex {
    /// Creates an empty index rooted at `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Rebuilds the index from the contents of `cache_dir`.
    ///
    /// Creates the directory if needed. Files named `<media_id>.<ext>` with a
    /// known extension are registered, leftover partial outputs are deleted,
    /// and everything else is ignored.
    pub fn load(cache_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let mut index = Self::new(cache_dir);
        fs::create_dir_all(&index.cache_dir)?;

        let mut removed_partials = 0usize;
        for entry in fs::read_dir(&index.cache_dir)? {
            let path = entry?.path();

            if path.extension().and_then(|e| e.to_str()) == Some(PARTIAL_EXTENSION) {
                match fs::remove_file(&path) {
                    Ok(()) => removed_partials += 1,
                    Err(e) => tracing::warn!("Failed to remove partial output {:?}: {}", path, e),
                }
                continue;
            }

            if let Some((media_id, container)) = parse_cache_name(&path) {
                index.register(media_id, container, path);
            }
        }

        tracing::info!(
            "Loaded cache index from {:?}: {} entries, {} stale partial files removed",
            index.cache_dir,
            index.len(),
            removed_partials
        );

        Ok(index)
    }

    /// Directory holding the cache files.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Final location of the cache file for a key.
    pub fn output_path(&self, media_id: i64, container: Container) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", media_id, container.extension()))
    }

    pub fn lookup(&self, media_id: i64, container: Container) -> Option<&Path> {
        self.entries
            .get(&media_id)
            .and_then(|formats| formats.get(&container))
            .map(PathBuf::as_path)
    }

    /// Registers a cache file. Idempotent; the last registration for a key wins.
    pub fn register(&mut self, media_id: i64, container: Container, path: PathBuf) {
        self.entries
            .entry(media_id)
            .or_default()
            .insert(container, path);
    }

    /// Removes an entry, returning the path it pointed to.
    pub fn remove(&mut self, media_id: i64, container: Container) -> Option<PathBuf> {
        let formats = self.entries.get_mut(&media_id)?;
        let removed = formats.remove(&container);
        if formats.is_empty() {
            self.entries.remove(&media_id);
        }
        removed
    }

    /// All registered formats of one item.
    pub fn formats(&self, media_id: i64) -> Vec<CacheEntry> {
        self.entries
            .get(&media_id)
            .map(|formats| {
                formats
                    .iter()
                    .map(|(container, path)| CacheEntry {
                        media_id,
                        container: *container,
                        path: path.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of registered files.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses `<media_id>.<ext>` into its key.
fn parse_cache_name(path: &Path) -> Option<(i64, Container)> {
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let media_id = stem.parse().ok()?;
    let container = Container::from_path(path)?;
    Some((media_id, container))
}
