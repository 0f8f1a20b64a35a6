//! SQLite-backed media library implementation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{LibraryError, LibraryStats, MediaLibrary, NewMediaItem};
use crate::media::MediaItem;

/// SQLite-backed media library.
pub struct SqliteLibrary {
    conn: Mutex<Connection>,
}

impl SqliteLibrary {
    /// Create a new SQLite library, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, LibraryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LibraryError::Database(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite library (useful for testing).
    pub fn in_memory() -> Result<Self, LibraryError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LibraryError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- One row per audio file
            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                path TEXT NOT NULL UNIQUE,
                length_secs INTEGER,
                size_bytes INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                added_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_name ON media(name);

            -- Tags found by the probe, lowercase names
            CREATE TABLE IF NOT EXISTS media_tags (
                media_id INTEGER NOT NULL REFERENCES media(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (media_id, name)
            );
            "#,
        )?;

        Ok(())
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<MediaItem> {
        let path: String = row.get(2)?;
        let length_secs: Option<i64> = row.get(3)?;
        let size_bytes: i64 = row.get(4)?;

        Ok(MediaItem {
            id: row.get(0)?,
            name: row.get(1)?,
            path: PathBuf::from(path),
            length_secs: length_secs.map(|l| l.max(0) as u64),
            size_bytes: size_bytes.max(0) as u64,
            mime_type: row.get(5)?,
            cached: false,
        })
    }
}

impl MediaLibrary for SqliteLibrary {
    fn get_item(&self, id: i64) -> Result<MediaItem, LibraryError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, path, length_secs, size_bytes, mime_type FROM media WHERE id = ?",
            params![id],
            Self::row_to_item,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => LibraryError::NotFound(id),
            _ => LibraryError::Database(e.to_string()),
        })
    }

    fn list(&self) -> Result<Vec<MediaItem>, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, path, length_secs, size_bytes, mime_type
             FROM media ORDER BY name COLLATE NOCASE, id",
        )?;

        let rows = stmt.query_map([], Self::row_to_item)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn tags(&self, id: i64) -> Result<BTreeMap<String, String>, LibraryError> {
        let conn = self.conn.lock().unwrap();

        let exists = conn
            .query_row("SELECT 1 FROM media WHERE id = ?", params![id], |_| Ok(()))
            .optional()?;
        if exists.is_none() {
            return Err(LibraryError::NotFound(id));
        }

        let mut stmt = conn.prepare("SELECT name, value FROM media_tags WHERE media_id = ?")?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut tags = BTreeMap::new();
        for row in rows {
            let (name, value) = row?;
            tags.insert(name, value);
        }
        Ok(tags)
    }

    fn upsert(&self, item: &NewMediaItem) -> Result<i64, LibraryError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let path = item.path.to_string_lossy().to_string();

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM media WHERE path = ?",
                params![&path],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE media SET name = ?, length_secs = ?, size_bytes = ?, mime_type = ?
                     WHERE id = ?",
                    params![
                        &item.name,
                        item.length_secs.map(|l| l as i64),
                        item.size_bytes as i64,
                        &item.mime_type,
                        id,
                    ],
                )?;
                tx.execute("DELETE FROM media_tags WHERE media_id = ?", params![id])?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO media (name, path, length_secs, size_bytes, mime_type, added_at)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![
                        &item.name,
                        &path,
                        item.length_secs.map(|l| l as i64),
                        item.size_bytes as i64,
                        &item.mime_type,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        for (name, value) in &item.tags {
            tx.execute(
                "INSERT OR REPLACE INTO media_tags (media_id, name, value) VALUES (?, ?, ?)",
                params![id, name, value],
            )?;
        }

        tx.commit()?;
        Ok(id)
    }

    fn count(&self) -> Result<u64, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn stats(&self) -> Result<LibraryStats, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let (items, size, length): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0), COALESCE(SUM(length_secs), 0)
             FROM media",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(LibraryStats {
            items: items as u64,
            total_size_bytes: size as u64,
            total_length_secs: length as u64,
        })
    }
}
