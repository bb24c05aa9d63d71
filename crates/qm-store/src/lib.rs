//! Cache of queried events, backed by `rusqlite`.
//!
//! Events fetched from a source are stored per time chunk, keyed by
//! `(source, hostname, start, end)`. Only complete chunks, those ending on a
//! week boundary, are stored: a chunk reaching up to "now" would go stale as
//! soon as more data is recorded.
//!
//! The cache is an optimization only. Dropping the database file loses
//! nothing but time.
//!
//! # Schema
//!
//! Chunk bounds are stored as TEXT in RFC 3339 with millisecond precision
//! (e.g. `2024-01-15T00:00:00.000Z`) and the events as a JSON array in the
//! ActivityWatch event shape.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use qm_core::{ChunkSize, Event};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Cache errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to create the directory holding the database.
    #[error("failed to create cache directory: {0}")]
    Io(#[from] std::io::Error),
    /// A stored chunk could not be decoded.
    #[error("invalid cached events for {key}: {source}")]
    InvalidChunk {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Identifies one cached chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkKey {
    pub source: String,
    pub hostname: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ChunkKey {
    pub fn new(
        source: impl Into<String>,
        hostname: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            hostname: hostname.into(),
            start,
            end,
        }
    }

    /// Whether the chunk is complete and may be stored.
    pub fn is_complete(&self) -> bool {
        ChunkSize::Week.is_boundary(self.end)
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} {}..{}",
            self.source,
            self.hostname,
            format_timestamp(self.start),
            format_timestamp(self.end)
        )
    }
}

/// Counts reported by [`Cache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub chunks: usize,
    pub events: usize,
}

/// Chunk cache connection.
///
/// Wraps a `rusqlite::Connection`, so it is `Send` but not `Sync`.
pub struct Cache {
    conn: Connection,
}

impl Cache {
    /// Opens the cache at `path`, creating the file and its parent directory
    /// if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.init()?;
        Ok(cache)
    }

    /// Opens an in-memory cache, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.init()?;
        Ok(cache)
    }

    /// Idempotent.
    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS event_chunks (
                source TEXT NOT NULL,
                hostname TEXT NOT NULL,
                chunk_start TEXT NOT NULL,
                chunk_end TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                event_count INTEGER NOT NULL,
                events TEXT NOT NULL,
                PRIMARY KEY (source, hostname, chunk_start, chunk_end)
            );
            ",
        )?;
        Ok(())
    }

    /// The cached events of a chunk, if present.
    pub fn get_chunk(&self, key: &ChunkKey) -> Result<Option<Vec<Event>>, StoreError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT events FROM event_chunks
                 WHERE source = ? AND hostname = ? AND chunk_start = ? AND chunk_end = ?",
                params![
                    key.source,
                    key.hostname,
                    format_timestamp(key.start),
                    format_timestamp(key.end)
                ],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            return Ok(None);
        };
        let events = serde_json::from_str(&json).map_err(|source| StoreError::InvalidChunk {
            key: key.to_string(),
            source,
        })?;
        tracing::debug!(chunk = %key, "cache hit");
        Ok(Some(events))
    }

    /// Stores a chunk's events, replacing any previous entry. Incomplete
    /// chunks are not stored; returns whether the chunk was stored.
    pub fn put_chunk(&mut self, key: &ChunkKey, events: &[Event]) -> Result<bool, StoreError> {
        if !key.is_complete() {
            return Ok(false);
        }
        let json = serde_json::to_string(events).map_err(|source| StoreError::InvalidChunk {
            key: key.to_string(),
            source,
        })?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO event_chunks
             (source, hostname, chunk_start, chunk_end, fetched_at, event_count, events)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                key.source,
                key.hostname,
                format_timestamp(key.start),
                format_timestamp(key.end),
                format_timestamp(Utc::now()),
                i64::try_from(events.len()).unwrap_or(i64::MAX),
                json
            ],
        )?;
        tx.commit()?;
        tracing::debug!(chunk = %key, events = events.len(), "cached chunk");
        Ok(true)
    }

    /// Removes every chunk; returns how many were removed.
    pub fn clear(&mut self) -> Result<usize, StoreError> {
        Ok(self.conn.execute("DELETE FROM event_chunks", [])?)
    }

    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        let (chunks, events): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(event_count), 0) FROM event_chunks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(CacheStats {
            chunks: usize::try_from(chunks).unwrap_or(0),
            events: usize::try_from(events).unwrap_or(0),
        })
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::{Map, json};

    // 2024-01-01 and 2024-01-08 are Mondays.
    fn week() -> ChunkKey {
        ChunkKey::new(
            "activitywatch",
            "erb-laptop",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        )
    }

    fn events() -> Vec<Event> {
        let mut data = Map::new();
        data.insert("app".to_string(), json!("Firefox"));
        vec![
            Event::new(
                Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
                Duration::milliseconds(1500),
                data,
            )
            .unwrap(),
        ]
    }

    #[test]
    fn complete_chunk_round_trips() {
        let mut cache = Cache::open_in_memory().unwrap();
        assert_eq!(cache.get_chunk(&week()).unwrap(), None);

        assert!(cache.put_chunk(&week(), &events()).unwrap());
        assert_eq!(cache.get_chunk(&week()).unwrap(), Some(events()));

        let mut other_host = week();
        other_host.hostname = "erb-desktop".to_string();
        assert_eq!(cache.get_chunk(&other_host).unwrap(), None);
    }

    #[test]
    fn incomplete_chunk_is_not_stored() {
        let mut cache = Cache::open_in_memory().unwrap();
        let mut partial = week();
        partial.end = Utc.with_ymd_and_hms(2024, 1, 5, 13, 37, 0).unwrap();

        assert!(!partial.is_complete());
        assert!(!cache.put_chunk(&partial, &events()).unwrap());
        assert_eq!(cache.get_chunk(&partial).unwrap(), None);
    }

    #[test]
    fn clear_and_stats() {
        let mut cache = Cache::open_in_memory().unwrap();
        cache.put_chunk(&week(), &events()).unwrap();
        let mut next = week();
        next.start = next.end;
        next.end += Duration::weeks(1);
        cache.put_chunk(&next, &[]).unwrap();

        assert_eq!(
            cache.stats().unwrap(),
            CacheStats {
                chunks: 2,
                events: 1
            }
        );
        assert_eq!(cache.clear().unwrap(), 2);
        assert_eq!(cache.stats().unwrap().chunks, 0);
    }

    #[test]
    fn open_creates_parent_directory_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");
        {
            let mut cache = Cache::open(&path).unwrap();
            cache.put_chunk(&week(), &events()).unwrap();
        }
        let cache = Cache::open(&path).unwrap();
        assert_eq!(cache.get_chunk(&week()).unwrap(), Some(events()));
    }
}
