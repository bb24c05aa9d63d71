//! Splitting a time range into aligned chunks.
//!
//! Loaders request and cache data per chunk, so the chunks of a range must be
//! stable across runs: they are aligned to UTC day or ISO week boundaries, and
//! only the first and last chunk can be shorter than a full period.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

/// Chunk size for [`split_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSize {
    /// Chunks end at 00:00 UTC.
    Day,
    /// Chunks end at Monday 00:00 UTC.
    Week,
}

impl ChunkSize {
    /// The first boundary strictly after `t`.
    fn next_boundary(self, t: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = t.date_naive().and_time(NaiveTime::MIN).and_utc();
        match self {
            Self::Day => midnight + Duration::days(1),
            Self::Week => {
                let days_since_monday = i64::from(t.weekday().num_days_from_monday());
                midnight - Duration::days(days_since_monday) + Duration::weeks(1)
            }
        }
    }

    /// Returns true if `t` falls exactly on a boundary.
    pub fn is_boundary(self, t: DateTime<Utc>) -> bool {
        let on_midnight = t.time() == NaiveTime::MIN;
        match self {
            Self::Day => on_midnight,
            Self::Week => on_midnight && t.weekday().num_days_from_monday() == 0,
        }
    }
}

/// Partitions `[start, end)` into contiguous aligned chunks.
///
/// Returns no chunks when `start >= end`.
pub fn split_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    size: ChunkSize,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut chunks = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let chunk_end = size.next_boundary(cursor).min(end);
        chunks.push((cursor, chunk_end));
        cursor = chunk_end;
    }
    chunks
}

/// Partitions `[start, end)` into ISO-week-aligned chunks.
pub fn split_into_weeks(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    split_range(start, end, ChunkSize::Week)
}

/// Partitions `[start, end)` into day-aligned chunks.
pub fn split_into_days(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    split_range(start, end, ChunkSize::Day)
}
