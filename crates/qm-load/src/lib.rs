//! Loaders for exported quantified-self data.
//!
//! Each module reads one vendor's export format and returns `qm-core` types.
//! Loaders never fail the whole pipeline on their own: callers log a
//! [`LoadError`] and continue with the remaining sources.

pub mod fitbit;
pub mod habitbull;
pub mod location;
pub mod oura;
pub mod qslang;
pub mod smartertime;
pub mod toggl;
pub mod whoop;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid CSV in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid timestamp {value:?} in {}", .path.display())]
    Timestamp { path: PathBuf, value: String },
    #[error("invalid record in {}: {message}", .path.display())]
    Record { path: PathBuf, message: String },
}

impl LoadError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn timestamp(path: &Path, value: &str) -> Self {
        Self::Timestamp {
            path: path.to_path_buf(),
            value: value.to_string(),
        }
    }

    pub(crate) fn record(path: &Path, message: impl Into<String>) -> Self {
        Self::Record {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn csv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    csv::Reader::from_path(path).map_err(|e| LoadError::csv(path, e))
}

/// Parses the timestamp formats found in vendor exports.
///
/// Accepts RFC 3339, Postgres-style `2021-06-22 04:17:09.81+00`, naive
/// date-times (taken as UTC), US-style `01/31/21 08:00:00` and bare dates.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%m/%d/%y %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Lists files in `dir` whose name starts with `prefix` and ends with
/// `suffix`, sorted by name.
pub(crate) fn matching_files(
    dir: &Path,
    prefix: &str,
    suffix: &str,
) -> Result<Vec<PathBuf>, LoadError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| LoadError::io(dir, e))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix) && n.ends_with(suffix))
        })
        .collect();
    files.sort();
    Ok(files)
}
