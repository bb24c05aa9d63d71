//! Google Takeout location history (`Records.json`).

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use qm_core::{LocationPoint, Track};
use serde::Deserialize;

use crate::{LoadError, matching_files, parse_timestamp, read_json};

const E7: f64 = 10_000_000.0;

#[derive(Debug, Deserialize)]
struct History {
    #[serde(default)]
    locations: Vec<Record>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    latitude_e7: Option<i64>,
    longitude_e7: Option<i64>,
    timestamp_ms: Option<String>,
    timestamp: Option<String>,
    #[serde(default)]
    inferred_location: Vec<InferredLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InferredLocation {
    latitude_e7: i64,
    longitude_e7: i64,
}

impl Record {
    fn position(&self, use_inferred: bool) -> Option<(f64, f64)> {
        #[allow(clippy::cast_precision_loss)]
        let scale = |lat: i64, long: i64| (lat as f64 / E7, long as f64 / E7);
        match (self.latitude_e7, self.longitude_e7) {
            (Some(lat), Some(long)) => Some(scale(lat, long)),
            _ if use_inferred => self
                .inferred_location
                .first()
                .map(|loc| scale(loc.latitude_e7, loc.longitude_e7)),
            _ => None,
        }
    }

    fn time(&self, path: &Path) -> Result<DateTime<Utc>, LoadError> {
        if let Some(ms) = &self.timestamp_ms {
            return ms
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis)
                .ok_or_else(|| LoadError::timestamp(path, ms));
        }
        let value = self
            .timestamp
            .as_deref()
            .ok_or_else(|| LoadError::record(path, "location entry without a timestamp"))?;
        parse_timestamp(value).ok_or_else(|| LoadError::timestamp(path, value))
    }
}

/// Raw position fixes from one location history file.
///
/// Entries without coordinates are skipped with a warning, unless
/// `use_inferred` is set and an inferred location is present.
pub fn load_location_history(
    path: &Path,
    use_inferred: bool,
) -> Result<Vec<LocationPoint>, LoadError> {
    tracing::info!(path = ?path, "loading location data");
    let history: History = read_json(path)?;
    let mut points = Vec::with_capacity(history.locations.len());
    let mut skipped = 0usize;
    for record in &history.locations {
        let timestamp = record.time(path)?;
        match record.position(use_inferred) {
            Some((lat, long)) => points.push(LocationPoint {
                timestamp,
                lat,
                long,
            }),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(path = ?path, skipped, "skipped location entries without coordinates");
    }
    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

/// Resampled tracks for every `*.json` file in `dir`, keyed by file stem.
///
/// The file stem names the person the history belongs to.
pub fn load_all_tracks(dir: &Path) -> Result<BTreeMap<String, Track>, LoadError> {
    let mut tracks = BTreeMap::new();
    for path in matching_files(dir, "", ".json")? {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        let points = load_location_history(&path, false)?;
        tracks.insert(name, Track::resample(&points));
    }
    Ok(tracks)
}
