//! Fitbit data export.
//!
//! Heart rate is split into one file per day under
//! `Physical Activity/heart_rate-YYYY-MM-DD.json`, each an array of
//! `{"dateTime": ..., "value": {"bpm": ..., "confidence": ...}}`.

use std::path::Path;

use qm_core::HeartRateSample;
use rayon::prelude::*;
use serde::Deserialize;

use crate::{LoadError, matching_files, parse_timestamp, read_json};

pub const SOURCE: &str = "fitbit";

#[derive(Debug, Deserialize)]
struct Reading {
    #[serde(rename = "dateTime")]
    date_time: String,
    value: ReadingValue,
}

#[derive(Debug, Deserialize)]
struct ReadingValue {
    bpm: f64,
}

fn load_heartrate_file(path: &Path) -> Result<Vec<HeartRateSample>, LoadError> {
    let readings: Vec<Reading> = read_json(path)?;
    readings
        .into_iter()
        .map(|r| {
            let timestamp = parse_timestamp(&r.date_time)
                .ok_or_else(|| LoadError::timestamp(path, &r.date_time))?;
            Ok(HeartRateSample {
                timestamp,
                bpm: r.value.bpm,
                source: SOURCE.to_string(),
            })
        })
        .collect()
}

/// Heart-rate samples from every daily file, parsed in parallel.
///
/// Files that fail to parse are logged and skipped.
pub fn load_heartrate(export_dir: &Path) -> Result<Vec<HeartRateSample>, LoadError> {
    let files = matching_files(&export_dir.join("Physical Activity"), "heart_rate-", ".json")?;
    tracing::debug!(count = files.len(), "loading fitbit heart rate files");

    let mut samples: Vec<HeartRateSample> = files
        .par_iter()
        .filter_map(|path| match load_heartrate_file(path) {
            Ok(samples) => Some(samples),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "skipping invalid heart rate file");
                None
            }
        })
        .flatten()
        .collect();

    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}
