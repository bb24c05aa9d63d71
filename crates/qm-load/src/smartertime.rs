//! Smartertime phone usage, either as an exported `.awbucket.json` or as the
//! raw Smartertime CSV.
//!
//! Only phone and call activities are kept; they are normalized to the window
//! watcher schema by copying the activity into `app` and `title`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use qm_core::event::{HOSTNAME_KEY, SOURCE_KEY};
use qm_core::{DataSource, Event, union_no_overlap};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{LoadError, csv_reader, read_json};

const ACTIVITY_MARKERS: [&str; 2] = ["phone:", "call:"];

#[derive(Debug, Deserialize)]
struct Bucket {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Timestamp UTC ms")]
    timestamp_ms: f64,
    #[serde(rename = "Duration ms")]
    duration_ms: f64,
    #[serde(rename = "Activity")]
    activity: String,
    #[serde(rename = "Device", default)]
    device: String,
    #[serde(rename = "Place", default)]
    place: String,
    #[serde(rename = "Room", default)]
    room: String,
}

/// Events from a raw Smartertime CSV export, unfiltered.
#[allow(clippy::cast_possible_truncation)]
pub fn read_csv_events(path: &Path) -> Result<Vec<Event>, LoadError> {
    let mut reader = csv_reader(path)?;
    let mut events = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(|e| LoadError::csv(path, e))?;
        let timestamp = DateTime::from_timestamp_millis(row.timestamp_ms as i64)
            .ok_or_else(|| LoadError::timestamp(path, &row.timestamp_ms.to_string()))?;
        let mut data = Map::new();
        data.insert("activity".to_string(), row.activity.into());
        data.insert("device".to_string(), row.device.into());
        data.insert("place".to_string(), row.place.into());
        data.insert("room".to_string(), row.room.into());
        let duration = qm_core::event::seconds_to_duration(row.duration_ms / 1000.0);
        let event = Event::new(timestamp, duration, data)
            .map_err(|e| LoadError::record(path, e.to_string()))?;
        events.push(event);
    }
    Ok(events)
}

fn normalize(events: Vec<Event>, since: DateTime<Utc>) -> Vec<Event> {
    let mut kept: Vec<Event> = events
        .into_iter()
        .filter(|e| since < e.timestamp)
        .filter_map(|mut e| {
            let activity = e.attr_str("activity")?.to_string();
            if !ACTIVITY_MARKERS.iter().any(|m| activity.contains(m)) {
                return None;
            }
            e.set_attr("app", activity.clone());
            e.set_attr("title", activity);
            e.set_attr(SOURCE_KEY, DataSource::Smartertime.as_str());
            Some(e)
        })
        .collect();
    kept.sort_by_key(|e| e.timestamp);
    kept
}

/// Phone events after `since` from one export file. Files ending in `.csv` are
/// read as raw CSV, anything else as an awbucket JSON.
pub fn load_events(path: &Path, since: DateTime<Utc>) -> Result<Vec<Event>, LoadError> {
    tracing::info!(path = ?path, "loading smartertime data");
    let events = if path.extension().is_some_and(|ext| ext == "csv") {
        read_csv_events(path)?
    } else {
        read_json::<Bucket>(path)?.events
    };
    Ok(normalize(events, since))
}

/// Events from every device, keyed by hostname, unioned in hostname order.
pub fn load_devices(
    buckets: &BTreeMap<String, PathBuf>,
    since: DateTime<Utc>,
) -> Result<Vec<Event>, LoadError> {
    let mut merged: Vec<Event> = Vec::new();
    for (hostname, path) in buckets {
        let mut events = load_events(path, since)?;
        for e in &mut events {
            e.set_attr(HOSTNAME_KEY, Value::String(hostname.clone()));
        }
        merged = union_no_overlap(&merged, &events);
    }
    Ok(merged)
}
