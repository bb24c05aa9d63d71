//! qslang substance log, exported as JSON.
//!
//! The export is a list of `{"timestamp", "type", "data"}` objects, either bare
//! or wrapped in `{"events": [...]}`. Dose entries carry `substance`, `tags` and
//! either an `amount` string or a structured `dose` with `amount` and `unit`.

use std::path::Path;

use chrono::{DateTime, Utc};
use qm_core::{DoseEvent, StructuredDose};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::LoadError;

#[derive(Debug, Deserialize)]
struct Wrapped {
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    data: RawData,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    #[serde(default)]
    substance: Option<String>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    dose: Option<RawDose>,
    #[serde(default, deserialize_with = "null_as_default")]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDose {
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    unit: Option<String>,
}

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses either a bare list of entries or one wrapped in `{"events": [...]}`.
///
/// The shape is picked from the first token so parse errors keep their line
/// and column.
fn parse_export(path: &Path, contents: &str) -> Result<Vec<RawEvent>, LoadError> {
    let result = if contents.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<RawEvent>>(contents)
    } else {
        serde_json::from_str::<Wrapped>(contents).map(|w| w.events)
    };
    result.map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Amounts are usually strings, but bare numbers show up too.
fn amount_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// All entries of the log, sorted by time.
pub fn load_doses(path: &Path) -> Result<Vec<DoseEvent>, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    let raw = parse_export(path, &contents)?;
    let mut events: Vec<DoseEvent> = raw
        .into_iter()
        .map(|e| DoseEvent {
            timestamp: e.timestamp,
            kind: e.kind,
            substance: e.data.substance,
            amount: amount_text(e.data.amount),
            dose: e.data.dose.map(|d| StructuredDose {
                amount: amount_text(d.amount).unwrap_or_default(),
                unit: d.unit.unwrap_or_default(),
            }),
            tags: e.data.tags,
        })
        .collect();
    events.sort_by_key(|e| e.timestamp);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_bare_and_wrapped_exports() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("bare.json");
        std::fs::write(
            &bare,
            r#"[
                {"timestamp": "2021-01-01T10:00:00Z", "type": "dose",
                 "data": {"substance": "Caffeine", "amount": "100mg", "tags": ["stimulant"]}},
                {"timestamp": "2021-01-01T08:00:00Z", "type": "dose",
                 "data": {"substance": "Melatonin", "dose": {"amount": 3, "unit": "mg"}}},
                {"timestamp": "2021-01-01T09:00:00Z", "type": "journal", "data": {}}
            ]"#,
        )
        .unwrap();

        let events = load_doses(&bare).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].substance.as_deref(), Some("Melatonin"));
        assert_eq!(
            events[0].dose,
            Some(StructuredDose {
                amount: "3".to_string(),
                unit: "mg".to_string()
            })
        );
        assert_eq!(events[1].kind, "journal");
        assert_eq!(events[2].amount.as_deref(), Some("100mg"));
        assert_eq!(events[2].tags, vec!["stimulant"]);

        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(
            &wrapped,
            r#"{"events": [{"timestamp": "2021-01-01T10:00:00Z", "type": "dose", "data": {"substance": "Caffeine", "amount": "?g"}}]}"#,
        )
        .unwrap();
        let events = load_doses(&wrapped).unwrap();
        assert_eq!(events[0].amount.as_deref(), Some("?g"));
    }

    #[test]
    fn null_tags_and_data_are_treated_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("null.json");
        std::fs::write(
            &path,
            r#"[
                {"timestamp": "2021-01-01T10:00:00Z", "type": "dose",
                 "data": {"substance": "Caffeine", "amount": "100mg", "tags": null, "dose": null}},
                {"timestamp": "2021-01-01T11:00:00Z", "type": "note", "data": null}
            ]"#,
        )
        .unwrap();

        let events = load_doses(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].tags.is_empty());
        assert_eq!(events[0].amount.as_deref(), Some("100mg"));
        assert!(events[0].dose.is_none());
        assert!(events[1].substance.is_none());
    }

    #[test]
    fn malformed_entry_reports_its_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            "[\n{\"timestamp\": \"2021-01-01T10:00:00Z\", \"type\": 3}\n]",
        )
        .unwrap();

        let err = load_doses(&path).unwrap_err();
        let LoadError::Json { source, .. } = &err else {
            panic!("expected a JSON error, got {err:?}");
        };
        assert_eq!(source.line(), 2);
        assert!(source.to_string().contains("invalid type"), "{source}");
    }
}
