//! Toggl detailed report CSV export.
//!
//! Start and end times in the export are local wall-clock times without an
//! offset, so the caller supplies the offset they were recorded in.

use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use qm_core::event::SOURCE_KEY;
use qm_core::{DataSource, Event};
use serde::Deserialize;
use serde_json::Map;

use crate::{LoadError, csv_reader};

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(rename = "Client", default)]
    client: String,
    #[serde(rename = "Project", default)]
    project: String,
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "Start date")]
    start_date: String,
    #[serde(rename = "Start time")]
    start_time: String,
    #[serde(rename = "End date")]
    end_date: String,
    #[serde(rename = "End time")]
    end_time: String,
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() { placeholder } else { value }
}

fn local_time(
    path: &Path,
    date: &str,
    time: &str,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, LoadError> {
    let bad = || LoadError::timestamp(path, &format!("{date} {time}"));
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| bad())?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S").map_err(|_| bad())?;
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(bad)
}

/// Time entries starting after `since`, sorted by time.
///
/// Each entry becomes an event with `app` set to the project and `title` to
/// `client -> project -> description`.
pub fn load_csv(
    path: &Path,
    offset: FixedOffset,
    since: DateTime<Utc>,
) -> Result<Vec<Event>, LoadError> {
    let mut reader = csv_reader(path)?;
    let mut events = Vec::new();
    for row in reader.deserialize::<Row>() {
        let row = row.map_err(|e| LoadError::csv(path, e))?;
        let start = local_time(path, &row.start_date, &row.start_time, offset)?;
        let end = local_time(path, &row.end_date, &row.end_time, offset)?;
        if start < since {
            continue;
        }

        let project = or_placeholder(&row.project, "no project");
        let client = or_placeholder(&row.client, "no client");
        let description = or_placeholder(&row.description, "no description");
        let mut data = Map::new();
        data.insert("app".to_string(), project.into());
        data.insert(
            "title".to_string(),
            format!("{client} -> {project} -> {description}").into(),
        );
        data.insert(SOURCE_KEY.to_string(), DataSource::Toggl.as_str().into());

        match Event::new(start, end - start, data) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(path = ?path, %start, error = %e, "skipping toggl entry"),
        }
    }
    events.sort_by_key(|e| e.timestamp);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const EXPORT: &str = "User,Email,Client,Project,Task,Description,Billable,Start date,Start time,End date,End time,Duration,Tags,Amount ()\n\
        Erik,e@example.com,Acme,Website,,Fix header,No,2021-05-03,09:00:00,2021-05-03,10:30:00,01:30:00,,\n\
        Erik,e@example.com,,,,,No,2021-05-03,08:00:00,2021-05-03,08:15:00,00:15:00,,\n\
        Erik,e@example.com,Acme,Website,,Broken,No,2021-05-03,12:00:00,2021-05-03,11:00:00,00:00:00,,\n\
        Erik,e@example.com,Acme,Old,,Ancient,No,2020-01-01,09:00:00,2020-01-01,10:00:00,01:00:00,,\n";

    #[test]
    fn entries_become_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toggl.csv");
        std::fs::write(&path, EXPORT).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let since = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();

        let events = load_csv(&path, offset, since).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].attr_str("title"),
            Some("no client -> no project -> no description")
        );
        assert_eq!(
            events[1].timestamp,
            Utc.with_ymd_and_hms(2021, 5, 3, 7, 0, 0).unwrap()
        );
        assert_eq!(events[1].duration, Duration::minutes(90));
        assert_eq!(events[1].attr_str("app"), Some("Website"));
        assert_eq!(
            events[1].attr_str("title"),
            Some("Acme -> Website -> Fix header")
        );
        assert_eq!(events[1].source(), Some("toggl"));
    }
}
