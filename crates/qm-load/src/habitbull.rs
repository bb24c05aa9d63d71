//! HabitBull CSV export.

use std::path::Path;

use qm_core::HabitEntry;
use serde::Deserialize;

use crate::{LoadError, csv_reader, parse_timestamp};

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(rename = "HabitName")]
    habit_name: String,
    #[serde(rename = "CalendarDate")]
    calendar_date: String,
    #[serde(rename = "Value", default)]
    value: Option<f64>,
}

/// Habit entries sorted by date then habit. Rows without a value are skipped.
pub fn load_habits(path: &Path) -> Result<Vec<HabitEntry>, LoadError> {
    let mut reader = csv_reader(path)?;
    let mut entries = Vec::new();
    for row in reader.deserialize::<Row>() {
        let row = row.map_err(|e| LoadError::csv(path, e))?;
        let Some(value) = row.value else {
            continue;
        };
        let date = parse_timestamp(&row.calendar_date)
            .ok_or_else(|| LoadError::timestamp(path, &row.calendar_date))?
            .date_naive();
        entries.push(HabitEntry {
            date,
            habit: row.habit_name,
            value,
        });
    }
    entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.habit.cmp(&b.habit)));
    Ok(entries)
}
