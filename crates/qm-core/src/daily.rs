//! Daily series and tables, and per-category time per day.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use thiserror::Error;

use crate::event::{Event, duration_to_hours};

/// Aggregation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// No event carries the requested category. Callers treat this as an
    /// empty series.
    #[error("no events to calculate on for category {category}")]
    NoEvents { category: String },
}

/// Decides which calendar date an instant belongs to.
///
/// A day runs from `day_start` after local midnight to `day_start` after the
/// next local midnight, where local time is UTC shifted by `utc_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    utc_offset: FixedOffset,
    day_start: Duration,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}

impl DayBoundary {
    /// UTC dates starting at midnight.
    pub fn utc() -> Self {
        Self {
            utc_offset: Utc.fix(),
            day_start: Duration::zero(),
        }
    }

    /// Dates in a fixed offset from UTC, starting `day_start` after midnight.
    pub const fn new(utc_offset: FixedOffset, day_start: Duration) -> Self {
        Self {
            utc_offset,
            day_start,
        }
    }

    /// Builds a boundary from whole-hour settings, as found in config files.
    ///
    /// Returns `None` if the offset is out of range (more than 23 hours).
    pub fn from_hours(utc_offset_hours: i32, day_start_hours: i64) -> Option<Self> {
        let offset = FixedOffset::east_opt(utc_offset_hours.checked_mul(3_600)?)?;
        Some(Self::new(offset, Duration::hours(day_start_hours)))
    }

    /// The date `t` is attributed to.
    pub fn date_of(&self, t: DateTime<Utc>) -> NaiveDate {
        (t.with_timezone(&self.utc_offset).naive_local() - self.day_start).date()
    }

    /// The instant `date` starts.
    pub fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::MIN) + self.day_start;
        let offset = Duration::seconds(i64::from(self.utc_offset.local_minus_utc()));
        (local - offset).and_utc()
    }

    /// Splits `[start, end)` at day boundaries, returning the hours per date.
    pub fn hours_per_day(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(NaiveDate, f64)> {
        let mut pieces = Vec::new();
        if end <= start {
            pieces.push((self.date_of(start), 0.0));
            return pieces;
        }
        let mut cursor = start;
        while cursor < end {
            let date = self.date_of(cursor);
            let next_day = date.succ_opt().map_or(end, |d| self.start_of(d));
            let piece_end = next_day.min(end);
            pieces.push((date, duration_to_hours(piece_end - cursor)));
            cursor = piece_end;
        }
        pieces
    }
}

/// Every date from `first` to `last`, inclusive.
pub fn date_range(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    first.iter_days().take_while(move |d| *d <= last)
}

/// A single daily column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    values: BTreeMap<NaiveDate, f64>,
}

impl DailySeries {
    /// Builds a series with every date between the first and last key present,
    /// missing dates set to zero.
    pub fn zero_filled(values: BTreeMap<NaiveDate, f64>) -> Self {
        let mut filled = BTreeMap::new();
        if let (Some(first), Some(last)) = (values.keys().next(), values.keys().next_back()) {
            for date in date_range(*first, *last) {
                filled.insert(date, values.get(&date).copied().unwrap_or(0.0));
            }
        }
        Self { values: filled }
    }

    /// Builds a series from raw values without filling gaps.
    pub const fn from_values(values: BTreeMap<NaiveDate, f64>) -> Self {
        Self { values }
    }

    /// Value on `date`, if the series covers it.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.values.get(&date).copied()
    }

    /// Iterates over `(date, value)` in date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.values.iter().map(|(d, v)| (*d, *v))
    }

    /// Sum of all values.
    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }

    /// Number of dates covered.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the series covers no dates.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A table keyed by date with named `f64` columns.
///
/// An absent cell means the column's source has no data for that date, which
/// is different from a recorded zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyTable {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

impl DailyTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Dates with at least one cell, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    /// First and last date with data.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((
            *self.rows.keys().next()?,
            *self.rows.keys().next_back()?,
        ))
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds a column without values, if not already present.
    pub fn add_column(&mut self, name: &str) {
        if !self.columns.iter().any(|c| c == name) {
            self.columns.push(name.to_string());
        }
    }

    /// Sets one cell.
    pub fn set(&mut self, date: NaiveDate, column: &str, value: f64) {
        self.add_column(column);
        self.rows
            .entry(date)
            .or_default()
            .insert(column.to_string(), value);
    }

    /// Reads one cell.
    pub fn get(&self, date: NaiveDate, column: &str) -> Option<f64> {
        self.rows.get(&date)?.get(column).copied()
    }

    /// The cells of one row, keyed by column.
    pub fn row(&self, date: NaiveDate) -> Option<&BTreeMap<String, f64>> {
        self.rows.get(&date)
    }

    /// Adds a series as a column.
    pub fn insert_series(&mut self, name: &str, series: &DailySeries) {
        self.add_column(name);
        for (date, value) in series.iter() {
            self.set(date, name, value);
        }
    }

    /// Extracts one column as a series of its present cells.
    pub fn column(&self, name: &str) -> DailySeries {
        DailySeries::from_values(
            self.rows
                .iter()
                .filter_map(|(date, row)| row.get(name).map(|v| (*date, *v)))
                .collect(),
        )
    }

    /// Fills every absent cell between the first and last date with zero.
    pub fn zero_fill(&mut self) {
        let Some((first, last)) = self.date_span() else {
            return;
        };
        for date in date_range(first, last) {
            let row = self.rows.entry(date).or_default();
            for column in &self.columns {
                row.entry(column.clone()).or_insert(0.0);
            }
        }
    }

    /// Outer-joins another table into this one. On a column name clash the
    /// other table's cells win.
    pub fn join(&mut self, other: &Self) {
        for column in &other.columns {
            self.add_column(column);
        }
        for (date, row) in &other.rows {
            let target = self.rows.entry(*date).or_default();
            for (column, value) in row {
                target.insert(column.clone(), *value);
            }
        }
    }

    /// Applies `f` to every present cell.
    pub fn map_values(&mut self, f: impl Fn(f64) -> f64) {
        for row in self.rows.values_mut() {
            for value in row.values_mut() {
                *value = f(*value);
            }
        }
    }

    /// Keeps only rows dated on or after `since`.
    pub fn retain_since(&mut self, since: NaiveDate) {
        self.rows.retain(|date, _| *date >= since);
    }
}

/// Hours per day spent in events tagged with `category`.
///
/// Events crossing a day boundary are split proportionally. The series runs
/// from the first to the last date with such events, zero-filled.
pub fn category_time_per_day(
    events: &[Event],
    category: &str,
    boundary: &DayBoundary,
) -> Result<DailySeries, AggregateError> {
    let mut hours: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut found = false;
    for event in events.iter().filter(|e| e.has_tag(category)) {
        found = true;
        for (date, h) in boundary.hours_per_day(event.timestamp, event.end()) {
            *hours.entry(date).or_insert(0.0) += h;
        }
    }
    if !found {
        return Err(AggregateError::NoEvents {
            category: category.to_string(),
        });
    }
    Ok(DailySeries::zero_filled(hours))
}

/// One column per tag present in `events`, in hours per day, zero-filled
/// across the whole table.
pub fn category_table(events: &[Event], boundary: &DayBoundary) -> DailyTable {
    let tags: BTreeSet<&str> = events.iter().flat_map(Event::tags).collect();
    let mut table = DailyTable::new();
    for tag in tags {
        match category_time_per_day(events, tag, boundary) {
            Ok(series) => table.insert_series(tag, &series),
            Err(AggregateError::NoEvents { category }) => {
                tracing::debug!(%category, "no events for category, using empty series");
                table.add_column(&category);
            }
        }
    }
    table.zero_fill();
    table
}
