//! Rendering daily tables as text and CSV.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Duration;
use qm_core::DailyTable;

/// Shown for cells without data.
const MISSING: &str = "-";

/// Formats a duration as "Xh Ym" if at least an hour, else "Xm".
/// Negative durations are shown as 0m.
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Two decimals, switching to scientific notation for values that would
/// round to zero, such as doses in kilograms.
fn format_cell(value: Option<f64>) -> String {
    value.map_or_else(
        || MISSING.to_string(),
        |v| {
            if v != 0.0 && v.abs() < 0.005 {
                format!("{v:.2e}")
            } else {
                format!("{v:.2}")
            }
        },
    )
}

/// Formats a table with one row per date, columns right-aligned.
pub fn format_table(table: &DailyTable) -> String {
    if table.is_empty() {
        return "(no data)\n".to_string();
    }

    let columns = table.columns();
    let rows: Vec<(String, Vec<String>)> = table
        .dates()
        .map(|date| {
            let cells = columns
                .iter()
                .map(|column| format_cell(table.get(date, column)))
                .collect();
            (date.format("%Y-%m-%d").to_string(), cells)
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            rows.iter()
                .map(|(_, cells)| cells[i].len())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut output = String::new();
    output.push_str("date      ");
    for (column, width) in columns.iter().zip(&widths) {
        let _ = write!(output, "  {column:>width$}");
    }
    output.push('\n');
    for (date, cells) in &rows {
        output.push_str(date);
        for (cell, width) in cells.iter().zip(&widths) {
            let _ = write!(output, "  {cell:>width$}");
        }
        output.push('\n');
    }
    output
}

/// Writes `table` as CSV: a `date` column, then one column per table column.
/// Cells without data are left empty.
pub fn write_csv<W: Write>(table: &DailyTable, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(std::iter::once("date").chain(table.columns().iter().map(String::as_str)))?;
    for date in table.dates() {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        record.extend(
            table
                .columns()
                .iter()
                .map(|column| table.get(date, column).map(|v| v.to_string()).unwrap_or_default()),
        );
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Prints `table` and, if requested, also saves it as CSV.
pub fn emit(table: &DailyTable, csv_path: Option<&Path>, writer: &mut impl Write) -> Result<()> {
    write!(writer, "{}", format_table(table))?;
    if let Some(path) = csv_path {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        write_csv(table, file).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = ?path, rows = table.dates().count(), "wrote CSV");
    }
    Ok(())
}
