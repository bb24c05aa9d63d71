//! Joining the per-source daily tables into one.

use chrono::NaiveDate;

use crate::daily::{DailyTable, date_range};

/// Where a source's table has no rows inside the combined date span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GapKind {
    /// Days before the source's first row.
    Start,
    /// Days after the source's last row.
    End,
    /// A run of missing days between two rows.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageGap {
    pub source: String,
    pub kind: GapKind,
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl CoverageGap {
    pub fn days(&self) -> i64 {
        (self.last - self.first).num_days() + 1
    }
}

/// The joined table and the gaps found while joining.
#[derive(Debug, Clone, Default)]
pub struct Combined {
    pub table: DailyTable,
    pub gaps: Vec<CoverageGap>,
}

fn gaps_for(source: &str, table: &DailyTable, span: (NaiveDate, NaiveDate)) -> Vec<CoverageGap> {
    let gap = |kind, first, last| CoverageGap {
        source: source.to_string(),
        kind,
        first,
        last,
    };
    let Some((first, last)) = table.date_span() else {
        return vec![gap(GapKind::Internal, span.0, span.1)];
    };

    let mut gaps = Vec::new();
    if let Some(before) = first.pred_opt().filter(|d| *d >= span.0) {
        gaps.push(gap(GapKind::Start, span.0, before));
    }

    let mut run_start: Option<NaiveDate> = None;
    for date in date_range(first, last) {
        match (table.row(date).is_some(), run_start) {
            (false, None) => run_start = Some(date),
            (true, Some(start)) => {
                if let Some(end) = date.pred_opt() {
                    gaps.push(gap(GapKind::Internal, start, end));
                }
                run_start = None;
            }
            _ => {}
        }
    }

    if let Some(after) = last.succ_opt().filter(|d| *d <= span.1) {
        gaps.push(gap(GapKind::End, after, span.1));
    }
    gaps
}

/// Outer-joins `tables` on date, recording every table's coverage gaps.
pub fn combine(tables: Vec<(String, DailyTable)>) -> Combined {
    let mut combined = Combined::default();
    for (_, table) in &tables {
        combined.table.join(table);
    }
    let Some(span) = combined.table.date_span() else {
        return combined;
    };

    for (source, table) in &tables {
        for gap in gaps_for(source, table, span) {
            tracing::warn!(
                source = %gap.source,
                kind = ?gap.kind,
                first = %gap.first,
                last = %gap.last,
                days = gap.days(),
                "source has no data for part of the combined range"
            );
            combined.gaps.push(gap);
        }
    }
    combined
}
