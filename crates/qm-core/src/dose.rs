//! Substance dose normalization.
//!
//! Dose amounts are free-form strings like `100mg` or `2 dl`. They are parsed
//! into SI base units (kilograms for mass, cubic metres for volume, bare
//! numbers as-is) so doses of one substance can be summed per day.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use thiserror::Error;

use crate::daily::{DailySeries, DailyTable, DayBoundary};

/// Event kind carrying a dose.
pub const DOSE_KIND: &str = "dose";

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?)\s*(\S*)\s*$").unwrap()
});

/// Amount parsing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("could not parse amount {input:?}")]
    InvalidAmount { input: String },
    #[error("undefined unit {unit:?}")]
    UnknownUnit { unit: String },
}

/// Conversion factor from `unit` to its SI base unit, matched exactly.
fn unit_factor(unit: &str) -> Option<f64> {
    let factor = match unit {
        "" => 1.0,
        "Mg" | "t" => 1e3,
        "kg" => 1.0,
        "g" => 1e-3,
        "mg" => 1e-6,
        "ug" | "mcg" | "µg" | "μg" => 1e-9,
        "ng" => 1e-12,
        "oz" => 28.349_523_125e-3,
        "lb" => 453.592_37e-3,
        "l" | "L" => 1e-3,
        "dl" | "dL" => 1e-4,
        "cl" | "cL" => 1e-5,
        "ml" | "mL" => 1e-6,
        "ul" | "uL" | "µl" | "μl" => 1e-9,
        "tsp" => 4.928_921_593_75e-6,
        "tbsp" => 14.786_764_781_25e-6,
        "floz" => 29.573_529_562_5e-6,
        "cup" | "cups" => 236.588_236_5e-6,
        _ => return None,
    };
    Some(factor)
}

/// Parses `<number><unit>` into SI base units.
///
/// Supported units:
/// - mass: `t`/`Mg`, `kg`, `g`, `mg`, `ug`/`mcg`/`µg`, `ng`, `oz`, `lb`
/// - volume: `l`, `dl`, `cl`, `ml`, `ul`/`µl`, and the US `tsp`, `tbsp`,
///   `floz` and `cup`
/// - none: a bare number
///
/// Units are matched case-sensitively first, so `Mg` (megagram) and `mg`
/// stay distinct. Only units with no exact match fall back to lowercase,
/// which accepts spellings like `MG` or `Ml`.
pub fn parse_amount(input: &str) -> Result<f64, UnitError> {
    let invalid = || UnitError::InvalidAmount {
        input: input.to_string(),
    };
    let caps = AMOUNT_RE.captures(input).ok_or_else(invalid)?;
    let value: f64 = caps[1].parse().map_err(|_| invalid())?;
    let unit = &caps[2];
    let factor = unit_factor(unit)
        .or_else(|| unit_factor(&unit.to_lowercase()))
        .ok_or_else(|| UnitError::UnknownUnit {
            unit: unit.to_string(),
        })?;
    Ok(value * factor)
}

/// Logs each distinct warning message once.
#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: HashSet<String>,
}

impl WarnOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs `message` unless it was logged before. Returns true if logged.
    pub fn warn(&mut self, message: &str) -> bool {
        if self.seen.contains(message) {
            return false;
        }
        tracing::warn!("{message}");
        self.seen.insert(message.to_string());
        true
    }
}

/// A structured dose, as some log entries carry instead of an amount string.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredDose {
    pub amount: String,
    pub unit: String,
}

/// One entry from a substance log.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub substance: Option<String>,
    pub amount: Option<String>,
    pub dose: Option<StructuredDose>,
    pub tags: Vec<String>,
}

impl DoseEvent {
    /// The dose in base units, `None` when unknown.
    fn base_amount(&self, warnings: &mut WarnOnce) -> Option<f64> {
        if self.amount.as_deref().is_some_and(|a| a.contains('?')) {
            return None;
        }
        let text = match (&self.dose, &self.amount) {
            (Some(dose), _) => format!("{}{}", dose.amount, dose.unit),
            (None, Some(amount)) => amount.clone(),
            (None, None) => {
                warnings.warn("dose event without an amount");
                return None;
            }
        };
        match parse_amount(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                warnings.warn(&err.to_string());
                None
            }
        }
    }
}

/// A normalized dose.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseRow {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub substance: Option<String>,
    /// Amount in SI base units.
    pub dose: f64,
    pub tags: Vec<String>,
}

/// Normalized doses with unknown amounts back-filled.
#[derive(Debug, Clone, Default)]
pub struct DoseTable {
    rows: Vec<DoseRow>,
}

impl DoseTable {
    #[allow(clippy::cast_precision_loss)]
    pub fn from_events(events: &[DoseEvent], boundary: &DayBoundary) -> Self {
        let mut warnings = WarnOnce::new();
        let parsed: Vec<(&DoseEvent, Option<f64>)> = events
            .iter()
            .filter(|e| e.kind == DOSE_KIND)
            .map(|e| (e, e.base_amount(&mut warnings)))
            .collect();

        let mut known: HashMap<Option<&str>, (f64, usize)> = HashMap::new();
        for (event, amount) in &parsed {
            if let Some(value) = amount {
                let entry = known.entry(event.substance.as_deref()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }

        let rows = parsed
            .into_iter()
            .map(|(event, amount)| {
                let dose = amount.unwrap_or_else(|| {
                    known
                        .get(&event.substance.as_deref())
                        .map_or(0.0, |(sum, n)| sum / *n as f64)
                });
                DoseRow {
                    timestamp: event.timestamp,
                    date: boundary.date_of(event.timestamp),
                    substance: event.substance.clone(),
                    dose,
                    tags: event.tags.clone(),
                }
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[DoseRow] {
        &self.rows
    }

    /// Total daily dose of `substance`.
    pub fn substance_series(&self, substance: &str) -> DailySeries {
        let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for row in self
            .rows
            .iter()
            .filter(|r| r.substance.as_deref() == Some(substance))
        {
            *sums.entry(row.date).or_insert(0.0) += row.dose;
        }
        DailySeries::zero_filled(sums)
    }

    /// Number of doses per day tagged `tag`.
    pub fn tag_series(&self, tag: &str) -> DailySeries {
        let mut counts: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for row in self.rows.iter().filter(|r| r.tags.iter().any(|t| t == tag)) {
            *counts.entry(row.date).or_insert(0.0) += 1.0;
        }
        DailySeries::zero_filled(counts)
    }

    /// `tag:<tag>` count columns, then one sum column per substance.
    pub fn daily_table(&self) -> DailyTable {
        let tags: BTreeSet<&str> = self
            .rows
            .iter()
            .flat_map(|r| r.tags.iter().map(String::as_str))
            .collect();
        let substances: BTreeSet<&str> = self
            .rows
            .iter()
            .filter_map(|r| r.substance.as_deref())
            .filter(|s| !s.is_empty())
            .collect();

        let mut table = DailyTable::new();
        for tag in tags {
            table.insert_series(&format!("tag:{tag}"), &self.tag_series(tag));
        }
        for substance in substances {
            table.insert_series(&substance_column(substance), &self.substance_series(substance));
        }
        table.zero_fill();
        table
    }
}

/// Column name for a substance: lowercased, without spaces or dashes.
pub fn substance_column(substance: &str) -> String {
    substance
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}
