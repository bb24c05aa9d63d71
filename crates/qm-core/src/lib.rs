//! Core pipeline for quantifiedme.
//!
//! This crate contains the data model and the pure pipeline steps:
//! - Timeline: merging event streams without overlap, by source priority
//! - Classification: tagging events with hierarchical categories
//! - Daily aggregation: per-category hours per day, and the per-source daily
//!   tables for doses, heart rate, sleep, location and habits
//! - Combination of daily tables into one, with coverage gap reporting

pub mod classify;
pub mod combine;
pub mod daily;
pub mod dose;
pub mod event;
pub mod fake;
pub mod habits;
pub mod heartrate;
pub mod location;
pub mod sleep;
pub mod timeline;
pub mod types;
pub mod window;

pub use classify::{CategoryRule, Classifier, ClassifyError, RuleSet, UNCATEGORIZED};
pub use combine::{Combined, CoverageGap, GapKind, combine};
pub use daily::{
    AggregateError, DailySeries, DailyTable, DayBoundary, category_table, category_time_per_day,
};
pub use dose::{DoseEvent, DoseTable, StructuredDose, WarnOnce};
pub use event::Event;
pub use fake::fake_events;
pub use habits::{HabitEntry, habit_names, habits_daily_table};
pub use heartrate::{HeartRateSample, HeartRateZone, default_zones, heartrate_daily_table};
pub use location::{
    LocationError, LocationPoint, Place, Track, colocate, location_daily_table,
    proximity_to_location,
};
pub use sleep::{SleepRecord, sleep_daily_table};
pub use timeline::{
    OverlapError, Timeline, TimelineBuilder, TimelineError, union_no_overlap, verify_no_overlap,
};
pub use types::{CategoryName, DataSource, ValidationError};
pub use window::{ChunkSize, split_into_days, split_into_weeks, split_range};
