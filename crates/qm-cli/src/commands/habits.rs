//! HabitBull habits.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Datelike;
use qm_core::{DailyTable, HabitEntry, habit_names, habits_daily_table};

use crate::config::Config;
use crate::output;

pub fn load_entries(config: &Config) -> Result<Vec<HabitEntry>> {
    let path = config
        .data
        .habitbull
        .as_deref()
        .context("data.habitbull is not configured")?;
    Ok(qm_load::habitbull::load_habits(path)?)
}

/// One `habit:<name>` column per habit.
pub fn load_table(config: &Config) -> Result<DailyTable> {
    Ok(habits_daily_table(&load_entries(config)?))
}

/// Lists habits, or shows one habit's daily values, optionally for one year.
pub fn run(
    config: &Config,
    habit: Option<&str>,
    year: Option<i32>,
    csv: Option<&Path>,
    writer: &mut impl Write,
) -> Result<()> {
    let entries = load_entries(config)?;

    let Some(habit) = habit else {
        writeln!(writer, "Habits:")?;
        for name in habit_names(&entries) {
            writeln!(writer, " - {name}")?;
        }
        writeln!(writer, "Specify a habit to show it.")?;
        return Ok(());
    };

    let selected: Vec<HabitEntry> = entries
        .into_iter()
        .filter(|e| e.habit == habit)
        .filter(|e| year.is_none_or(|y| e.date.year() == y))
        .collect();
    if selected.is_empty() {
        bail!("no entries for habit {habit:?}");
    }
    output::emit(&habits_daily_table(&selected), csv, writer)
}
