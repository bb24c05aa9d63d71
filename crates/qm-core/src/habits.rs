//! Habit tracker entries.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::daily::DailyTable;

/// One day's value for one habit.
#[derive(Debug, Clone, PartialEq)]
pub struct HabitEntry {
    pub date: NaiveDate,
    pub habit: String,
    pub value: f64,
}

/// Column name for a habit.
pub fn habit_column(habit: &str) -> String {
    format!("habit:{habit}")
}

/// Distinct habit names, sorted.
pub fn habit_names(entries: &[HabitEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.habit.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One `habit:<name>` column per habit. Multiple entries for the same habit
/// and date are summed; days without an entry stay absent.
pub fn habits_daily_table(entries: &[HabitEntry]) -> DailyTable {
    let mut table = DailyTable::new();
    for habit in habit_names(entries) {
        table.add_column(&habit_column(&habit));
    }
    for entry in entries {
        let column = habit_column(&entry.habit);
        let current = table.get(entry.date, &column).unwrap_or(0.0);
        table.set(entry.date, &column, current + entry.value);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: u32, habit: &str, value: f64) -> HabitEntry {
        HabitEntry {
            date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            habit: habit.to_string(),
            value,
        }
    }

    #[test]
    fn one_column_per_habit() {
        let entries = [
            entry(1, "Meditate", 1.0),
            entry(1, "Pushups", 20.0),
            entry(1, "Pushups", 10.0),
            entry(3, "Meditate", 1.0),
        ];
        assert_eq!(habit_names(&entries), vec!["Meditate", "Pushups"]);

        let table = habits_daily_table(&entries);
        assert_eq!(table.columns(), &["habit:Meditate", "habit:Pushups"]);
        let day1 = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let day3 = NaiveDate::from_ymd_opt(2024, 4, 3).unwrap();
        assert_eq!(table.get(day1, "habit:Pushups"), Some(30.0));
        assert_eq!(table.get(day3, "habit:Pushups"), None);
    }
}
