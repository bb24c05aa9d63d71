//! End-to-end tests running the `quantifiedme` binary.
//!
//! Every test runs with `HOME` pointing at a temporary directory and an
//! explicit config file, so nothing from the developer's machine is read.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn qm_binary() -> String {
    env!("CARGO_BIN_EXE_quantifiedme").to_string()
}

/// Writes a config with habit data and a cache inside `temp`.
fn write_config(temp: &Path) -> std::path::PathBuf {
    let habits = temp.join("habits.csv");
    std::fs::write(
        &habits,
        "HabitName,CalendarDate,Value\n\
         Meditate,2021-05-02T00:00:00,1\n\
         Stretch,2021-05-02T00:00:00,1\n",
    )
    .unwrap();

    let config = temp.join("config.toml");
    std::fs::write(
        &config,
        format!(
            "cache_path = {:?}\n\n[data]\nhabitbull = {:?}\n",
            temp.join("cache/cache.db").display().to_string(),
            habits.display().to_string()
        ),
    )
    .unwrap();
    config
}

fn run(temp: &Path, args: &[&str]) -> Output {
    let config = write_config(temp);
    Command::new(qm_binary())
        .env("HOME", temp)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_CACHE_HOME")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&config)
        .args(args)
        .output()
        .expect("failed to run quantifiedme")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "quantifiedme should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_screentime_from_fake_source() {
    let temp = TempDir::new().unwrap();
    let csv = temp.path().join("screentime.csv");

    let output = run(
        temp.path(),
        &[
            "screentime",
            "--sources",
            "fake",
            "--days",
            "3",
            "--csv",
            csv.to_str().unwrap(),
        ],
    );

    assert_success(&output);
    let text = stdout(&output);
    assert!(text.starts_with("Total duration: "), "unexpected output: {text}");
    assert!(text.contains("date"));

    let csv = std::fs::read_to_string(&csv).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.starts_with("date,"));
    // Three days back from now spans three or four calendar dates.
    let rows = csv.lines().count() - 1;
    assert!((3..=4).contains(&rows), "unexpected row count {rows}");
}

#[test]
fn test_screentime_without_any_events_fails() {
    let temp = TempDir::new().unwrap();

    let output = run(temp.path(), &["screentime", "--sources", "toggl", "--days", "3"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to merge screen time"), "stderr: {stderr}");
}

#[test]
fn test_habits_list() {
    let temp = TempDir::new().unwrap();

    let output = run(temp.path(), &["habits"]);

    assert_success(&output);
    assert_eq!(
        stdout(&output),
        "Habits:\n - Meditate\n - Stretch\nSpecify a habit to show it.\n"
    );
}

#[test]
fn test_split_into_weeks() {
    let temp = TempDir::new().unwrap();

    let output = run(
        temp.path(),
        &["split", "--start", "2024-01-01", "--end", "2024-01-15"],
    );

    assert_success(&output);
    assert_eq!(
        stdout(&output),
        "2024-01-01T00:00:00Z  2024-01-08T00:00:00Z\n\
         2024-01-08T00:00:00Z  2024-01-15T00:00:00Z\n"
    );
}

#[test]
fn test_config_shows_effective_values() {
    let temp = TempDir::new().unwrap();

    let output = run(temp.path(), &["config"]);

    assert_success(&output);
    let text = stdout(&output);
    assert!(text.contains("habits.csv"));
    assert!(text.contains("[me]"));
    // An explicit config file replaces the bundled example.
    assert!(!text.contains("erb-laptop"));
}

#[test]
fn test_env_overrides_config_file() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let output = Command::new(qm_binary())
        .env("HOME", temp.path())
        .env_remove("XDG_CONFIG_HOME")
        .env("QM_ME__NAME", "from-env")
        .arg("--config")
        .arg(&config)
        .arg("config")
        .output()
        .unwrap();

    assert_success(&output);
    assert!(stdout(&output).contains("name = \"from-env\""));
}

#[test]
fn test_cache_clear_without_cache() {
    let temp = TempDir::new().unwrap();

    let output = run(temp.path(), &["cache", "clear"]);

    assert_success(&output);
    assert!(stdout(&output).starts_with("Cache is empty"));
}
