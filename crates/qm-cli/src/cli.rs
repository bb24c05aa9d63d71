//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use qm_core::DataSource;

/// Aggregates quantified-self data into daily tables.
///
/// Merges screen time from ActivityWatch, Smartertime and Toggl, classifies it
/// into categories and joins it with sleep, heart rate, location, substance
/// and habit data.
#[derive(Debug, Parser)]
#[command(name = "quantifiedme", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load screen time and show hours per category per day.
    Screentime {
        #[command(flatten)]
        screentime: ScreentimeArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List habits, or show one habit's daily values.
    Habits {
        /// Habit to show.
        habit: Option<String>,

        /// Only show this year.
        #[arg(long)]
        year: Option<i32>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show sleep duration and score per day.
    Sleep {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show mean heart rate and time in zones per day.
    Heartrate {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show hours per day spent near a place or person NAME.
    Locate {
        /// A configured place or the name of a location history.
        name: String,

        /// Only show days from this date.
        #[arg(long)]
        start: Option<String>,

        /// Show hours away instead of hours near.
        #[arg(long)]
        invert: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show substance doses per day.
    Doses {
        /// Only show these substances.
        #[arg(long)]
        substance: Vec<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Join every available daily table into one.
    AllDf {
        #[command(flatten)]
        screentime: ScreentimeArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the week (or day) chunks a time range is queried in.
    Split {
        /// Start of the range.
        #[arg(long)]
        start: String,

        /// End of the range; defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// Split into days instead of weeks.
        #[arg(long)]
        days: bool,
    },

    /// Manage the query cache.
    #[command(subcommand)]
    Cache(CacheAction),

    /// Print the effective configuration.
    Config,
}

/// Cache subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove every cached chunk.
    Clear,
}

/// Which screen time to load.
#[derive(Debug, Clone, Args)]
pub struct ScreentimeArgs {
    /// Start of the period: a date, RFC 3339 or e.g. "2 weeks ago".
    #[arg(long, conflicts_with = "days")]
    pub since: Option<String>,

    /// Days to look back when --since is not given.
    #[arg(long, default_value_t = 90)]
    pub days: i64,

    /// Sources to merge.
    #[arg(long, value_delimiter = ',', default_value = "activitywatch")]
    pub sources: Vec<DataSource>,

    /// ActivityWatch hosts to query instead of the configured ones.
    #[arg(long)]
    pub hostname: Vec<String>,

    /// Use the personal categories file instead of the example rules.
    #[arg(long)]
    pub personal: bool,

    /// Query the ActivityWatch testing server.
    #[arg(long)]
    pub testing: bool,

    /// Neither read nor write the query cache.
    #[arg(long)]
    pub no_cache: bool,
}

/// Where tables go besides stdout.
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Also write the table as CSV to this path.
    #[arg(long)]
    pub csv: Option<PathBuf>,
}
