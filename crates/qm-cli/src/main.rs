use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use qm_cli::commands::{
    all_df, cache, doses, habits, heartrate, locate, screentime, show_config, sleep, split,
};
use qm_cli::{CacheAction, Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so tables on stdout stay clean.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Screentime { screentime: args, output }) => {
            let config = load_config(cli.config.as_deref())?;
            screentime::run(&config, args, output.csv.as_deref(), &mut out)?;
        }
        Some(Commands::Habits { habit, year, output }) => {
            let config = load_config(cli.config.as_deref())?;
            habits::run(&config, habit.as_deref(), *year, output.csv.as_deref(), &mut out)?;
        }
        Some(Commands::Sleep { output }) => {
            let config = load_config(cli.config.as_deref())?;
            sleep::run(&config, output.csv.as_deref(), &mut out)?;
        }
        Some(Commands::Heartrate { output }) => {
            let config = load_config(cli.config.as_deref())?;
            heartrate::run(&config, output.csv.as_deref(), &mut out)?;
        }
        Some(Commands::Locate {
            name,
            start,
            invert,
            output,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            locate::run(
                &config,
                name,
                start.as_deref(),
                *invert,
                output.csv.as_deref(),
                &mut out,
            )?;
        }
        Some(Commands::Doses { substance, output }) => {
            let config = load_config(cli.config.as_deref())?;
            doses::run(&config, substance, output.csv.as_deref(), &mut out)?;
        }
        Some(Commands::AllDf { screentime: args, output }) => {
            let config = load_config(cli.config.as_deref())?;
            all_df::run(&config, args, output.csv.as_deref(), &mut out)?;
        }
        Some(Commands::Split { start, end, days }) => {
            split::run(start, end.as_deref(), *days, &mut out)?;
        }
        Some(Commands::Cache(CacheAction::Clear)) => {
            let config = load_config(cli.config.as_deref())?;
            cache::clear(&config, &mut out)?;
        }
        Some(Commands::Config) => {
            let config = load_config(cli.config.as_deref())?;
            show_config::run(&config, &mut out)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
