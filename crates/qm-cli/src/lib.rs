//! quantifiedme CLI library.
//!
//! This crate provides the CLI interface: configuration, subcommands and
//! table output.

mod cli;
pub mod commands;
mod config;
pub mod output;

pub use cli::{CacheAction, Cli, Commands, OutputArgs, ScreentimeArgs};
pub use config::{Config, EXAMPLE_CONFIG};
