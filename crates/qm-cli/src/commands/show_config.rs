//! Prints the effective configuration.

use std::io::Write;

use anyhow::{Context, Result};

use crate::config::Config;

pub fn run(config: &Config, writer: &mut impl Write) -> Result<()> {
    let toml = toml::to_string_pretty(config).context("failed to serialize configuration")?;
    write!(writer, "{toml}")?;
    Ok(())
}
