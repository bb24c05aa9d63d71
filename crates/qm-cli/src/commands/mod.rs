//! CLI subcommand implementations.

pub mod all_df;
pub mod cache;
pub mod doses;
pub mod habits;
pub mod heartrate;
pub mod locate;
pub mod screentime;
pub mod show_config;
pub mod sleep;
pub mod split;
pub mod util;
