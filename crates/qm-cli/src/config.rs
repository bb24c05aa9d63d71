//! Configuration loading and management.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use qm_core::{DayBoundary, Place};
use serde::{Deserialize, Serialize};

/// Used when the user has no config file of their own.
pub const EXAMPLE_CONFIG: &str = include_str!("../config.example.toml");

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the query cache database.
    pub cache_path: PathBuf,
    pub me: MeConfig,
    pub data: DataConfig,
    /// Named places for `locate`, by name.
    pub locations: BTreeMap<String, Place>,
}

/// Settings about the user themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeConfig {
    /// Name of the user's own location history.
    pub name: String,
    /// Hours after midnight at which a new day starts.
    pub date_offset_hours: i64,
    pub utc_offset_hours: i32,
}

impl Default for MeConfig {
    fn default() -> Self {
        Self {
            name: "me".to_string(),
            date_offset_hours: 0,
            utc_offset_hours: 0,
        }
    }
}

/// Where each data source lives. Unset sources are skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Personal category rules, used with `--personal`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub habitbull: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qslang: Option<PathBuf>,
    /// Oura export with sleep periods; `oura_sleep` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oura: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oura_heartrate: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oura_sleep: Option<PathBuf>,
    /// Directory of an unpacked Whoop export.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whoop: Option<PathBuf>,
    /// Directory of an unpacked Fitbit export.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitbit: Option<PathBuf>,
    /// Directory of location histories, one `<name>.json` per person.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggl: Option<PathBuf>,
    pub activitywatch: ActivityWatchConfig,
    /// Smartertime exports by device hostname.
    pub smartertime_buckets: BTreeMap<String, PathBuf>,
}

impl DataConfig {
    /// The Oura sleep export, falling back to the plain `oura` key.
    pub fn oura_sleep_path(&self) -> Option<&Path> {
        self.oura_sleep.as_deref().or(self.oura.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityWatchConfig {
    /// Server port; defaults to 5600, or 5666 with `--testing`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub hostnames: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let cache_dir = dirs_cache_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            cache_path: cache_dir.join("cache.db"),
            me: MeConfig::default(),
            data: DataConfig::default(),
            locations: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Layers, later wins: defaults, the user config file, `config_path`,
    /// then `QM_*` environment variables (`__` separates nested keys). Without
    /// a user config file or `config_path`, the bundled example is used.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let user_file = dirs_config_path()
            .map(|dir| dir.join("config.toml"))
            .filter(|path| path.exists());
        Self::figment(user_file.as_deref(), config_path).extract().map(Self::expand_paths)
    }

    fn figment(user_file: Option<&Path>, config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match (user_file, config_path) {
            (Some(path), _) => {
                tracing::info!(path = ?path, "loading config");
                figment = figment.merge(Toml::file(path));
            }
            (None, None) => {
                tracing::warn!("no config found, falling back to example config");
                figment = figment.merge(Toml::string(EXAMPLE_CONFIG));
            }
            (None, Some(_)) => {}
        }

        if let Some(path) = config_path {
            tracing::info!(path = ?path, "loading config");
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("QM_").split("__"))
    }

    /// Resolves a leading `~` in every configured path.
    fn expand_paths(mut self) -> Self {
        self.cache_path = expand_home(&self.cache_path);
        let data = &mut self.data;
        for path in [
            &mut data.categories,
            &mut data.habitbull,
            &mut data.qslang,
            &mut data.oura,
            &mut data.oura_heartrate,
            &mut data.oura_sleep,
            &mut data.whoop,
            &mut data.fitbit,
            &mut data.location,
            &mut data.toggl,
        ]
        .into_iter()
        .flatten()
        {
            *path = expand_home(path);
        }
        for path in data.smartertime_buckets.values_mut() {
            *path = expand_home(path);
        }
        self
    }

    /// Day boundary from `me.utc_offset_hours` and `me.date_offset_hours`.
    pub fn day_boundary(&self) -> anyhow::Result<DayBoundary> {
        DayBoundary::from_hours(self.me.utc_offset_hours, self.me.date_offset_hours).ok_or_else(
            || {
                anyhow::anyhow!(
                    "invalid day boundary: utc_offset_hours = {}, date_offset_hours = {}",
                    self.me.utc_offset_hours,
                    self.me.date_offset_hours
                )
            },
        )
    }
}

/// Replaces a leading `~` component with the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Returns the platform-specific config directory for quantifiedme.
///
/// On Linux: `~/.config/quantifiedme`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("quantifiedme"))
}

/// Returns the platform-specific cache directory for quantifiedme.
///
/// On Linux: `~/.cache/quantifiedme`
pub fn dirs_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join("quantifiedme"))
}
