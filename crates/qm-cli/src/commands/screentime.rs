//! Screen time: merge events from every requested source into one timeline,
//! classify them and aggregate hours per category per day.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use qm_aw::{AwError, Client};
use qm_core::{
    Classifier, DailyTable, DataSource, Event, RuleSet, TimelineBuilder, category_table,
    fake_events, split_into_weeks,
};
use qm_store::{Cache, ChunkKey};
use tokio::runtime::Runtime;

use super::util::{parse_datetime, skip_failed};
use crate::cli::ScreentimeArgs;
use crate::config::Config;
use crate::output;

/// Seed of the `fake` source, so repeated runs show the same data.
const FAKE_SEED: u64 = 42;

/// A resolved screen time request.
#[derive(Debug, Clone)]
pub struct Options {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub sources: Vec<DataSource>,
    pub hostnames: Vec<String>,
    pub personal: bool,
    pub testing: bool,
    pub use_cache: bool,
}

impl Options {
    /// Resolves command-line arguments against the config, up to `now`.
    pub fn from_args(args: &ScreentimeArgs, config: &Config, now: DateTime<Utc>) -> Result<Self> {
        let since = match &args.since {
            Some(since) => parse_datetime(since)?,
            None => now - Duration::days(args.days),
        };
        if since >= now {
            bail!("start of period {since} is not in the past");
        }

        let hostnames = if args.hostname.is_empty() {
            config.data.activitywatch.hostnames.clone()
        } else {
            args.hostname.clone()
        };

        let mut sources = args.sources.clone();
        sources.sort();
        sources.dedup();

        Ok(Self {
            since,
            until: now,
            sources,
            hostnames,
            personal: args.personal,
            testing: args.testing,
            use_cache: !args.no_cache,
        })
    }
}

/// Loads, merges and classifies screen time.
///
/// Sources that fail to load are logged and skipped; only a total absence of
/// events is an error.
pub fn load_events(config: &Config, options: &Options) -> Result<Vec<Event>> {
    let mut builder = TimelineBuilder::new();
    for source in &options.sources {
        let priority = source.default_priority();
        match source {
            DataSource::ActivityWatch => {
                for (hostname, events) in load_activitywatch(config, options)? {
                    builder.add_source(format!("activitywatch {hostname}"), priority, events);
                }
            }
            DataSource::Smartertime => {
                let result = qm_load::smartertime::load_devices(
                    &config.data.smartertime_buckets,
                    options.since,
                );
                if let Some(events) = skip_failed("smartertime", result) {
                    builder.add_source("smartertime", priority, events);
                }
            }
            DataSource::Toggl => {
                if let Some(events) = load_toggl(config, options.since)? {
                    builder.add_source("toggl", priority, events);
                }
            }
            DataSource::Fake => {
                builder.add_source(
                    "fake",
                    priority,
                    fake_events(options.since, options.until, FAKE_SEED),
                );
            }
        }
    }

    let timeline = builder.build().context("failed to merge screen time")?;
    for join in timeline.joins() {
        tracing::info!(
            source = %join.source_name,
            received = join.received,
            contributed = %output::format_duration(join.contributed),
            "source merged"
        );
    }

    let mut events = timeline.into_events();
    load_classifier(config, options.personal)?.classify(&mut events);
    Ok(events)
}

/// Hours per category per day for the requested screen time.
pub fn load_table(config: &Config, options: &Options) -> Result<DailyTable> {
    let events = load_events(config, options)?;
    Ok(category_table(&events, &config.day_boundary()?))
}

fn load_toggl(config: &Config, since: DateTime<Utc>) -> Result<Option<Vec<Event>>> {
    let Some(path) = config.data.toggl.as_deref() else {
        tracing::warn!("data.toggl is not configured, skipping toggl");
        return Ok(None);
    };
    let offset = config
        .me
        .utc_offset_hours
        .checked_mul(3_600)
        .and_then(FixedOffset::east_opt)
        .with_context(|| format!("invalid utc_offset_hours {}", config.me.utc_offset_hours))?;
    Ok(skip_failed("toggl", qm_load::toggl::load_csv(path, offset, since)))
}

/// Window events per host, queried one week at a time.
fn load_activitywatch(config: &Config, options: &Options) -> Result<Vec<(String, Vec<Event>)>> {
    if options.hostnames.is_empty() {
        tracing::warn!("no activitywatch hostnames configured, skipping activitywatch");
        return Ok(Vec::new());
    }

    let port = config
        .data
        .activitywatch
        .port
        .unwrap_or_else(|| qm_aw::default_port(options.testing));
    let client = Client::new(port).context("failed to create ActivityWatch client")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")?;
    let mut cache = if options.use_cache {
        open_cache(&config.cache_path)
    } else {
        None
    };

    let mut loaded = Vec::new();
    for hostname in &options.hostnames {
        tracing::info!(hostname, "getting events");
        let result = load_host(
            &client,
            &runtime,
            cache.as_mut(),
            hostname,
            options.since,
            options.until,
        );
        if let Some(events) = skip_failed(&format!("activitywatch {hostname}"), result) {
            loaded.push((hostname.clone(), events));
        }
    }
    Ok(loaded)
}

fn open_cache(path: &Path) -> Option<Cache> {
    match Cache::open(path) {
        Ok(cache) => Some(cache),
        Err(err) => {
            tracing::warn!(path = ?path, error = %err, "failed to open cache, continuing without");
            None
        }
    }
}

fn load_host(
    client: &Client,
    runtime: &Runtime,
    mut cache: Option<&mut Cache>,
    hostname: &str,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<Event>, AwError> {
    let mut events = Vec::new();
    for (start, end) in split_into_weeks(since, until) {
        let key = ChunkKey::new(DataSource::ActivityWatch.as_str(), hostname, start, end);
        if let Some(cached) = cache.as_deref().and_then(|cache| cached_chunk(cache, &key)) {
            events.extend(cached);
            continue;
        }

        let chunk = runtime.block_on(client.load_events(hostname, start, end))?;
        tracing::debug!(hostname, %start, %end, count = chunk.len(), "events retrieved");
        if let Some(cache) = cache.as_deref_mut() {
            if let Err(err) = cache.put_chunk(&key, &chunk) {
                tracing::warn!(chunk = %key, error = %err, "failed to cache chunk");
            }
        }
        events.extend(chunk);
    }
    Ok(events)
}

fn cached_chunk(cache: &Cache, key: &ChunkKey) -> Option<Vec<Event>> {
    cache.get_chunk(key).unwrap_or_else(|err| {
        tracing::warn!(chunk = %key, error = %err, "ignoring unreadable cache entry");
        None
    })
}

fn load_classifier(config: &Config, personal: bool) -> Result<Classifier> {
    let rules = if personal {
        let path = config
            .data
            .categories
            .as_deref()
            .context("--personal needs data.categories in the config")?;
        tracing::info!(path = ?path, "using personal categories");
        RuleSet::from_path(path)?
    } else {
        tracing::info!("using example categories");
        RuleSet::example()
    };
    Ok(Classifier::from_rule_set(&rules)?)
}

/// Runs the screentime command.
pub fn run(
    config: &Config,
    args: &ScreentimeArgs,
    csv: Option<&Path>,
    writer: &mut impl Write,
) -> Result<()> {
    let options = Options::from_args(args, config, Utc::now())?;
    let events = load_events(config, &options)?;

    let total = events
        .iter()
        .fold(Duration::zero(), |acc, e| acc + e.duration);
    writeln!(writer, "Total duration: {}", output::format_duration(total))?;

    let table = category_table(&events, &config.day_boundary()?);
    output::emit(&table, csv, writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use qm_core::TimelineError;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 5, d, h, 0, 0).unwrap()
    }

    fn options(sources: Vec<DataSource>) -> Options {
        Options {
            since: at(1, 0),
            until: at(8, 0),
            sources,
            hostnames: Vec::new(),
            personal: false,
            testing: true,
            use_cache: false,
        }
    }

    fn args(sources: Vec<DataSource>) -> ScreentimeArgs {
        ScreentimeArgs {
            since: None,
            days: 7,
            sources,
            hostname: Vec::new(),
            personal: false,
            testing: false,
            no_cache: false,
        }
    }

    fn config_with_toggl(dir: &Path) -> Config {
        let path = dir.join("toggl.csv");
        std::fs::write(
            &path,
            "User,Email,Client,Project,Task,Description,Billable,Start date,Start time,End date,End time,Duration,Tags,Amount ()\n\
             Erik,e@example.com,Acme,Website,,Fix header,No,2021-05-03,09:00:00,2021-05-03,10:30:00,01:30:00,,\n",
        )
        .unwrap();
        let mut config = Config::default();
        config.data.toggl = Some(path);
        config
    }

    #[test]
    fn test_options_from_args() {
        let mut config = Config::default();
        config.data.activitywatch.hostnames = vec!["erb-laptop".to_string()];
        let now = at(8, 0);

        let mut args = args(vec![DataSource::Fake, DataSource::ActivityWatch, DataSource::Fake]);
        let options = Options::from_args(&args, &config, now).unwrap();
        assert_eq!(options.since, at(1, 0));
        assert_eq!(options.until, now);
        assert_eq!(options.sources, vec![DataSource::ActivityWatch, DataSource::Fake]);
        assert_eq!(options.hostnames, vec!["erb-laptop"]);
        assert!(options.use_cache);

        args.hostname = vec!["other".to_string()];
        args.no_cache = true;
        let options = Options::from_args(&args, &config, now).unwrap();
        assert_eq!(options.hostnames, vec!["other"]);
        assert!(!options.use_cache);
    }

    #[test]
    fn test_options_reject_future_start() {
        let mut args = args(vec![DataSource::Fake]);
        args.since = Some("2999-01-01".to_string());
        assert!(Options::from_args(&args, &Config::default(), at(8, 0)).is_err());
    }

    #[test]
    fn test_fake_events_are_classified() {
        let events = load_events(&Config::default(), &options(vec![DataSource::Fake])).unwrap();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.source() == Some("fake")));
        assert!(events.iter().all(|e| e.category().is_some()));
    }

    #[test]
    fn test_toggl_wins_over_fake() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_toggl(dir.path());

        // Fake is listed first but has the lower precedence.
        let events =
            load_events(&config, &options(vec![DataSource::Fake, DataSource::Toggl])).unwrap();

        let toggl: Vec<&Event> = events.iter().filter(|e| e.source() == Some("toggl")).collect();
        assert_eq!(toggl.len(), 1);
        assert_eq!(toggl[0].timestamp, at(3, 9));
        assert_eq!(toggl[0].duration, Duration::minutes(90));
        assert!(events.iter().any(|e| e.source() == Some("fake")));
    }

    #[test]
    fn test_missing_sources_are_skipped_until_nothing_is_left() {
        let err = load_events(
            &Config::default(),
            &options(vec![DataSource::ActivityWatch, DataSource::Toggl]),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TimelineError>(),
            Some(TimelineError::NoEvents)
        ));
    }

    #[test]
    fn test_personal_categories() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_toggl(dir.path());
        let rules = dir.path().join("categories.toml");
        std::fs::write(
            &rules,
            "[[categories]]\nname = \"Web\"\nparent = \"Work\"\npattern = \"Website\"\n",
        )
        .unwrap();
        config.data.categories = Some(rules);
        let mut options = options(vec![DataSource::Toggl]);
        options.personal = true;

        let table = load_table(&config, &options).unwrap();

        assert_eq!(table.columns(), ["Web", "Work"]);
        let day = at(3, 0).date_naive();
        assert!((table.get(day, "Web").unwrap() - 1.5).abs() < 1e-9);
        assert!((table.get(day, "Work").unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_personal_without_categories_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_toggl(dir.path());
        let mut options = options(vec![DataSource::Toggl]);
        options.personal = true;
        assert!(load_events(&config, &options).is_err());
    }
}
