//! Client for a locally running ActivityWatch server.
//!
//! Only the query endpoint is used: one canonical query per host and time
//! period, returning window events while the user was not AFK.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use qm_core::event::{HOSTNAME_KEY, SOURCE_KEY};
use qm_core::{DataSource, Event};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default request timeout for queries.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
/// Port of a normal ActivityWatch server.
pub const DEFAULT_PORT: u16 = 5600;
/// Port of a server started with `--testing`.
pub const TESTING_PORT: u16 = 5666;

/// ActivityWatch client errors.
#[derive(Debug, Error)]
pub enum AwError {
    /// The server address is not a valid URL.
    #[error("invalid server URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Server returned an error response.
    #[error("server error: {message}")]
    Api { message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// The port to use when none is configured.
pub const fn default_port(testing: bool) -> u16 {
    if testing { TESTING_PORT } else { DEFAULT_PORT }
}

/// ActivityWatch query client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client for the server on `localhost:<port>`.
    pub fn new(port: u16) -> Result<Self, AwError> {
        Self::with_base_url(&format!("http://localhost:{port}"))
    }

    /// Creates a client for the server at `base_url`.
    pub fn with_base_url(base_url: &str) -> Result<Self, AwError> {
        let base_url = Url::parse(base_url).map_err(|source| AwError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(AwError::ClientBuild)?;
        Ok(Self { http, base_url })
    }

    fn query_url(&self) -> Result<Url, AwError> {
        self.base_url
            .join("/api/0/query/")
            .map_err(|source| AwError::InvalidUrl {
                url: self.base_url.to_string(),
                source,
            })
    }

    /// Runs `query` over one time period and returns its result events.
    pub async fn query(
        &self,
        query: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, AwError> {
        let request = QueryRequest {
            timeperiods: vec![timeperiod(start, end)],
            query: query.to_vec(),
        };
        tracing::debug!(query = %query.join("\n"), %start, %end, "querying activitywatch");

        let response = self
            .http
            .post(self.query_url()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_api_error(&body).unwrap_or_else(|| AwError::Api {
                message: format!("status {status}: {body}"),
            }));
        }
        parse_query_response(&body)
    }

    /// Active window events for `hostname` in `(since, end)`, tagged with
    /// their source and hostname.
    pub async fn load_events(
        &self,
        hostname: &str,
        since: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, AwError> {
        let events = self.query(&build_query(hostname), since, end).await?;
        let received = events.len();
        let events = clean_events(events, hostname, since, end);
        tracing::debug!(hostname, received, kept = events.len(), "events retrieved");
        Ok(events)
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    timeperiods: Vec<String>,
    query: Vec<String>,
}

fn timeperiod(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "{}/{}",
        start.to_rfc3339_opts(SecondsFormat::Micros, false),
        end.to_rfc3339_opts(SecondsFormat::Micros, false)
    )
}

/// The canonical query: window events intersected with not-AFK periods.
pub fn build_query(hostname: &str) -> Vec<String> {
    vec![
        format!(r#"events = flood(query_bucket(find_bucket("aw-watcher-window_{hostname}")));"#),
        format!(r#"not_afk = flood(query_bucket(find_bucket("aw-watcher-afk_{hostname}")));"#),
        r#"not_afk = filter_keyvals(not_afk, "status", ["not-afk"]);"#.to_string(),
        "events = filter_period_intersect(events, not_afk);".to_string(),
        "RETURN = sort_by_timestamp(events);".to_string(),
    ]
}

fn parse_api_error(body: &str) -> Option<AwError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        message: String,
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| AwError::Api {
            message: payload.message,
        })
}

/// The server returns one list of events per time period.
fn parse_query_response(body: &str) -> Result<Vec<Event>, AwError> {
    let mut periods: Vec<Vec<Event>> =
        serde_json::from_str(body).map_err(|err| AwError::InvalidResponse(err.to_string()))?;
    if periods.is_empty() {
        return Err(AwError::InvalidResponse(
            "missing result for time period".to_string(),
        ));
    }
    Ok(periods.swap_remove(0))
}

/// Keeps events lying strictly inside `(since, end)` that carry data, fills
/// `app` from the URL host where missing and tags source and hostname.
pub fn clean_events(
    events: Vec<Event>,
    hostname: &str,
    since: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<Event> {
    events
        .into_iter()
        .filter(|e| since < e.timestamp && e.end() < end)
        .filter(|e| !e.data.is_empty())
        .map(|mut e| {
            if e.attr_str("app").is_none() {
                match e.attr_str("url").and_then(url_host) {
                    Some(host) => e.set_attr("app", host),
                    None => tracing::debug!(timestamp = %e.timestamp, "event without app or url"),
                }
            }
            e.set_attr(SOURCE_KEY, DataSource::ActivityWatch.as_str());
            e.set_attr(HOSTNAME_KEY, hostname);
            e
        })
        .collect()
}

fn url_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
