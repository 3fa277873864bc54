//! Client for the external settings directory.
//!
//! The directory is a JSON object mapping tournament display names to their
//! source pages:
//!
//! ```json
//! {
//!   "Big Rock": {"participants": "https://...", "events": "https://..."},
//!   "Old Event": null
//! }
//! ```
//!
//! # Architecture
//!
//! - [`SettingsSource`]: capability the scheduler consumes
//! - [`HttpSettings`]: fetches and parses the directory
//! - [`RetrySettings`]: decorator adding exponential backoff with jitter
//! - [`CachedSettings`]: decorator reusing the last directory for a short TTL,
//!   so the two scheduler loops do not each hit the network every tick

use crate::error::ScrapeError;
use crate::http::Fetch;
use crate::models::Tournament;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use rand::{Rng, rng};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// The current tournament directory.
    async fn tournaments(&self) -> Result<Vec<Tournament>, ScrapeError>;
}

/// Parse a directory document, skipping unusable entries.
///
/// Entries that are not objects, or list neither a participants nor an
/// events URL, are dropped without affecting the rest. Blank URL strings
/// count as absent. Output is sorted by display name.
pub fn parse_directory(raw: &str) -> Result<Vec<Tournament>, ScrapeError> {
    let doc: Value = serde_json::from_str(raw)?;
    let Value::Object(entries) = doc else {
        return Err(ScrapeError::Settings("top level is not an object".into()));
    };

    let mut tournaments = Vec::with_capacity(entries.len());
    for (name, entry) in entries {
        let Value::Object(fields) = entry else {
            debug!(%name, "Skipping non-object directory entry");
            continue;
        };
        let url = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        let participants = url("participants");
        let events = url("events");
        if participants.is_none() && events.is_none() {
            debug!(%name, "Skipping directory entry without URLs");
            continue;
        }
        let tournament = Tournament::new(name, participants, events);
        if tournament.normalized_id.is_empty() {
            continue;
        }
        tournaments.push(tournament);
    }
    tournaments.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tournaments)
}

/// Fetches the directory from a fixed URL.
pub struct HttpSettings {
    fetch: Arc<dyn Fetch>,
    url: String,
    timeout: Duration,
}

impl HttpSettings {
    pub fn new(fetch: Arc<dyn Fetch>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetch,
            url: url.into(),
            timeout,
        }
    }
}

impl fmt::Debug for HttpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSettings")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl SettingsSource for HttpSettings {
    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn tournaments(&self) -> Result<Vec<Tournament>, ScrapeError> {
        let body = self.fetch.text(&self.url, self.timeout).await?;
        let tournaments = parse_directory(&body).inspect_err(|e| {
            warn!(error = %e, body_preview = %truncate_for_log(&body, 200), "Settings directory did not parse");
        })?;
        info!(
            count = tournaments.len(),
            names = ?tournaments.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "Loaded settings directory"
        );
        Ok(tournaments)
    }
}

/// Retries the inner source with exponential backoff.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetrySettings<S> {
    inner: S,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<S: SettingsSource> RetrySettings<S> {
    pub fn new(inner: S, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl<S> fmt::Debug for RetrySettings<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySettings")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<S: SettingsSource> SettingsSource for RetrySettings<S> {
    async fn tournaments(&self) -> Result<Vec<Tournament>, ScrapeError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.tournaments().await {
                Ok(tournaments) => return Ok(tournaments),
                // A parseable-but-wrong document will not fix itself within a tick.
                Err(e @ (ScrapeError::Settings(_) | ScrapeError::Json(_))) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "Settings fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self
                        .base_delay
                        .saturating_mul(1 << (attempt - 1))
                        .min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(attempt, max = self.max_retries, ?delay, error = %e, "Settings fetch failed; backing off");
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Reuses the last successful directory for `ttl`.
///
/// Failures are not cached; the next call goes back to the inner source.
pub struct CachedSettings<S> {
    inner: S,
    ttl: Duration,
    cached: Mutex<Option<(Instant, Vec<Tournament>)>>,
}

impl<S: SettingsSource> CachedSettings<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<S: SettingsSource> SettingsSource for CachedSettings<S> {
    async fn tournaments(&self) -> Result<Vec<Tournament>, ScrapeError> {
        let mut cached = self.cached.lock().await;
        if let Some((at, tournaments)) = cached.as_ref() {
            if at.elapsed() < self.ttl {
                debug!(count = tournaments.len(), "Using cached settings directory");
                return Ok(tournaments.clone());
            }
        }
        let tournaments = self.inner.tournaments().await?;
        *cached = Some((Instant::now(), tournaments.clone()));
        Ok(tournaments)
    }
}
