//! The two refresh loops that keep the cache filled.
//!
//! Each loop repeats the same tick at its own cadence:
//!
//! 1. Ask the [`SettingsSource`] for the current tournament directory
//!    (failure = empty directory for this tick).
//! 2. For each tournament with a URL for this [`Kind`] whose snapshot is not
//!    fresh, fetch the page, extract, finalize and persist.
//! 3. Wait for the next tick or for shutdown.
//!
//! A failure for one tournament is logged and recorded in the
//! [`TickReport`]; it never stops the tick or the loop. The loops share
//! nothing except the [`CacheStore`].

use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::events::{dedup_and_sort, resolve_boat_names};
use crate::http::Fetch;
use crate::images::ImageFetcher;
use crate::models::{Event, Kind, Participant, Tournament};
use crate::settings::SettingsSource;
use crate::store::CacheStore;
use chrono::{DateTime, Local, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, instrument, warn};
use url::Url;

/// Timing knobs for the scheduler.
#[derive(Debug, Clone)]
pub struct Cadence {
    pub participants_ttl: chrono::Duration,
    pub events_ttl: chrono::Duration,
    pub page_timeout: Duration,
    /// Tournaments processed at once within one tick.
    pub concurrency: usize,
}

impl Cadence {
    fn ttl(&self, kind: Kind) -> chrono::Duration {
        match kind {
            Kind::Participants => self.participants_ttl,
            Kind::Events => self.events_ttl,
        }
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            participants_ttl: chrono::Duration::hours(6),
            events_ttl: chrono::Duration::seconds(90),
            page_timeout: Duration::from_secs(15),
            concurrency: 4,
        }
    }
}

/// What happened to one tournament during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum TickOutcome {
    /// A new snapshot with this many records was persisted.
    Saved(usize),
    /// The cached snapshot is still within its TTL.
    Fresh,
    /// The page parsed to zero records; an empty snapshot replaced the old one.
    Empty,
    /// The directory lists no URL for this kind.
    Skipped(String),
    /// Fetch, parse or persist failed; the previous snapshot was kept.
    Failed(String),
}

/// Per-tournament outcomes of one tick, keyed by display name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub kind: Option<Kind>,
    pub results: BTreeMap<String, TickOutcome>,
}

impl TickReport {
    pub fn saved(&self) -> usize {
        self.results
            .values()
            .filter(|o| matches!(o, TickOutcome::Saved(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .values()
            .filter(|o| matches!(o, TickOutcome::Failed(_)))
            .count()
    }
}

pub struct Scheduler {
    settings: Arc<dyn SettingsSource>,
    fetch: Arc<dyn Fetch>,
    store: CacheStore,
    images: ImageFetcher,
    config: ScraperConfig,
    cadence: Cadence,
}

impl Scheduler {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        fetch: Arc<dyn Fetch>,
        store: CacheStore,
        images: ImageFetcher,
        config: ScraperConfig,
        cadence: Cadence,
    ) -> Self {
        Self {
            settings,
            fetch,
            store,
            images,
            config,
            cadence,
        }
    }

    /// Run one `kind` tick every `every` until `shutdown` flips to `true`.
    ///
    /// The first tick runs immediately. Ticks never overlap: a slow tick
    /// delays the next one rather than stacking.
    pub async fn run(self: Arc<Self>, kind: Kind, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(%kind, every_secs = every.as_secs(), "Refresh loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let t0 = Instant::now();
                    let report = self.tick(kind).await;
                    info!(
                        %kind,
                        tournaments = report.results.len(),
                        saved = report.saved(),
                        failed = report.failed(),
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        "Tick complete"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(%kind, "Refresh loop stopped");
    }

    /// One freshness-gated tick at the current time.
    pub async fn tick(&self, kind: Kind) -> TickReport {
        self.tick_at(kind, Utc::now(), false).await
    }

    /// One tick that scrapes every tournament regardless of freshness.
    pub async fn force_tick(&self, kind: Kind) -> TickReport {
        self.tick_at(kind, Utc::now(), true).await
    }

    /// One tick as of `now`. Never fails; every problem ends up in the report.
    #[instrument(level = "info", skip(self))]
    pub async fn tick_at(&self, kind: Kind, now: DateTime<Utc>, force: bool) -> TickReport {
        let tournaments = match self.settings.tournaments().await {
            Ok(tournaments) => tournaments,
            Err(e) => {
                error!(%kind, error = %e, "Settings directory unavailable; nothing to refresh this tick");
                Vec::new()
            }
        };

        let results: Vec<(String, TickOutcome)> = stream::iter(tournaments)
            .map(|t| async move {
                let outcome = self.refresh(&t, kind, now, force).await;
                (t.name, outcome)
            })
            .buffer_unordered(self.cadence.concurrency.max(1))
            .collect()
            .await;

        TickReport {
            kind: Some(kind),
            results: results.into_iter().collect(),
        }
    }

    async fn refresh(&self, t: &Tournament, kind: Kind, now: DateTime<Utc>, force: bool) -> TickOutcome {
        let Some(url) = t.url_for(kind) else {
            return TickOutcome::Skipped(format!("no {kind} URL"));
        };
        if !force
            && self
                .store
                .is_fresh_at(&t.normalized_id, kind, self.cadence.ttl(kind), now)
                .await
        {
            return TickOutcome::Fresh;
        }

        let result = match kind {
            Kind::Participants => self.scrape_participants(t, url, now).await,
            Kind::Events => self.scrape_events(t, url, now).await,
        };
        match result {
            Ok(0) => {
                warn!(tournament = %t.name, %kind, %url, "Page yielded no records; persisted an empty snapshot");
                TickOutcome::Empty
            }
            Ok(count) => TickOutcome::Saved(count),
            Err(e) => {
                warn!(tournament = %t.name, %kind, %url, error = %e, "Refresh failed; keeping previous snapshot");
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    /// Fetch a roster page, resolve photos and persist the batch.
    #[instrument(level = "info", skip_all, fields(tournament = %t.normalized_id, %url))]
    async fn scrape_participants(&self, t: &Tournament, url: &str, now: DateTime<Utc>) -> Result<usize, ScrapeError> {
        let html = self.fetch.text(url, self.cadence.page_timeout).await?;
        let base = Url::parse(url)?;
        let variant = self.config.variant_for(&t.normalized_id);

        let raws = variant.extract(&html, &base, now.with_timezone(&Local).date_naive()).participants;
        let participants = self.images.fetch_all(raws).await;
        self.store
            .write(&t.normalized_id, Kind::Participants, &participants, now)
            .await?;
        Ok(participants.len())
    }

    /// Fetch a feed page, cross-reference the cached roster, de-duplicate,
    /// sort and persist the batch.
    #[instrument(level = "info", skip_all, fields(tournament = %t.normalized_id, %url))]
    async fn scrape_events(&self, t: &Tournament, url: &str, now: DateTime<Utc>) -> Result<usize, ScrapeError> {
        let html = self.fetch.text(url, self.cadence.page_timeout).await?;
        let base = Url::parse(url)?;
        let variant = self.config.variant_for(&t.normalized_id);
        let scrape_date = now.with_timezone(&Local).date_naive();

        let mut events = variant.extract(&html, &base, scrape_date).events;
        let roster: Vec<Participant> = self
            .store
            .read(&t.normalized_id, Kind::Participants)
            .await;
        resolve_boat_names(&mut events, &roster);
        let events: Vec<Event> = dedup_and_sort(events);

        self.store
            .write(&t.normalized_id, Kind::Events, &events, now)
            .await?;
        Ok(events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{GaugedFetch, StubFetch};
    use crate::models::EventType;
    use async_trait::async_trait;
    use tempfile::{TempDir, tempdir};

    struct StaticSettings(Result<Vec<Tournament>, ()>);

    #[async_trait]
    impl SettingsSource for StaticSettings {
        async fn tournaments(&self) -> Result<Vec<Tournament>, ScrapeError> {
            self.0
                .clone()
                .map_err(|_| ScrapeError::Settings("down".into()))
        }
    }

    const ROSTER: &str = r#"
<div class="col-md-3"><img src="/img/reel.jpg"><h3 class="post-title">Reel Deal III</h3><ul class="post-meta"><li>Viking</li></ul></div>
<div class="col-md-3"><h3 class="post-title">Sea Witch</h3></div>
"#;

    const FEED: &str = r#"
<article class="m-b-20"><p class="pull-right">@ 2:35 PM</p><h4 class="montserrat">Sea Witch</h4><p><strong>Boated a blue</strong></p></article>
<article class="m-b-20"><p class="pull-right">@ 1:10 PM</p><h4 class="montserrat">reel deal iii</h4><p><strong>Sailfish released</strong></p></article>
<article class="m-b-20"><p class="pull-right">@ 1:10 PM</p><h4 class="montserrat">Reel Deal III</h4><p><strong>Sailfish released (dup)</strong></p></article>
"#;

    fn tournament(name: &str, host: &str) -> Tournament {
        Tournament::new(
            name,
            Some(format!("https://{host}/participants")),
            Some(format!("https://{host}/events")),
        )
    }

    fn build(
        dir: &TempDir,
        stub: Arc<StubFetch>,
        tournaments: Result<Vec<Tournament>, ()>,
    ) -> (Scheduler, CacheStore) {
        let store = CacheStore::new(dir.path().join("data"));
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        let images = ImageFetcher::new(
            stub.clone(),
            dir.path().join("images"),
            "/static/images/boats",
            Duration::from_secs(1),
            4,
        );
        let scheduler = Scheduler::new(
            Arc::new(StaticSettings(tournaments)),
            stub,
            store.clone(),
            images,
            ScraperConfig::default(),
            Cadence::default(),
        );
        (scheduler, store)
    }

    #[tokio::test]
    async fn test_participants_then_events_end_to_end() {
        let dir = tempdir().unwrap();
        let stub = Arc::new(
            StubFetch::new()
                .page("https://a/participants", ROSTER)
                .page("https://a/events", FEED)
                .page("https://a/img/reel.jpg", b"jpg".to_vec()),
        );
        let (scheduler, store) = build(&dir, stub, Ok(vec![tournament("Big Rock", "a")]));
        let now = Utc::now();

        let report = scheduler.tick_at(Kind::Participants, now, false).await;
        assert_eq!(report.results["Big Rock"], TickOutcome::Saved(2));
        let roster: Vec<Participant> = store.read("big_rock", Kind::Participants).await;
        assert_eq!(roster[0].image_path, "/static/images/boats/reel_deal_iii.jpg");
        assert_eq!(roster[1].image_path, "/static/images/boats/default.jpg");

        let report = scheduler.tick_at(Kind::Events, now, false).await;
        assert_eq!(report.results["Big Rock"], TickOutcome::Saved(2));
        let events: Vec<Event> = store.read("big_rock", Kind::Events).await;
        assert_eq!(events.len(), 2);
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(events[0].boat_display_name, "Reel Deal III");
        assert_eq!(events[0].event_type, EventType::Released);
        assert_eq!(events[0].detail_text, "Sailfish released");
        assert_eq!(events[1].uid, "sea_witch");
    }

    #[tokio::test]
    async fn test_fresh_snapshots_are_not_rescraped() {
        let dir = tempdir().unwrap();
        let stub = Arc::new(StubFetch::new().page("https://a/events", FEED));
        let (scheduler, store) = build(&dir, stub.clone(), Ok(vec![tournament("Big Rock", "a")]));
        let now = Utc::now();
        store
            .write::<Event>("big_rock", Kind::Events, &[], now - chrono::Duration::seconds(30))
            .await
            .unwrap();

        let report = scheduler.tick_at(Kind::Events, now, false).await;
        assert_eq!(report.results["Big Rock"], TickOutcome::Fresh);
        assert_eq!(stub.hits("https://a/events"), 0);

        let report = scheduler.tick_at(Kind::Events, now, true).await;
        assert_eq!(report.results["Big Rock"], TickOutcome::Saved(2));
        assert_eq!(stub.hits("https://a/events"), 1);
    }

    #[tokio::test]
    async fn test_one_failing_tournament_does_not_affect_another() {
        let dir = tempdir().unwrap();
        let stub = Arc::new(
            StubFetch::new()
                .failing("https://a/participants", 504)
                .page("https://b/participants", ROSTER),
        );
        let (scheduler, store) = build(
            &dir,
            stub,
            Ok(vec![tournament("Alpha", "a"), tournament("Bravo", "b")]),
        );

        let earlier = Utc::now() - chrono::Duration::days(1);
        let previous = vec![Participant {
            uid: "old_boat".into(),
            display_name: "Old Boat".into(),
            boat_type: String::new(),
            image_path: "/static/images/boats/default.jpg".into(),
        }];
        store
            .write("alpha", Kind::Participants, &previous, earlier)
            .await
            .unwrap();

        let report = scheduler.tick_at(Kind::Participants, Utc::now(), false).await;
        assert!(matches!(report.results["Alpha"], TickOutcome::Failed(_)));
        assert_eq!(report.results["Bravo"], TickOutcome::Saved(2));

        let alpha: Vec<Participant> = store.read("alpha", Kind::Participants).await;
        assert_eq!(alpha, previous);
        assert_eq!(
            store.meta("alpha", Kind::Participants).await.unwrap().last_scraped,
            earlier
        );
        let bravo: Vec<Participant> = store.read("bravo", Kind::Participants).await;
        assert_eq!(bravo.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_page_replaces_previous_snapshot() {
        let dir = tempdir().unwrap();
        let stub = Arc::new(StubFetch::new().page("https://a/events", FEED));
        let (scheduler, store) = build(&dir, stub.clone(), Ok(vec![tournament("Big Rock", "a")]));

        let yesterday = Utc::now() - chrono::Duration::hours(20);
        let report = scheduler.tick_at(Kind::Events, yesterday, true).await;
        assert_eq!(report.results["Big Rock"], TickOutcome::Saved(2));

        stub.set("https://a/events", "<div class='feed'></div>");
        let now = Utc::now();
        let report = scheduler.tick_at(Kind::Events, now, false).await;
        assert_eq!(report.results["Big Rock"], TickOutcome::Empty);

        let events: Vec<Event> = store.read("big_rock", Kind::Events).await;
        assert!(events.is_empty());
        let meta = store.meta("big_rock", Kind::Events).await.unwrap();
        assert_eq!(meta.last_scraped, now);
        assert_eq!(meta.count, 0);

        let report = scheduler.tick_at(Kind::Events, now, false).await;
        assert_eq!(report.results["Big Rock"], TickOutcome::Fresh);
    }

    #[tokio::test]
    async fn test_tournaments_in_flight_never_exceed_concurrency() {
        let dir = tempdir().unwrap();
        let mut stub = StubFetch::new();
        let mut tournaments = Vec::new();
        for i in 0..6 {
            let host = format!("t{i}");
            stub = stub.page(&format!("https://{host}/events"), FEED);
            tournaments.push(tournament(&format!("Tournament {i}"), &host));
        }
        let gauge = Arc::new(GaugedFetch::new(stub, Duration::from_millis(50)));
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        let store = CacheStore::new(dir.path().join("data"));
        let images = ImageFetcher::new(
            gauge.clone(),
            dir.path().join("images"),
            "/static/images/boats",
            Duration::from_secs(1),
            4,
        );
        let scheduler = Scheduler::new(
            Arc::new(StaticSettings(Ok(tournaments))),
            gauge.clone(),
            store,
            images,
            ScraperConfig::default(),
            Cadence {
                concurrency: 2,
                ..Cadence::default()
            },
        );

        let report = scheduler.tick_at(Kind::Events, Utc::now(), false).await;
        assert_eq!(report.saved(), 6);
        assert!(gauge.peak() <= 2, "peak {}", gauge.peak());
        assert!(gauge.peak() >= 1);
    }

    #[tokio::test]
    async fn test_missing_url_and_directory_failure() {
        let dir = tempdir().unwrap();
        let stub = Arc::new(StubFetch::new());
        let only_events = Tournament::new("Late Entry", None, Some("https://c/events".into()));
        let (scheduler, _) = build(&dir, stub.clone(), Ok(vec![only_events]));
        let report = scheduler.tick_at(Kind::Participants, Utc::now(), false).await;
        assert!(matches!(report.results["Late Entry"], TickOutcome::Skipped(_)));

        let (down, _) = build(&dir, stub, Err(()));
        let report = down.tick_at(Kind::Events, Utc::now(), false).await;
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let stub = Arc::new(StubFetch::new());
        let (scheduler, _) = build(&dir, stub, Ok(vec![]));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(Arc::new(scheduler).run(Kind::Events, Duration::from_millis(10), rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
