//! # Tourney Scrape
//!
//! Keeps live fishing tournament standings available while the tournament
//! websites themselves come and go. Roster pages and catch feeds are scraped
//! from a handful of known site layouts, normalized into participants and
//! catch events, and cached on disk; a small read API serves the latest
//! snapshot.
//!
//! ## Usage
//!
//! ```sh
//! tourney_scrape -d ./data -i ./images --bind 127.0.0.1:8080
//! ```
//!
//! ## Architecture
//!
//! 1. **Directory**: the settings directory lists tournaments and their pages
//! 2. **Participants loop**: rosters on a long cadence, photos downloaded with
//!    a small worker pool
//! 3. **Events loop**: catch feeds on a short cadence, classified,
//!    cross-referenced to the roster and de-duplicated
//! 4. **Read API**: serves whatever the loops last persisted

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod events;
mod http;
mod identity;
mod images;
mod models;
mod scheduler;
mod scrapers;
mod server;
mod settings;
mod store;
mod utils;

use cli::Cli;
use config::ScraperConfig;
use http::{Fetch, HttpFetch};
use images::ImageFetcher;
use models::Kind;
use scheduler::{Cadence, Scheduler};
use server::{AppState, create_router};
use settings::{CachedSettings, HttpSettings, RetrySettings};
use store::CacheStore;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "tourney_scrape starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // The only fatal failures: no place to persist, no usable config, no socket.
    for dir in [&args.data_dir, &args.image_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Directory is not writable (fix perms or choose a different path)");
            return Err(e);
        }
    }
    let config = ScraperConfig::load(args.config.as_deref()).await?;

    let fetch: Arc<dyn Fetch> = Arc::new(HttpFetch::new()?);
    let settings = CachedSettings::new(
        RetrySettings::new(
            HttpSettings::new(
                fetch.clone(),
                args.settings_url.clone(),
                Duration::from_secs(args.settings_timeout_secs),
            ),
            2,
            Duration::from_millis(500),
        ),
        Duration::from_secs(args.settings_cache_secs),
    );
    let store = CacheStore::new(&args.data_dir);
    let images = ImageFetcher::new(
        fetch.clone(),
        &args.image_dir,
        &args.image_base,
        Duration::from_secs(args.image_timeout_secs),
        args.image_workers,
    );
    let cadence = Cadence {
        participants_ttl: chrono::Duration::seconds(args.participants_ttl_secs),
        events_ttl: chrono::Duration::seconds(args.events_ttl_secs),
        page_timeout: Duration::from_secs(args.page_timeout_secs),
        concurrency: args.tournament_concurrency,
    };
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(settings),
        fetch,
        store.clone(),
        images,
        config,
        cadence,
    ));

    // ---- Background refresh loops ----
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let participants_loop = tokio::spawn(scheduler.clone().run(
        Kind::Participants,
        args.participants_every(),
        shutdown_rx.clone(),
    ));
    let events_loop = tokio::spawn(scheduler.clone().run(
        Kind::Events,
        args.events_every(),
        shutdown_rx,
    ));

    // ---- Read API ----
    let app = create_router(
        AppState { store, scheduler },
        args.image_dir.clone().into(),
        &args.image_base,
    );
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!(addr = %args.bind, "Read API listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Could not listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await;
    if let Err(e) = served {
        error!(error = %e, "Read API stopped unexpectedly");
    }

    let _ = shutdown_tx.send(true);
    for (name, handle) in [("participants", participants_loop), ("events", events_loop)] {
        if let Err(e) = handle.await {
            warn!(loop_name = name, error = %e, "Refresh loop ended abnormally");
        }
    }
    info!("Shutdown complete");
    Ok(())
}
