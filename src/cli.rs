//! Command-line interface definitions.
//!
//! Every option can also be supplied through its environment variable, which
//! is how the container deployment configures the service.

use clap::Parser;
use std::time::Duration;

/// Command-line arguments for the tournament scraper service.
///
/// # Examples
///
/// ```sh
/// # Defaults: container paths, public settings directory, port 8080
/// tourney_scrape
///
/// # Local run with a variant map and faster event refresh
/// tourney_scrape -d ./data -i ./images -c scraper.yaml --events-every-secs 15
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// URL of the tournament settings directory (JSON)
    #[arg(long, env = "SETTINGS_URL", default_value = "https://js9467.github.io/Brtourney/settings.json")]
    pub settings_url: String,

    /// Directory holding cached snapshots and metadata
    #[arg(short, long, env = "DATA_DIR", default_value = "/app/persist/data")]
    pub data_dir: String,

    /// Directory holding downloaded boat photos
    #[arg(short, long, env = "IMAGE_DIR", default_value = "/app/persist/images/boats")]
    pub image_dir: String,

    /// Public URL path under which boat photos are served
    #[arg(long, env = "IMAGE_BASE", default_value = "/static/images/boats", value_parser = parse_image_base)]
    pub image_base: String,

    /// Address the read API listens on
    #[arg(short, long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Optional path to a YAML file mapping tournaments to extractor variants
    #[arg(short, long, env = "SCRAPER_CONFIG")]
    pub config: Option<String>,

    /// Seconds between participant refresh ticks
    #[arg(long, default_value_t = 600)]
    pub participants_every_secs: u64,

    /// Seconds between event refresh ticks
    #[arg(long, default_value_t = 30)]
    pub events_every_secs: u64,

    /// Age in seconds after which a roster snapshot is re-scraped
    #[arg(long, default_value_t = 6 * 60 * 60)]
    pub participants_ttl_secs: i64,

    /// Age in seconds after which an event snapshot is re-scraped
    #[arg(long, default_value_t = 90)]
    pub events_ttl_secs: i64,

    /// Timeout for one tournament page fetch
    #[arg(long, default_value_t = 15)]
    pub page_timeout_secs: u64,

    /// Timeout for one boat photo download
    #[arg(long, default_value_t = 10)]
    pub image_timeout_secs: u64,

    /// Timeout for the settings directory fetch
    #[arg(long, default_value_t = 10)]
    pub settings_timeout_secs: u64,

    /// Seconds a fetched settings directory is reused
    #[arg(long, default_value_t = 20)]
    pub settings_cache_secs: u64,

    /// Concurrent photo downloads per roster batch
    #[arg(long, default_value_t = 6)]
    pub image_workers: usize,

    /// Tournaments refreshed concurrently within one tick
    #[arg(long, default_value_t = 4)]
    pub tournament_concurrency: usize,
}

/// Normalize `--image-base` to `/segment[/segment..]`.
///
/// The root and `/data` are rejected: photos are mounted beside the API and
/// the raw snapshot route, never over them.
fn parse_image_base(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err("image base must be a path below /, e.g. /static/images/boats".into());
    }
    let base = format!("/{trimmed}");
    if base == "/data" || base.starts_with("/data/") || base == "/api" || base.starts_with("/api/") {
        return Err(format!("image base {base} collides with a built-in route"));
    }
    Ok(base)
}

impl Cli {
    pub fn participants_every(&self) -> Duration {
        Duration::from_secs(self.participants_every_secs.max(1))
    }

    pub fn events_every(&self) -> Duration {
        Duration::from_secs(self.events_every_secs.max(1))
    }
}
