//! Error types for the scraping pipeline and configuration loading.
//!
//! Pipeline errors never escape a single tournament: the scheduler turns each
//! [`ScrapeError`] into a logged, per-tournament outcome and moves on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Transport failure or timeout.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The settings directory was reachable but not a usable document.
    #[error("invalid settings directory: {0}")]
    Settings(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
