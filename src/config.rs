//! Optional YAML configuration selecting an extractor variant per tournament.
//!
//! ```yaml
//! default_variant: post_grid
//! tournaments:
//!   "Big Rock":
//!     variant: activity_feed
//! ```
//!
//! Tournament keys go through the same normalizer as the settings
//! directory, so `"Big Rock"`, `"big-rock"` and `big_rock` all match.

use crate::error::ConfigError;
use crate::identity::normalize;
use crate::scrapers::Variant;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ScraperConfig {
    #[serde(default)]
    pub default_variant: Variant,
    #[serde(default)]
    pub tournaments: HashMap<String, TournamentOverride>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct TournamentOverride {
    pub variant: Option<Variant>,
}

impl ScraperConfig {
    /// Load from `path`, or defaults when no path was given.
    pub async fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        info!(
            %path,
            default_variant = %config.default_variant,
            overrides = config.tournaments.len(),
            "Loaded scraper config"
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        let mut config: Self = serde_yaml::from_str(raw)?;
        config.tournaments = config
            .tournaments
            .into_iter()
            .map(|(key, value)| (normalize(&key), value))
            .collect();
        Ok(config)
    }

    pub fn variant_for(&self, tournament_id: &str) -> Variant {
        self.tournaments
            .get(tournament_id)
            .and_then(|o| o.variant)
            .unwrap_or(self.default_variant)
    }
}
