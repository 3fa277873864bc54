//! Data models shared by the scraping pipeline, the cache store and the read API.
//!
//! - [`Tournament`]: one entry from the external settings directory
//! - [`Participant`]: a boat on a tournament roster
//! - [`Event`]: one scored catch event from a tournament feed
//! - [`Kind`]: which of the two snapshots a cache file holds
//! - [`CacheMeta`]: freshness metadata written beside each snapshot
//!
//! Field names on the serialized records are the JSON shape served by the
//! read API, so renames here are wire-format changes.

use crate::events::classify;
use crate::identity::normalize;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp layout used in persisted events and dedup keys.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A tournament as published by the settings directory.
///
/// Read-only to the engine. Tournaments may appear, disappear or change URLs
/// between polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tournament {
    /// Display name as keyed in the settings directory.
    pub name: String,
    /// [`normalize`]d name; used for cache file names and API paths.
    pub normalized_id: String,
    pub participants_url: Option<String>,
    pub events_url: Option<String>,
}

impl Tournament {
    pub fn new(
        name: impl Into<String>,
        participants_url: Option<String>,
        events_url: Option<String>,
    ) -> Self {
        let name = name.into();
        Self {
            normalized_id: normalize(&name),
            name,
            participants_url,
            events_url,
        }
    }

    /// The source URL for the given snapshot kind, if the directory lists one.
    pub fn url_for(&self, kind: Kind) -> Option<&str> {
        match kind {
            Kind::Participants => self.participants_url.as_deref(),
            Kind::Events => self.events_url.as_deref(),
        }
    }
}

/// A boat entered in a tournament.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Participant {
    /// Join key to [`Event::uid`].
    pub uid: String,
    pub display_name: String,
    /// Boat class/make as listed on the roster card; may be empty.
    #[serde(rename = "type")]
    pub boat_type: String,
    /// Public path of the boat photo, or the default asset.
    pub image_path: String,
}

/// Closed set of event categories recognized in feed descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum EventType {
    Released,
    Boated,
    #[serde(rename = "Pulled Hook")]
    PulledHook,
    #[serde(rename = "Wrong Species")]
    WrongSpecies,
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Released => "Released",
            EventType::Boated => "Boated",
            EventType::PulledHook => "Pulled Hook",
            EventType::WrongSpecies => "Wrong Species",
            EventType::Other => "Other",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored catch event observed in a tournament feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Event {
    pub uid: String,
    /// Boat name as shown to clients. Rewritten to the roster spelling when the
    /// uid matches a cached participant.
    pub boat_display_name: String,
    pub event_type: EventType,
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub detail_text: String,
    /// `{uid}_{event_type}_{timestamp}`; equal keys are the same catch.
    pub dedup_key: String,
}

impl Event {
    /// Build an event from the three fragments scraped from one feed item.
    ///
    /// The uid, event type and dedup key are all derived here so that every
    /// extractor variant produces keys with the same rules.
    pub fn new(boat_display_name: &str, detail_text: &str, timestamp: NaiveDateTime) -> Self {
        let uid = normalize(boat_display_name);
        let event_type = classify(detail_text);
        let dedup_key = format!(
            "{}_{}_{}",
            uid,
            event_type,
            timestamp.format(TIMESTAMP_FORMAT)
        );
        Self {
            uid,
            boat_display_name: boat_display_name.to_string(),
            event_type,
            timestamp,
            detail_text: detail_text.to_string(),
            dedup_key,
        }
    }
}

mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .or_else(|_| raw.parse::<NaiveDateTime>())
            .map_err(serde::de::Error::custom)
    }
}

/// The two independently refreshed snapshots kept per tournament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Participants,
    Events,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Participants => "participants",
            Kind::Events => "events",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshness metadata for one (tournament, kind) snapshot.
///
/// Only written after the snapshot itself has been persisted, so a failing
/// upstream never looks fresh.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheMeta {
    pub tournament_id: String,
    pub kind: Kind,
    pub last_scraped: DateTime<Utc>,
    /// Number of records in the snapshot.
    pub count: usize,
}
