//! Event classification, de-duplication and roster cross-reference.
//!
//! Runs after extraction and before persistence:
//!
//! 1. [`classify`] maps a feed description to an [`EventType`] (done inside
//!    [`Event::new`]).
//! 2. [`resolve_boat_names`] rewrites boat names to the roster spelling.
//! 3. [`dedup_and_sort`] keeps the first occurrence of each dedup key and
//!    orders the batch by timestamp.
//!
//! De-duplication only ever looks at one scrape batch. Each batch replaces
//! the previous snapshot wholesale.

use crate::models::{Event, EventType, Participant};
use itertools::Itertools;
use std::collections::HashMap;
use tracing::debug;

/// Ordered keyword rules; the first matching substring wins.
const RULES: &[(&str, EventType)] = &[
    ("released", EventType::Released),
    ("boated", EventType::Boated),
    ("headed to scales", EventType::Boated),
    ("headed to the scales", EventType::Boated),
    ("pulled hook", EventType::PulledHook),
    ("wrong species", EventType::WrongSpecies),
];

/// Classify a free-text feed description.
///
/// Case-insensitive and whitespace-tolerant. Descriptions such as
/// "boated, later released" hit several rules, so the order of [`RULES`]
/// decides.
pub fn classify(detail_text: &str) -> EventType {
    let text = detail_text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    RULES
        .iter()
        .find(|(needle, _)| text.contains(needle))
        .map(|(_, event_type)| *event_type)
        .unwrap_or(EventType::Other)
}

/// Collapse repeated observations of the same catch within one batch.
///
/// Keeps the first event per `dedup_key` in page order, then sorts ascending
/// by timestamp. The sort is stable so same-minute events keep page order.
pub fn dedup_and_sort(events: Vec<Event>) -> Vec<Event> {
    let before = events.len();
    let mut unique: Vec<Event> = events
        .into_iter()
        .unique_by(|e| e.dedup_key.clone())
        .collect();
    unique.sort_by_key(|e| e.timestamp);
    if unique.len() != before {
        debug!(before, after = unique.len(), "Dropped duplicate events");
    }
    unique
}

/// Rewrite each event's boat name to the roster's canonical display name.
///
/// Events whose uid has no roster entry keep the feed spelling.
pub fn resolve_boat_names(events: &mut [Event], roster: &[Participant]) {
    if roster.is_empty() {
        return;
    }
    let by_uid: HashMap<&str, &str> = roster
        .iter()
        .map(|p| (p.uid.as_str(), p.display_name.as_str()))
        .collect();
    for event in events.iter_mut() {
        if let Some(name) = by_uid.get(event.uid.as_str()) {
            event.boat_display_name = (*name).to_string();
        }
    }
}
