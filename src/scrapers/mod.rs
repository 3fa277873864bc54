//! HTML extraction for tournament roster and catch-feed pages.
//!
//! Tournament sites come from a handful of known site families. Each family
//! is an extractor [`Variant`] that only supplies CSS selectors (a
//! [`Layout`]); the extraction rules themselves are shared:
//!
//! | Variant | Module | Site family |
//! |---------|--------|-------------|
//! | `post_grid` | [`post_grid`] | Bootstrap column cards and `article` activity posts |
//! | `activity_feed` | [`activity_feed`] | Boat cards and a list-style activity timeline |
//!
//! Anything an item is missing makes that one item unextractable; it is
//! skipped and the rest of the page continues. A page from an unrecognized
//! layout simply yields zero records.

pub mod activity_feed;
pub mod post_grid;
pub mod timestamp;

use crate::identity::normalize;
use crate::models::Event;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};
use url::Url;

/// Words that mark a roster card as a person rather than a boat.
const NON_BOAT_WORDS: &[&str] = &[
    "angler", "anglers", "junior", "juniors", "mate", "mates", "lady", "ladies",
];

/// Closed set of known site layouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    PostGrid,
    ActivityFeed,
}

impl Variant {
    fn layout(self) -> &'static Layout {
        match self {
            Variant::PostGrid => &post_grid::LAYOUT,
            Variant::ActivityFeed => &activity_feed::LAYOUT,
        }
    }

    /// Extract both record streams from one page.
    pub fn extract(self, html: &str, base: &Url, scrape_date: NaiveDate) -> Extracted {
        let document = Html::parse_document(html);
        let layout = self.layout();
        Extracted {
            participants: layout.participants(&document, base),
            events: layout.events(&document, scrape_date),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::PostGrid => "post_grid",
            Variant::ActivityFeed => "activity_feed",
        })
    }
}

/// A roster card before its photo has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawParticipant {
    pub uid: String,
    pub display_name: String,
    pub boat_type: String,
    /// Absolute photo URL, resolved against the page URL.
    pub image_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct Extracted {
    pub participants: Vec<RawParticipant>,
    pub events: Vec<Event>,
}

/// Structural selectors for one site family.
pub struct Layout {
    pub card: Selector,
    pub card_name: Selector,
    pub card_type: Selector,
    pub card_link: Selector,
    pub card_image: Selector,
    pub item: Selector,
    pub item_time: Selector,
    pub item_boat: Selector,
    pub item_detail: Selector,
}

/// Parse a selector list that is a compile-time constant.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e:?}"))
}

impl Layout {
    fn participants(&self, document: &Html, base: &Url) -> Vec<RawParticipant> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut skipped = 0usize;

        for card in document.select(&self.card) {
            let Some(raw) = self.participant(card, base) else {
                skipped += 1;
                continue;
            };
            if !seen.insert(raw.uid.clone()) {
                debug!(uid = %raw.uid, "Duplicate roster card");
                continue;
            }
            out.push(raw);
        }

        info!(count = out.len(), skipped, "Extracted participants");
        out
    }

    fn participant(&self, card: ElementRef<'_>, base: &Url) -> Option<RawParticipant> {
        let links_to_angler = card
            .select(&self.card_link)
            .filter_map(|a| a.value().attr("href"))
            .any(|href| href.contains("/anglers/"));
        if links_to_angler {
            return None;
        }

        let display_name = first_text(card, &self.card_name)?;
        let boat_type = first_text(card, &self.card_type).unwrap_or_default();
        if !looks_like_boat(&display_name) || mentions_non_boat(&boat_type) {
            return None;
        }
        let uid = normalize(&display_name);
        if uid.is_empty() {
            return None;
        }

        let image_url = card
            .select(&self.card_image)
            .find_map(|img| img.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .and_then(|src| base.join(src).ok())
            .map(|u| u.to_string());

        Some(RawParticipant {
            uid,
            display_name,
            boat_type,
            image_url,
        })
    }

    fn events(&self, document: &Html, scrape_date: NaiveDate) -> Vec<Event> {
        let mut out = Vec::new();
        let mut skipped = 0usize;

        for item in document.select(&self.item) {
            match self.event(item, scrape_date) {
                Some(event) => out.push(event),
                None => skipped += 1,
            }
        }

        info!(count = out.len(), skipped, "Extracted events");
        out
    }

    fn event(&self, item: ElementRef<'_>, scrape_date: NaiveDate) -> Option<Event> {
        let raw_time = first_text(item, &self.item_time)?;
        let boat = first_text(item, &self.item_boat)?;
        let detail = first_text(item, &self.item_detail)?;

        let Some(timestamp) = timestamp::parse_on(&raw_time, scrape_date) else {
            debug!(%raw_time, %boat, "Unparseable event time");
            return None;
        };
        if normalize(&boat).is_empty() {
            return None;
        }
        Some(Event::new(&boat, &detail, timestamp))
    }
}

/// Whitespace-collapsed text of the first match, if non-empty.
fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    let el = scope.select(sel).next()?;
    let text = el.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// False for co-angler lists and cards naming people instead of boats.
fn looks_like_boat(name: &str) -> bool {
    !name.contains(',') && !mentions_non_boat(name)
}

fn mentions_non_boat(text: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| NON_BOAT_WORDS.contains(&word))
}
