//! "Activity feed" tournament sites.
//!
//! Boat cards carry explicit `.boat-name` / `.boat-type` fields and the
//! catch feed is a timeline of entries with a `<time>` element.

use super::{Layout, selector};
use once_cell::sync::Lazy;

pub static LAYOUT: Lazy<Layout> = Lazy::new(|| Layout {
    card: selector("div.boat-card, li.boat"),
    card_name: selector(".boat-name"),
    card_type: selector(".boat-type, .boat-class"),
    card_link: selector("a[href]"),
    card_image: selector("img"),
    item: selector("div.feed-entry, li.activity-item"),
    item_time: selector("time, .timestamp"),
    item_boat: selector(".boat-name"),
    item_detail: selector(".description, .details"),
});
