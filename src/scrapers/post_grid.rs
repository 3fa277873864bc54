//! Bootstrap "post grid" tournament sites.
//!
//! Rosters are a grid of `col-*-3` cards with the boat name in `.post-title`
//! and the boat make in the first `.post-meta` list item. Activity pages are
//! a column of `article` posts:
//!
//! ```text
//! <article class="m-b-20">
//!   <p class="pull-right">@ 2:35 PM</p>
//!   <h4 class="montserrat">Reel Deal</h4>
//!   <p><strong>Blue marlin released</strong></p>
//! </article>
//! ```

use super::{Layout, selector};
use once_cell::sync::Lazy;

pub static LAYOUT: Lazy<Layout> = Lazy::new(|| Layout {
    card: selector("div.col-sm-3, div.col-md-3, div.col-lg-3"),
    card_name: selector(".post-title"),
    card_type: selector(".post-meta li"),
    card_link: selector("a[href]"),
    card_image: selector("img"),
    item: selector("article.m-b-20, article.entry, div.activity, li.event, div.feed-item"),
    item_time: selector("p.pull-right"),
    item_boat: selector("h4.montserrat"),
    item_detail: selector("p > strong"),
});
