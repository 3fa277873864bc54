//! Boat identity normalization.
//!
//! Every boat name seen by the engine, whether it comes from a roster card
//! or from a free-text catch feed, is reduced to a `uid` by [`normalize`].
//! The uid is the only join key between the participant and event streams,
//! and the same function also produces tournament ids and cache file names.
//!
//! # Rules
//!
//! 1. Lowercase.
//! 2. Drop possessive suffixes (`Reel Deal's` → `reel deal`).
//! 3. Strip apostrophes and quote marks.
//! 4. `&` becomes `and`.
//! 5. Any run of other non-alphanumeric characters becomes a single `_`.
//! 6. Leading and trailing `_` are trimmed.

use once_cell::sync::Lazy;
use regex::Regex;

static POSSESSIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"['’‘`]s\b").expect("possessive pattern is valid"));

const QUOTES: &[char] = &['\'', '’', '‘', '`', '"', '“', '”'];

/// Map a display name to its stable, case- and punctuation-insensitive uid.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize("Reel Deal"), "reel_deal");
/// assert_eq!(normalize("REEL-DEAL"), "reel_deal");
/// assert_eq!(normalize("Reel Deal's"), "reel_deal");
/// assert_eq!(normalize("Rock & Roll"), "rock_and_roll");
/// ```
pub fn normalize(display_name: &str) -> String {
    let lowered = display_name.to_lowercase();
    let without_possessive = POSSESSIVE.replace_all(&lowered, "");
    let unquoted: String = without_possessive
        .chars()
        .filter(|c| !QUOTES.contains(c))
        .collect();
    let expanded = unquoted.replace('&', " and ");

    let mut uid = String::with_capacity(expanded.len());
    let mut pending_sep = false;
    for c in expanded.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !uid.is_empty() {
                uid.push('_');
            }
            pending_sep = false;
            uid.push(c);
        } else {
            pending_sep = true;
        }
    }
    uid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_names() {
        assert_eq!(normalize("Reel Deal"), "reel_deal");
        assert_eq!(normalize("  Sea   Witch  "), "sea_witch");
        assert_eq!(normalize("Game-On"), "game_on");
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let a = normalize("Reel Deal");
        assert_eq!(a, normalize("REEL-DEAL"));
        assert_eq!(a, normalize("Reel Deal's"));
        assert_eq!(a, normalize("reel  deal"));
        assert_eq!(a, normalize("\"Reel Deal\""));
        assert_eq!(a, normalize("Reel Deal’s"));
    }

    #[test]
    fn test_apostrophes_inside_words() {
        assert_eq!(normalize("Knot Nautical's"), "knot_nautical");
        assert_eq!(normalize("Fishin' Mission"), "fishin_mission");
        assert_eq!(normalize("O'Reilly"), "oreilly");
    }

    #[test]
    fn test_ampersand() {
        assert_eq!(normalize("Rock & Roll"), "rock_and_roll");
        assert_eq!(normalize("R&R"), "r_and_r");
        assert_eq!(normalize("Rock and Roll"), normalize("Rock & Roll"));
    }

    #[test]
    fn test_collapses_separators() {
        assert_eq!(normalize("Big -- Rock!!! 2025"), "big_rock_2025");
        assert_eq!(normalize("...Hooked..."), "hooked");
    }

    #[test]
    fn test_empty_and_symbol_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("!!! ---"), "");
    }

    #[test]
    fn test_idempotent() {
        for name in [
            "Reel Deal",
            "REEL-DEAL",
            "Reel Deal's",
            "Rock & Roll",
            "Señorita II",
            "  __weird__ NAME  ",
            "Sea’s “Hunter”",
            "",
        ] {
            let once = normalize(name);
            assert_eq!(normalize(&once), once, "not idempotent for {name:?}");
        }
    }
}
