//! Permissive parsing of feed timestamps.
//!
//! Feed items carry a time of day ("2:35 PM", "@ 14:35", "Jun 14 2:35pm",
//! "2025-06-14T14:35:00") but never a trustworthy full date, so the parsed
//! date is always replaced with the scrape date. A fragment that only names
//! a date ("June 14", "14 June 2025") lands on midnight.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

static TIME_OF_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|\D)(\d{1,2}):(\d{2})(?::(\d{2}))?\s*([ap])\.?\s*m\b\.?|(?:^|\D)(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\D|$)",
    )
    .expect("time pattern is valid")
});

static BARE_HOUR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*([ap])\.?\s*m\b").expect("hour pattern is valid"));

/// Named group matching an English month name or abbreviation.
fn month_group(name: &str) -> String {
    format!(
        r"(?P<{name}>jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?"
    )
}

/// A date somewhere inside the fragment: ISO, US slashes, "June 14[, 2025]"
/// or "14 June [2025]", with or without a weekday around it.
static DATE_FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"(?i)(?P<iso>\d{{4}}-\d{{1,2}}-\d{{1,2}})|(?P<slash>\d{{1,2}}/\d{{1,2}}/\d{{2,4}})|\b{m1}\s+(?P<day1>\d{{1,2}})(?:st|nd|rd|th)?\b|\b(?P<day2>\d{{1,2}})(?:st|nd|rd|th)?\s+{m2}\b",
        m1 = month_group("month1"),
        m2 = month_group("month2"),
    );
    Regex::new(&pattern).expect("date pattern is valid")
});

/// Complete date-times, tried against the whole fragment first.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

/// Parse a raw timestamp fragment and pin it to `scrape_date`.
///
/// Returns `None` when no time of day or date can be recognized; the caller
/// skips the event.
pub fn parse_on(raw: &str, scrape_date: NaiveDate) -> Option<NaiveDateTime> {
    let cleaned = raw.replace('@', " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Some(time) = full_datetime(cleaned) {
        return Some(scrape_date.and_time(time));
    }
    if let Some(time) = time_of_day(cleaned) {
        return Some(scrape_date.and_time(time));
    }
    if contains_date(cleaned) {
        return Some(scrape_date.and_time(NaiveTime::MIN));
    }
    None
}

fn full_datetime(text: &str) -> Option<NaiveTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local().time());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.time())
}

fn time_of_day(text: &str) -> Option<NaiveTime> {
    if let Some(caps) = TIME_OF_DAY.captures(text) {
        if let Some(h) = caps.get(1) {
            let hour: u32 = h.as_str().parse().ok()?;
            let minute: u32 = caps[2].parse().ok()?;
            let second: u32 = caps.get(3).map_or(Some(0), |s| s.as_str().parse().ok())?;
            let pm = caps[4].eq_ignore_ascii_case("p");
            return NaiveTime::from_hms_opt(to_24h(hour, pm)?, minute, second);
        }
        let hour: u32 = caps[5].parse().ok()?;
        let minute: u32 = caps[6].parse().ok()?;
        let second: u32 = caps.get(7).map_or(Some(0), |s| s.as_str().parse().ok())?;
        return NaiveTime::from_hms_opt(hour, minute, second);
    }
    let caps = BARE_HOUR.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let pm = caps[2].eq_ignore_ascii_case("p");
    NaiveTime::from_hms_opt(to_24h(hour, pm)?, 0, 0)
}

fn contains_date(text: &str) -> bool {
    DATE_FRAGMENT.captures_iter(text).any(|caps| {
        if let Some(iso) = caps.name("iso") {
            return NaiveDate::parse_from_str(iso.as_str(), "%Y-%m-%d").is_ok();
        }
        if let Some(slash) = caps.name("slash") {
            return ["%m/%d/%Y", "%m/%d/%y"]
                .iter()
                .any(|fmt| NaiveDate::parse_from_str(slash.as_str(), fmt).is_ok());
        }
        let (month, day) = match (caps.name("month1"), caps.name("day1")) {
            (Some(m), Some(d)) => (m, d),
            _ => match (caps.name("month2"), caps.name("day2")) {
                (Some(m), Some(d)) => (m, d),
                _ => return false,
            },
        };
        let (Some(month), Ok(day)) = (month_number(month.as_str()), day.as_str().parse::<u32>()) else {
            return false;
        };
        // 2000 is a leap year, so Feb 29 is accepted.
        NaiveDate::from_ymd_opt(2000, month, day).is_some()
    })
}

fn month_number(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_ascii_lowercase();
    let index = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|m| *m == prefix)?;
    Some(index as u32 + 1)
}

fn to_24h(hour: u32, pm: bool) -> Option<u32> {
    match (hour, pm) {
        (1..=11, false) => Some(hour),
        (12, false) => Some(0),
        (1..=11, true) => Some(hour + 12),
        (12, true) => Some(12),
        _ => None,
    }
}
