//! Periodicity and duration parsing for dose counting.
//!
//! Orders are free text ("every 4 hours", "TID", "3 days"). Only the common
//! ward phrasings are understood; anything else yields `None` so the
//! prescription simply has no dose count.

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;

const MINUTES_PER_DAY: i64 = 24 * 60;

static EVERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:every|q)\s*(\d+)?\s*(minutes?|mins?|hours?|hrs?|h|days?|d)$").unwrap()
});

static TIMES_DAILY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(?:x|times)\s*(?:daily|a day|per day|/day)$").unwrap()
});

static SPAN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(minutes?|mins?|hours?|hrs?|h|days?|d|weeks?|wk)$").unwrap()
});

/// How often a dose is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Single dose ("once", "stat").
    Once,
    /// As needed; not countable.
    AsNeeded,
    /// Regular interval in minutes.
    Interval(i64),
}

fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn unit_minutes(unit: &str) -> Option<i64> {
    match unit.trim_end_matches('s') {
        "minute" | "min" => Some(1),
        "hour" | "hr" | "h" => Some(60),
        "day" | "d" => Some(MINUTES_PER_DAY),
        "week" | "wk" => Some(7 * MINUTES_PER_DAY),
        _ => None,
    }
}

/// Parse a periodicity descriptor.
pub fn parse_frequency(periodicity: &str) -> Option<Frequency> {
    let text = normalize(periodicity);
    match text.as_str() {
        "once" | "stat" | "one time" | "single dose" => return Some(Frequency::Once),
        "prn" | "as needed" | "when needed" => return Some(Frequency::AsNeeded),
        "daily" | "once daily" | "qd" | "every day" => return Some(Frequency::Interval(MINUTES_PER_DAY)),
        "bid" | "twice daily" => return Some(Frequency::Interval(MINUTES_PER_DAY / 2)),
        "tid" => return Some(Frequency::Interval(MINUTES_PER_DAY / 3)),
        "qid" => return Some(Frequency::Interval(MINUTES_PER_DAY / 4)),
        _ => {}
    }
    if text.ends_with("prn") || text.contains("as needed") {
        return Some(Frequency::AsNeeded);
    }

    if let Some(caps) = EVERY_PATTERN.captures(&text) {
        let n: i64 = caps.get(1).map_or(Some(1), |m| m.as_str().parse().ok())?;
        let unit = unit_minutes(caps.get(2)?.as_str())?;
        let every = n.checked_mul(unit)?;
        return (n > 0).then_some(Frequency::Interval(every));
    }

    if let Some(caps) = TIMES_DAILY_PATTERN.captures(&text) {
        let n: i64 = caps.get(1)?.as_str().parse().ok()?;
        return (n > 0).then_some(Frequency::Interval(MINUTES_PER_DAY / n));
    }

    None
}

/// Parse a duration such as "24 hours" or "7 days". Spans too large to
/// represent yield `None`.
pub fn parse_span(duration: &str) -> Option<Duration> {
    let text = normalize(duration);
    let caps = SPAN_PATTERN.captures(&text)?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = unit_minutes(caps.get(2)?.as_str())?;
    if n <= 0 {
        return None;
    }
    Duration::try_minutes(n.checked_mul(unit)?)
}

/// Doses an order implies over its duration. `None` for as-needed or
/// unparseable orders.
pub fn total_doses(periodicity: &str, duration: &str) -> Option<u32> {
    match parse_frequency(periodicity)? {
        Frequency::Once => Some(1),
        Frequency::AsNeeded => None,
        Frequency::Interval(every) if every > 0 => {
            let span = parse_span(duration)?.num_minutes();
            let doses = span.checked_add(every - 1)? / every;
            u32::try_from(doses.max(1)).ok()
        }
        Frequency::Interval(_) => None,
    }
}

pub fn doses_remaining(total: Option<u32>, administered: u32) -> Option<u32> {
    total.map(|t| t.saturating_sub(administered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_dose_phrasings() {
        assert_eq!(parse_frequency("once"), Some(Frequency::Once));
        assert_eq!(parse_frequency("STAT"), Some(Frequency::Once));
        assert_eq!(total_doses("once", "24 hours"), Some(1));
        assert_eq!(total_doses("stat", "whenever"), Some(1));
    }

    #[test]
    fn interval_orders() {
        assert_eq!(total_doses("every 4 hours", "24 hours"), Some(6));
        assert_eq!(total_doses("q6h", "2 days"), Some(8));
        assert_eq!(total_doses("every 30 minutes", "2 hours"), Some(4));
        assert_eq!(total_doses("every 2 days", "1 week"), Some(4));
        assert_eq!(total_doses("every hour", "3 hours"), Some(3));
    }

    #[test]
    fn daily_orders() {
        assert_eq!(total_doses("daily", "7 days"), Some(7));
        assert_eq!(total_doses("BID", "5 days"), Some(10));
        assert_eq!(total_doses("TID", "1 day"), Some(3));
        assert_eq!(total_doses("qid", "2 days"), Some(8));
        assert_eq!(total_doses("3 times daily", "2 days"), Some(6));
        assert_eq!(total_doses("2x per day", "3 days"), Some(6));
    }

    #[test]
    fn as_needed_is_uncounted() {
        assert_eq!(total_doses("PRN", "3 days"), None);
        assert_eq!(total_doses("every 4 hours PRN", "3 days"), None);
        assert_eq!(total_doses("as needed for pain", "3 days"), None);
    }

    #[test]
    fn unparseable_is_uncounted() {
        assert_eq!(total_doses("with meals", "3 days"), None);
        assert_eq!(total_doses("every 4 hours", "until discharge"), None);
        assert_eq!(total_doses("every 0 hours", "1 day"), None);
    }

    #[test]
    fn partial_interval_rounds_up() {
        assert_eq!(total_doses("every 8 hours", "20 hours"), Some(3));
    }

    #[test]
    fn span_parsing() {
        assert_eq!(parse_span("24 hours"), Some(Duration::hours(24)));
        assert_eq!(parse_span(" 3  Days "), Some(Duration::days(3)));
        assert_eq!(parse_span("1 week"), Some(Duration::days(7)));
        assert_eq!(parse_span("0 hours"), None);
    }

    #[test]
    fn oversized_spans_are_unparseable() {
        assert_eq!(parse_span("999999999999 days"), None);
        assert_eq!(parse_span("9999999999999999 weeks"), None);
        assert_eq!(total_doses("every 4 hours", "9999999999999999 weeks"), None);
        assert_eq!(parse_frequency("every 9999999999999999 days"), None);
    }

    #[test]
    fn remaining_saturates() {
        assert_eq!(doses_remaining(Some(4), 1), Some(3));
        assert_eq!(doses_remaining(Some(1), 3), Some(0));
        assert_eq!(doses_remaining(None, 3), None);
    }
}
