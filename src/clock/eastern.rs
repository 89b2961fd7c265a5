//! US Eastern civil time.
//!
//! Daylight saving starts at 02:00 local on the second Sunday of March and
//! ends at 02:00 local on the first Sunday of November. All arithmetic is
//! done in UTC; this module only converts for display.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
    Weekday,
};

const STANDARD_OFFSET_SECS: i32 = 5 * 3600;
const DAYLIGHT_OFFSET_SECS: i32 = 4 * 3600;

fn west(secs: i32) -> FixedOffset {
    FixedOffset::west_opt(secs).unwrap_or_else(|| Utc.fix())
}

/// Transition instants (UTC) for the given calendar year: `(dst_start, dst_end)`.
pub fn dst_transitions(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let two_am = NaiveTime::from_hms_opt(2, 0, 0)?;
    let start_day = NaiveDate::from_weekday_of_month_opt(year, 3, Weekday::Sun, 2)?;
    let end_day = NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Sun, 1)?;

    // 02:00 EST on the start day, 02:00 EDT on the end day.
    let start = start_day.and_time(two_am) + Duration::seconds(i64::from(STANDARD_OFFSET_SECS));
    let end = end_day.and_time(two_am) + Duration::seconds(i64::from(DAYLIGHT_OFFSET_SECS));
    Some((Utc.from_utc_datetime(&start), Utc.from_utc_datetime(&end)))
}

/// Whether daylight saving is in effect at the given instant.
pub fn is_dst(at: DateTime<Utc>) -> bool {
    match dst_transitions(at.year()) {
        Some((start, end)) => at >= start && at < end,
        None => false,
    }
}

/// UTC offset in effect at the given instant.
pub fn offset_at(at: DateTime<Utc>) -> FixedOffset {
    if is_dst(at) {
        west(DAYLIGHT_OFFSET_SECS)
    } else {
        west(STANDARD_OFFSET_SECS)
    }
}

pub fn abbreviation(at: DateTime<Utc>) -> &'static str {
    if is_dst(at) {
        "EDT"
    } else {
        "EST"
    }
}

/// Convert an instant to Eastern civil time.
pub fn to_eastern(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.with_timezone(&offset_at(at))
}

/// Operator-facing rendering, e.g. `2026-03-09 11:00 AM EDT`.
pub fn format_eastern(at: DateTime<Utc>) -> String {
    format!(
        "{} {}",
        to_eastern(at).format("%Y-%m-%d %I:%M %p"),
        abbreviation(at)
    )
}
