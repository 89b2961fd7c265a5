//! Human-readable waiting times for operator messages.

use chrono::Duration;

/// Whole minutes remaining, rounded up so a partial minute still reads as
/// one. Negative spans clamp to zero.
pub fn wait_minutes(remaining: Duration) -> i64 {
    let ms = remaining.num_milliseconds().max(0);
    (ms + 59_999) / 60_000
}

/// Largest unit first, zero units omitted: `2d 3h 15m`, `1h`, `45m`.
pub fn format_wait(remaining: Duration) -> String {
    let total = wait_minutes(remaining);
    if total == 0 {
        return "0m".to_string();
    }

    let days = total / (24 * 60);
    let hours = (total % (24 * 60)) / 60;
    let minutes = total % 60;

    let mut parts = Vec::with_capacity(3);
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.join(" ")
}
