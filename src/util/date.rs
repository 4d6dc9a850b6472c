//! Timestamp helpers
//!
//! Library feeds, loan records and our own database do not agree on a date
//! format. `parse_timestamp` accepts all of them and normalizes to UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Parse a timestamp in any of the formats we receive
///
/// Accepted, in order:
/// - RFC 3339 (`2025-03-01T10:00:00Z`, `2025-03-01T10:00:00.123+02:00`)
/// - RFC 2822 (`Sat, 01 Mar 2025 10:00:00 GMT`), as sent in HTTP headers
/// - SQLite `CURRENT_TIMESTAMP` (`2025-03-01 10:00:00`), taken as UTC
/// - Bare dates (`2025-03-01`), taken as UTC midnight
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }

    None
}

/// Format as RFC 3339 with second precision and a `Z` suffix
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Whole days until a loan is due, rounding partial days up
///
/// Negative once the due date has passed.
pub fn days_until(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (due - now).num_seconds();
    let day = 86_400;
    if seconds >= 0 {
        (seconds + day - 1) / day
    } else {
        -((-seconds) / day)
    }
}
