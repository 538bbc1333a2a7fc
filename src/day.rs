//! Calendar-day bucketing and window arithmetic
//!
//! All streak, window, and calendar logic works on day buckets in
//! "YYYY-MM-DD" form, computed in UTC from epoch-millis timestamps.
//! Time-of-day never participates in streak or window decisions.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

/// Compute the day bucket string from a Unix timestamp in milliseconds.
///
/// Returns a string in format "YYYY-MM-DD".
pub fn day_bucket(timestamp_ms: i64) -> String {
    let dt = DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now);
    format!("{:04}-{:02}-{:02}", dt.year(), dt.month(), dt.day())
}

/// Format a calendar day as its bucket string.
pub fn format_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Parse a day bucket string back to a calendar day.
pub fn parse_day(bucket: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(bucket, "%Y-%m-%d").ok()
}

/// Today's calendar day in UTC.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Current timestamp in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Day bucket for the start of a trailing window of `days` calendar days
/// ending today (inclusive). `days = 7` covers today and the six days
/// before it.
pub fn trailing_window_start(now: NaiveDate, days: i64) -> String {
    format_day(now - Duration::days(days - 1))
}

/// Number of whole calendar days from `earlier` to `later`.
/// Negative if `later` precedes `earlier`.
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

/// The Sunday on or before the given day.
pub fn sunday_on_or_before(day: NaiveDate) -> NaiveDate {
    let back = day.weekday().num_days_from_sunday() as i64;
    day - Duration::days(back)
}

/// The Saturday on or after the given day.
pub fn saturday_on_or_after(day: NaiveDate) -> NaiveDate {
    let forward = (Weekday::Sat.num_days_from_sunday() as i64
        - day.weekday().num_days_from_sunday() as i64)
        .rem_euclid(7);
    day + Duration::days(forward)
}
