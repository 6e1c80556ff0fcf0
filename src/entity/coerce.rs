// src/entity/coerce.rs
//
// Cell coercions. None of these fail: a value that cannot be read becomes
// `None` and the caller picks the default.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Parse a date or date-time cell into a UTC instant. Values without an
/// offset are taken as UTC; date-only values become midnight.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

pub fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// `true` unless the cell says `false` in any case.
pub fn parse_active_flag(raw: &str) -> bool {
    !raw.trim().eq_ignore_ascii_case("false")
}

/// Whole minutes from `start` to `end`, rounded, never negative.
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let minutes = (end - start).num_seconds() as f64 / 60.0;
    minutes.round().max(0.0) as i64
}
