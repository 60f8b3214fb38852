//! Date parsing for candidate and submission fields.
//!
//! Two strictness levels:
//!
//! - [`parse_offset_datetime`]: RFC 3339 with an explicit offset. This is
//!   the only form the extractor may return.
//! - [`parse_calendar_date`]: anything a user could plausibly type into a
//!   date field. Offset-less inputs are taken as UTC.
//!
//! | Input                       | Result (UTC)               |
//! |-----------------------------|----------------------------|
//! | `2021-06-01T09:30:00+02:00` | `2021-06-01T07:30:00Z`     |
//! | `2021-06-01T09:30:00`       | `2021-06-01T09:30:00Z`     |
//! | `2021-06-01`                | `2021-06-01T00:00:00Z`     |
//! | `2021-06`                   | `2021-06-01T00:00:00Z`     |
//! | `2021`                      | `2021-01-01T00:00:00Z`     |

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse an RFC 3339 timestamp that carries an explicit offset.
pub fn parse_offset_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s.trim()).ok()
}

/// Parse a user-supplied calendar date or timestamp.
pub fn parse_calendar_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(dt) = parse_offset_datetime(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    let date = match s.len() {
        4 if s.bytes().all(|b| b.is_ascii_digit()) => {
            NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1)
        }
        7 => NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
    }?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Render a timestamp as RFC 3339 without losing sub-second precision.
pub fn format_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
