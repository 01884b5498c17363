//! Date and date-time decoding for admin payloads
//!
//! The admin list endpoints format timestamps with the server locale
//! (`"2025/1/1 13:38:34"`); detail endpoints and newer server revisions send
//! ISO-8601. The locale encoding is tried first, then the ISO family, then
//! epoch milliseconds.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static LOCALE_DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})[ T]+(\d{1,2}):(\d{1,2}):(\d{1,2})$")
        .expect("locale date-time pattern")
});

static LOCALE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})$").expect("locale date pattern"));

const ISO_NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Decode a JSON date-time value in any supported encoding
pub fn decode_date_time(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(raw) => parse_date_time(raw),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.with_timezone(&Local).naive_local()),
        _ => None,
    }
}

/// Parse a date-time string, locale encoding first
pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    parse_locale(raw).or_else(|| parse_iso(raw))
}

/// Decode a calendar date (date of birth); date-times are truncated to their date
pub fn decode_date(value: &Value) -> Option<NaiveDate> {
    let raw = value.as_str()?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(caps) = LOCALE_DATE.captures(raw) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    parse_date_time(raw).map(|dt| dt.date())
}

fn parse_locale(raw: &str) -> Option<NaiveDateTime> {
    let caps = LOCALE_DATE_TIME.captures(raw)?;
    let field = |i: usize| caps[i].parse::<u32>().ok();
    let year = caps[1].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?.and_hms_opt(field(4)?, field(5)?, field(6)?)
}

fn parse_iso(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for format in ISO_NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_locale_format_without_padding() {
        let dt = parse_date_time("2025/1/1 13:38:34").unwrap();
        assert_eq!(dt, ymd_hms(2025, 1, 1, 13, 38, 34));
    }

    #[test]
    fn test_locale_format_single_digit_hour() {
        let dt = parse_date_time("2024/12/31 9:05:00").unwrap();
        assert_eq!(dt, ymd_hms(2024, 12, 31, 9, 5, 0));
    }

    #[test]
    fn test_iso_naive_and_fractional() {
        let dt = parse_date_time("2025-03-04T05:06:07.123").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(dt.format("%.3f").to_string(), ".123");

        let dt = parse_date_time("2025-03-04 05:06:07").unwrap();
        assert_eq!(dt, ymd_hms(2025, 3, 4, 5, 6, 7));
    }

    #[test]
    fn test_rfc3339_is_accepted() {
        assert!(parse_date_time("2025-03-04T05:06:07Z").is_some());
        assert!(parse_date_time("2025-03-04T05:06:07+08:00").is_some());
    }

    #[test]
    fn test_invalid_calendar_values_rejected() {
        assert!(parse_date_time("2025/13/1 10:00:00").is_none());
        assert!(parse_date_time("2025/2/30 10:00:00").is_none());
        assert!(parse_date_time("yesterday").is_none());
    }

    #[test]
    fn test_epoch_millis() {
        let dt = decode_date_time(&json!(1_735_689_600_000_i64)).unwrap();
        assert!(dt.date() >= NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert!(decode_date_time(&json!(true)).is_none());
    }

    #[test]
    fn test_decode_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2000, 2, 29).unwrap();
        assert_eq!(decode_date(&json!("2000-02-29")), Some(expected));
        assert_eq!(decode_date(&json!("2000/2/29")), Some(expected));
        assert_eq!(decode_date(&json!("2000-02-29T00:00:00")), Some(expected));
        assert_eq!(decode_date(&json!("not a date")), None);
    }
}
