use std::sync::LazyLock;

use chrono::{Days, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{ParseError, ValueKind};
use crate::models::RawValue;

// ROC (Republic of China calendar) dates arrive dotted: "112.01.15" is
// 2023-01-15. The dots are the structural marker; magnitude alone never
// triggers the +1911 shift.
static DOTTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,4})\.(\d{1,2})\.(\d{1,2})$").unwrap());
static COMPACT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{8}$").unwrap());

// Excel serial day range: 1 = 1900-01-01, 2958465 = 9999-12-31.
const SERIAL_MIN: i64 = 1;
const SERIAL_MAX: i64 = 2_958_465;

/// Converts a raw cell to a canonical calendar date, or `None` for missing.
///
/// Numeric cells are read as Excel serial days (workbooks hand dates over
/// as serials). Text is tried against patterns from most to least
/// specific: ROC dotted, dotted Gregorian, ISO dash (with optional time),
/// slash, day-first and month-first slash forms, compact YYYYMMDD.
/// Malformed non-empty values are a `ParseError`; the caller recovers the
/// row with a missing date rather than failing it.
pub fn normalize_date(value: &RawValue, column: &str) -> Result<Option<NaiveDate>, ParseError> {
    let text = match value {
        RawValue::Missing => return Ok(None),
        RawValue::Numeric(d) => {
            let serial = d.trunc().to_i64().unwrap_or(0);
            return from_excel_serial(serial)
                .map(Some)
                .ok_or_else(|| ParseError::new(column, d.to_string(), ValueKind::Date));
        }
        RawValue::Text(s) => s.trim(),
    };

    if text.is_empty() {
        return Ok(None);
    }

    if let Some(date) = parse_text_date(text) {
        return Ok(Some(date));
    }

    Err(ParseError::new(column, text, ValueKind::Date))
}

fn parse_text_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = DOTTED.captures(text) {
        let lead: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        // A leading component below 1911 is an ROC year; at or above it,
        // the string is a dotted Gregorian date.
        let year = if lead < 1911 { lead + 1911 } else { lead };
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if text.contains('-') {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
            return Some(dt.date());
        }
        if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(d);
        }
    }

    if text.contains('/') {
        for fmt in ["%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y"] {
            if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
                return Some(d);
            }
        }
    }

    if COMPACT.is_match(text) {
        if let Ok(d) = NaiveDate::parse_from_str(text, "%Y%m%d") {
            return Some(d);
        }
    }

    None
}

fn from_excel_serial(serial: i64) -> Option<NaiveDate> {
    if !(SERIAL_MIN..=SERIAL_MAX).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_roc_dotted_shifts_by_1911() {
        assert_eq!(
            normalize_date(&text("112.01.15"), "銷貨日期").unwrap(),
            Some(ymd(2023, 1, 15))
        );
        assert_eq!(
            normalize_date(&text("99.12.31"), "銷貨日期").unwrap(),
            Some(ymd(2010, 12, 31))
        );
    }

    #[test]
    fn test_dotted_gregorian_not_shifted() {
        assert_eq!(
            normalize_date(&text("2024.01.05"), "銷貨日期").unwrap(),
            Some(ymd(2024, 1, 5))
        );
    }

    #[test]
    fn test_iso_and_slash_formats() {
        assert_eq!(
            normalize_date(&text("2024-01-05"), "銷貨日期").unwrap(),
            Some(ymd(2024, 1, 5))
        );
        assert_eq!(
            normalize_date(&text("2024-01-05 00:00:00"), "銷貨日期").unwrap(),
            Some(ymd(2024, 1, 5))
        );
        assert_eq!(
            normalize_date(&text("2024/01/05"), "銷貨日期").unwrap(),
            Some(ymd(2024, 1, 5))
        );
        assert_eq!(
            normalize_date(&text("20240105"), "銷貨日期").unwrap(),
            Some(ymd(2024, 1, 5))
        );
    }

    #[test]
    fn test_day_first_fallback() {
        assert_eq!(
            normalize_date(&text("31/01/2024"), "銷貨日期").unwrap(),
            Some(ymd(2024, 1, 31))
        );
    }

    #[test]
    fn test_excel_serial() {
        // 45292 is 2024-01-01
        assert_eq!(
            normalize_date(&RawValue::Numeric(dec!(45292)), "銷貨日期").unwrap(),
            Some(ymd(2024, 1, 1))
        );
        // fractional serials carry a time-of-day component
        assert_eq!(
            normalize_date(&RawValue::Numeric(dec!(45292.75)), "銷貨日期").unwrap(),
            Some(ymd(2024, 1, 1))
        );
        assert!(normalize_date(&RawValue::Numeric(dec!(-5)), "銷貨日期").is_err());
    }

    #[test]
    fn test_missing_never_raises() {
        assert_eq!(normalize_date(&RawValue::Missing, "銷貨日期").unwrap(), None);
        assert_eq!(normalize_date(&text("  "), "銷貨日期").unwrap(), None);
    }

    #[test]
    fn test_malformed_is_parse_error() {
        let err = normalize_date(&text("not a date"), "銷貨日期").unwrap_err();
        assert_eq!(err.column, "銷貨日期");
        assert_eq!(err.expected, ValueKind::Date);
    }
}
