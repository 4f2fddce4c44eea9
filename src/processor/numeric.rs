use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{ParseError, ValueKind};
use crate::models::RawValue;

// Thousands separators must sit on proper 3-digit group boundaries;
// "1,23" is malformed, not 123.
static GROUPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d{1,3}(,\d{3})*(\.\d+)?$").unwrap());
static PLAIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());

// Tokens the ERP emits for absent values.
const PLACEHOLDERS: &[&str] = &["-", "--", "n/a", "na", "nan", "null", "none"];

/// Converts a raw cell to a typed decimal, or `None` for missing.
///
/// Already-numeric values pass through unchanged. Text is stripped of
/// currency markers and thousands separators; separators are cosmetic and
/// never affect magnitude ("1,000" parses to 1000). Empty text and
/// placeholder tokens map to missing, never to zero. Anything else is a
/// `ParseError`; whether that becomes missing or aborts the load is the
/// ingestion engine's call.
pub fn parse_decimal(value: &RawValue, column: &str) -> Result<Option<Decimal>, ParseError> {
    let text = match value {
        RawValue::Numeric(d) => return Ok(Some(*d)),
        RawValue::Missing => return Ok(None),
        RawValue::Text(s) => s.trim(),
    };

    if text.is_empty() || is_placeholder(text) {
        return Ok(None);
    }

    let stripped = strip_currency(text);

    let candidate = if GROUPED.is_match(&stripped) {
        stripped.replace(',', "")
    } else if PLAIN.is_match(&stripped) {
        stripped.clone()
    } else {
        return Err(ParseError::new(column, text, ValueKind::Number));
    };

    Decimal::from_str(&candidate)
        .map(Some)
        .map_err(|_| ParseError::new(column, text, ValueKind::Number))
}

/// Like [`parse_decimal`] but truncates to a whole quantity.
pub fn parse_quantity(value: &RawValue, column: &str) -> Result<Option<i64>, ParseError> {
    use rust_decimal::prelude::ToPrimitive;

    match parse_decimal(value, column)? {
        Some(d) => d
            .trunc()
            .to_i64()
            .map(Some)
            .ok_or_else(|| ParseError::new(column, value.display(), ValueKind::Number)),
        None => Ok(None),
    }
}

fn is_placeholder(text: &str) -> bool {
    let lower = text.to_lowercase();
    if PLACEHOLDERS.contains(&lower.as_str()) {
        return true;
    }
    // Overflowing percentage cells are rendered as "***.**".
    !text.is_empty() && text.chars().all(|c| c == '*' || c == '.')
}

fn strip_currency(text: &str) -> String {
    text.trim_start_matches("NT$")
        .trim_start_matches('$')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_thousands_separator_is_cosmetic() {
        let thousand = parse_decimal(&text("1,000"), "小計").unwrap().unwrap();
        let nine_nine_nine = parse_decimal(&text("999"), "小計").unwrap().unwrap();
        assert_eq!(thousand, dec!(1000));
        // "1,000" < "999" lexicographically; the parsed values must not be.
        assert!(thousand > nine_nine_nine);

        assert_eq!(
            parse_decimal(&text("1,234,567.89"), "小計").unwrap(),
            Some(dec!(1234567.89))
        );
        assert_eq!(
            parse_decimal(&text("-12,000"), "毛利").unwrap(),
            Some(dec!(-12000))
        );
    }

    #[test]
    fn test_numeric_passthrough() {
        assert_eq!(
            parse_decimal(&RawValue::Numeric(dec!(42.5)), "單價").unwrap(),
            Some(dec!(42.5))
        );
    }

    #[test]
    fn test_missing_is_not_zero() {
        assert_eq!(parse_decimal(&RawValue::Missing, "數量").unwrap(), None);
        assert_eq!(parse_decimal(&text(""), "數量").unwrap(), None);
        assert_eq!(parse_decimal(&text("   "), "數量").unwrap(), None);
        assert_eq!(parse_decimal(&text("N/A"), "數量").unwrap(), None);
        assert_eq!(parse_decimal(&text("-"), "數量").unwrap(), None);
        assert_eq!(parse_decimal(&text("***.**"), "毛利率").unwrap(), None);
    }

    #[test]
    fn test_currency_markers_stripped() {
        assert_eq!(
            parse_decimal(&text("NT$1,500"), "總計金額").unwrap(),
            Some(dec!(1500))
        );
        assert_eq!(
            parse_decimal(&text("$99.95"), "單價").unwrap(),
            Some(dec!(99.95))
        );
    }

    #[test]
    fn test_malformed_carries_raw_and_column() {
        let err = parse_decimal(&text("abc"), "單價").unwrap_err();
        assert_eq!(err.column, "單價");
        assert_eq!(err.raw, "abc");
        assert_eq!(err.expected, ValueKind::Number);

        // Bad group boundaries are malformed, not silently repaired.
        assert!(parse_decimal(&text("1,23"), "單價").is_err());
        assert!(parse_decimal(&text("12,34,56"), "單價").is_err());
    }

    #[test]
    fn test_quantity_truncates() {
        assert_eq!(parse_quantity(&text("3"), "數量").unwrap(), Some(3));
        assert_eq!(
            parse_quantity(&RawValue::Numeric(dec!(7.0)), "數量").unwrap(),
            Some(7)
        );
        assert_eq!(parse_quantity(&text("2,500"), "數量").unwrap(), Some(2500));
        assert_eq!(parse_quantity(&RawValue::Missing, "數量").unwrap(), None);
    }
}
