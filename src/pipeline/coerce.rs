//! Conversions from raw provider values to canonical types.
//!
//! Numeric policy: integer targets truncate toward zero (a stray `2.5`
//! bedrooms becomes `2`), and counts, sizes and prices reject negatives.
//! Numeric strings may carry `$`, thousands separators and a `K`/`M`
//! suffix.

use super::extractor::{Field, RawValue};
use crate::error::{CoerceError, RejectReason, Rejection};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Number, Value};

/// Epoch values at or above this are milliseconds, below are seconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

// `%y` goes before `%Y` so two-digit years are not read as year 0024
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y", "%m/%d/%y", "%m/%d/%Y"];

/// Coerce a required field; absence or an invalid value rejects the record.
pub fn required<T>(
    field: Field,
    raw: Option<RawValue<'_>>,
    convert: impl FnOnce(&Value) -> Result<T, CoerceError>,
) -> Result<T, Rejection> {
    let raw = raw.ok_or(Rejection {
        field,
        reason: RejectReason::Missing,
    })?;
    convert(raw.value()).map_err(|err| Rejection {
        field,
        reason: err.into(),
    })
}

/// Coerce an optional field; absence or an invalid value becomes `None`.
pub fn optional<T>(
    raw: Option<RawValue<'_>>,
    convert: impl FnOnce(&Value) -> Result<T, CoerceError>,
) -> Option<T> {
    raw.and_then(|raw| convert(raw.value()).ok())
}

/// Non-empty trimmed text. Numbers are rendered, since ids often arrive numeric.
pub fn text(value: &Value) -> Result<String, CoerceError> {
    let rendered = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => render_number(n),
        other => return Err(CoerceError::NotText(other.to_string())),
    };
    if rendered.is_empty() {
        return Err(CoerceError::Empty);
    }
    Ok(rendered)
}

/// Five-digit zip code; numeric zips lose leading zeros upstream, so pad them back.
pub fn zip_code(value: &Value) -> Result<String, CoerceError> {
    if let Value::Number(n) = value {
        if let Ok(n) = render_number(n).parse::<u64>() {
            return Ok(format!("{:05}", n));
        }
    }
    let zip = text(value)?;
    Ok(zip.split('-').next().unwrap_or(&zip).to_string())
}

/// Integral floats render without a fraction, so `98765.0` reads as `98765`
fn render_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// Non-negative float, e.g. bathrooms
pub fn float(value: &Value) -> Result<f64, CoerceError> {
    let n = number(value)?;
    if n < 0.0 {
        return Err(CoerceError::Negative(n));
    }
    Ok(n)
}

/// Non-negative count, truncated toward zero
pub fn count(value: &Value) -> Result<u32, CoerceError> {
    let n = float(value)?.trunc();
    if n > u32::MAX as f64 {
        return Err(CoerceError::OutOfRange(n));
    }
    Ok(n as u32)
}

/// Non-negative amount (price, square footage), truncated toward zero
pub fn amount(value: &Value) -> Result<u64, CoerceError> {
    let n = float(value)?.trunc();
    if n > u64::MAX as f64 {
        return Err(CoerceError::OutOfRange(n));
    }
    Ok(n as u64)
}

/// Coordinate within `[-limit, limit]`
pub fn coordinate(value: &Value, limit: f64) -> Result<f64, CoerceError> {
    let n = number(value)?;
    if n.abs() > limit {
        return Err(CoerceError::OutOfRange(n));
    }
    Ok(n)
}

pub fn latitude(value: &Value) -> Result<f64, CoerceError> {
    coordinate(value, 90.0)
}

pub fn longitude(value: &Value) -> Result<f64, CoerceError> {
    coordinate(value, 180.0)
}

/// Sale timestamp from epoch numbers or the date strings providers emit
pub fn timestamp(value: &Value) -> Result<DateTime<Utc>, CoerceError> {
    match value {
        Value::Number(_) => epoch(number(value)?),
        Value::String(s) => parse_date(s),
        other => Err(CoerceError::NotADate(other.to_string())),
    }
}

fn epoch(n: f64) -> Result<DateTime<Utc>, CoerceError> {
    if n < 0.0 {
        return Err(CoerceError::Negative(n));
    }
    let millis = if n >= EPOCH_MILLIS_THRESHOLD { n } else { n * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .ok_or(CoerceError::OutOfRange(n))
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, CoerceError> {
    let trimmed = raw.trim();
    let text = strip_prefix_ignore_case(trimmed, "sold").trim_start_matches(':').trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(n) = text.parse::<f64>() {
        return epoch(n);
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| CoerceError::NotADate(raw.to_string()))
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> &'a str {
    match text.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => text[prefix.len()..].trim_start(),
        _ => text,
    }
}

fn number(value: &Value) -> Result<f64, CoerceError> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_text(s),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(CoerceError::NotNumeric(value.to_string())),
    }
}

fn parse_numeric_text(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '+'))
        .collect();

    let (digits, multiplier) = match cleaned.chars().last() {
        Some('K') | Some('k') => (&cleaned[..cleaned.len() - 1], 1_000.0),
        Some('M') | Some('m') => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };

    digits.parse::<f64>().ok().map(|n| n * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text() {
        assert_eq!(text(&json!("  1 Main St ")), Ok("1 Main St".to_string()));
        assert_eq!(text(&json!(123)), Ok("123".to_string()));
        assert_eq!(text(&json!("")), Err(CoerceError::Empty));
        assert!(text(&json!(true)).is_err());
    }

    #[test]
    fn test_zip_code_padding() {
        assert_eq!(zip_code(&json!(2134)), Ok("02134".to_string()));
        assert_eq!(zip_code(&json!("95112-1234")), Ok("95112".to_string()));
        assert_eq!(zip_code(&json!(2134.0)), Ok("02134".to_string()));
        assert_eq!(zip_code(&json!(98765.0)), Ok("98765".to_string()));
    }

    #[test]
    fn test_integral_floats_render_as_integers() {
        assert_eq!(text(&json!(98765.0)), Ok("98765".to_string()));
        assert_eq!(text(&json!(2.5)), Ok("2.5".to_string()));
        assert_eq!(text(&json!(-7.0)), Ok("-7".to_string()));
    }

    #[test]
    fn test_counts_truncate() {
        assert_eq!(count(&json!(2.9)), Ok(2));
        assert_eq!(count(&json!("3")), Ok(3));
        assert_eq!(count(&json!(-1)), Err(CoerceError::Negative(-1.0)));
    }

    #[test]
    fn test_amounts_from_display_text() {
        assert_eq!(amount(&json!("$500,000")), Ok(500_000));
        assert_eq!(amount(&json!("$1.25M")), Ok(1_250_000));
        assert_eq!(amount(&json!("640K")), Ok(640_000));
        assert_eq!(amount(&json!(1450.7)), Ok(1450));
        assert!(amount(&json!("call for price")).is_err());
        assert!(amount(&json!(-5)).is_err());
    }

    #[test]
    fn test_float_keeps_fraction() {
        assert_eq!(float(&json!(2.5)), Ok(2.5));
        assert!(float(&json!(-0.5)).is_err());
    }

    #[test]
    fn test_coordinates() {
        assert_eq!(latitude(&json!(-33.9)), Ok(-33.9));
        assert!(latitude(&json!(91.0)).is_err());
        assert_eq!(longitude(&json!(-121.88)), Ok(-121.88));
    }

    #[test]
    fn test_timestamp_from_epoch_millis_and_seconds() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(timestamp(&json!(1710460800000_i64)), Ok(expected));
        assert_eq!(timestamp(&json!(1710460800)), Ok(expected));
        assert!(timestamp(&json!(-1)).is_err());
    }

    #[test]
    fn test_timestamp_from_strings() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        for raw in [
            "2024-03-15",
            "2024-03-15T00:00:00Z",
            "Mar 15, 2024",
            "March 15, 2024",
            "03/15/2024",
            "Sold 03/15/24",
            "SOLD: Mar 15, 2024",
        ] {
            assert_eq!(timestamp(&json!(raw)), Ok(expected), "{}", raw);
        }
        assert!(timestamp(&json!("last spring")).is_err());
        assert!(timestamp(&json!({ "date": 1 })).is_err());
    }

    #[test]
    fn test_required_and_optional() {
        let present = json!("12");
        let raw = Some(RawValue::Scalar(&present));

        assert_eq!(required(Field::Bedrooms, raw, count), Ok(12));
        assert_eq!(
            required(Field::Price, None, amount),
            Err(Rejection {
                field: Field::Price,
                reason: RejectReason::Missing
            })
        );
        assert_eq!(optional(raw, count), Some(12));
        assert_eq!(optional(None, count), None);

        let bad = json!("n/a");
        assert_eq!(optional(Some(RawValue::Scalar(&bad)), count), None);
        assert!(matches!(
            required(Field::Price, Some(RawValue::Scalar(&bad)), amount),
            Err(Rejection {
                field: Field::Price,
                reason: RejectReason::Invalid(_)
            })
        ));
    }
}
