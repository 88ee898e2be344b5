// src/validation.rs
//
// Field parsers shared by the request DTOs. Every parser is pure and
// reports the offending field name.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Largest accepted invoice amount, in cents.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError {
            field,
            message: message.into(),
        }
    }

    pub fn required(field: &'static str) -> Self {
        ValidationError::new(field, format!("{field} is required"))
    }
}

/// A JSON value counts as present unless it is null or a blank string.
pub fn is_present(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Accepts JSON integers and strings holding an integer.
pub fn parse_id(field: &'static str, value: &JsonValue) -> Result<i64, ValidationError> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ValidationError::new(field, format!("{field} must be an integer")))
}

pub fn require_id(field: &'static str, value: Option<&JsonValue>) -> Result<i64, ValidationError> {
    match value {
        Some(v) if is_present(Some(v)) => parse_id(field, v),
        _ => Err(ValidationError::required(field)),
    }
}

/// `None` when the field was not sent (or sent as null).
pub fn optional_id(field: &'static str, value: Option<&JsonValue>) -> Result<Option<i64>, ValidationError> {
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => parse_id(field, v).map(Some),
    }
}

/// ISO-8601 date-time. Offsets are honoured; naive values and plain dates
/// are taken as UTC.
pub fn parse_datetime(field: &'static str, raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(ValidationError::new(
        field,
        format!("{field} must be an ISO-8601 date-time"),
    ))
}

/// Calendar date; a full date-time is truncated to its date.
pub fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, ValidationError> {
    let s = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_datetime(field, s)
        .map(|dt| dt.date_naive())
        .map_err(|_| ValidationError::new(field, format!("{field} must be a YYYY-MM-DD date")))
}

/// Decimal amount (JSON number or numeric string) converted to cents.
pub fn parse_amount_cents(field: &'static str, value: &JsonValue) -> Result<i64, ValidationError> {
    let amount = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ValidationError::new(field, format!("{field} must be a decimal number")))?;

    if !amount.is_finite() {
        return Err(ValidationError::new(field, format!("{field} must be finite")));
    }
    if amount < 0.0 {
        return Err(ValidationError::new(field, format!("{field} must not be negative")));
    }

    let cents = (amount * 100.0).round();
    if cents > MAX_AMOUNT_CENTS as f64 {
        return Err(ValidationError::new(field, format!("{field} is too large")));
    }
    Ok(cents as i64)
}

/// Trimmed text, `None` when blank.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn required_text(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    non_blank(value).ok_or_else(|| ValidationError::required(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_accept_integers_and_numeric_strings() {
        assert_eq!(parse_id("patientId", &json!(7)), Ok(7));
        assert_eq!(parse_id("patientId", &json!(" 42 ")), Ok(42));
    }

    #[test]
    fn ids_reject_everything_else() {
        for bad in [json!("abc"), json!(1.5), json!(true), json!([1]), json!("12abc")] {
            let err = parse_id("doctorId", &bad).unwrap_err();
            assert_eq!(err.field, "doctorId");
        }
    }

    #[test]
    fn blank_and_null_ids_are_missing() {
        assert_eq!(
            require_id("patientId", Some(&json!(""))),
            Err(ValidationError::required("patientId"))
        );
        assert_eq!(
            require_id("patientId", Some(&JsonValue::Null)),
            Err(ValidationError::required("patientId"))
        );
        assert_eq!(optional_id("doctorId", None), Ok(None));
    }

    #[test]
    fn datetimes_in_several_iso_shapes() {
        let expected = DateTime::parse_from_rfc3339("2030-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(parse_datetime("date", "2030-01-01T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_datetime("date", "2030-01-01T12:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_datetime("date", "2030-01-01T10:00").unwrap(), expected);
        assert_eq!(
            parse_datetime("date", "2030-01-01").unwrap(),
            expected - chrono::Duration::hours(10)
        );
        assert!(parse_datetime("date", "01/01/2030").is_err());
        assert!(parse_datetime("date", "2030-13-01T10:00:00Z").is_err());
    }

    #[test]
    fn dob_truncates_datetimes() {
        let d = parse_date("dob", "1990-05-17T00:00:00.000Z").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(1990, 5, 17).unwrap());
        assert!(parse_date("dob", "yesterday").is_err());
    }

    #[test]
    fn amounts_become_cents() {
        assert_eq!(parse_amount_cents("amount", &json!(125.5)), Ok(12_550));
        assert_eq!(parse_amount_cents("amount", &json!("80")), Ok(8_000));
        assert_eq!(parse_amount_cents("amount", &json!(0)), Ok(0));
    }

    #[test]
    fn amounts_must_be_finite_and_non_negative() {
        assert!(parse_amount_cents("amount", &json!(-1)).is_err());
        assert!(parse_amount_cents("amount", &json!("NaN")).is_err());
        assert!(parse_amount_cents("amount", &json!("inf")).is_err());
        assert!(parse_amount_cents("amount", &json!("12,50")).is_err());
        assert!(parse_amount_cents("amount", &json!(null)).is_err());
    }

    #[test]
    fn text_helpers_trim() {
        assert_eq!(non_blank(Some("  checkup ")), Some("checkup".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert!(required_text("name", Some("")).is_err());
    }
}
