//! Value conversion
//!
//! Coerces raw record values (most often strings read from a CSV row or a
//! JSON payload) into the typed representation a field declares.

use chrono::format::ParseErrorKind;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{Result, SchemaError};
use crate::schema::FieldType;
use crate::value::Value;

/// Convert `raw` into a value of `field_type`.
///
/// `format` is a chrono strftime pattern and is only consulted when a string
/// has to be parsed into a date or datetime. Values already of the target
/// type are returned unchanged. Nulls stay null for every type, STRING
/// included: an absent value has no string form.
pub fn convert_value(field_type: FieldType, raw: Value, format: Option<&str>) -> Result<Value> {
    if raw.is_null() || field_type.matches(&raw) {
        return Ok(raw);
    }

    match (field_type, raw) {
        (FieldType::String, raw) => Ok(Value::String(raw.to_string())),

        (FieldType::Int, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| SchemaError::conversion(field_type, &s, e.to_string())),
        (FieldType::Int, Value::Float(f)) => {
            if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(Value::Int(f.trunc() as i64))
            } else {
                Err(SchemaError::conversion(field_type, f, "not a finite integer"))
            }
        }

        (FieldType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| SchemaError::conversion(field_type, &s, e.to_string())),
        (FieldType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),

        (FieldType::Date, Value::String(s)) => {
            let format = require_format(field_type, &s, format)?;
            NaiveDate::parse_from_str(&s, format)
                .map(Value::Date)
                .map_err(|e| SchemaError::conversion(field_type, &s, e.to_string()))
        }
        (FieldType::Date, Value::DateTime(dt)) => Ok(Value::Date(dt.date())),

        (FieldType::DateTime, Value::String(s)) => {
            let format = require_format(field_type, &s, format)?;
            parse_datetime(&s, format)
                .map(Value::DateTime)
                .map_err(|e| SchemaError::conversion(field_type, &s, e.to_string()))
        }

        (_, raw) => Err(SchemaError::conversion(
            field_type,
            &raw,
            format!("unsupported source type {}", raw.type_name()),
        )),
    }
}

fn require_format<'a>(field_type: FieldType, raw: &str, format: Option<&'a str>) -> Result<&'a str> {
    format.ok_or_else(|| SchemaError::conversion(field_type, raw, "no field format configured"))
}

// Patterns carrying an offset (%z, %:z) are normalised to UTC; chrono's
// naive parser would silently drop the offset. Date-only patterns yield
// midnight.
fn parse_datetime(raw: &str, format: &str) -> chrono::ParseResult<NaiveDateTime> {
    DateTime::parse_from_str(raw, format)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, format))
        .or_else(|e| match e.kind() {
            ParseErrorKind::NotEnough => NaiveDate::parse_from_str(raw, format)
                .and_then(|d| d.and_hms_opt(0, 0, 0).ok_or(e)),
            _ => Err(e),
        })
}
