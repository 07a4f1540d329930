//! Literal coercion by field kind

use crate::error::LoadError;
use crate::lookup::get_code;
use chrono::{NaiveDate, NaiveDateTime};
use etl_model::{FieldDescriptor, FieldKind, Value};

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a timestamp literal; an empty literal is `Ok(None)`
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.fraction]`, `YYYY-MM-DDTHH:MM:SS[.fraction]`
/// and `YYYY-MM-DD` (midnight).
///
/// # Errors
/// Returns [`LoadError::InvalidTimestamp`] for any other non-empty literal
pub fn parse_timestamp(field: &str, literal: &str) -> Result<Option<NaiveDateTime>, LoadError> {
    let trimmed = literal.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Some(parsed));
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(Some)
        .ok_or_else(|| LoadError::InvalidTimestamp {
            field: field.to_string(),
            value: literal.to_string(),
        })
}

/// Coerce a row literal to the value stored for `field`
///
/// Lookup fields carrying an assertion are normalized to their code when
/// `generate_lookups` is set. Reference fields are resolved by the loader, not here.
///
/// # Errors
/// Returns [`LoadError::InvalidTimestamp`] or [`LoadError::InvalidValue`]
pub fn coerce(
    field: &FieldDescriptor,
    literal: &str,
    generate_lookups: bool,
) -> Result<Value, LoadError> {
    match field.kind {
        FieldKind::Text | FieldKind::Reference => Ok(Value::from(literal)),
        FieldKind::Bool => coerce_bool(field, literal),
        FieldKind::Int => {
            let trimmed = literal.trim();
            if trimmed.is_empty() {
                return Ok(Value::Null);
            }
            trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| LoadError::invalid_value(&field.name, literal, e.to_string()))
        }
        FieldKind::Date => Ok(parse_timestamp(&field.name, literal)?.map_or(Value::Null, Value::Date)),
        FieldKind::Lookup if generate_lookups && field.is_lookup() => {
            if literal.trim().is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Text(get_code(literal)))
            }
        }
        FieldKind::Lookup => Ok(Value::from(literal)),
    }
}

fn coerce_bool(field: &FieldDescriptor, literal: &str) -> Result<Value, LoadError> {
    match literal.trim().to_ascii_lowercase().as_str() {
        "" => Ok(Value::Null),
        "true" | "1" | "yes" | "y" => Ok(Value::Bool(true)),
        "false" | "0" | "no" | "n" => Ok(Value::Bool(false)),
        _ => Err(LoadError::invalid_value(&field.name, literal, "not a boolean")),
    }
}
