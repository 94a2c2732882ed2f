//! Form schemas, submission parsing, and derived values.
//!
//! DESIGN
//! ======
//! Every record screen has the same shape, so each record type is described by
//! a static field table (`schema`) and one generic validator turns a submitted
//! JSON object into the normalized `data` stored in `records.data`. Form inputs
//! usually arrive as strings, so numbers, dates and times are accepted either as
//! JSON strings or as native JSON values.

pub mod derive;
pub mod schema;

use serde_json::{Map, Value};
use time::macros::format_description;
use time::{Date, Time};
use uuid::Uuid;

pub use schema::{FieldSpec, FieldType, RecordKind};

use crate::error::ErrorCode;

const MAX_TEXT_LEN: usize = 200;
const MAX_LONG_TEXT_LEN: usize = 4000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("submission must be a JSON object")]
    NotAnObject,
    #[error("{0} is required")]
    Required(&'static str),
    #[error("unknown field {0}")]
    UnknownField(String),
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("{0}")]
    Rule(String),
}

impl FormError {
    /// Field the error is attached to, when there is one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Required(field) | Self::Invalid { field, .. } => Some(*field),
            Self::UnknownField(field) => Some(field.as_str()),
            Self::NotAnObject | Self::Rule(_) => None,
        }
    }
}

impl ErrorCode for FormError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotAnObject => "E_BAD_SUBMISSION",
            Self::Required(_) => "E_REQUIRED_FIELD",
            Self::UnknownField(_) => "E_UNKNOWN_FIELD",
            Self::Invalid { .. } => "E_INVALID_FIELD",
            Self::Rule(_) => "E_RULE_VIOLATION",
        }
    }
}

/// A reference field that must point at an existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub kind: RecordKind,
    pub id: Uuid,
}

/// Submission after parsing, normalization and derivation.
#[derive(Debug, Clone)]
pub struct ValidatedRecord {
    pub kind: RecordKind,
    pub data: Map<String, Value>,
    pub record_date: Option<Date>,
    pub references: Vec<Reference>,
}

/// What a client needs to render the entry form for one record type.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FormSchema {
    pub kind: RecordKind,
    pub label: &'static str,
    pub requires_approval: bool,
    pub date_field: Option<&'static str>,
    pub fields: &'static [FieldSpec],
    pub derived: &'static [&'static str],
}

#[must_use]
pub fn schema(kind: RecordKind) -> FormSchema {
    FormSchema {
        kind,
        label: kind.label(),
        requires_approval: kind.requires_approval(),
        date_field: kind.date_field(),
        fields: kind.fields(),
        derived: kind.derived_fields(),
    }
}

/// Validate a submission for `kind`.
///
/// # Errors
///
/// Returns the first [`FormError`] found, checking unknown fields first and then
/// fields in schema order.
pub fn validate(kind: RecordKind, submission: &Value) -> Result<ValidatedRecord, FormError> {
    let Some(input) = submission.as_object() else {
        return Err(FormError::NotAnObject);
    };

    for key in input.keys() {
        match kind.field(key) {
            Some(spec) if !spec.system => {}
            _ => return Err(FormError::UnknownField(key.clone())),
        }
    }

    let mut data = Map::new();
    let mut references = Vec::new();

    for spec in kind.fields().iter().filter(|f| !f.system) {
        let raw = input.get(spec.name).filter(|v| !is_blank(v));
        let Some(raw) = raw else {
            if spec.required {
                return Err(FormError::Required(spec.name));
            }
            continue;
        };

        let value = parse_field(spec, raw)?;
        if let FieldType::Reference { kind: target } = spec.ty {
            if let Some(id) = value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                references.push(Reference { field: spec.name, kind: target, id });
            }
        }
        data.insert(spec.name.to_owned(), value);
    }

    derive::apply(kind, &mut data)?;

    let record_date = kind
        .date_field()
        .and_then(|field| data.get(field))
        .and_then(Value::as_str)
        .and_then(|s| parse_date(s).ok());

    Ok(ValidatedRecord { kind, data, record_date, references })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn invalid(spec: &FieldSpec, reason: impl Into<String>) -> FormError {
    FormError::Invalid { field: spec.name, reason: reason.into() }
}

fn parse_field(spec: &FieldSpec, raw: &Value) -> Result<Value, FormError> {
    match spec.ty {
        FieldType::Text => parse_text(spec, raw, MAX_TEXT_LEN),
        FieldType::LongText => parse_text(spec, raw, MAX_LONG_TEXT_LEN),
        FieldType::Number => parse_number(raw)
            .map(Value::from)
            .map_err(|reason| invalid(spec, reason)),
        FieldType::Integer => parse_integer(raw)
            .map(Value::from)
            .map_err(|reason| invalid(spec, reason)),
        FieldType::Date => {
            let s = raw.as_str().ok_or_else(|| invalid(spec, "expected a date string"))?;
            let date = parse_date(s).map_err(|_| invalid(spec, "expected YYYY-MM-DD"))?;
            Ok(Value::from(format_date(date)))
        }
        FieldType::Time => {
            let s = raw.as_str().ok_or_else(|| invalid(spec, "expected a time string"))?;
            let t = parse_time(s).map_err(|_| invalid(spec, "expected HH:MM"))?;
            Ok(Value::from(format_time(t)))
        }
        FieldType::Choice { options } => {
            let s = raw.as_str().ok_or_else(|| invalid(spec, "expected a string"))?;
            let normalized = s.trim().to_ascii_lowercase();
            if options.contains(&normalized.as_str()) {
                Ok(Value::from(normalized))
            } else {
                Err(invalid(spec, format!("must be one of {}", options.join(", "))))
            }
        }
        FieldType::Reference { .. } => {
            let s = raw.as_str().ok_or_else(|| invalid(spec, "expected an id"))?;
            let id = Uuid::parse_str(s.trim()).map_err(|_| invalid(spec, "expected a UUID"))?;
            Ok(Value::from(id.to_string()))
        }
    }
}

fn parse_text(spec: &FieldSpec, raw: &Value, max_len: usize) -> Result<Value, FormError> {
    let text = match raw {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        _ => return Err(invalid(spec, "expected text")),
    };
    if text.chars().count() > max_len {
        return Err(invalid(spec, format!("must be at most {max_len} characters")));
    }
    Ok(Value::from(text))
}

/// Parse a non-negative finite number from a JSON number or numeric string.
///
/// # Errors
///
/// Returns a human-readable reason on failure.
pub fn parse_number(raw: &Value) -> Result<f64, String> {
    let n = match raw {
        Value::Number(n) => n.as_f64().ok_or_else(|| "expected a number".to_owned())?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("{s:?} is not a number"))?,
        _ => return Err("expected a number".into()),
    };
    if !n.is_finite() {
        return Err("must be a finite number".into());
    }
    if n < 0.0 {
        return Err("must not be negative".into());
    }
    Ok(n)
}

/// Parse a non-negative whole number from a JSON number or numeric string.
///
/// # Errors
///
/// Returns a human-readable reason on failure.
pub fn parse_integer(raw: &Value) -> Result<i64, String> {
    let n = match raw {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => {
                let f = n.as_f64().ok_or_else(|| "expected a whole number".to_owned())?;
                if f.fract() != 0.0 || !f.is_finite() || f.abs() > 9.0e15 {
                    return Err("expected a whole number".into());
                }
                #[allow(clippy::cast_possible_truncation)]
                let i = f as i64;
                i
            }
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("{s:?} is not a whole number"))?,
        _ => return Err("expected a whole number".into()),
    };
    if n < 0 {
        return Err("must not be negative".into());
    }
    Ok(n)
}

/// Parse `YYYY-MM-DD`.
///
/// # Errors
///
/// Returns the underlying parse error.
pub fn parse_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
}

/// Parse `HH:MM` or `HH:MM:SS` (24-hour clock).
///
/// # Errors
///
/// Returns the underlying parse error.
pub fn parse_time(raw: &str) -> Result<Time, time::error::Parse> {
    let raw = raw.trim();
    Time::parse(raw, format_description!("[hour]:[minute]:[second]"))
        .or_else(|_| Time::parse(raw, format_description!("[hour]:[minute]")))
}

#[must_use]
pub fn format_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

#[must_use]
pub fn format_time(t: Time) -> String {
    if t.second() == 0 {
        format!("{:02}:{:02}", t.hour(), t.minute())
    } else {
        format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second())
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
