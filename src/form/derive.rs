//! Values computed from a validated submission.
//!
//! Derived values are rounded to two decimals. A division by zero, or a missing
//! operand, leaves the derived value out rather than storing a placeholder.

use serde_json::{Map, Value};
use time::{Date, Time};

use super::FormError;
use super::schema::RecordKind;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Hours elapsed from `start` to `end`, wrapping past midnight when `end < start`.
#[must_use]
pub fn elapsed_hours(start: Time, end: Time) -> f64 {
    let start_secs = seconds_of_day(start);
    let end_secs = seconds_of_day(end);
    let mut diff = end_secs - start_secs;
    if diff < 0 {
        diff += SECONDS_PER_DAY;
    }
    #[allow(clippy::cast_precision_loss)]
    let hours = diff as f64 / 3600.0;
    hours
}

fn seconds_of_day(t: Time) -> i64 {
    i64::from(t.hour()) * 3600 + i64::from(t.minute()) * 60 + i64::from(t.second())
}

/// Round to two decimals. Values too large to scale are returned unchanged,
/// and negative zero comes back as zero.
#[must_use]
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0 + 0.0
}

fn num(data: &Map<String, Value>, key: &str) -> Option<f64> {
    data.get(key).and_then(Value::as_f64)
}

fn time_of(data: &Map<String, Value>, key: &str) -> Option<Time> {
    data.get(key)
        .and_then(Value::as_str)
        .and_then(|s| super::parse_time(s).ok())
}

fn date_of(data: &Map<String, Value>, key: &str) -> Option<Date> {
    data.get(key)
        .and_then(Value::as_str)
        .and_then(|s| super::parse_date(s).ok())
}

fn put(data: &mut Map<String, Value>, key: &str, value: Option<f64>) {
    if let Some(v) = value.map(round2).filter(|v| v.is_finite()) {
        data.insert(key.to_owned(), Value::from(v));
    }
}

fn product(data: &Map<String, Value>, a: &str, b: &str) -> Option<f64> {
    Some(num(data, a)? * num(data, b)?)
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let d = denominator?;
    if d > 0.0 { Some(numerator? / d) } else { None }
}

fn hours_between(data: &Map<String, Value>, start: &str, end: &str) -> Option<f64> {
    Some(elapsed_hours(time_of(data, start)?, time_of(data, end)?))
}

/// Apply cross-field rules and insert derived values into `data`.
///
/// # Errors
///
/// Returns [`FormError::Rule`] when a cross-field rule is violated.
pub fn apply(kind: RecordKind, data: &mut Map<String, Value>) -> Result<(), FormError> {
    match kind {
        RecordKind::Drilling => {
            let meters = product(data, "holes_drilled", "hole_depth_m");
            let hours = hours_between(data, "start_time", "end_time");
            put(data, "total_meters", meters);
            put(data, "working_hours", hours);
        }
        RecordKind::Blasting => {
            let pf = ratio(num(data, "explosive_kg"), num(data, "blast_volume_m3"));
            put(data, "powder_factor", pf);
        }
        RecordKind::Loading => {
            let volume = product(data, "trips", "bucket_capacity_m3");
            put(data, "loaded_volume_m3", volume);
        }
        RecordKind::Transport => {
            let total = product(data, "trips", "tons_per_trip");
            put(data, "total_tons", total);
        }
        RecordKind::Attendance => {
            let hours = hours_between(data, "check_in", "check_out");
            put(data, "hours_worked", hours);
        }
        RecordKind::Fuel => {
            let cost = product(data, "litres", "rate_per_litre");
            put(data, "fuel_cost", cost);
        }
        RecordKind::Inventory => {
            let value = product(data, "quantity", "unit_cost");
            put(data, "total_value", value);
        }
        RecordKind::Permit => {
            if let (Some(issued), Some(until)) = (date_of(data, "issued_on"), date_of(data, "valid_until")) {
                if until < issued {
                    return Err(FormError::Rule("valid_until must not be before issued_on".into()));
                }
                #[allow(clippy::cast_precision_loss)]
                let days = (until - issued).whole_days() as f64;
                put(data, "validity_days", Some(days));
            }
        }
        RecordKind::Stock => {
            let opening = num(data, "opening_tons").unwrap_or(0.0);
            let produced = num(data, "produced_tons").unwrap_or(0.0);
            let dispatched = num(data, "dispatched_tons").unwrap_or(0.0);
            let closing = round2(opening + produced - dispatched);
            if closing < 0.0 {
                return Err(FormError::Rule("dispatched_tons exceeds available stock".into()));
            }
            put(data, "closing_tons", Some(closing));
        }
        RecordKind::CrusherProduction => {
            let input = num(data, "input_tons");
            let output = num(data, "output_tons");
            if let (Some(i), Some(o)) = (input, output) {
                if o > i {
                    return Err(FormError::Rule("output_tons must not exceed input_tons".into()));
                }
            }
            let hours = hours_between(data, "start_time", "end_time");
            put(data, "running_hours", hours);
            put(data, "output_per_hour", ratio(output, hours));
            put(data, "yield_percent", ratio(output, input).map(|r| r * 100.0));
        }
        RecordKind::EbReport => {
            let opening = num(data, "opening_reading");
            let closing = num(data, "closing_reading");
            if let (Some(o), Some(c)) = (opening, closing) {
                if c < o {
                    return Err(FormError::Rule("closing_reading must not be below opening_reading".into()));
                }
                let units = c - o;
                put(data, "units_consumed", Some(units));
                put(data, "amount", num(data, "rate_per_unit").map(|rate| units * rate));
            }
        }
        RecordKind::JcbOperation => {
            let hours = hours_between(data, "start_time", "end_time");
            put(data, "hours", hours);
            put(data, "amount", hours.zip(num(data, "rate_per_hour")).map(|(h, r)| h * r));
        }
        RecordKind::Sale => {
            let total = product(data, "quantity_tons", "rate_per_ton");
            put(data, "total_amount", total);
        }
        RecordKind::Safety
        | RecordKind::Dispatch
        | RecordKind::Account
        | RecordKind::Customer
        | RecordKind::Media => {}
    }
    Ok(())
}
