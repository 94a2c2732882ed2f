//! Aggregates over a filtered record list.
//!
//! Totals are computed in process over the same rows the list view shows, so a
//! summary always agrees with the list it sits above.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::form::RecordKind;
use crate::form::derive::round2;
use crate::services::record::{RecordRow, Status};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldTotal {
    /// Rows that carried a value for the field.
    pub count: usize,
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    pub kind: RecordKind,
    pub count: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub fields: BTreeMap<&'static str, FieldTotal>,
}

#[must_use]
pub fn summarize(kind: RecordKind, rows: &[RecordRow]) -> RecordSummary {
    let mut summary = RecordSummary {
        kind,
        count: rows.len(),
        pending: 0,
        approved: 0,
        rejected: 0,
        fields: BTreeMap::new(),
    };

    for row in rows {
        match row.status {
            Some(Status::Pending) => summary.pending += 1,
            Some(Status::Approved) => summary.approved += 1,
            Some(Status::Rejected) => summary.rejected += 1,
            None => {}
        }
    }

    for field in kind.numeric_fields() {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|row| row.data.get(field).and_then(Value::as_f64))
            .collect();
        if let Some(total) = total_of(&values) {
            summary.fields.insert(field, total);
        }
    }

    summary
}

fn total_of(values: &[f64]) -> Option<FieldTotal> {
    let (&first, rest) = values.split_first()?;
    let (sum, min, max) = rest
        .iter()
        .fold((first, first, first), |(sum, min, max), &v| (sum + v, min.min(v), max.max(v)));
    #[allow(clippy::cast_precision_loss)]
    let avg = sum / values.len() as f64;
    Some(FieldTotal { count: values.len(), sum: round2(sum), avg: round2(avg), min, max })
}

#[cfg(test)]
#[path = "summary_test.rs"]
mod tests;
