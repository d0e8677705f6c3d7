//! Mapping of raw change-log rows onto [`ChangeEntry`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::entry::ChangeEntry;
use super::schema::{self, TableSchema};
use crate::error::AnalysisError;

/// A row as returned by the row source: column name to value.
pub type RawRow = serde_json::Map<String, Value>;

/// Field name used when a row carries no field column.
pub const UNKNOWN_FIELD: &str = "unknown_field";

/// Naive timestamp layouts accepted in addition to RFC 3339.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Integer timestamps above this are read as epoch milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// A row dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedRow {
    /// Source table.
    pub table: String,
    /// Position of the row within its table's result set.
    pub row_index: usize,
    /// Why the row was rejected.
    pub reason: String,
}

/// Outcome of normalizing a batch of rows.
#[derive(Debug, Clone, Default)]
pub struct NormalizationReport {
    /// Entries in normalization order.
    pub entries: Vec<ChangeEntry>,
    /// Rows that could not be mapped.
    pub malformed: Vec<MalformedRow>,
    /// Rows whose field is configured to be ignored.
    pub skipped: usize,
}

/// Maps one raw row from `table_origin` to a change entry.
pub fn normalize(raw_row: &RawRow, table_origin: &str) -> Result<ChangeEntry, AnalysisError> {
    let table = schema::resolve(table_origin);
    let malformed = |reason: String| AnalysisError::MalformedRow {
        table: table_origin.to_string(),
        reason,
    };

    let update_time = match column(raw_row, &[table.time_column]) {
        Some(value) => parse_timestamp(value).map_err(malformed)?,
        None => return Err(malformed(format!("missing {}", table.time_column))),
    };

    let entity_id = resolve_entity_id(raw_row, table).map_err(malformed)?;

    let field_name = column(raw_row, &[table.field_column])
        .and_then(value_to_string)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_FIELD.to_string());

    let actor = column(raw_row, table.actor_columns)
        .and_then(value_to_string)
        .map(|actor| actor.trim().to_string())
        .filter(|actor| !actor.is_empty());

    Ok(ChangeEntry {
        table_origin: table_origin.to_string(),
        entity_id,
        field_name,
        old_value: column(raw_row, &[table.old_value_column]).and_then(value_to_string),
        new_value: column(raw_row, &[table.new_value_column]).and_then(value_to_string),
        update_time,
        actor,
        sequence: 0,
    })
}

/// Normalizes every row of every table.
///
/// Tables are visited in name order so entry sequence numbers are stable for
/// identical input. Malformed rows are logged and reported, never fatal.
pub fn normalize_batch(
    rows_by_table: &BTreeMap<String, Vec<RawRow>>,
    skip_fields: &BTreeSet<String>,
) -> NormalizationReport {
    let mut report = NormalizationReport::default();

    for (table, rows) in rows_by_table {
        for (row_index, row) in rows.iter().enumerate() {
            match normalize(row, table) {
                Ok(entry) if skip_fields.contains(&entry.field_name) => {
                    report.skipped += 1;
                }
                Ok(mut entry) => {
                    entry.sequence = report.entries.len();
                    report.entries.push(entry);
                }
                Err(err) => {
                    warn!(table = %table, row_index, error = %err, "Dropping malformed change row");
                    let reason = match err {
                        AnalysisError::MalformedRow { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    report.malformed.push(MalformedRow {
                        table: table.clone(),
                        row_index,
                        reason,
                    });
                }
            }
        }
    }

    debug!(
        entries = report.entries.len(),
        malformed = report.malformed.len(),
        skipped = report.skipped,
        "Normalized change rows"
    );

    report
}

/// Returns the first non-null value among the candidate columns.
fn column<'a>(row: &'a RawRow, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| row.get(*name))
        .find(|value| !value.is_null())
}

/// Resolves the entity id through the table's id aliases, then any other
/// `*_id` column.
fn resolve_entity_id(row: &RawRow, table: &TableSchema) -> Result<i64, String> {
    if let Some(value) = column(row, table.id_columns) {
        return parse_entity_id(value);
    }

    row.iter()
        .find(|(name, value)| name.ends_with("_id") && !value.is_null())
        .map_or_else(
            || Err("missing entity id".to_string()),
            |(_, value)| parse_entity_id(value),
        )
}

fn parse_entity_id(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("entity id {n} is not an integer")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("entity id {s:?} is not an integer")),
        other => Err(format!("unsupported entity id value: {other}")),
    }
}

/// Parses a timestamp column value.
///
/// Naive timestamps are read as UTC.
pub(crate) fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|epoch| {
                if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
                    DateTime::from_timestamp_millis(epoch)
                } else {
                    DateTime::from_timestamp(epoch, 0)
                }
            })
            .ok_or_else(|| format!("unparseable update time {n}")),
        other => Err(format!("unsupported update time value: {other}")),
    }
}

fn parse_timestamp_str(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }
    Err(format!("unparseable update time {s:?}"))
}

/// Renders a column value as text. Structured values are kept as compact JSON.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
