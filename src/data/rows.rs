//! Row sources feeding the analysis pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::changes::normalizer::parse_timestamp;
use crate::changes::schema::{self, CAMPAIGN_ID};
use crate::changes::RawRow;
use crate::request::{AnalysisRequest, DateRange};

/// Source of raw change-log rows.
pub trait RowSource: Send + Sync {
    /// Returns the rows of `table` recorded for `campaign_id` inside
    /// `date_range`.
    fn fetch_rows(&self, table: &str, campaign_id: i64, date_range: &DateRange)
        -> Result<Vec<RawRow>>;
}

/// Row source backed by a JSON document mapping table names to row arrays.
///
/// ```json
/// { "sp_campaign_details_v2_changes_log": [ { "campaign_id": 1, ... } ] }
/// ```
///
/// Rows are filtered the way a query would filter them. Rows whose campaign
/// or time cannot be read are passed through so the normalizer can report
/// them.
#[derive(Debug, Clone, Default)]
pub struct JsonFileRowSource {
    tables: BTreeMap<String, Vec<RawRow>>,
}

impl JsonFileRowSource {
    /// Loads the document at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rows file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse rows file: {}", path.display()))
    }

    /// Parses a document held in memory.
    pub fn from_json(content: &str) -> Result<Self> {
        let tables: BTreeMap<String, Vec<RawRow>> = serde_json::from_str(content)
            .context("Expected an object mapping table names to arrays of row objects")?;
        Ok(Self { tables })
    }

    /// Table names present in the document.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl RowSource for JsonFileRowSource {
    fn fetch_rows(
        &self,
        table: &str,
        campaign_id: i64,
        date_range: &DateRange,
    ) -> Result<Vec<RawRow>> {
        let Some(rows) = self.tables.get(table) else {
            debug!(table, "Table not present in rows file");
            return Ok(Vec::new());
        };

        let time_column = schema::resolve(table).time_column;
        let selected: Vec<RawRow> = rows
            .iter()
            .filter(|row| belongs_to_campaign(row, campaign_id))
            .filter(|row| within_range(row, time_column, date_range))
            .cloned()
            .collect();

        debug!(
            table,
            available = rows.len(),
            selected = selected.len(),
            "Fetched rows from file"
        );
        Ok(selected)
    }
}

fn belongs_to_campaign(row: &RawRow, campaign_id: i64) -> bool {
    let recorded = CAMPAIGN_ID
        .iter()
        .filter_map(|column| row.get(*column))
        .find_map(|value| match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        });
    recorded.map_or(true, |id| id == campaign_id)
}

fn within_range(row: &RawRow, time_column: &str, date_range: &DateRange) -> bool {
    match row.get(time_column).map(parse_timestamp) {
        Some(Ok(time)) => date_range.contains(time),
        _ => true,
    }
}

/// Pulls every requested table from `source`, keyed by table name.
pub fn fetch_rows_by_table(
    source: &dyn RowSource,
    request: &AnalysisRequest,
) -> Result<BTreeMap<String, Vec<RawRow>>> {
    let mut rows_by_table = BTreeMap::new();
    for table in &request.tables {
        let rows = source
            .fetch_rows(table, request.campaign_id, &request.date_range)
            .with_context(|| format!("Failed to fetch rows from {table}"))?;
        rows_by_table.insert(table.clone(), rows);
    }
    Ok(rows_by_table)
}
