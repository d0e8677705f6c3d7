//! Analysis request parameters and their validation.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::AnalysisError;

/// Date format accepted for request dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive range of calendar days (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    /// First day.
    pub from: NaiveDate,
    /// Last day, inclusive.
    pub to: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting `from` after `to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, AnalysisError> {
        if from > to {
            return Err(AnalysisError::InvalidRequest(
                "From Date must be before To Date".to_string(),
            ));
        }
        Ok(Self { from, to })
    }

    /// Parses a range from two `YYYY-MM-DD` strings.
    pub fn parse(from: &str, to: &str) -> Result<Self, AnalysisError> {
        Self::new(parse_date(from)?, parse_date(to)?)
    }

    /// True when `time` falls on a day inside the range.
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        let day = time.date_naive();
        self.from <= day && day <= self.to
    }

    /// Number of days covered, inclusive.
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.from.format(DATE_FORMAT),
            self.to.format(DATE_FORMAT)
        )
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, AnalysisError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AnalysisError::InvalidRequest(
            "Please provide both from and to dates".to_string(),
        ));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        AnalysisError::InvalidRequest(format!("Dates must be in YYYY-MM-DD format, got {value:?}"))
    })
}

/// What to analyse: one campaign, a window and the tables to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    /// Campaign to analyse.
    pub campaign_id: i64,
    /// Window of interest.
    pub date_range: DateRange,
    /// Change-log tables to read, deduplicated in the order given.
    pub tables: Vec<String>,
}

impl AnalysisRequest {
    /// Creates a validated request.
    pub fn new(
        campaign_id: i64,
        date_range: DateRange,
        tables: Vec<String>,
    ) -> Result<Self, AnalysisError> {
        if campaign_id < 1 {
            return Err(AnalysisError::InvalidRequest(
                "Campaign ID must be a positive number".to_string(),
            ));
        }

        let mut unique: Vec<String> = Vec::with_capacity(tables.len());
        for table in tables {
            let table = table.trim().to_string();
            if !table.is_empty() && !unique.contains(&table) {
                unique.push(table);
            }
        }
        if unique.is_empty() {
            return Err(AnalysisError::InvalidRequest(
                "Please select at least one table to query".to_string(),
            ));
        }

        Ok(Self {
            campaign_id,
            date_range,
            tables: unique,
        })
    }

    /// Parses and validates raw user input.
    pub fn parse(
        campaign_id: &str,
        from: &str,
        to: &str,
        tables: Vec<String>,
    ) -> Result<Self, AnalysisError> {
        let campaign_id = campaign_id.trim();
        if campaign_id.is_empty() {
            return Err(AnalysisError::InvalidRequest(
                "Please provide a campaign ID".to_string(),
            ));
        }
        let campaign_id = campaign_id.parse::<i64>().map_err(|_| {
            AnalysisError::InvalidRequest("Campaign ID must be a number".to_string())
        })?;
        Self::new(campaign_id, DateRange::parse(from, to)?, tables)
    }
}
