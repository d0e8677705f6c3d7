//! Deterministic summary metrics over change entries and sessions.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::changes::{ChangeEntry, ChangeSession, UNKNOWN_ACTOR};

/// Occurrence count for a named value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    /// The counted value (field name, actor or table).
    pub name: String,
    /// Number of occurrences.
    pub count: usize,
}

/// Number of changes recorded on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    /// The day.
    pub day: NaiveDate,
    /// Changes on that day.
    pub count: usize,
}

/// Summary statistics for one analysis run.
///
/// Ranked lists are ordered by count descending, ties alphabetically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// Number of change entries.
    pub total_entries: usize,
    /// Number of sessions.
    pub total_sessions: usize,
    /// Changes per field.
    pub field_counts: Vec<CountEntry>,
    /// Changes per actor; entries without an actor count as "unknown".
    pub actor_counts: Vec<CountEntry>,
    /// Changes per source table.
    pub table_counts: Vec<CountEntry>,
    /// Changes per day, ascending.
    pub day_counts: Vec<DayCount>,
    /// Earliest update time.
    pub earliest_update: Option<DateTime<Utc>>,
    /// Latest update time.
    pub latest_update: Option<DateTime<Utc>>,
    /// Inclusive number of calendar days between earliest and latest update.
    pub date_range_days: i64,
    /// Entries divided by sessions, 0 when there are no sessions.
    pub average_entries_per_session: f64,
    /// Entries divided by `date_range_days`, 0 when there are no entries.
    pub changes_per_day: f64,
    /// Actor with the most changes, ignoring unknown actors.
    pub most_active_actor: Option<CountEntry>,
}

/// Computes statistics from the normalized entries and their sessions.
pub fn compute(entries: &[ChangeEntry], sessions: &[ChangeSession]) -> Statistics {
    let mut fields: BTreeMap<&str, usize> = BTreeMap::new();
    let mut actors: BTreeMap<&str, usize> = BTreeMap::new();
    let mut tables: BTreeMap<&str, usize> = BTreeMap::new();
    let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();

    for entry in entries {
        *fields.entry(entry.field_name.as_str()).or_default() += 1;
        *actors.entry(entry.actor_or_unknown()).or_default() += 1;
        *tables.entry(entry.table_origin.as_str()).or_default() += 1;
        *days.entry(entry.update_time.date_naive()).or_default() += 1;
    }

    let earliest_update = entries.iter().map(|e| e.update_time).min();
    let latest_update = entries.iter().map(|e| e.update_time).max();
    let date_range_days = match (earliest_update, latest_update) {
        (Some(first), Some(last)) => (last.date_naive() - first.date_naive()).num_days() + 1,
        _ => 0,
    };

    let total_entries = entries.len();
    let total_sessions = sessions.len();
    let actor_counts = ranked(actors);
    let most_active_actor = actor_counts
        .iter()
        .find(|c| c.name != UNKNOWN_ACTOR)
        .cloned();

    Statistics {
        total_entries,
        total_sessions,
        field_counts: ranked(fields),
        actor_counts,
        table_counts: ranked(tables),
        day_counts: days
            .into_iter()
            .map(|(day, count)| DayCount { day, count })
            .collect(),
        earliest_update,
        latest_update,
        date_range_days,
        average_entries_per_session: ratio(total_entries, total_sessions as i64),
        changes_per_day: ratio(total_entries, date_range_days),
        most_active_actor,
    }
}

impl Statistics {
    /// Sum of the per-session entry counts.
    pub fn session_entry_total(sessions: &[ChangeSession]) -> usize {
        sessions.iter().map(|s| s.entry_count).sum()
    }

    /// Top `limit` fields by change count.
    pub fn top_fields(&self, limit: usize) -> &[CountEntry] {
        &self.field_counts[..self.field_counts.len().min(limit)]
    }
}

fn ratio(numerator: usize, denominator: i64) -> f64 {
    if denominator <= 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn ranked(counts: BTreeMap<&str, usize>) -> Vec<CountEntry> {
    let mut ranked: Vec<CountEntry> = counts
        .into_iter()
        .map(|(name, count)| CountEntry {
            name: name.to_string(),
            count,
        })
        .collect();
    // BTreeMap iteration is alphabetical and the sort is stable.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}
