//! Change sessions: clusters of entries from one editing episode.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::entry::{ChangeEntry, UNKNOWN_ACTOR};

/// A non-empty, chronologically ordered group of change entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSession {
    /// Time of the first entry.
    pub start_time: DateTime<Utc>,
    /// Time of the last entry.
    pub end_time: DateTime<Utc>,
    /// Most frequent non-null actor, or [`UNKNOWN_ACTOR`].
    pub primary_actor: String,
    /// Number of entries.
    pub entry_count: usize,
    /// Entries sorted ascending by update time.
    pub entries: Vec<ChangeEntry>,
}

impl ChangeSession {
    /// Builds a session from entries already in chronological order.
    ///
    /// Returns `None` for an empty group.
    pub fn from_entries(entries: Vec<ChangeEntry>) -> Option<Self> {
        let start_time = entries.first()?.update_time;
        let end_time = entries.last()?.update_time;

        Some(Self {
            start_time,
            end_time,
            primary_actor: primary_actor(&entries),
            entry_count: entries.len(),
            entries,
        })
    }

    /// Time between the first and last entry.
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Distinct field names in order of first modification.
    pub fn field_names(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .map(|e| e.field_name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Distinct source tables, sorted by name.
    pub fn tables(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.table_origin.as_str()).collect()
    }
}

/// Picks the most frequent non-null actor; ties go to the actor seen first.
fn primary_actor(entries: &[ChangeEntry]) -> String {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (position, actor) in entries
        .iter()
        .filter_map(|e| e.actor.as_deref())
        .enumerate()
    {
        counts.entry(actor).or_insert((0, position)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then_with(|| first_b.cmp(first_a))
        })
        .map_or_else(|| UNKNOWN_ACTOR.to_string(), |(actor, _)| actor.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn entry(minute: u32, actor: Option<&str>, field: &str, table: &str) -> ChangeEntry {
        ChangeEntry {
            table_origin: table.to_string(),
            entity_id: 1,
            field_name: field.to_string(),
            old_value: None,
            new_value: None,
            update_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap(),
            actor: actor.map(String::from),
            sequence: 0,
        }
    }

    #[test]
    fn empty_group_has_no_session() {
        assert!(ChangeSession::from_entries(Vec::new()).is_none());
    }

    #[test]
    fn derived_fields() {
        let session = ChangeSession::from_entries(vec![
            entry(0, Some("a"), "budget", "t2"),
            entry(3, None, "bid", "t1"),
            entry(7, Some("a"), "budget", "t1"),
        ])
        .unwrap();

        assert_eq!(session.entry_count, 3);
        assert_eq!(session.primary_actor, "a");
        assert_eq!(session.duration(), Duration::minutes(7));
        assert_eq!(session.field_names(), vec!["budget", "bid"]);
        assert_eq!(session.tables().into_iter().collect::<Vec<_>>(), vec!["t1", "t2"]);
    }

    #[test]
    fn all_null_actors_is_unknown() {
        let session = ChangeSession::from_entries(vec![entry(0, None, "bid", "t")]).unwrap();
        assert_eq!(session.primary_actor, UNKNOWN_ACTOR);
    }

    #[test]
    fn primary_actor_tie_prefers_first_seen() {
        let session = ChangeSession::from_entries(vec![
            entry(0, Some("zed"), "bid", "t"),
            entry(1, Some("amy"), "bid", "t"),
        ])
        .unwrap();
        assert_eq!(session.primary_actor, "zed");
    }

    #[test]
    fn primary_actor_most_frequent() {
        let session = ChangeSession::from_entries(vec![
            entry(0, Some("zed"), "bid", "t"),
            entry(1, Some("amy"), "bid", "t"),
            entry(2, Some("amy"), "bid", "t"),
        ])
        .unwrap();
        assert_eq!(session.primary_actor, "amy");
    }
}
