//! Clustering of change entries into sessions.
//!
//! Entries are sorted by update time (stable, so ties keep input order) and
//! walked once. A session closes when the next entry was made by a different
//! actor than the session's most recent known actor, or when the gap since the
//! previous entry exceeds the configured threshold. Entries without an actor
//! never close a session on their own.

use chrono::Duration;
use tracing::{debug, trace};

use super::entry::ChangeEntry;
use super::session::ChangeSession;

/// Why a new session was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBreak {
    /// A different non-null actor took over.
    ActorChange,
    /// The time since the previous entry exceeded the gap threshold.
    TimeGap,
}

/// Groups change entries into sessions by temporal proximity and actor.
///
/// Entries are taken in time order and each one joins the current session
/// unless:
///
/// - it has an actor and that actor differs from the last non-null actor
///   seen in the session, so `A, null, B` splits at `B`; or
/// - more than the gap threshold has passed since the previous entry.
///
/// An entry without an actor never opens a session on its own and leaves
/// the session's reference actor unchanged. The actor rule is checked
/// before the time rule.
#[derive(Debug, Clone, Copy)]
pub struct SessionGrouper {
    gap: Duration,
}

impl SessionGrouper {
    /// Creates a grouper that splits sessions on gaps longer than `gap`.
    pub fn new(gap: Duration) -> Self {
        Self { gap }
    }

    /// Returns the gap threshold.
    pub fn gap(&self) -> Duration {
        self.gap
    }

    /// Partitions `entries` into sessions ordered by start time.
    pub fn group(&self, entries: &[ChangeEntry]) -> Vec<ChangeSession> {
        let mut sorted = entries.to_vec();
        sorted.sort_by_key(|entry| entry.update_time);

        let mut sessions = Vec::new();
        let mut current: Vec<ChangeEntry> = Vec::new();
        let mut reference_actor: Option<String> = None;

        for entry in sorted {
            if let Some(previous) = current.last() {
                if let Some(reason) =
                    self.break_reason(previous, reference_actor.as_deref(), &entry)
                {
                    trace!(?reason, at = %entry.update_time, "Opening new change session");
                    sessions.extend(ChangeSession::from_entries(std::mem::take(&mut current)));
                    reference_actor = None;
                }
            }
            if let Some(actor) = &entry.actor {
                reference_actor = Some(actor.clone());
            }
            current.push(entry);
        }
        sessions.extend(ChangeSession::from_entries(current));

        debug!(
            entries = entries.len(),
            sessions = sessions.len(),
            gap_minutes = self.gap.num_minutes(),
            "Grouped change entries into sessions"
        );

        sessions
    }

    /// Decides whether `entry` must open a new session.
    ///
    /// The actor rule is evaluated before the time rule, so simultaneous
    /// changes by two actors still split.
    fn break_reason(
        &self,
        previous: &ChangeEntry,
        reference_actor: Option<&str>,
        entry: &ChangeEntry,
    ) -> Option<SessionBreak> {
        if let (Some(reference), Some(actor)) = (reference_actor, entry.actor.as_deref()) {
            if reference != actor {
                return Some(SessionBreak::ActorChange);
            }
        }
        if entry.update_time - previous.update_time > self.gap {
            return Some(SessionBreak::TimeGap);
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn entry(hour: u32, minute: u32, actor: Option<&str>, field: &str) -> ChangeEntry {
        ChangeEntry {
            table_origin: "sp_campaign_details_v2_changes_log".to_string(),
            entity_id: 1,
            field_name: field.to_string(),
            old_value: None,
            new_value: None,
            update_time: Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap(),
            actor: actor.map(String::from),
            sequence: 0,
        }
    }

    fn grouper() -> SessionGrouper {
        SessionGrouper::new(Duration::minutes(5))
    }

    fn fields(session: &ChangeSession) -> Vec<&str> {
        session.entries.iter().map(|e| e.field_name.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_no_sessions() {
        assert!(grouper().group(&[]).is_empty());
    }

    #[test]
    fn single_entry_single_session() {
        let sessions = grouper().group(&[entry(10, 0, Some("a"), "budget")]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].entry_count, 1);
    }

    #[test]
    fn gap_and_actor_change_split() {
        let sessions = grouper().group(&[
            entry(10, 0, Some("A"), "budget"),
            entry(10, 2, Some("A"), "bid"),
            entry(10, 20, Some("B"), "budget"),
        ]);

        assert_eq!(sessions.len(), 2);
        assert_eq!(fields(&sessions[0]), vec!["budget", "bid"]);
        assert_eq!(sessions[0].primary_actor, "A");
        assert_eq!(fields(&sessions[1]), vec!["budget"]);
        assert_eq!(sessions[1].primary_actor, "B");
    }

    #[test]
    fn unsorted_input_is_sorted() {
        let sessions = grouper().group(&[
            entry(10, 2, Some("A"), "bid"),
            entry(10, 20, Some("B"), "budget"),
            entry(10, 0, Some("A"), "budget"),
        ]);
        assert_eq!(fields(&sessions[0]), vec!["budget", "bid"]);
        assert!(sessions[0].start_time < sessions[1].start_time);
    }

    #[test]
    fn time_gap_alone_splits_same_actor() {
        let sessions = grouper().group(&[
            entry(10, 0, Some("A"), "budget"),
            entry(10, 6, Some("A"), "bid"),
        ]);
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn gap_equal_to_threshold_continues() {
        let sessions = grouper().group(&[
            entry(10, 0, Some("A"), "budget"),
            entry(10, 5, Some("A"), "bid"),
        ]);
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn gap_measured_from_previous_entry_not_session_start() {
        let sessions = grouper().group(&[
            entry(10, 0, Some("A"), "a"),
            entry(10, 4, Some("A"), "b"),
            entry(10, 8, Some("A"), "c"),
            entry(10, 12, Some("A"), "d"),
        ]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].entry_count, 4);
    }

    #[test]
    fn identical_timestamp_same_actor_colocate() {
        let sessions = grouper().group(&[
            entry(10, 0, Some("A"), "budget"),
            entry(10, 0, Some("A"), "bid"),
        ]);
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn identical_timestamp_different_actors_split() {
        let sessions = grouper().group(&[
            entry(10, 0, Some("A"), "budget"),
            entry(10, 0, Some("B"), "bid"),
        ]);
        assert_eq!(sessions.len(), 2);
        assert_eq!(fields(&sessions[0]), vec!["budget"]);
        assert_eq!(fields(&sessions[1]), vec!["bid"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let sessions = grouper().group(&[
            entry(10, 0, Some("A"), "first"),
            entry(10, 0, Some("A"), "second"),
            entry(10, 0, Some("A"), "third"),
        ]);
        assert_eq!(fields(&sessions[0]), vec!["first", "second", "third"]);
    }

    #[test]
    fn null_actor_continues_session() {
        let sessions = grouper().group(&[
            entry(10, 0, Some("A"), "budget"),
            entry(10, 1, None, "hours"),
            entry(10, 2, Some("A"), "bid"),
        ]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].primary_actor, "A");
    }

    #[test]
    fn null_actor_does_not_hide_actor_change() {
        let sessions = grouper().group(&[
            entry(10, 0, Some("A"), "budget"),
            entry(10, 0, None, "hours"),
            entry(10, 0, Some("B"), "bid"),
        ]);
        assert_eq!(sessions.len(), 2);
        assert_eq!(fields(&sessions[0]), vec!["budget", "hours"]);
        assert_eq!(fields(&sessions[1]), vec!["bid"]);
    }

    #[test]
    fn known_actor_joins_anonymous_session() {
        let sessions = grouper().group(&[
            entry(10, 0, None, "hours"),
            entry(10, 1, Some("A"), "bid"),
        ]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].primary_actor, "A");
    }

    #[test]
    fn null_actor_still_subject_to_gap() {
        let sessions = grouper().group(&[
            entry(10, 0, Some("A"), "budget"),
            entry(11, 0, None, "hours"),
        ]);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[1].primary_actor, "unknown");
    }

    #[test]
    fn break_reason_prefers_actor_change() {
        let previous = entry(10, 0, Some("A"), "budget");
        let next = entry(11, 0, Some("B"), "bid");
        assert_eq!(
            grouper().break_reason(&previous, Some("A"), &next),
            Some(SessionBreak::ActorChange)
        );
    }
}
