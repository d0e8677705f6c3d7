//! Canonical change-log entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor label used wherever a change has no recorded actor.
pub const UNKNOWN_ACTOR: &str = "unknown";

/// A single field modification taken from one change-log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Name of the table the row came from.
    pub table_origin: String,
    /// Campaign or sub-entity key.
    pub entity_id: i64,
    /// Modified field.
    pub field_name: String,
    /// Value before the change (may be truncated upstream).
    pub old_value: Option<String>,
    /// Value after the change (may be truncated upstream).
    pub new_value: Option<String>,
    /// When the change was recorded.
    pub update_time: DateTime<Utc>,
    /// User or system that made the change, when the table records one.
    pub actor: Option<String>,
    /// Position of the entry in the normalized input.
    #[serde(skip)]
    pub sequence: usize,
}

impl ChangeEntry {
    /// Returns the actor, or [`UNKNOWN_ACTOR`] when none was recorded.
    pub fn actor_or_unknown(&self) -> &str {
        self.actor.as_deref().unwrap_or(UNKNOWN_ACTOR)
    }

    /// Returns true when the old and new values are identical.
    pub fn is_noop(&self) -> bool {
        self.old_value == self.new_value
    }
}
