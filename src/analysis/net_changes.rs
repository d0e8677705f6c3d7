//! Net effect of all modifications to each field over the analysed window.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::changes::ChangeEntry;

/// First-to-last transition of one field on one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetChange {
    /// Source table.
    pub table: String,
    /// Entity the field belongs to.
    pub entity_id: i64,
    /// Field name.
    pub field_name: String,
    /// Value before the first modification in the window.
    pub initial_value: Option<String>,
    /// Value after the last modification in the window.
    pub final_value: Option<String>,
    /// Number of modifications in the window.
    pub modifications: usize,
    /// Time of the first modification.
    pub first_changed: DateTime<Utc>,
    /// Time of the last modification.
    pub last_changed: DateTime<Utc>,
}

impl NetChange {
    /// True when the field ended where it started.
    pub fn is_noop(&self) -> bool {
        self.initial_value == self.final_value
    }
}

/// Collapses the entries into one net change per (table, entity, field),
/// ordered by table, entity and field.
pub fn net_changes(entries: &[ChangeEntry]) -> Vec<NetChange> {
    let mut chronological: Vec<&ChangeEntry> = entries.iter().collect();
    chronological.sort_by_key(|e| e.update_time);

    let mut net: BTreeMap<(&str, i64, &str), NetChange> = BTreeMap::new();
    for entry in chronological {
        let key = (
            entry.table_origin.as_str(),
            entry.entity_id,
            entry.field_name.as_str(),
        );
        net.entry(key)
            .and_modify(|change| {
                change.final_value.clone_from(&entry.new_value);
                change.modifications += 1;
                change.last_changed = entry.update_time;
            })
            .or_insert_with(|| NetChange {
                table: entry.table_origin.clone(),
                entity_id: entry.entity_id,
                field_name: entry.field_name.clone(),
                initial_value: entry.old_value.clone(),
                final_value: entry.new_value.clone(),
                modifications: 1,
                first_changed: entry.update_time,
                last_changed: entry.update_time,
            });
    }

    net.into_values().collect()
}
