//! Column layout of the supported change-log tables.
//!
//! Every change-log table stores the same logical record (entity, field, old
//! value, new value, time, actor) but the tables disagree on column names:
//! some key rows by `campaign_id`, others by `sp_campaign_id` or an item id,
//! and a few record no actor at all. Each table is described once here and
//! the normalizer reads rows through the descriptor.

use crate::utils::text::title_case;

/// Id columns used by tables keyed directly by campaign.
pub(crate) const CAMPAIGN_ID: &[&str] = &["campaign_id", "sp_campaign_id"];

/// Id columns used by tables keyed by campaign item.
const ITEM_ID: &[&str] = &["campaign_item_id", "item_id", "campaign_id"];

/// Tables that record both a performer and the logged-in user prefer the
/// performer.
const PERFORMER_THEN_USER: &[&str] = &["performer", "update_user"];

const USER_ONLY: &[&str] = &["update_user"];

const NO_ACTOR: &[&str] = &[];

/// Describes how one change-log table names its columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name as queried.
    pub name: &'static str,
    /// Human-readable name for display.
    pub display_name: &'static str,
    /// Candidate entity id columns, in priority order.
    pub id_columns: &'static [&'static str],
    /// Candidate actor columns, in priority order. Empty when the table
    /// records no actor.
    pub actor_columns: &'static [&'static str],
    /// Column holding the modified field name.
    pub field_column: &'static str,
    /// Column holding the previous value.
    pub old_value_column: &'static str,
    /// Column holding the new value.
    pub new_value_column: &'static str,
    /// Column holding the modification time.
    pub time_column: &'static str,
}

impl TableSchema {
    /// Descriptor for a table using the standard column names.
    const fn standard(
        name: &'static str,
        display_name: &'static str,
        id_columns: &'static [&'static str],
        actor_columns: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            display_name,
            id_columns,
            actor_columns,
            field_column: "field_name",
            old_value_column: "old_value",
            new_value_column: "new_value",
            time_column: "update_time",
        }
    }
}

/// Every change-log table the analyzer knows how to read.
pub static SUPPORTED_TABLES: [TableSchema; 18] = [
    TableSchema::standard(
        "sp_campaign_details_v2_changes_log",
        "Campaign Details",
        CAMPAIGN_ID,
        PERFORMER_THEN_USER,
    ),
    TableSchema::standard(
        "sp_campaign_targeting_v2_changes_log",
        "Campaign Targeting",
        CAMPAIGN_ID,
        PERFORMER_THEN_USER,
    ),
    TableSchema::standard(
        "sp_campaign_creative_v2_changes_log",
        "Campaign Creative",
        CAMPAIGN_ID,
        PERFORMER_THEN_USER,
    ),
    TableSchema::standard(
        "sp_campaign_budget_v2_changes_log",
        "Campaign Budget",
        CAMPAIGN_ID,
        PERFORMER_THEN_USER,
    ),
    TableSchema::standard(
        "sp_campaign_bid_modifiers_changes_log",
        "Bid Modifiers",
        CAMPAIGN_ID,
        USER_ONLY,
    ),
    TableSchema::standard(
        "sp_campaign_publisher_bid_modifiers_changes_log",
        "Publisher Bid Modifiers",
        CAMPAIGN_ID,
        USER_ONLY,
    ),
    TableSchema::standard(
        "sp_campaign_geo_targeting_changes_log",
        "Geo Targeting",
        CAMPAIGN_ID,
        PERFORMER_THEN_USER,
    ),
    TableSchema::standard(
        "sp_campaign_platform_targeting_changes_log",
        "Platform Targeting",
        CAMPAIGN_ID,
        USER_ONLY,
    ),
    TableSchema::standard(
        "sp_campaign_os_targeting_changes_log",
        "OS Targeting",
        CAMPAIGN_ID,
        USER_ONLY,
    ),
    TableSchema::standard(
        "sp_campaign_browser_targeting_changes_log",
        "Browser Targeting",
        CAMPAIGN_ID,
        USER_ONLY,
    ),
    TableSchema::standard(
        "sp_campaign_audience_targeting_changes_log",
        "Audience Targeting",
        CAMPAIGN_ID,
        PERFORMER_THEN_USER,
    ),
    TableSchema::standard(
        "sp_campaign_contextual_segments_changes_log",
        "Contextual Segments",
        CAMPAIGN_ID,
        USER_ONLY,
    ),
    TableSchema::standard(
        "sp_campaign_dayparting_changes_log",
        "Day Parting",
        CAMPAIGN_ID,
        NO_ACTOR,
    ),
    TableSchema::standard(
        "sp_campaign_schedule_changes_log",
        "Schedule",
        CAMPAIGN_ID,
        USER_ONLY,
    ),
    TableSchema::standard(
        "sp_campaign_conversion_rules_changes_log",
        "Conversion Rules",
        CAMPAIGN_ID,
        PERFORMER_THEN_USER,
    ),
    TableSchema::standard(
        "sp_campaign_tracking_codes_changes_log",
        "Tracking Codes",
        CAMPAIGN_ID,
        NO_ACTOR,
    ),
    TableSchema::standard(
        "sp_campaign_items_changes_log",
        "Campaign Items",
        ITEM_ID,
        PERFORMER_THEN_USER,
    ),
    TableSchema {
        name: "sp_campaign_pacing_changes_log",
        display_name: "Pacing",
        id_columns: CAMPAIGN_ID,
        actor_columns: &["changed_by"],
        field_column: "changed_field",
        old_value_column: "previous_value",
        new_value_column: "current_value",
        time_column: "change_time",
    },
];

/// Descriptor used for tables missing from [`SUPPORTED_TABLES`].
pub static GENERIC_TABLE: TableSchema =
    TableSchema::standard("", "", CAMPAIGN_ID, PERFORMER_THEN_USER);

/// Looks up the descriptor for a known table.
pub fn lookup(table: &str) -> Option<&'static TableSchema> {
    SUPPORTED_TABLES.iter().find(|schema| schema.name == table)
}

/// Returns the descriptor for `table`, falling back to [`GENERIC_TABLE`].
pub fn resolve(table: &str) -> &'static TableSchema {
    lookup(table).unwrap_or(&GENERIC_TABLE)
}

/// Returns the display name of a table.
///
/// Unknown tables get a name derived from the table name with the
/// `_changes_log` suffix removed, e.g. `sp_campaign_notes_changes_log` becomes
/// "Sp Campaign Notes".
pub fn display_name(table: &str) -> String {
    match lookup(table) {
        Some(schema) => schema.display_name.to_string(),
        None => title_case(&table.replace("_changes_log", "")),
    }
}
