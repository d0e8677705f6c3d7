//! Prompt construction for campaign change analysis.
//!
//! The user payload has a fixed part (request header, statistics, net
//! changes, instructions) that is always sent whole, and two variable parts
//! (session list, entry details) that are trimmed oldest-first until the
//! payload fits its ceiling.

use std::fmt::Write as _;

use serde::Serialize;
use tracing::{debug, warn};

use crate::analysis::{NetChange, Statistics};
use crate::changes::schema::display_name;
use crate::changes::{ChangeEntry, ChangeSession};
use crate::config::AnalysisConfig;
use crate::data::to_yaml;
use crate::error::AnalysisError;
use crate::llm::token_budget::TokenBudget;
use crate::request::DateRange;
use crate::utils::text::value_preview;

/// Timestamp layout used throughout the prompt.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// System prompt for campaign change analysis.
pub const SYSTEM_PROMPT: &str = r#"You are an experienced digital advertising analyst. You will receive the change history of one advertising campaign: summary statistics, the net effect of the changes on each field, the editing sessions in which the changes were made and a chronological list of individual changes.

Your task is to explain what happened to the campaign and what it means.

OUTPUT FORMAT:
Respond with a single JSON object containing exactly these fields:
{
  "summary": "A factual, readable account of the net changes. State each changed field and its final value, based only on the Net Changes section. Put each change on its own line. No interpretation.",
  "key_insights": ["0-5 observations about optimization patterns, strategic direction and likely performance impact"],
  "risk_factors": ["0-5 risks introduced by the changes, such as abrupt budget swings, reverted edits or conflicting edits by different users"],
  "recommendations": ["0-5 concrete next steps for the campaign owner"]
}

GUIDELINES:
- Base the summary strictly on the Net Changes section.
- Use the sessions and details to judge intent, pacing and who was involved.
- Keep every list item to one sentence.
- If some history was omitted for length, do not speculate about it.

Return only the JSON object, with no markdown fences and no additional keys."#;

/// Size and detail limits applied while building the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptLimits {
    /// Ceiling on the user payload, in bytes.
    pub max_prompt_bytes: usize,
    /// Ceiling on the number of individually described entries.
    pub max_detail_entries: usize,
    /// Longest value preview.
    pub value_preview_chars: usize,
}

impl PromptLimits {
    /// Limits taken from the run configuration.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            max_prompt_bytes: config.max_prompt_bytes,
            max_detail_entries: config.max_detail_entries,
            value_preview_chars: config.value_preview_chars,
        }
    }

    /// Lowers the byte ceiling to what the model's input window allows.
    #[must_use]
    pub fn capped_by(mut self, budget: &TokenBudget) -> Self {
        let budget_bytes = budget.max_user_prompt_bytes(SYSTEM_PROMPT);
        if budget_bytes < self.max_prompt_bytes {
            debug!(
                configured = self.max_prompt_bytes,
                budget_bytes, "Token budget lowers the prompt ceiling"
            );
            self.max_prompt_bytes = budget_bytes;
        }
        self
    }
}

/// Everything the builder renders.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    /// Campaign under analysis.
    pub campaign_id: i64,
    /// Requested window.
    pub date_range: &'a DateRange,
    /// Summary statistics.
    pub statistics: &'a Statistics,
    /// Net effect per field.
    pub net_changes: &'a [NetChange],
    /// Sessions in chronological order.
    pub sessions: &'a [ChangeSession],
    /// Limits to honour.
    pub limits: PromptLimits,
}

/// What was left out of the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Truncation {
    /// Entries not described individually.
    pub omitted_entries: usize,
    /// Session lines left out.
    pub omitted_sessions: usize,
}

impl Truncation {
    /// True when anything was left out.
    pub fn is_truncated(&self) -> bool {
        self.omitted_entries > 0 || self.omitted_sessions > 0
    }
}

/// A ready-to-send prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// System prompt.
    pub system: String,
    /// User payload.
    pub user: String,
    /// What was left out of the payload.
    pub truncation: Truncation,
}

impl Prompt {
    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.system.len() + self.user.len()
    }

    /// True when both parts are empty.
    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.user.is_empty()
    }
}

/// Builds the prompt, trimming detail entries and then session lines
/// oldest-first until the payload fits `limits.max_prompt_bytes`.
///
/// Fails with [`AnalysisError::PromptTooLarge`] when the fixed sections alone
/// exceed the ceiling.
pub fn build(input: &PromptInput<'_>) -> Result<Prompt, AnalysisError> {
    let ceiling = input.limits.max_prompt_bytes;
    let preview = input.limits.value_preview_chars;

    let head = render_head(input);
    let tail = render_instructions();

    let session_lines: Vec<String> = input
        .sessions
        .iter()
        .enumerate()
        .map(|(index, session)| session_line(index + 1, session))
        .collect();
    let entries: Vec<&ChangeEntry> = input
        .sessions
        .iter()
        .flat_map(|session| session.entries.iter())
        .collect();
    let detail_lines: Vec<String> = entries
        .iter()
        .map(|entry| detail_line(entry, preview))
        .collect();

    let assemble = |dropped_sessions: usize, dropped_entries: usize| {
        let mut user = String::with_capacity(head.len() + tail.len());
        user.push_str(&head);
        push_section(
            &mut user,
            "Change Sessions",
            &session_lines[dropped_sessions..],
            dropped_sessions,
            "sessions",
        );
        push_section(
            &mut user,
            "Change Details",
            &detail_lines[dropped_entries..],
            dropped_entries,
            "entries",
        );
        user.push_str(&tail);
        user
    };
    let fits = |dropped_sessions: usize, dropped_entries: usize| {
        assemble(dropped_sessions, dropped_entries).len() <= ceiling
    };

    let all_sessions = session_lines.len();
    let all_entries = detail_lines.len();
    let capped_entries = all_entries.saturating_sub(input.limits.max_detail_entries);

    let (dropped_sessions, dropped_entries) =
        if let Some(dropped) = smallest_fitting(capped_entries, all_entries, |d| fits(0, d)) {
            (0, dropped)
        } else if let Some(dropped) =
            smallest_fitting(0, all_sessions, |s| fits(s, all_entries))
        {
            (dropped, all_entries)
        } else {
            let required = assemble(all_sessions, all_entries).len();
            warn!(required, ceiling, "Fixed prompt sections exceed the ceiling");
            return Err(AnalysisError::PromptTooLarge { required, ceiling });
        };

    let truncation = Truncation {
        omitted_entries: dropped_entries,
        omitted_sessions: dropped_sessions,
    };
    let user = assemble(dropped_sessions, dropped_entries);

    if truncation.is_truncated() {
        warn!(
            omitted_entries = truncation.omitted_entries,
            omitted_sessions = truncation.omitted_sessions,
            "Prompt truncated to fit the ceiling"
        );
    }
    debug!(
        user_bytes = user.len(),
        ceiling,
        sessions = all_sessions - dropped_sessions,
        entries = all_entries - dropped_entries,
        "Built analysis prompt"
    );

    Ok(Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
        truncation,
    })
}

/// Smallest `n` in `lo..=hi` for which `fits(n)` holds, assuming dropping
/// more never makes the payload larger.
fn smallest_fitting(lo: usize, hi: usize, fits: impl Fn(usize) -> bool) -> Option<usize> {
    if !fits(hi) {
        return None;
    }
    let (mut lo, mut hi) = (lo, hi);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if fits(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Some(hi)
}

fn render_head(input: &PromptInput<'_>) -> String {
    let rendered = to_yaml(input.statistics).unwrap_or_else(|err| {
        warn!(error = %err, "Falling back to debug rendering of statistics");
        format!("{:#?}\n", input.statistics)
    });
    let statistics = rendered.trim_start_matches("---").trim_start_matches('\n');

    let mut head = String::new();
    let _ = writeln!(head, "Campaign ID: {}", input.campaign_id);
    let _ = writeln!(head, "Date range: {}", input.date_range);
    head.push_str("\n## Summary Statistics\n");
    head.push_str(statistics);
    if !statistics.ends_with('\n') {
        head.push('\n');
    }

    head.push_str("\n## Net Changes\n");
    if input.net_changes.is_empty() {
        head.push_str("No net changes.\n");
    }
    for change in input.net_changes {
        head.push_str(&net_change_line(change, input.limits.value_preview_chars));
        head.push('\n');
    }
    head
}

fn render_instructions() -> String {
    "\n## Instructions\nAnalyse the history above and respond with the JSON object described in \
     the system prompt: summary, key_insights, risk_factors and recommendations.\n"
        .to_string()
}

fn push_section(out: &mut String, title: &str, lines: &[String], omitted: usize, noun: &str) {
    let _ = write!(out, "\n## {title}\n");
    if omitted > 0 {
        let _ = writeln!(out, "({omitted} earlier {noun} omitted)");
    }
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
}

fn net_change_line(change: &NetChange, preview: usize) -> String {
    let mut line = format!(
        "- {} #{} {}: {} -> {} ({} modification{})",
        display_name(&change.table),
        change.entity_id,
        change.field_name,
        value_preview(change.initial_value.as_deref(), preview),
        value_preview(change.final_value.as_deref(), preview),
        change.modifications,
        if change.modifications == 1 { "" } else { "s" },
    );
    if change.is_noop() {
        line.push_str(", reverted");
    }
    line
}

fn session_line(number: usize, session: &ChangeSession) -> String {
    let tables: Vec<String> = session.tables().into_iter().map(display_name).collect();
    format!(
        "{number}. {} to {} | actor: {} | {} change{} | tables: {} | fields: {}",
        session.start_time.format(TIME_FORMAT),
        session.end_time.format(TIME_FORMAT),
        session.primary_actor,
        session.entry_count,
        if session.entry_count == 1 { "" } else { "s" },
        tables.join(", "),
        session.field_names().join(", "),
    )
}

fn detail_line(entry: &ChangeEntry, preview: usize) -> String {
    format!(
        "- {} | {} | {} #{} | {}: {} -> {}",
        entry.update_time.format(TIME_FORMAT),
        entry.actor_or_unknown(),
        display_name(&entry.table_origin),
        entry.entity_id,
        entry.field_name,
        value_preview(entry.old_value.as_deref(), preview),
        value_preview(entry.new_value.as_deref(), preview),
    )
}
