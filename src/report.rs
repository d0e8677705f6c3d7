//! Rendering of analysis outcomes for the terminal and for machines.

use std::fmt;

use anyhow::{Context, Result};

use crate::analysis::Statistics;
use crate::changes::schema::display_name;
use crate::changes::ChangeSession;
use crate::data::to_yaml;
use crate::llm::{AnalysisQuality, CampaignAnalysisResponse};
use crate::pipeline::AnalysisOutcome;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Number of fields listed under "Most changed fields".
const TOP_FIELDS: usize = 5;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Output format for analysis results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text format.
    #[default]
    Text,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

/// Renders an outcome in the requested format.
pub fn render(outcome: &AnalysisOutcome, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_outcome_text(outcome)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(outcome).context("Failed to serialize outcome to JSON")
        }
        OutputFormat::Yaml => to_yaml(outcome).context("Failed to serialize outcome to YAML"),
    }
}

/// Formats a whole outcome as text.
pub fn format_outcome_text(outcome: &AnalysisOutcome) -> String {
    let mut out = format!(
        "Campaign {} | {}\n\n",
        outcome.campaign_id, outcome.date_range
    );
    out.push_str(&format_statistics_text(&outcome.statistics));
    out.push('\n');
    out.push_str(&format_sessions_text(&outcome.sessions));
    out.push('\n');
    out.push_str(&format_analysis_text(&outcome.response));

    let mut notes = Vec::new();
    if !outcome.malformed.is_empty() {
        notes.push(format!(
            "{} row(s) could not be read and were skipped",
            outcome.malformed.len()
        ));
    }
    if outcome.truncation.is_truncated() {
        notes.push(format!(
            "The analysis saw {} fewer entries and {} fewer sessions than shown above",
            outcome.truncation.omitted_entries, outcome.truncation.omitted_sessions
        ));
    }
    if !notes.is_empty() {
        out.push('\n');
        for note in notes {
            out.push_str(&format!("⚠️  {note}\n"));
        }
    }
    out
}

/// Formats summary statistics as text.
pub fn format_statistics_text(statistics: &Statistics) -> String {
    let mut out = format!(
        "{RULE}\nSummary: {} changes in {} sessions over {} day(s)\n",
        statistics.total_entries, statistics.total_sessions, statistics.date_range_days
    );
    out.push_str(&format!(
        "  {:.1} changes per session, {:.1} changes per day\n",
        statistics.average_entries_per_session, statistics.changes_per_day
    ));
    if let Some(actor) = &statistics.most_active_actor {
        out.push_str(&format!(
            "  Most active user: {} ({} changes)\n",
            actor.name, actor.count
        ));
    }

    out.push_str("\nChanges by table:\n");
    for table in &statistics.table_counts {
        out.push_str(&format!(
            "  {:<32} {:>5}  {:>5.1}%\n",
            display_name(&table.name),
            table.count,
            share(table.count, statistics.total_entries)
        ));
    }

    out.push_str("\nMost changed fields:\n");
    for field in statistics.top_fields(TOP_FIELDS) {
        out.push_str(&format!("  {:<32} {:>5}\n", field.name, field.count));
    }
    out
}

/// Formats the session list as text.
pub fn format_sessions_text(sessions: &[ChangeSession]) -> String {
    let mut out = format!("{RULE}\nSessions:\n");
    for (index, session) in sessions.iter().enumerate() {
        let tables: Vec<String> = session.tables().into_iter().map(display_name).collect();
        out.push_str(&format!(
            "  #{} {} to {} ({} min) by {}: {} change(s) in {}\n",
            index + 1,
            session.start_time.format(TIME_FORMAT),
            session.end_time.format(TIME_FORMAT),
            session.duration().num_minutes(),
            session.primary_actor,
            session.entry_count,
            tables.join(", ")
        ));
        out.push_str(&format!("     fields: {}\n", session.field_names().join(", ")));
    }
    out
}

/// Formats the generated analysis as text.
pub fn format_analysis_text(response: &CampaignAnalysisResponse) -> String {
    let mut out = format!("{RULE}\nAnalysis ({}):\n", quality_label(response.quality));
    if let Some(reason) = &response.degraded_reason {
        out.push_str(&format!("  Unavailable: {reason}\n"));
    }

    out.push_str("\nSummary:\n");
    for line in response.summary.lines() {
        out.push_str(&format!("  {line}\n"));
    }

    for (title, items) in [
        ("Key Insights", &response.key_insights),
        ("Risk Factors", &response.risk_factors),
        ("Recommendations", &response.recommendations),
    ] {
        out.push_str(&format!("\n{title}:\n"));
        if items.is_empty() {
            out.push_str("  (none)\n");
        }
        for item in items {
            out.push_str(&format!("  • {item}\n"));
        }
    }

    if response.quality == AnalysisQuality::Partial && !response.missing_fields.is_empty() {
        out.push_str(&format!(
            "\nNot provided by the model: {}\n",
            response.missing_fields.join(", ")
        ));
    }
    out
}

/// Short label for a response quality.
pub fn quality_label(quality: AnalysisQuality) -> &'static str {
    match quality {
        AnalysisQuality::Complete => "complete",
        AnalysisQuality::Partial => "partial",
        AnalysisQuality::Degraded => "degraded",
    }
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}
