//! End-to-end analysis of one campaign's change history.
//!
//! rows -> normalize -> group -> statistics and net changes -> prompt ->
//! generation -> parse. Everything before the generation call can fail the
//! run; nothing after it does.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::{compute, net_changes, NetChange, Statistics};
use crate::changes::{normalize_batch, ChangeSession, MalformedRow, RawRow, SessionGrouper};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::llm::{
    self, generate, CampaignAnalysisResponse, GenerationClient, Prompt, PromptInput, PromptLimits,
    TokenBudget, Truncation,
};
use crate::request::{AnalysisRequest, DateRange};

/// Everything derived from the rows before the generation call.
#[derive(Debug, Clone)]
pub struct PreparedAnalysis {
    /// Sessions in chronological order.
    pub sessions: Vec<ChangeSession>,
    /// Summary statistics.
    pub statistics: Statistics,
    /// Net effect per field.
    pub net_changes: Vec<NetChange>,
    /// Prompt ready to send.
    pub prompt: Prompt,
    /// Rows dropped during normalization.
    pub malformed: Vec<MalformedRow>,
    /// Rows whose field is configured to be ignored.
    pub skipped: usize,
}

/// Result of a completed analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    /// Campaign analysed.
    pub campaign_id: i64,
    /// Requested window.
    pub date_range: DateRange,
    /// Summary statistics.
    pub statistics: Statistics,
    /// Net effect per field.
    pub net_changes: Vec<NetChange>,
    /// Sessions in chronological order.
    pub sessions: Vec<ChangeSession>,
    /// Generated analysis, possibly degraded.
    pub response: CampaignAnalysisResponse,
    /// Rows dropped during normalization.
    pub malformed: Vec<MalformedRow>,
    /// Rows whose field is configured to be ignored.
    pub skipped: usize,
    /// What the prompt left out.
    pub truncation: Truncation,
}

/// Runs every step up to, but excluding, the generation call.
///
/// `budget` further caps the prompt ceiling when the target model is known.
pub fn prepare(
    rows_by_table: &BTreeMap<String, Vec<RawRow>>,
    request: &AnalysisRequest,
    budget: Option<&TokenBudget>,
    config: &AnalysisConfig,
) -> Result<PreparedAnalysis, AnalysisError> {
    config.validate()?;

    let report = normalize_batch(rows_by_table, &config.skip_fields);
    if !report.malformed.is_empty() {
        warn!(
            malformed = report.malformed.len(),
            "Some change rows could not be read"
        );
    }
    if report.entries.is_empty() {
        return Err(AnalysisError::EmptyResult {
            campaign_id: request.campaign_id,
        });
    }

    let sessions = SessionGrouper::new(config.session_gap()).group(&report.entries);
    let statistics = compute(&report.entries, &sessions);
    let net_changes = net_changes(&report.entries);
    info!(
        campaign_id = request.campaign_id,
        entries = statistics.total_entries,
        sessions = statistics.total_sessions,
        net_changes = net_changes.len(),
        "Prepared change history"
    );

    let limits = PromptLimits::from_config(config);
    let limits = match budget {
        Some(budget) => limits.capped_by(budget),
        None => limits,
    };
    let prompt = llm::build(&PromptInput {
        campaign_id: request.campaign_id,
        date_range: &request.date_range,
        statistics: &statistics,
        net_changes: &net_changes,
        sessions: &sessions,
        limits,
    })?;

    Ok(PreparedAnalysis {
        sessions,
        statistics,
        net_changes,
        prompt,
        malformed: report.malformed,
        skipped: report.skipped,
    })
}

/// Analyses the rows of one campaign.
///
/// Fails only with [`AnalysisError::InvalidRequest`],
/// [`AnalysisError::EmptyResult`] or [`AnalysisError::PromptTooLarge`].
/// Generation timeouts, transport errors and unreadable responses produce
/// a degraded [`CampaignAnalysisResponse`] instead.
pub async fn analyze(
    rows_by_table: &BTreeMap<String, Vec<RawRow>>,
    request: &AnalysisRequest,
    client: &dyn GenerationClient,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, AnalysisError> {
    let budget = TokenBudget::from_metadata(&client.get_metadata());
    let prepared = prepare(rows_by_table, request, Some(&budget), config)?;
    let estimate = budget.estimate(&prepared.prompt.system, &prepared.prompt.user);
    debug!(
        estimated_tokens = estimate.estimated_tokens,
        available_tokens = estimate.available_tokens,
        utilization_pct = estimate.utilization_pct,
        "Sending analysis prompt"
    );

    let response = match generate(client, &prepared.prompt, config.generation_timeout()).await {
        Ok(text) => llm::parse(&text),
        Err(err) => {
            warn!(error = %err, "Generation failed, returning degraded analysis");
            CampaignAnalysisResponse::degraded(err.to_string())
        }
    };
    info!(quality = ?response.quality, "Campaign analysis finished");

    Ok(AnalysisOutcome {
        campaign_id: request.campaign_id,
        date_range: request.date_range,
        statistics: prepared.statistics,
        net_changes: prepared.net_changes,
        sessions: prepared.sessions,
        response,
        malformed: prepared.malformed,
        skipped: prepared.skipped,
        truncation: prepared.prompt.truncation,
    })
}
