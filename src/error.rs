//! Analysis pipeline error handling.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while turning change-log rows into an analysis.
///
/// Only [`EmptyResult`](Self::EmptyResult),
/// [`InvalidRequest`](Self::InvalidRequest) and
/// [`PromptTooLarge`](Self::PromptTooLarge) ever reach the caller of
/// [`analyze`](crate::pipeline::analyze). The remaining variants are recovered
/// inside the pipeline: malformed rows are dropped and reported, generation
/// and parse failures become a degraded response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A raw row could not be mapped to a change entry.
    #[error("Malformed row in {table}: {reason}")]
    MalformedRow {
        /// Source table of the row.
        table: String,
        /// Why the row was rejected.
        reason: String,
    },

    /// No change entries survived normalization.
    #[error("No changes found for campaign ID {campaign_id}")]
    EmptyResult {
        /// Campaign that was analysed.
        campaign_id: i64,
    },

    /// The analysis request failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The fixed part of the prompt does not fit the size ceiling.
    #[error("Prompt too large: fixed sections need {required} bytes but the ceiling is {ceiling}")]
    PromptTooLarge {
        /// Bytes needed by the sections that are never truncated.
        required: usize,
        /// Effective payload ceiling.
        ceiling: usize,
    },

    /// The generation call did not complete in time.
    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    /// The generation call failed before producing text.
    #[error("Generation request failed: {0}")]
    GenerationTransport(String),

    /// The generated text could not be interpreted.
    #[error("Failed to parse analysis response: {0}")]
    ResponseParse(String),
}
