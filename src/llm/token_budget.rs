//! Token estimation and budget checks for generation requests.
//!
//! A character heuristic estimates token counts so the prompt builder can
//! size the user payload to the model's input window before any request is
//! sent.

use crate::llm::client::ClientMetadata;

/// Approximate characters per token for heuristic estimation.
const CHARS_PER_TOKEN: f64 = 3.5;

/// Safety margin multiplier applied to token estimates.
const SAFETY_MARGIN: f64 = 1.10;

/// Tokens held back from the payload budget to absorb rounding.
const ROUNDING_TOKENS: usize = 1;

/// Estimates the token count of a string.
#[must_use]
pub(crate) fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_from_char_count(text.len())
}

/// Estimates the token count of a string of `char_count` bytes.
#[must_use]
pub(crate) fn estimate_tokens_from_char_count(char_count: usize) -> usize {
    let raw_estimate = char_count as f64 / CHARS_PER_TOKEN;
    (raw_estimate * SAFETY_MARGIN).ceil() as usize
}

/// Largest byte count whose estimate stays within `tokens`.
fn char_count_for_tokens(tokens: usize) -> usize {
    (tokens as f64 / SAFETY_MARGIN * CHARS_PER_TOKEN).floor() as usize
}

/// Estimated usage of a prompt against the budget.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenEstimate {
    /// Estimated prompt tokens (system + user).
    pub estimated_tokens: usize,
    /// Input tokens available for this model.
    pub available_tokens: usize,
    /// Utilization percentage (0.0 to 100.0+).
    pub utilization_pct: f64,
}

/// Token budget derived from client metadata.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    max_context_length: usize,
    reserved_output_tokens: usize,
}

impl TokenBudget {
    /// Creates a token budget from client metadata.
    #[must_use]
    pub fn from_metadata(metadata: &ClientMetadata) -> Self {
        Self {
            max_context_length: metadata.max_context_length,
            reserved_output_tokens: metadata.max_response_length,
        }
    }

    /// Input tokens left after reserving the response.
    #[must_use]
    pub fn available_input_tokens(&self) -> usize {
        self.max_context_length
            .saturating_sub(self.reserved_output_tokens)
    }

    /// Largest user payload, in bytes, that fits beside `system_prompt`.
    #[must_use]
    pub fn max_user_prompt_bytes(&self, system_prompt: &str) -> usize {
        let remaining = self
            .available_input_tokens()
            .saturating_sub(estimate_tokens(system_prompt))
            .saturating_sub(ROUNDING_TOKENS);
        char_count_for_tokens(remaining)
    }

    /// Estimates how much of the budget a prompt uses.
    #[must_use]
    pub fn estimate(&self, system_prompt: &str, user_prompt: &str) -> TokenEstimate {
        let estimated_tokens = estimate_tokens(system_prompt) + estimate_tokens(user_prompt);
        let available_tokens = self.available_input_tokens();
        let utilization_pct = if available_tokens > 0 {
            (estimated_tokens as f64 / available_tokens as f64) * 100.0
        } else {
            f64::INFINITY
        };
        TokenEstimate {
            estimated_tokens,
            available_tokens,
            utilization_pct,
        }
    }
}
