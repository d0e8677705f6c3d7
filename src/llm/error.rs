//! Generation client errors.

use thiserror::Error;

/// Errors raised by HTTP generation clients.
#[derive(Error, Debug)]
pub enum LlmError {
    /// API key not found in the environment or settings.
    #[error("OpenAI API key not found. Set OPENAI_API_KEY or add it to the env section of the settings file")]
    ApiKeyNotFound,

    /// The API answered with a non-success status.
    #[error("Generation API request failed: {0}")]
    ApiRequestFailed(String),

    /// The API answered with a body the client cannot read.
    #[error("Invalid response format from generation API: {0}")]
    InvalidResponseFormat(String),

    /// The request could not be delivered.
    #[error("Network error: {0}")]
    NetworkError(String),
}
