//! Generation client trait and shared helpers.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::llm::error::LlmError;
use crate::llm::prompts::Prompt;

/// HTTP request timeout for generation API calls.
///
/// Matches the default generation timeout; the pipeline applies its own
/// configured deadline on top.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Metadata about a generation client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientMetadata {
    /// Service provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Context window in tokens.
    pub max_context_length: usize,
    /// Tokens reserved for the response.
    pub max_response_length: usize,
}

/// Text-generation capability used by the pipeline.
pub trait GenerationClient: Send + Sync {
    /// Sends a request and returns the raw response text.
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Returns metadata about the client.
    fn get_metadata(&self) -> ClientMetadata;
}

/// Runs one generation call under `timeout`.
///
/// Errors from the client become [`AnalysisError::GenerationTransport`]; an
/// expired deadline becomes [`AnalysisError::GenerationTimeout`].
pub async fn generate(
    client: &dyn GenerationClient,
    prompt: &Prompt,
    timeout: Duration,
) -> Result<String, AnalysisError> {
    let metadata = client.get_metadata();
    info!(
        provider = %metadata.provider,
        model = %metadata.model,
        payload_bytes = prompt.len(),
        timeout_secs = timeout.as_secs(),
        "Requesting campaign analysis"
    );

    match tokio::time::timeout(timeout, client.send_request(&prompt.system, &prompt.user)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(AnalysisError::GenerationTransport(format!("{err:#}"))),
        Err(_) => Err(AnalysisError::GenerationTimeout(timeout)),
    }
}

/// Builds an HTTP client with the standard request timeout.
pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Checks an HTTP response for an error status.
///
/// On failure, reads the error body and returns
/// [`LlmError::ApiRequestFailed`].
pub(crate) async fn check_error_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_else(|e| {
        debug!("Failed to read error response body: {e}");
        String::new()
    });
    Err(LlmError::ApiRequestFailed(format!("HTTP {status}: {error_text}")).into())
}

/// Logs successful text extraction from a generation API response.
pub(crate) fn log_response_success(provider: &str, result: &Result<String>) {
    if let Ok(text) = result {
        debug!(
            response_len = text.len(),
            "Successfully extracted text content from {} API response", provider
        );
        debug!(response_content = %text, "{} API response content", provider);
    }
}
