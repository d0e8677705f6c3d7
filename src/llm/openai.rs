//! OpenAI-compatible chat completions client (OpenAI, Ollama and similar).

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::llm::client::{
    build_http_client, check_error_response, log_response_success, ClientMetadata,
    GenerationClient,
};
use crate::llm::error::LlmError;
use crate::utils::settings::get_env_vars;

/// Default OpenAI endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Upper bound on response tokens; the analysis is a short JSON document.
const ANALYSIS_MAX_TOKENS: usize = 4_096;

/// Model families that reject `max_tokens` and `temperature`.
const REASONING_PREFIXES: &[&str] = &["gpt-5", "o1", "o3", "o4"];

/// Limits for models without a known entry.
const FALLBACK_LIMITS: (usize, usize) = (32_768, 4_096);

/// Known model families: (prefix, input context, max output tokens).
/// Longer prefixes are listed before the families they refine.
const MODEL_LIMITS: &[(&str, usize, usize)] = &[
    ("gpt-5", 400_000, 128_000),
    ("gpt-4.1", 1_047_576, 32_768),
    ("gpt-4o-mini", 128_000, 16_384),
    ("gpt-4o", 128_000, 16_384),
    ("gpt-4-turbo", 128_000, 4_096),
    ("gpt-4", 8_192, 4_096),
    ("gpt-3.5-turbo", 16_385, 4_096),
    ("o1", 200_000, 100_000),
    ("o3", 200_000, 100_000),
    ("llama3", 8_192, 2_048),
];

/// Returns (input context, max output tokens) for a model.
pub fn model_limits(model: &str) -> (usize, usize) {
    MODEL_LIMITS
        .iter()
        .find(|(prefix, _, _)| model.starts_with(prefix))
        .map_or(FALLBACK_LIMITS, |(_, context, output)| (*context, *output))
}

#[derive(Serialize, Debug)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Serialize, Debug)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize, Debug)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct Usage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

/// OpenAI-compatible generation client.
pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    temperature: Option<f32>,
}

impl OpenAiClient {
    /// Creates a client for `model` at `base_url`.
    pub fn new(model: String, api_key: Option<String>, base_url: String) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            api_key,
            model,
            base_url,
            temperature: Some(0.1),
        })
    }

    /// Creates a client from `OPENAI_API_KEY`, `OPENAI_MODEL` and
    /// `OPENAI_BASE_URL`, falling back to the settings file.
    ///
    /// Explicit arguments win over the environment. A key is required only
    /// for the default OpenAI endpoint.
    pub fn from_env(model: Option<String>, base_url: Option<String>) -> Result<Self> {
        let model = model
            .or_else(|| get_env_vars(&["OPENAI_MODEL"]).ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url
            .or_else(|| get_env_vars(&["OPENAI_BASE_URL", "OPENAI_API_BASE"]).ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = get_env_vars(&["OPENAI_API_KEY", "OPENAI_AUTH_TOKEN"]).ok();

        if api_key.is_none() && base_url == DEFAULT_BASE_URL {
            return Err(LlmError::ApiKeyNotFound.into());
        }

        debug!(model = %model, base_url = %base_url, has_key = api_key.is_some(), "Configured OpenAI-compatible client");
        Self::new(model, api_key, base_url)
    }

    /// Builds the chat completions URL.
    fn get_api_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| LlmError::NetworkError(format!("Invalid base URL: {e}")))?;

        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }

        let full_url = url
            .join("v1/chat/completions")
            .map_err(|e| LlmError::NetworkError(format!("Failed to build API URL: {e}")))?;

        debug!(base_url = %self.base_url, full_url = %full_url, "Constructed OpenAI-compatible API URL");
        Ok(full_url)
    }

    /// True for a local or keyless endpoint.
    fn is_ollama(&self) -> bool {
        self.base_url.contains("localhost")
            || self.base_url.contains("127.0.0.1")
            || self.api_key.is_none()
    }

    /// Reasoning model families take `max_completion_tokens` and no
    /// temperature.
    fn is_reasoning_model(&self) -> bool {
        REASONING_PREFIXES
            .iter()
            .any(|prefix| self.model.starts_with(prefix))
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(Message {
                role: "system",
                content: system_prompt.to_string(),
            });
        }
        messages.push(Message {
            role: "user",
            content: user_prompt.to_string(),
        });

        let max_tokens = model_limits(&self.model).1.min(ANALYSIS_MAX_TOKENS);
        let reasoning = self.is_reasoning_model();
        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: (!reasoning).then_some(max_tokens),
            max_completion_tokens: reasoning.then_some(max_tokens),
            temperature: if reasoning { None } else { self.temperature },
            response_format: ResponseFormat {
                kind: "json_object",
            },
            stream: false,
        }
    }
}

impl GenerationClient for OpenAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let request = self.build_request(system_prompt, user_prompt);
            debug!(
                system_prompt_len = system_prompt.len(),
                user_prompt_len = user_prompt.len(),
                max_tokens = ?request.max_tokens.or(request.max_completion_tokens),
                temperature = ?request.temperature,
                "Built OpenAI-compatible request payload"
            );

            let api_url = self.get_api_url()?;
            info!(url = %api_url, model = %self.model, "Sending request to OpenAI-compatible API");

            let mut req_builder = self
                .client
                .post(api_url)
                .header("Content-Type", "application/json")
                .json(&request);
            if let Some(ref api_key) = self.api_key {
                req_builder = req_builder.header("Authorization", format!("Bearer {api_key}"));
            }

            let response = req_builder
                .send()
                .await
                .map_err(|e| LlmError::NetworkError(e.to_string()))?;
            let response = check_error_response(response).await?;

            let chat_response: ChatResponse = response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponseFormat(e.to_string()))?;

            debug!(
                choice_count = chat_response.choices.len(),
                model = ?chat_response.model,
                usage = ?chat_response.usage,
                "Received OpenAI-compatible API response"
            );

            let result = chat_response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| {
                    LlmError::InvalidResponseFormat("No message content in response".to_string())
                        .into()
                });

            log_response_success("OpenAI-compatible", &result);
            result
        })
    }

    fn get_metadata(&self) -> ClientMetadata {
        let (max_context_length, max_response_length) = model_limits(&self.model);
        ClientMetadata {
            provider: if self.is_ollama() { "Ollama" } else { "OpenAI" }.to_string(),
            model: self.model.clone(),
            max_context_length,
            max_response_length: max_response_length.min(ANALYSIS_MAX_TOKENS),
        }
    }
}
