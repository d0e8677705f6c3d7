//! Shared test utilities for the `llm` module.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;

use crate::llm::client::{ClientMetadata, GenerationClient};

/// Generation client that replays queued responses.
///
/// Each call pops the next response, or fails once the queue is empty. The
/// prompts it receives are kept for [`PromptRecordHandle`]. An optional
/// delay lets tests drive the generation timeout.
pub(crate) struct ConfigurableMockClient {
    responses: Mutex<VecDeque<Result<String>>>,
    metadata: ClientMetadata,
    recorded_prompts: Arc<Mutex<Vec<(String, String)>>>,
    delay: Option<Duration>,
}

impl ConfigurableMockClient {
    /// Creates a mock client that returns the given responses in order.
    pub(crate) fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            metadata: ClientMetadata {
                provider: "Mock".to_string(),
                model: "mock-model".to_string(),
                max_context_length: 200_000,
                max_response_length: 8_192,
            },
            recorded_prompts: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Returns the client with a custom context window size.
    pub(crate) fn with_context_length(mut self, max_context_length: usize) -> Self {
        self.metadata.max_context_length = max_context_length;
        self
    }

    /// Returns the client with every response delayed by `delay`.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns a handle for inspecting the prompts that were sent.
    pub(crate) fn prompt_handle(&self) -> PromptRecordHandle {
        PromptRecordHandle {
            recorded_prompts: self.recorded_prompts.clone(),
        }
    }
}

/// Shared handle to a mock client's recorded prompts.
pub(crate) struct PromptRecordHandle {
    recorded_prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl PromptRecordHandle {
    /// `(system, user)` pairs in call order.
    pub(crate) fn prompts(&self) -> Vec<(String, String)> {
        self.recorded_prompts.lock().unwrap().clone()
    }

    /// Calls made so far.
    pub(crate) fn request_count(&self) -> usize {
        self.recorded_prompts.lock().unwrap().len()
    }
}

impl GenerationClient for ConfigurableMockClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        self.recorded_prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        let next = self.responses.lock().unwrap().pop_front();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            next.unwrap_or_else(|| Err(anyhow::anyhow!("mock response queue is empty")))
        })
    }

    fn get_metadata(&self) -> ClientMetadata {
        self.metadata.clone()
    }
}
