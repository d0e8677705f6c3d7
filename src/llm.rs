//! Text-generation integration: prompts, clients and response parsing.

pub mod client;
pub mod error;
pub mod openai;
pub mod prompts;
pub mod response;
pub mod token_budget;

#[cfg(test)]
pub(crate) mod test_utils;

pub use client::{generate, ClientMetadata, GenerationClient};
pub use error::LlmError;
pub use openai::OpenAiClient;
pub use prompts::{build, Prompt, PromptInput, PromptLimits, Truncation, SYSTEM_PROMPT};
pub use response::{parse, AnalysisQuality, CampaignAnalysisResponse};
pub use token_budget::{TokenBudget, TokenEstimate};
