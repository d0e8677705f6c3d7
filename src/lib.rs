//! # campaign-analyzer
//!
//! Turns the raw change-log rows of an advertising campaign into an
//! explanation of what happened to it.
//!
//! Rows from several change-log tables are normalized into a single
//! [`ChangeEntry`](changes::ChangeEntry) shape, grouped into editing sessions,
//! summarised as statistics and net changes, and sent to a text-generation
//! model whose answer is parsed into a
//! [`CampaignAnalysisResponse`](llm::CampaignAnalysisResponse).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//!
//! use campaign_analyzer::llm::OpenAiClient;
//! use campaign_analyzer::request::AnalysisRequest;
//! use campaign_analyzer::{analyze, AnalysisConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let request = AnalysisRequest::parse(
//!     "42",
//!     "2024-03-01",
//!     "2024-03-31",
//!     vec!["sp_campaign_details_v2_changes_log".to_string()],
//! )?;
//! let rows = BTreeMap::new();
//! let client = OpenAiClient::from_env(None, None)?;
//! let outcome = analyze(&rows, &request, &client, &AnalysisConfig::default()).await?;
//! println!("{}", outcome.response.summary);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod changes;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod utils;

pub use crate::cli::Cli;
pub use crate::config::AnalysisConfig;
pub use crate::error::AnalysisError;
pub use crate::pipeline::{analyze, AnalysisOutcome};

/// The current version of campaign-analyzer.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
