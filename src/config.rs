//! Pipeline configuration.
//!
//! Everything the pipeline tunes is carried in one [`AnalysisConfig`] value
//! passed to [`analyze`](crate::pipeline::analyze). The CLI builds it from the
//! `analysis` section of the settings file and its own flags.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::utils::settings::Settings;

/// Default session gap.
pub const DEFAULT_SESSION_GAP_MINUTES: u64 = 5;

/// Default payload ceiling for the generation request.
pub const DEFAULT_MAX_PROMPT_BYTES: usize = 60_000;

/// Default number of individual entries described in the prompt.
pub const DEFAULT_MAX_DETAIL_ENTRIES: usize = 500;

/// Default generation timeout.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 600;

/// Default length of value previews.
pub const DEFAULT_VALUE_PREVIEW_CHARS: usize = 100;

/// Fields that are bookkeeping, not campaign changes.
pub const DEFAULT_SKIP_FIELDS: &[&str] = &["update_time", "performer", "update_user"];

/// Shortest value preview that still leaves room for the ellipsis.
const MIN_VALUE_PREVIEW_CHARS: usize = 4;

/// Tuning for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Longest pause, in minutes, that still continues a session.
    pub session_gap_minutes: u64,
    /// Ceiling on the generation payload, in bytes.
    pub max_prompt_bytes: usize,
    /// Ceiling on the number of entries described individually.
    pub max_detail_entries: usize,
    /// How long to wait for the generation capability.
    pub generation_timeout_secs: u64,
    /// Longest value shown in the prompt and on screen.
    pub value_preview_chars: usize,
    /// Field names dropped during normalization.
    pub skip_fields: BTreeSet<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            session_gap_minutes: DEFAULT_SESSION_GAP_MINUTES,
            max_prompt_bytes: DEFAULT_MAX_PROMPT_BYTES,
            max_detail_entries: DEFAULT_MAX_DETAIL_ENTRIES,
            generation_timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
            value_preview_chars: DEFAULT_VALUE_PREVIEW_CHARS,
            skip_fields: DEFAULT_SKIP_FIELDS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl AnalysisConfig {
    /// Loads the `analysis` section of the settings file, or defaults.
    pub fn load() -> Result<Self> {
        Ok(Settings::load()?.analysis.unwrap_or_default())
    }

    /// Session gap as a chrono duration.
    pub fn session_gap(&self) -> chrono::Duration {
        i64::try_from(self.session_gap_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Generation timeout.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Rejects settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.max_prompt_bytes == 0 {
            return Err(AnalysisError::InvalidRequest(
                "max_prompt_bytes must be greater than zero".to_string(),
            ));
        }
        if self.generation_timeout_secs == 0 {
            return Err(AnalysisError::InvalidRequest(
                "generation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.value_preview_chars < MIN_VALUE_PREVIEW_CHARS {
            return Err(AnalysisError::InvalidRequest(format!(
                "value_preview_chars must be at least {MIN_VALUE_PREVIEW_CHARS}"
            )));
        }
        Ok(())
    }
}
