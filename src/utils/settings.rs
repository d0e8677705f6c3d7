//! The user settings file.
//!
//! `$HOME/.campaign-analyzer/settings.json` holds an `env` map consulted when
//! a variable is missing from the process environment, and an optional
//! `analysis` section with pipeline tuning.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::config::AnalysisConfig;

/// Settings loaded from $HOME/.campaign-analyzer/settings.json.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Environment variable overrides.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Pipeline tuning.
    #[serde(default)]
    pub analysis: Option<AnalysisConfig>,
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Self::load_from_path(&settings_path)
    }

    /// Loads settings from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Returns the default settings path.
    pub fn get_settings_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

        Ok(home_dir.join(".campaign-analyzer").join("settings.json"))
    }

    /// Reads `key` from the process environment, or from the `env` map.
    pub fn get_env_var(&self, key: &str) -> Option<String> {
        env::var(key).ok().or_else(|| self.env.get(key).cloned())
    }
}

/// Looks `key` up in the process environment, then in the settings file.
pub fn get_env_var(key: &str) -> Result<String> {
    if let Ok(value) = env::var(key) {
        return Ok(value);
    }
    Settings::load()
        .with_context(|| format!("Environment variable not found: {key}"))?
        .get_env_var(key)
        .ok_or_else(|| anyhow!("Environment variable not found: {key}"))
}

/// Returns the first of `keys` that is set, checking each in order.
pub fn get_env_vars(keys: &[&str]) -> Result<String> {
    keys.iter()
        .find_map(|key| get_env_var(key).ok())
        .ok_or_else(|| anyhow!("None of the environment variables found: {}", keys.join(", ")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn settings_load_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");

        let settings_json = r#"{
            "env": {
                "OPENAI_MODEL": "gpt-4o-mini",
                "CAMPAIGN_ANALYZER_TEST_KEY": "from_settings"
            },
            "analysis": {
                "session_gap_minutes": 15
            }
        }"#;
        fs::write(&settings_path, settings_json).unwrap();

        let settings = Settings::load_from_path(&settings_path).unwrap();

        assert_eq!(settings.env.get("OPENAI_MODEL").unwrap(), "gpt-4o-mini");
        let analysis = settings.analysis.unwrap();
        assert_eq!(analysis.session_gap_minutes, 15);
        assert_eq!(
            analysis.max_prompt_bytes,
            AnalysisConfig::default().max_prompt_bytes
        );
    }

    #[test]
    fn settings_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from_path(temp_dir.path().join("absent.json")).unwrap();
        assert!(settings.env.is_empty());
        assert!(settings.analysis.is_none());
    }

    #[test]
    fn settings_invalid_json_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");
        fs::write(&settings_path, "{ not json").unwrap();

        let err = Settings::load_from_path(&settings_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn missing_variables_are_named() {
        let err = get_env_vars(&[
            "CAMPAIGN_ANALYZER_UNSET_ONE",
            "CAMPAIGN_ANALYZER_UNSET_TWO",
        ])
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("CAMPAIGN_ANALYZER_UNSET_ONE, CAMPAIGN_ANALYZER_UNSET_TWO"));
    }

    #[test]
    fn settings_get_env_var_falls_back_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");
        fs::write(
            &settings_path,
            r#"{ "env": { "CAMPAIGN_ANALYZER_SETTINGS_ONLY": "from_settings" } }"#,
        )
        .unwrap();

        let settings = Settings::load_from_path(&settings_path).unwrap();

        assert_eq!(
            settings.get_env_var("CAMPAIGN_ANALYZER_SETTINGS_ONLY").unwrap(),
            "from_settings"
        );
        assert!(settings
            .get_env_var("CAMPAIGN_ANALYZER_DEFINITELY_UNSET")
            .is_none());
    }
}
