//! Analyze command.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::warn;

use crate::changes::SUPPORTED_TABLES;
use crate::config::AnalysisConfig;
use crate::data::{fetch_rows_by_table, JsonFileRowSource};
use crate::llm::{ClientMetadata, GenerationClient, OpenAiClient, Prompt};
use crate::pipeline;
use crate::report::{self, OutputFormat};
use crate::request::AnalysisRequest;

/// Analyze command options.
#[derive(Parser)]
pub struct AnalyzeCommand {
    /// JSON file mapping change-log table names to arrays of row objects.
    #[arg(long, value_name = "FILE")]
    pub rows: PathBuf,

    /// Campaign to analyse.
    #[arg(long, value_name = "ID")]
    pub campaign_id: String,

    /// First day of the window (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub from: String,

    /// Last day of the window (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub to: String,

    /// Change-log table to read. Repeat for several tables; defaults to all
    /// supported tables.
    #[arg(long = "table", value_name = "TABLE")]
    pub tables: Vec<String>,

    /// Idle minutes that end a session.
    #[arg(long, value_name = "MINUTES")]
    pub gap_minutes: Option<u64>,

    /// Model to use (overrides OPENAI_MODEL).
    #[arg(long)]
    pub model: Option<String>,

    /// OpenAI-compatible endpoint (overrides OPENAI_BASE_URL).
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Seconds to wait for the model before giving up.
    #[arg(long, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Upper bound on the prompt payload in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_prompt_bytes: Option<usize>,

    /// Output format: text, json or yaml.
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Prints the prompt that would be sent and exits without calling the model.
    #[arg(long)]
    pub dry_run: bool,
}

impl AnalyzeCommand {
    /// Executes the analyze command.
    pub async fn execute(self) -> Result<()> {
        let format: OutputFormat = self.format.parse().map_err(|()| {
            anyhow!(
                "Unsupported output format '{}' (expected text, json or yaml)",
                self.format
            )
        })?;
        let config = self.apply_overrides(AnalysisConfig::load()?);
        let request = AnalysisRequest::parse(
            &self.campaign_id,
            &self.from,
            &self.to,
            self.requested_tables(),
        )?;

        let source = JsonFileRowSource::load(&self.rows)?;
        let available: Vec<&str> = source.table_names().collect();
        for table in &request.tables {
            if !available.contains(&table.as_str()) {
                warn!(table = %table, "Table not present in rows file");
            }
        }
        let rows = fetch_rows_by_table(&source, &request)?;

        if self.dry_run {
            let prepared = pipeline::prepare(&rows, &request, None, &config)?;
            print!("{}", format_prompt(&prepared.prompt));
            return Ok(());
        }

        let client = OpenAiClient::from_env(self.model.clone(), self.base_url.clone())?;
        if format == OutputFormat::Text {
            print!("{}", format_model_info(&client.get_metadata()));
            println!("🔍 Analyzing {} ...\n", request.date_range);
        }

        let outcome = pipeline::analyze(&rows, &request, &client, &config).await?;
        if let Some(reason) = &outcome.response.degraded_reason {
            let mut stderr = StandardStream::stderr(ColorChoice::Auto);
            write_degraded_banner(&mut stderr, reason)?;
        }

        println!("{}", report::render(&outcome, format)?);
        Ok(())
    }

    /// Applies command-line overrides on top of the loaded settings.
    fn apply_overrides(&self, mut config: AnalysisConfig) -> AnalysisConfig {
        if let Some(minutes) = self.gap_minutes {
            config.session_gap_minutes = minutes;
        }
        if let Some(secs) = self.timeout_secs {
            config.generation_timeout_secs = secs;
        }
        if let Some(bytes) = self.max_prompt_bytes {
            config.max_prompt_bytes = bytes;
        }
        config
    }

    fn requested_tables(&self) -> Vec<String> {
        if self.tables.is_empty() {
            SUPPORTED_TABLES
                .iter()
                .map(|schema| schema.name.to_string())
                .collect()
        } else {
            self.tables.clone()
        }
    }
}

fn format_model_info(metadata: &ClientMetadata) -> String {
    format!(
        "🤖 Model: {} ({})\n   📏 Context: {} tokens, response: {} tokens\n",
        metadata.model, metadata.provider, metadata.max_context_length, metadata.max_response_length
    )
}

fn format_prompt(prompt: &Prompt) -> String {
    let mut out = format!(
        "=== System prompt ===\n{}\n\n=== User prompt ({} bytes) ===\n{}\n",
        prompt.system,
        prompt.user.len(),
        prompt.user
    );
    if prompt.truncation.is_truncated() {
        out.push_str(&format!(
            "\n⚠️  Omitted {} change entries and {} sessions to fit the size limit\n",
            prompt.truncation.omitted_entries, prompt.truncation.omitted_sessions
        ));
    }
    out
}

fn write_degraded_banner<W: WriteColor>(out: &mut W, reason: &str) -> Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    write!(out, "⚠️  Analysis unavailable")?;
    out.reset()?;
    writeln!(out, ": {reason}")?;
    writeln!(
        out,
        "   Statistics and sessions below were computed without the model."
    )?;
    Ok(())
}
