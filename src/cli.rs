//! CLI interface for campaign-analyzer.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod analyze;
pub mod tables;

/// campaign-analyzer: explains what happened to a campaign from its change logs.
#[derive(Parser)]
#[command(name = "campaign-analyzer")]
#[command(about = "Analyses campaign change-log history", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Groups a campaign's changes into sessions and asks a model to explain them.
    Analyze(analyze::AnalyzeCommand),
    /// Lists the supported change-log tables.
    Tables(tables::TablesCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Analyze(analyze_cmd) => analyze_cmd.execute().await,
            Commands::Tables(tables_cmd) => tables_cmd.execute(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_analyze_arguments() {
        let cli = Cli::try_parse_from([
            "campaign-analyzer",
            "analyze",
            "--rows",
            "rows.json",
            "--campaign-id",
            "42",
            "--from",
            "2024-03-01",
            "--to",
            "2024-03-31",
            "--table",
            "sp_campaign_details_v2_changes_log",
            "--table",
            "sp_campaign_geo_targeting_changes_log",
            "--gap-minutes",
            "10",
            "--dry-run",
        ])
        .unwrap();

        let Commands::Analyze(cmd) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(cmd.campaign_id, "42");
        assert_eq!(cmd.tables.len(), 2);
        assert_eq!(cmd.gap_minutes, Some(10));
        assert_eq!(cmd.format, "text");
        assert!(cmd.dry_run);
    }

    #[test]
    fn analyze_requires_rows() {
        assert!(Cli::try_parse_from([
            "campaign-analyzer",
            "analyze",
            "--campaign-id",
            "42",
            "--from",
            "2024-03-01",
            "--to",
            "2024-03-31",
        ])
        .is_err());
    }

    #[test]
    fn parses_tables_command() {
        let cli = Cli::try_parse_from(["campaign-analyzer", "tables", "--format", "json"]).unwrap();
        let Commands::Tables(cmd) = cli.command else {
            panic!("expected tables");
        };
        assert_eq!(cmd.format, "json");
    }
}
