//! Tables command.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;

use crate::changes::{TableSchema, SUPPORTED_TABLES};
use crate::data::to_yaml;
use crate::report::OutputFormat;

/// Tables command options.
#[derive(Parser)]
pub struct TablesCommand {
    /// Output format: text, json or yaml.
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Serialize)]
struct TableInfo {
    name: &'static str,
    display_name: &'static str,
    id_columns: &'static [&'static str],
    records_actor: bool,
}

impl From<&TableSchema> for TableInfo {
    fn from(schema: &TableSchema) -> Self {
        Self {
            name: schema.name,
            display_name: schema.display_name,
            id_columns: schema.id_columns,
            records_actor: !schema.actor_columns.is_empty(),
        }
    }
}

impl TablesCommand {
    /// Executes the tables command.
    pub fn execute(self) -> Result<()> {
        let format: OutputFormat = self.format.parse().map_err(|()| {
            anyhow!(
                "Unsupported output format '{}' (expected text, json or yaml)",
                self.format
            )
        })?;
        print!("{}", render_tables(&SUPPORTED_TABLES, format)?);
        Ok(())
    }
}

fn render_tables(schemas: &[TableSchema], format: OutputFormat) -> Result<String> {
    let infos: Vec<TableInfo> = schemas.iter().map(TableInfo::from).collect();
    match format {
        OutputFormat::Text => Ok(format_tables_text(&infos)),
        OutputFormat::Json => serde_json::to_string_pretty(&infos)
            .map(|json| json + "\n")
            .context("Failed to serialize tables to JSON"),
        OutputFormat::Yaml => to_yaml(&infos),
    }
}

fn format_tables_text(infos: &[TableInfo]) -> String {
    let mut out = format!("📋 Supported change-log tables ({}):\n", infos.len());
    for info in infos {
        let actor = if info.records_actor { "" } else { "  (no actor)" };
        out.push_str(&format!(
            "  {:<48} {}{actor}\n",
            info.name, info.display_name
        ));
    }
    out
}
