use std::fs;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use campaign_analyzer::data::{fetch_rows_by_table, JsonFileRowSource};
use campaign_analyzer::llm::{AnalysisQuality, ClientMetadata, GenerationClient, OpenAiClient};
use campaign_analyzer::report::{render, OutputFormat};
use campaign_analyzer::request::AnalysisRequest;
use campaign_analyzer::{analyze, AnalysisConfig, AnalysisError};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DETAILS: &str = "sp_campaign_details_v2_changes_log";
const GEO: &str = "sp_campaign_geo_targeting_changes_log";

const ANSWER: &str = r#"{
  "summary": "The budget doubled and the campaign was resumed, then geo targeting widened to Canada.",
  "key_insights": ["Budget doubled", "Campaign resumed"],
  "risk_factors": ["Spend may pace faster in the new market"],
  "recommendations": ["Review CA performance after a week"]
}"#;

/// Answers every request with a fixed reply and records the user prompts.
struct CannedClient {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl CannedClient {
    fn answering(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerationClient for CannedClient {
    fn send_request<'a>(
        &'a self,
        _system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        self.prompts.lock().unwrap().push(user_prompt.to_string());
        let reply = self.reply.clone();
        Box::pin(async move { reply.map_err(|message| anyhow!(message)) })
    }

    fn get_metadata(&self) -> ClientMetadata {
        ClientMetadata {
            provider: "Canned".to_string(),
            model: "canned-1".to_string(),
            max_context_length: 128_000,
            max_response_length: 4_096,
        }
    }
}

/// A rows file with two campaigns and one change outside the window.
struct RowsFile {
    _temp_dir: TempDir,
    path: std::path::PathBuf,
}

impl RowsFile {
    fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("rows.json");
        let content = json!({
            "sp_campaign_details_v2_changes_log": [
                {"campaign_id": 42, "field_name": "budget", "old_value": "100", "new_value": "200",
                 "update_time": "2024-03-01 10:00:00", "performer": "alice"},
                {"campaign_id": 42, "field_name": "status", "old_value": "PAUSED", "new_value": "RUNNING",
                 "update_time": "2024-03-01 10:02:00", "performer": "alice"},
                {"campaign_id": 42, "field_name": "budget", "old_value": "50", "new_value": "100",
                 "update_time": "2024-02-10 09:00:00", "performer": "alice"},
                {"campaign_id": 43, "field_name": "budget", "old_value": "1", "new_value": "2",
                 "update_time": "2024-03-01 10:01:00", "performer": "carol"}
            ],
            "sp_campaign_geo_targeting_changes_log": [
                {"campaign_id": 42, "field_name": "country", "old_value": "US", "new_value": "US,CA",
                 "update_time": "2024-03-01 10:20:00", "update_user": "bob"}
            ]
        });
        fs::write(&path, serde_json::to_string_pretty(&content)?)?;
        Ok(Self {
            _temp_dir: temp_dir,
            path,
        })
    }
}

fn request(campaign_id: &str) -> AnalysisRequest {
    AnalysisRequest::parse(
        campaign_id,
        "2024-03-01",
        "2024-03-31",
        vec![DETAILS.to_string(), GEO.to_string()],
    )
    .unwrap()
}

#[tokio::test]
async fn analyzes_a_rows_file_end_to_end() -> Result<()> {
    let file = RowsFile::new()?;
    let source = JsonFileRowSource::load(&file.path)?;
    let request = request("42");
    let rows = fetch_rows_by_table(&source, &request)?;
    let client = CannedClient::answering(ANSWER);

    let outcome = analyze(&rows, &request, &client, &AnalysisConfig::default()).await?;

    assert_eq!(outcome.statistics.total_entries, 3);
    assert_eq!(outcome.sessions.len(), 2);
    assert_eq!(outcome.sessions[0].entry_count, 2);
    assert_eq!(outcome.sessions[1].primary_actor, "bob");
    assert_eq!(outcome.response.quality, AnalysisQuality::Complete);
    assert_eq!(outcome.response.key_insights.len(), 2);
    assert!(outcome.malformed.is_empty());

    let prompts = client.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Campaign ID: 42"));
    assert!(!prompts[0].contains("carol"));

    let text = render(&outcome, OutputFormat::Text)?;
    assert!(text.contains("Analysis (complete):"));
    assert!(text.contains("  • Review CA performance after a week"));
    Ok(())
}

#[tokio::test]
async fn transport_failure_keeps_statistics() -> Result<()> {
    let file = RowsFile::new()?;
    let source = JsonFileRowSource::load(&file.path)?;
    let request = request("42");
    let rows = fetch_rows_by_table(&source, &request)?;
    let client = CannedClient::failing("connection reset by peer");

    let outcome = analyze(&rows, &request, &client, &AnalysisConfig::default()).await?;

    assert_eq!(outcome.response.quality, AnalysisQuality::Degraded);
    assert!(outcome
        .response
        .degraded_reason
        .as_deref()
        .unwrap()
        .contains("connection reset by peer"));
    assert_eq!(outcome.statistics.total_entries, 3);
    assert_eq!(outcome.sessions.len(), 2);
    Ok(())
}

#[tokio::test]
async fn campaign_without_changes_is_empty() -> Result<()> {
    let file = RowsFile::new()?;
    let source = JsonFileRowSource::load(&file.path)?;
    let request = request("99");
    let rows = fetch_rows_by_table(&source, &request)?;
    let client = CannedClient::answering(ANSWER);

    let err = analyze(&rows, &request, &client, &AnalysisConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err, AnalysisError::EmptyResult { campaign_id: 99 });
    assert!(client.prompts().is_empty());
    Ok(())
}

#[tokio::test]
async fn analyzes_through_an_openai_compatible_endpoint() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": ANSWER}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = RowsFile::new()?;
    let source = JsonFileRowSource::load(&file.path)?;
    let request = request("42");
    let rows = fetch_rows_by_table(&source, &request)?;
    let client = OpenAiClient::new(
        "gpt-4o-mini".to_string(),
        Some("test-key".to_string()),
        server.uri(),
    )?;

    let outcome = analyze(&rows, &request, &client, &AnalysisConfig::default()).await?;

    assert_eq!(outcome.response.quality, AnalysisQuality::Complete);
    assert!(outcome.response.summary.starts_with("The budget doubled"));
    Ok(())
}
