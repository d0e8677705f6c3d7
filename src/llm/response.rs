//! Interpretation of generated analysis text.
//!
//! Models are asked for a JSON object but do not always comply. Parsing is
//! strict first (JSON, then YAML, inside or outside code fences) and then
//! lenient (labelled sections with bullet lists). Parsing never fails; what
//! could not be recovered is disclosed through [`AnalysisQuality`].

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::AnalysisError;

/// Summary used when a response carries no summary.
pub const FALLBACK_SUMMARY: &str = "Not available";

/// Summary used when no analysis could be obtained at all.
pub const DEGRADED_SUMMARY: &str = "Analysis unavailable";

const SUMMARY: &str = "summary";
const KEY_INSIGHTS: &str = "key_insights";
const RISK_FACTORS: &str = "risk_factors";
const RECOMMENDATIONS: &str = "recommendations";

/// How much of the analysis was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisQuality {
    /// All four fields were decoded from a structured document.
    Complete,
    /// Some fields were recovered; the rest hold fallback values.
    Partial,
    /// Nothing usable was obtained.
    Degraded,
}

/// Structured analysis of a campaign's change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignAnalysisResponse {
    /// Factual account of the net changes.
    pub summary: String,
    /// Strategic observations.
    pub key_insights: Vec<String>,
    /// Risks introduced by the changes.
    pub risk_factors: Vec<String>,
    /// Suggested next steps.
    pub recommendations: Vec<String>,
    /// How much was recovered.
    pub quality: AnalysisQuality,
    /// Fields that hold fallback values.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
    /// Why no analysis is available, for degraded responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
    /// Text as returned by the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl CampaignAnalysisResponse {
    /// Response for a run where generation failed or produced nothing usable.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            summary: DEGRADED_SUMMARY.to_string(),
            key_insights: Vec::new(),
            risk_factors: Vec::new(),
            recommendations: Vec::new(),
            quality: AnalysisQuality::Degraded,
            missing_fields: all_fields(),
            degraded_reason: Some(reason.into()),
            raw_response: None,
        }
    }

    /// True when the response is degraded.
    pub fn is_degraded(&self) -> bool {
        self.quality == AnalysisQuality::Degraded
    }
}

/// Fields recovered from a response, before fallbacks are applied.
#[derive(Debug, Default)]
struct Recovered {
    summary: Option<String>,
    key_insights: Option<Vec<String>>,
    risk_factors: Option<Vec<String>>,
    recommendations: Option<Vec<String>>,
}

impl Recovered {
    fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.key_insights.is_none()
            && self.risk_factors.is_none()
            && self.recommendations.is_none()
    }

    fn missing_fields(&self) -> Vec<String> {
        [
            (SUMMARY, self.summary.is_none()),
            (KEY_INSIGHTS, self.key_insights.is_none()),
            (RISK_FACTORS, self.risk_factors.is_none()),
            (RECOMMENDATIONS, self.recommendations.is_none()),
        ]
        .into_iter()
        .filter(|(_, missing)| *missing)
        .map(|(name, _)| name.to_string())
        .collect()
    }

    fn into_response(self, structured: bool, raw: &str) -> CampaignAnalysisResponse {
        let missing_fields = self.missing_fields();
        let quality = if structured && missing_fields.is_empty() {
            AnalysisQuality::Complete
        } else {
            AnalysisQuality::Partial
        };
        CampaignAnalysisResponse {
            summary: self
                .summary
                .unwrap_or_else(|| FALLBACK_SUMMARY.to_string()),
            key_insights: self.key_insights.unwrap_or_default(),
            risk_factors: self.risk_factors.unwrap_or_default(),
            recommendations: self.recommendations.unwrap_or_default(),
            quality,
            missing_fields,
            degraded_reason: None,
            raw_response: Some(raw.to_string()),
        }
    }
}

/// Interprets generated text. Never fails.
pub fn parse(raw_text: &str) -> CampaignAnalysisResponse {
    let text = raw_text.trim();
    if text.is_empty() {
        warn!("Generation returned an empty response");
        return CampaignAnalysisResponse::degraded(
            AnalysisError::ResponseParse("empty response".to_string()).to_string(),
        );
    }

    let unfenced = strip_code_fences(text);
    let structured = decode_document(text)
        .or_else(|| decode_document(unfenced))
        .or_else(|| {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        (start < end)
            .then(|| decode_document(&text[start..=end]))
            .flatten()
    });
    if let Some(recovered) = structured {
        debug!(missing = ?recovered.missing_fields(), "Decoded structured analysis response");
        return recovered.into_response(true, raw_text);
    }

    let sections = extract_sections(unfenced);
    if !sections.is_empty() {
        warn!(
            missing = ?sections.missing_fields(),
            "Recovered analysis from labelled sections"
        );
        return sections.into_response(false, raw_text);
    }

    warn!(
        response_len = raw_text.len(),
        "Analysis response has no recognizable fields"
    );
    let mut degraded = CampaignAnalysisResponse::degraded(
        AnalysisError::ResponseParse("no recognizable analysis fields".to_string()).to_string(),
    );
    degraded.raw_response = Some(raw_text.to_string());
    degraded
}

fn all_fields() -> Vec<String> {
    [SUMMARY, KEY_INSIGHTS, RISK_FACTORS, RECOMMENDATIONS]
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Returns the content of the first fenced code block, or the text itself.
fn strip_code_fences(text: &str) -> &str {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").ok());

    fence
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str().trim())
}

/// Strictly decodes a JSON or YAML mapping holding at least one known field.
fn decode_document(text: &str) -> Option<Recovered> {
    let value = serde_json::from_str::<Value>(text)
        .ok()
        .or_else(|| serde_yaml::from_str::<Value>(text).ok())?;
    let Value::Object(object) = value else {
        return None;
    };
    let recovered = recover_fields(&object);
    (!recovered.is_empty()).then_some(recovered)
}

fn recover_fields(object: &Map<String, Value>) -> Recovered {
    let mut recovered = Recovered::default();
    for (key, value) in object {
        match canonical_field(key) {
            Some(SUMMARY) => recovered.summary = summary_text(value),
            Some(KEY_INSIGHTS) => recovered.key_insights = string_list(value),
            Some(RISK_FACTORS) => recovered.risk_factors = string_list(value),
            Some(RECOMMENDATIONS) => recovered.recommendations = string_list(value),
            _ => {}
        }
    }
    recovered
}

/// Maps spelling variants of a field label onto its canonical name.
fn canonical_field(label: &str) -> Option<&'static str> {
    let normalized: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    match normalized.as_str() {
        "summary" => Some(SUMMARY),
        "keyinsights" | "insights" => Some(KEY_INSIGHTS),
        "riskfactors" | "risks" => Some(RISK_FACTORS),
        "recommendations" | "recommendation" => Some(RECOMMENDATIONS),
        _ => None,
    }
}

/// Strings are kept exactly as sent; a present string counts as present
/// even when empty.
fn summary_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(items.iter().map(value_text).collect::<Vec<_>>().join("\n")),
        other => Some(value_text(other)),
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(items.iter().map(value_text).collect()),
        other => Some(vec![value_text(other)]),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn section_heading() -> Option<&'static Regex> {
    static HEADING: OnceLock<Option<Regex>> = OnceLock::new();
    HEADING
        .get_or_init(|| {
            Regex::new(
                r#"(?i)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*|__)?[ \t]*"?(summary|key[ _-]?insights|risk[ _-]?factors|recommendations)"?[ \t]*(?:\*\*|__)?[ \t]*(?::[ \t]*(?:\*\*|__)?(.*))?$"#,
            )
            .ok()
        })
        .as_ref()
}

fn bullet() -> Option<&'static Regex> {
    static BULLET: OnceLock<Option<Regex>> = OnceLock::new();
    BULLET
        .get_or_init(|| Regex::new(r"^[ \t]*(?:[-*+•]|\d+[.)])[ \t]+(.*)$").ok())
        .as_ref()
}

/// Reads labelled sections (`Summary`, `Key Insights`, `Risk Factors`,
/// `Recommendations`) and the lines under them.
fn extract_sections(text: &str) -> Recovered {
    let Some(heading) = section_heading() else {
        return Recovered::default();
    };

    let mut sections: Vec<(&'static str, Vec<&str>)> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = heading.captures(line) {
            let Some(field) = caps.get(1).and_then(|m| canonical_field(m.as_str())) else {
                continue;
            };
            let mut lines = Vec::new();
            if let Some(inline) = caps.get(2) {
                lines.push(inline.as_str());
            }
            sections.push((field, lines));
        } else if let Some((_, lines)) = sections.last_mut() {
            lines.push(line);
        }
    }

    let mut recovered = Recovered::default();
    for (field, lines) in sections {
        if field == SUMMARY {
            let text = lines
                .iter()
                .map(|line| clean_item(line))
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            if !text.is_empty() {
                recovered.summary = Some(text);
            }
            continue;
        }

        let items = list_items(&lines);
        let slot = match field {
            KEY_INSIGHTS => &mut recovered.key_insights,
            RISK_FACTORS => &mut recovered.risk_factors,
            _ => &mut recovered.recommendations,
        };
        if !items.is_empty() || slot.is_none() {
            *slot = Some(items);
        }
    }
    recovered
}

/// Splits section lines into items. Bullet lines start items and other
/// lines continue them; without bullets every line is an item.
fn list_items(lines: &[&str]) -> Vec<String> {
    let bullet = bullet();
    let has_bullets = bullet.is_some_and(|re| lines.iter().any(|line| re.is_match(line)));

    let mut items: Vec<String> = Vec::new();
    for line in lines {
        let bulleted = bullet
            .and_then(|re| re.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        match bulleted {
            Some(content) => items.push(clean_item(content)),
            None if has_bullets => {
                let continuation = clean_item(line);
                if let (Some(last), false) = (items.last_mut(), continuation.is_empty()) {
                    last.push(' ');
                    last.push_str(&continuation);
                }
            }
            None => items.push(clean_item(line)),
        }
    }
    items.retain(|item| !item.is_empty());
    items
}

/// Strips punctuation left over from half-formed JSON and markdown.
fn clean_item(text: &str) -> String {
    text.trim()
        .trim_end_matches(',')
        .trim_matches(|c| matches!(c, '[' | ']' | '{' | '}'))
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}
