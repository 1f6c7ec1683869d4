//! Narrative analysis of fetched series via a chat-completions service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AnalysisError;

const DEFAULT_ENDPOINT: &str = "https://api.mistral.ai/v1/chat/completions";
const PRIMARY_MODEL: &str = "mistral-large-latest";
const FALLBACK_MODEL: &str = "mistral-medium";
const SYSTEM_PROMPT: &str = "You are an expert economic analyst specializing in analyzing \
official statistics and providing insightful economic analysis.";

/// Produces a text analysis for one serialized dataset (or a bundle of them).
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        country: &str,
        indicator: &str,
        data: &Value,
    ) -> Result<String, AnalysisError>;
}

/// Build the user prompt for `data`.
///
/// Accepts a single serialized `Dataset` or `{"datasets": [...]}`.
pub fn build_prompt(country: &str, indicator: &str, data: &Value) -> String {
    let mut sections = Vec::new();
    match data.get("datasets").and_then(Value::as_array) {
        Some(datasets) => {
            for dataset in datasets {
                sections.push(describe_dataset(dataset));
            }
        }
        None => sections.push(describe_dataset(data)),
    }

    format!(
        "You are an expert economic analyst. Analyze the following {indicator} data for \
{country} and provide:\n\
1. A clear summary of the trends\n\
2. Key observations and insights\n\
3. Potential factors influencing the changes\n\
4. Comparison with global or regional averages if relevant\n\
5. Future outlook based on the trends\n\n\
{}\n\n\
Please provide a well-structured, detailed analysis of the economic situation of \
{country} based on this {indicator} data.",
        sections.join("\n\n")
    )
}

fn describe_dataset(dataset: &Value) -> String {
    let metadata = dataset.get("metadata");
    let field = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .unwrap_or("Not specified")
            .to_string()
    };

    let points: Vec<String> = dataset
        .get("data")
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .map(|p| {
                    let value = match p.get("value") {
                        Some(Value::Number(n)) => n.to_string(),
                        _ => "n/a".to_string(),
                    };
                    format!("Year: {}, Value: {}", p.get("year").unwrap_or(&Value::Null), value)
                })
                .collect()
        })
        .unwrap_or_default();

    format!(
        "Indicator Details:\n- Name: {}\n- Unit: {}\n- Source: {}\n\nData Points:\n{}",
        field("indicator_name"),
        field("unit"),
        field("source"),
        points.join("\n")
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// [`Analyzer`] backed by a chat-completions HTTP endpoint.
///
/// Tries the primary model first and the fallback model once if that fails.
#[derive(Clone)]
pub struct ChatAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    primary_model: String,
    fallback_model: String,
}

impl std::fmt::Debug for ChatAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAnalyzer")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("primary_model", &self.primary_model)
            .field("fallback_model", &self.fallback_model)
            .finish_non_exhaustive()
    }
}

impl ChatAnalyzer {
    pub fn new(api_key: impl Into<String>) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            primary_model: PRIMARY_MODEL.to_string(),
            fallback_model: FALLBACK_MODEL.to_string(),
        })
    }

    /// Read `MISTRAL_API_KEY` (and optionally `ECON_ANALYSIS_URL`).
    pub fn from_env() -> Result<Self, AnalysisError> {
        let api_key = std::env::var("MISTRAL_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AnalysisError::Unavailable("MISTRAL_API_KEY is not set".to_string()))?;
        let mut analyzer = Self::new(api_key)?;
        if let Ok(endpoint) = std::env::var("ECON_ANALYSIS_URL") {
            analyzer.endpoint = endpoint;
        }
        Ok(analyzer)
    }

    pub fn with_models(mut self, primary: &str, fallback: &str) -> Self {
        self.primary_model = primary.to_string();
        self.fallback_model = fallback.to_string();
        self
    }

    async fn complete(
        &self,
        model: &str,
        messages: Vec<ChatMessage<'_>>,
    ) -> Result<String, AnalysisError> {
        let request = ChatRequest { model, messages };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Unavailable(format!(
                "{model} returned status {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AnalysisError::EmptyResponse)
    }
}

#[async_trait]
impl Analyzer for ChatAnalyzer {
    async fn analyze(
        &self,
        country: &str,
        indicator: &str,
        data: &Value,
    ) -> Result<String, AnalysisError> {
        let prompt = build_prompt(country, indicator, data);
        debug!(model = %self.primary_model, chars = prompt.len(), "Requesting analysis");

        let primary = vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            ChatMessage {
                role: "user",
                content: &prompt,
            },
        ];
        match self.complete(&self.primary_model, primary).await {
            Ok(text) => return Ok(text),
            Err(err) => warn!(
                model = %self.primary_model,
                fallback = %self.fallback_model,
                error = %err,
                "Primary analysis model failed, falling back"
            ),
        }

        let fallback_prompt = format!("Analyze this economic data:\n{prompt}");
        let fallback = vec![ChatMessage {
            role: "user",
            content: &fallback_prompt,
        }];
        self.complete(&self.fallback_model, fallback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_lists_points_and_metadata() {
        let data = json!({
            "metadata": {"indicator_name": "GDP (current US$)", "unit": "trillions", "source": "world_bank"},
            "data": [{"year": 2010, "value": 1.5}, {"year": 2011, "value": null}]
        });
        let prompt = build_prompt("NPL", "gdp", &data);
        assert!(prompt.contains("gdp data for NPL"));
        assert!(prompt.contains("- Name: GDP (current US$)"));
        assert!(prompt.contains("- Unit: trillions"));
        assert!(prompt.contains("Year: 2010, Value: 1.5"));
        assert!(prompt.contains("Year: 2011, Value: n/a"));
    }

    #[test]
    fn test_prompt_handles_bundles() {
        let data = json!({
            "datasets": [
                {"metadata": {"source": "world_bank"}, "data": [{"year": 2000, "value": 1.0}]},
                {"metadata": {"source": "imf"}, "data": [{"year": 2001, "value": 2.0}]}
            ]
        });
        let prompt = build_prompt("NPL", "gdp", &data);
        assert!(prompt.contains("- Source: world_bank"));
        assert!(prompt.contains("- Source: imf"));
        assert!(prompt.contains("Year: 2001, Value: 2.0"));
    }

    #[test]
    fn test_missing_metadata_is_not_specified() {
        let prompt = build_prompt("NPL", "gdp", &json!({}));
        assert!(prompt.contains("- Unit: Not specified"));
    }

    #[test]
    fn test_from_env_without_key_is_unavailable() {
        if std::env::var("MISTRAL_API_KEY").is_ok() {
            return;
        }
        let err = ChatAnalyzer::from_env().unwrap_err();
        assert!(matches!(err, AnalysisError::Unavailable(_)));
    }
}
