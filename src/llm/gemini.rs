//! Google Gemini tool selector using structured JSON output.

use super::{build_system_instruction, tool_call_schema, ToolChoice, ToolSelector};
use crate::error::{LedgerError, Result};
use crate::mcp::protocol::ToolDefinition;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini-backed [`ToolSelector`].
pub struct GeminiSelector {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_json_schema: Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GeminiSelector {
    /// Create a selector for `model` (e.g. "gemini-2.5-flash").
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ToolSelector for GeminiSelector {
    #[instrument(skip(self, message, tools), fields(model = %self.model, tools = tools.len()))]
    async fn select(
        &self,
        message: &str,
        tools: &[ToolDefinition],
        today: NaiveDate,
    ) -> Result<ToolChoice> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: build_system_instruction(tools, today),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: message.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_json_schema: tool_call_schema(),
            },
        };

        let response = self
            .client
            .post(self.api_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = match response.json::<ApiError>().await {
                Ok(err) => err.error.message,
                Err(_) => format!("HTTP {}", status),
            };
            return Err(LedgerError::Llm(message));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| LedgerError::Llm("Empty response from Gemini".to_string()))?;

        debug!("Gemini answered: {}", text);

        let choice: ToolChoice = serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| LedgerError::Llm(format!("Unparsable tool choice: {}", e)))?;
        Ok(choice.normalized())
    }
}

/// Models occasionally wrap JSON in a markdown fence despite the mime type.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 17).unwrap()
    }

    fn tools() -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "summarize".to_string(),
            description: "Summarize expenses by category.".to_string(),
            input_schema: json!({"type": "object", "properties": {"start_date": {"type": "string"}}}),
        }]
    }

    fn candidate(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn test_select_parses_structured_answer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseMimeType": "application/json"},
                "contents": [{"role": "user", "parts": [{"text": "October expenses by category"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(
                r#"{"tool": "summarize", "params": {"start_date": "2025-10-01", "end_date": "2025-10-31"}}"#,
            )))
            .mount(&server)
            .await;

        let selector = GeminiSelector::with_base_url("test-key", "gemini-2.5-flash", server.uri());
        let choice = selector
            .select("October expenses by category", &tools(), today())
            .await
            .unwrap();

        assert_eq!(choice.tool.as_deref(), Some("summarize"));
        assert_eq!(choice.params["end_date"], "2025-10-31");
    }

    #[tokio::test]
    async fn test_select_none_answer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(candidate(r#"{"tool": "None", "params": {}}"#)),
            )
            .mount(&server)
            .await;

        let selector = GeminiSelector::with_base_url("k", "gemini-2.5-flash", server.uri());
        let choice = selector.select("hello", &tools(), today()).await.unwrap();
        assert_eq!(choice, ToolChoice::none());
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let selector = GeminiSelector::with_base_url("bad", "gemini-2.5-flash", server.uri());
        let err = selector.select("hi", &tools(), today()).await.unwrap_err();

        match err {
            LedgerError::Llm(msg) => assert_eq!(msg, "API key not valid."),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let selector = GeminiSelector::with_base_url("k", "gemini-2.5-flash", server.uri());
        assert!(selector.select("hi", &tools(), today()).await.is_err());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }
}
