//! Language-model tool selection.

mod gemini;

pub use gemini::GeminiSelector;

use crate::error::Result;
use crate::mcp::protocol::ToolDefinition;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The model's answer: which tool to call, with which arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolChoice {
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub params: Value,
}

impl ToolChoice {
    pub fn none() -> Self {
        Self {
            tool: None,
            params: Value::Object(Map::new()),
        }
    }

    pub fn call(tool: impl Into<String>, params: Value) -> Self {
        Self {
            tool: Some(tool.into()),
            params,
        }
    }

    /// Map `"None"`/empty tool names to `None` and non-object params to `{}`.
    pub fn normalized(self) -> Self {
        let tool = self
            .tool
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("none") && t != "null");
        let params = match self.params {
            Value::Object(map) => Value::Object(map),
            _ => Value::Object(Map::new()),
        };
        Self { tool, params }
    }
}

/// Picks a tool for a natural-language request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolSelector: Send + Sync {
    /// Choose among `tools` for `message`, assuming `today` as the date.
    async fn select(
        &self,
        message: &str,
        tools: &[ToolDefinition],
        today: NaiveDate,
    ) -> Result<ToolChoice>;
}

/// JSON schema the model's answer must follow.
pub fn tool_call_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "tool": {"type": "string"},
            "params": {"type": "object", "minProperties": 0}
        },
        "required": ["tool", "params"]
    })
}

/// One line per parameter: `'name' (type) - description`, joined by `; `.
fn describe_params(schema: &Value) -> String {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return "None".to_string();
    };
    if properties.is_empty() {
        return "None".to_string();
    }

    properties
        .iter()
        .map(|(name, spec)| {
            let kind = spec.get("type").and_then(|t| t.as_str()).unwrap_or("string");
            match spec.get("description").and_then(|d| d.as_str()) {
                Some(desc) if !desc.is_empty() => format!("'{}' ({}) - {}", name, kind, desc),
                _ => format!("'{}' ({})", name, kind),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// System prompt listing the available tools.
pub fn build_system_instruction(tools: &[ToolDefinition], today: NaiveDate) -> String {
    let tools_context = tools
        .iter()
        .map(|tool| {
            format!(
                "- Name: {}\n  Description: {}\n  Parameters: {}",
                tool.name,
                tool.description,
                describe_params(&tool.input_schema)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Assume today is {today}. \
         If the user refers to a month only (e.g., 'October expenses'), use the current year. \
         You are an AI financial assistant. \
         Respond ONLY with a JSON object matching the provided schema, with no markdown or text. \
         If no tool fits, use 'None' and '{{}}'.\n\
         ---TOOLS---\n{tools_context}\n---END_TOOLS---",
        today = today.format("%Y-%m-%d"),
        tools_context = tools_context,
    )
}
