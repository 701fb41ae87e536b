//! Natural-language request → MCP tool call.

use crate::llm::{ToolChoice, ToolSelector};
use crate::mcp::protocol::ToolDefinition;
use crate::mcp::McpClient;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub const NO_MATCHING_TOOL: &str = "No matching tool found.";
pub const TOOL_NOT_FOUND: &str = "Tool not found in any client.";

/// Reply of `POST /interpret`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretResponse {
    pub tool: Option<String>,
    pub params: Value,
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_from: Option<String>,
}

/// Failures that abort the request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpretError {
    /// The chosen tool failed on the endpoint that owns it.
    #[error("Error calling tool '{tool}' on {endpoint}: {message}")]
    ToolCall {
        tool: String,
        endpoint: String,
        message: String,
    },
}

/// An endpoint that answered `tools/list`.
struct Connected {
    client: McpClient,
    tools: Vec<ToolDefinition>,
}

/// Connect to every endpoint, skipping the ones that fail.
async fn connect_all(endpoints: &[String]) -> Vec<Connected> {
    let mut connected = Vec::with_capacity(endpoints.len());

    for url in endpoints {
        let client = match McpClient::connect(url.as_str()).await {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Failed to connect to {}: {}", url, e);
                continue;
            }
        };

        match client.list_tools().await {
            Ok(tools) => {
                tracing::debug!("{} offers {} tools", url, tools.len());
                connected.push(Connected { client, tools });
            }
            Err(e) => tracing::warn!("Failed to list tools from {}: {}", url, e),
        }
    }

    connected
}

/// Ask `selector` which tool fits `message` and run it.
pub async fn interpret(
    selector: &dyn ToolSelector,
    endpoints: &[String],
    message: &str,
    today: NaiveDate,
) -> Result<InterpretResponse, InterpretError> {
    let connected = connect_all(endpoints).await;
    let all_tools: Vec<ToolDefinition> = connected
        .iter()
        .flat_map(|c| c.tools.iter().cloned())
        .collect();

    let choice = match selector.select(message, &all_tools, today).await {
        Ok(choice) => choice.normalized(),
        Err(e) => {
            tracing::warn!("Tool selection failed: {}", e);
            ToolChoice::none()
        }
    };

    let Some(tool) = choice.tool else {
        return Ok(InterpretResponse {
            tool: None,
            params: json!({}),
            result: Value::String(NO_MATCHING_TOOL.to_string()),
            executed_from: None,
        });
    };
    let params = choice.params;

    let Some(owner) = connected
        .iter()
        .find(|c| c.tools.iter().any(|t| t.name == tool))
    else {
        tracing::info!("Model chose {} but no endpoint offers it", tool);
        return Ok(InterpretResponse {
            tool: Some(tool),
            params,
            result: Value::String(TOOL_NOT_FOUND.to_string()),
            executed_from: None,
        });
    };

    let endpoint = owner.client.url().to_string();
    tracing::info!("Calling {} on {}", tool, endpoint);

    let result = match owner.client.call_tool(&tool, params.clone()).await {
        Ok(result) => result,
        Err(e) => {
            return Err(InterpretError::ToolCall {
                tool,
                endpoint,
                message: e.to_string(),
            })
        }
    };

    if let Some(message) = tool_error_message(&result) {
        return Err(InterpretError::ToolCall {
            tool,
            endpoint,
            message,
        });
    }

    Ok(InterpretResponse {
        tool: Some(tool),
        params,
        result,
        executed_from: Some(endpoint),
    })
}

/// Text of a `tools/call` result flagged with `isError`.
fn tool_error_message(result: &Value) -> Option<String> {
    if result.get("isError").and_then(Value::as_bool) != Some(true) {
        return None;
    }

    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    Some(if text.is_empty() {
        "Tool reported an error".to_string()
    } else {
        text
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_message() {
        assert_eq!(tool_error_message(&json!({"content": [], "isError": false})), None);
        assert_eq!(tool_error_message(&json!({"content": [{"type": "text", "text": "ok"}]})), None);
        assert_eq!(
            tool_error_message(&json!({
                "content": [{"type": "text", "text": "a"}, {"type": "image"}, {"type": "text", "text": "b"}],
                "isError": true
            })),
            Some("a\nb".to_string())
        );
        assert_eq!(
            tool_error_message(&json!({"isError": true})),
            Some("Tool reported an error".to_string())
        );
    }
}
