//! MCP client over HTTP.
//!
//! Servers may answer with a plain JSON body or with a `text/event-stream`
//! body whose `data:` lines carry the JSON-RPC response; both are accepted.

use super::protocol::{
    methods, JsonRpcRequest, JsonRpcResponse, ResourceContents, ResourceDefinition,
    ToolDefinition, CLIENT_PROTOCOL_VERSION,
};
use crate::error::{LedgerError, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT: &str = "application/json, text/event-stream";

/// MCP client bound to one HTTP endpoint.
pub struct McpClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    session_id: Mutex<Option<String>>,
}

impl McpClient {
    /// Create a client without performing the handshake.
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
            session_id: Mutex::new(None),
        }
    }

    /// Create a client and run the `initialize` handshake.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        let client = Self::new(url);
        client.initialize().await?;
        Ok(client)
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Session id assigned by the server, if any.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    /// Send `initialize` followed by `notifications/initialized`.
    pub async fn initialize(&self) -> Result<Value> {
        let result = self
            .request(
                methods::INITIALIZE,
                json!({
                    "protocolVersion": CLIENT_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "mcp-ledger",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await?;

        self.notify(methods::INITIALIZED).await?;

        tracing::debug!(
            "Connected to {} ({})",
            self.url,
            result
                .pointer("/serverInfo/name")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
        );
        Ok(result)
    }

    pub async fn ping(&self) -> Result<()> {
        self.request(methods::PING, Value::Null).await?;
        Ok(())
    }

    /// All tools, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        self.list_paged(methods::LIST_TOOLS, "tools").await
    }

    /// All resources, following pagination cursors.
    pub async fn list_resources(&self) -> Result<Vec<ResourceDefinition>> {
        self.list_paged(methods::LIST_RESOURCES, "resources").await
    }

    /// Call a tool and return the raw `tools/call` result.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        self.request(
            methods::CALL_TOOL,
            json!({ "name": name, "arguments": arguments }),
        )
        .await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let result = self
            .request(methods::READ_RESOURCE, json!({ "uri": uri }))
            .await?;
        field(&result, "contents")
    }

    async fn list_paged<T: DeserializeOwned>(&self, method: &str, key: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => Value::Null,
            };
            let result = self.request(method, params).await?;
            items.extend(field::<Vec<T>>(&result, key)?);

            cursor = result
                .get("nextCursor")
                .and_then(|v| v.as_str())
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                return Ok(items);
            }
        }
    }

    /// Send a request and return its `result`.
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let response = self.send(&request).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await?;

        let rpc = if content_type.starts_with("text/event-stream") {
            parse_sse_response(&body, id)?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body)?
        };

        if let Some(error) = rpc.error {
            return Err(LedgerError::Protocol {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str) -> Result<()> {
        self.send(&JsonRpcRequest::notification(method)).await?;
        Ok(())
    }

    async fn send(&self, request: &JsonRpcRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .json(request);

        if let Some(session) = self.session_id() {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock() = Some(session.to_string());
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Network(format!(
                "HTTP {} from {} ({}): {}",
                status, self.url, request.method, body
            )));
        }

        Ok(response)
    }
}

fn field<T: DeserializeOwned>(result: &Value, key: &str) -> Result<T> {
    let value = result.get(key).cloned().unwrap_or_else(|| json!([]));
    Ok(serde_json::from_value(value)?)
}

/// Pick the JSON-RPC response with `id` out of an SSE body.
fn parse_sse_response(body: &str, id: u64) -> Result<JsonRpcResponse> {
    let mut data = String::new();
    let mut events = Vec::new();

    for line in body.lines() {
        if line.is_empty() {
            if !data.is_empty() {
                events.push(std::mem::take(&mut data));
            }
        } else if let Some(payload) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(payload.strip_prefix(' ').unwrap_or(payload));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }

    events
        .iter()
        .filter_map(|event| serde_json::from_str::<JsonRpcResponse>(event).ok())
        .find(|resp| resp.id.as_ref().and_then(|v| v.as_u64()) == Some(id))
        .ok_or_else(|| {
            LedgerError::Serialization(format!("No response with id {} in event stream", id))
        })
}
