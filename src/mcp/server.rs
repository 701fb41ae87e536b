//! MCP JSON-RPC 2.0 server core and stdio transport.

use super::protocol::{
    codes, methods, negotiate_version, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ResourceContents, ResourceDefinition, ServerInfo, ToolCallResult, ToolDefinition,
};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// A set of tools and resources exposed over MCP.
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Server name advertised on `initialize`.
    fn name(&self) -> &'static str;

    fn tools(&self) -> Vec<ToolDefinition>;

    fn resources(&self) -> Vec<ResourceDefinition> {
        Vec::new()
    }

    /// Run a tool.
    ///
    /// Unknown tools are a JSON-RPC error; failures of a known tool should be
    /// returned as [`ToolCallResult::error`].
    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> std::result::Result<ToolCallResult, JsonRpcError>;

    async fn read_resource(
        &self,
        uri: &str,
    ) -> std::result::Result<ResourceContents, JsonRpcError> {
        Err(JsonRpcError::new(
            codes::RESOURCE_NOT_FOUND,
            format!("Resource not found: {}", uri),
        ))
    }
}

/// MCP server dispatching JSON-RPC requests to a [`ToolService`].
#[derive(Clone)]
pub struct McpServer {
    service: Arc<dyn ToolService>,
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(service: Arc<dyn ToolService>) -> Self {
        Self { service }
    }

    pub fn name(&self) -> &'static str {
        self.service.name()
    }

    /// Handle one request. Notifications yield `None`.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!("Notification {}", request.method);
            return None;
        }

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                request.id,
                JsonRpcError::new(codes::INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            ));
        }

        tracing::debug!("{} request {}", self.name(), request.method);

        let result = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(&request.params),
            methods::PING => Ok(json!({})),
            methods::LIST_TOOLS => self.handle_tools_list(),
            methods::CALL_TOOL => self.handle_tools_call(request.params).await,
            methods::LIST_RESOURCES => self.handle_resources_list(),
            methods::READ_RESOURCE => self.handle_resources_read(&request.params).await,
            _ => Err(JsonRpcError::new(
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            )),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => {
                tracing::debug!("{} failed: {}", request.method, error.message);
                JsonRpcResponse::failure(request.id, error)
            }
        })
    }

    /// Parse a raw message and handle it.
    ///
    /// Unparsable input yields a parse error with a null id. JSON that is not
    /// a request yields an invalid-request error carrying its id, if any.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(e) => return Some(JsonRpcResponse::failure(None, JsonRpcError::parse_error(e))),
        };

        let id = value.get("id").filter(|id| !id.is_null()).cloned();
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(codes::INVALID_REQUEST, format!("Invalid request: {}", e)),
            )),
        }
    }

    /// Run the MCP server over stdio, one message per line.
    pub async fn run_stdio(&self) -> Result<()> {
        tracing::info!("{} MCP server started on stdio", self.name());
        self.serve_lines(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await?;
        tracing::info!("stdin closed, shutting down");
        Ok(())
    }

    /// Answer newline-delimited messages from `reader` until it is exhausted.
    pub async fn serve_lines<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(&line).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    fn handle_initialize(&self, params: &Value) -> std::result::Result<Value, JsonRpcError> {
        let requested = params.get("protocolVersion").and_then(|v| v.as_str());

        let mut capabilities = json!({ "tools": { "listChanged": false } });
        if !self.service.resources().is_empty() {
            capabilities["resources"] = json!({ "subscribe": false, "listChanged": false });
        }

        let server_info = ServerInfo {
            name: self.name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        Ok(json!({
            "protocolVersion": negotiate_version(requested),
            "capabilities": capabilities,
            "serverInfo": server_info,
        }))
    }

    fn handle_tools_list(&self) -> std::result::Result<Value, JsonRpcError> {
        Ok(json!({ "tools": self.service.tools() }))
    }

    async fn handle_tools_call(&self, params: Value) -> std::result::Result<Value, JsonRpcError> {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool name"))?;

        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args) => args.clone(),
        };

        let result = self.service.call_tool(name, arguments).await?;
        if result.is_error() {
            tracing::warn!("Tool {} failed: {}", name, result.text_content());
        }

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
    }

    fn handle_resources_list(&self) -> std::result::Result<Value, JsonRpcError> {
        Ok(json!({ "resources": self.service.resources() }))
    }

    async fn handle_resources_read(&self, params: &Value) -> std::result::Result<Value, JsonRpcError> {
        let uri = params
            .get("uri")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JsonRpcError::invalid_params("Missing resource uri"))?;

        let contents = self.service.read_resource(uri).await?;
        Ok(json!({ "contents": [contents] }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoService;

    #[async_trait]
    impl ToolService for EchoService {
        fn name(&self) -> &'static str {
            "Echo"
        }

        fn tools(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition {
                name: "echo".to_string(),
                description: "Echo the arguments back.".to_string(),
                input_schema: json!({"type": "object", "properties": {}}),
            }]
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: Value,
        ) -> std::result::Result<ToolCallResult, JsonRpcError> {
            match name {
                "echo" => Ok(ToolCallResult::json(&arguments)),
                _ => Err(JsonRpcError::invalid_params(format!("Unknown tool: {}", name))),
            }
        }
    }

    fn server() -> McpServer {
        McpServer::new(Arc::new(EchoService))
    }

    fn request(id: u64, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest::new(id, method, params)
    }

    #[tokio::test]
    async fn test_initialize_advertises_server() {
        let resp = server()
            .handle_request(request(1, "initialize", json!({"protocolVersion": "2024-11-05"})))
            .await
            .unwrap();
        let result = resp.result.unwrap();

        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "Echo");
        assert!(result["capabilities"].get("resources").is_none());
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let resp = server()
            .handle_request(JsonRpcRequest::notification("notifications/initialized"))
            .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn test_ping_returns_empty_object() {
        let resp = server().handle_request(request(2, "ping", Value::Null)).await.unwrap();
        assert_eq!(resp.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let resp = server()
            .handle_request(request(3, "prompts/list", Value::Null))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, codes::METHOD_NOT_FOUND);
        assert_eq!(resp.id, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_tools_call_and_unknown_tool() {
        let srv = server();

        let resp = srv
            .handle_request(request(
                4,
                "tools/call",
                json!({"name": "echo", "arguments": {"hello": "world"}}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.result.unwrap()["structuredContent"]["hello"], "world");

        let resp = srv
            .handle_request(request(5, "tools/call", json!({"name": "nope"})))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, codes::INVALID_PARAMS);

        let resp = srv
            .handle_request(request(6, "tools/call", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().message, "Missing tool name");
    }

    #[tokio::test]
    async fn test_default_resource_read_is_not_found() {
        let resp = server()
            .handle_request(request(7, "resources/read", json!({"uri": "x://y"})))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, codes::RESOURCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handle_message_parse_error() {
        let resp = server().handle_message("{not json").await.unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, codes::PARSE_ERROR);
        assert!(resp.id.is_none());
    }

    #[tokio::test]
    async fn test_json_that_is_not_a_request() {
        let resp = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":1}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, codes::INVALID_REQUEST);
        assert_eq!(resp.id, Some(json!(1)));

        let resp = server().handle_message("[1, 2]").await.unwrap();
        assert_eq!(resp.error.unwrap().code, codes::INVALID_REQUEST);
        assert!(resp.id.is_none());
    }

    #[tokio::test]
    async fn test_serve_lines() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
            "\n",
            "   \n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "{broken\n",
            "{\"jsonrpc\":\"2.0\",\"id\":\"b\",\"method\":\"tools/list\"}",
        );
        let mut output = Vec::new();

        server()
            .serve_lines(input.as_bytes(), &mut output)
            .await
            .unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);

        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[0]["result"], json!({}));

        assert_eq!(lines[1]["id"], Value::Null);
        assert_eq!(lines[1]["error"]["code"], codes::PARSE_ERROR);

        assert_eq!(lines[2]["id"], "b");
        assert_eq!(lines[2]["result"]["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn test_wrong_jsonrpc_version() {
        let resp = server()
            .handle_message(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, codes::INVALID_REQUEST);
    }
}
