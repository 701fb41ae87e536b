//! MCP over HTTP: JSON-RPC requests are POSTed to a single endpoint.

use super::protocol::{JsonRpcError, JsonRpcResponse};
use super::server::McpServer;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the router: `POST <path>` for JSON-RPC, `GET /health`.
pub fn router(server: McpServer, path: &str) -> Router {
    Router::new()
        .route(path, post(rpc_handler))
        .route("/health", get(health_handler))
        .with_state(server)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve `server` on `addr` until the process is stopped.
pub async fn serve(server: McpServer, addr: SocketAddr, path: &str) -> std::io::Result<()> {
    let name = server.name();
    let app = router(server, path);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("{} MCP server listening on http://{}{}", name, addr, path);

    axum::serve(listener, app).await
}

async fn rpc_handler(State(server): State<McpServer>, body: Bytes) -> Response {
    let raw = match std::str::from_utf8(&body) {
        Ok(raw) => raw,
        Err(e) => {
            let error = JsonRpcResponse::failure(None, JsonRpcError::parse_error(e));
            return Json(error).into_response();
        }
    };

    match server.handle_message(raw).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health_handler(State(server): State<McpServer>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "server": server.name(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
