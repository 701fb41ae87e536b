//! HTTP backend routing natural-language requests to MCP tools.

mod interpret;

pub use interpret::{interpret, InterpretError, InterpretResponse, NO_MATCHING_TOOL, TOOL_NOT_FOUND};

use crate::config::BackendConfig;
use crate::llm::{GeminiSelector, ToolSelector};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    selector: Option<Arc<dyn ToolSelector>>,
    endpoints: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(selector: Option<Arc<dyn ToolSelector>>, endpoints: Vec<String>) -> Self {
        Self {
            selector,
            endpoints: Arc::new(endpoints),
        }
    }

    /// Build from configuration, resolving the API key and endpoints.
    pub fn from_config(config: &BackendConfig) -> Self {
        let selector = config.api_key().map(|key| {
            Arc::new(GeminiSelector::new(key, config.model.clone())) as Arc<dyn ToolSelector>
        });
        if selector.is_none() {
            tracing::warn!("GOOGLE_API_KEY not set; /interpret will fail until it is");
        }

        let endpoints = config.endpoints();
        if endpoints.is_empty() {
            tracing::warn!("No MCP endpoints configured");
        }
        for endpoint in &endpoints {
            tracing::info!("MCP endpoint: {}", endpoint);
        }

        Self::new(selector, endpoints)
    }
}

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/interpret", post(interpret_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve the backend on `addr`.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Backend listening on http://{}", addr);

    axum::serve(listener, app).await
}

/// POST /interpret
async fn interpret_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<InterpretResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'message' field".to_string()))?
        .to_string();

    let selector = state
        .selector
        .as_ref()
        .ok_or_else(|| ApiError::Internal("GOOGLE_API_KEY not set".to_string()))?;

    if state.endpoints.is_empty() {
        return Err(ApiError::Internal("No MCP endpoints configured".to_string()));
    }

    let today = chrono::Local::now().date_naive();
    let response = interpret(selector.as_ref(), &state.endpoints, &message, today)
        .await
        .map_err(|e| {
            tracing::error!("{}", e);
            ApiError::Internal(e.to_string())
        })?;

    Ok(Json(response))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": state.endpoints.len(),
        "llm_configured": state.selector.is_some(),
    }))
}
