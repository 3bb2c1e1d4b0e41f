//! REST API server implementation using Axum
//!
//! Serves the liveness banner, health and readiness endpoints. Handlers read
//! lifecycle state through a [`HealthHandle`] and never touch the backend.

use crate::lifecycle::{HealthHandle, HealthReport};
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use legalrag_core::config::ServerConfig;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) health: HealthHandle,
}

/// Build the Axum router with all endpoints
pub(crate) fn build_router(state: AppState, server_config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler));

    // Configure CORS based on allowed_origins
    let cors_layer = if server_config.allowed_origins.is_empty() {
        // CORS disabled
        CorsLayer::new()
    } else if server_config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = server_config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE])
            .allow_origin(origins)
    };

    router
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /
async fn root_handler() -> impl IntoResponse {
    Json(json!({ "message": "Legal RAG API is running" }))
}

/// GET /health
///
/// Always answers 200, including before startup completes and after a
/// failed startup.
async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.report())
}

/// GET /ready
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let lifecycle = state.health.state();
    let ready = state.health.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(json!({ "ready": ready, "state": lifecycle })))
}
