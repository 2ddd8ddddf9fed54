//! Tipsearch HTTP API
//!
//! Axum-based HTTP surface for the AI search pipeline.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a
//! directly testable inner function returning `(StatusCode, serde_json::Value)`.
//! CORS is permissive and applied as a layer, which also answers OPTIONS
//! preflight before any handler runs. Non-POST methods on `/aisearch` get a
//! 405 from the router.
//!
//! Endpoints:
//! - GET  /health   — health check with DB status
//! - GET  /version  — server version info
//! - POST /aisearch — natural-language search over tip reports

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use sqlx::PgPool;
use tipsearch_core::{run_search, QueryExecutor, SqlGenerator, TipsearchError};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for all HTTP handlers. The generator and executor are
/// injected here; their lifecycle belongs to `main`, not to the pipeline.
#[derive(Clone)]
pub struct HttpState {
    pub pool: PgPool,
    pub generator: Arc<dyn SqlGenerator>,
    pub executor: Arc<dyn QueryExecutor>,
}

/// Build the Axum router with all endpoints and the CORS layer.
pub fn build_router(state: Arc<HttpState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/aisearch", post(aisearch_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the given address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    host: &str,
    port: u16,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Tipsearch HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — queries DB and returns (status_code, json_body).
pub async fn health_inner(pool: &PgPool) -> (StatusCode, Value) {
    match tipsearch_core::db::health_check(pool).await {
        Ok(pg_ver) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "postgresql": pg_ver,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "tipsearch/1",
    })
}

/// Inner AI search — validates the body shape, runs the pipeline, and maps
/// the error taxonomy onto HTTP statuses.
pub async fn aisearch_inner(
    generator: &dyn SqlGenerator,
    executor: &dyn QueryExecutor,
    payload: Value,
) -> (StatusCode, Value) {
    let question = match payload.get("query").and_then(Value::as_str) {
        Some(q) if !q.trim().is_empty() => q.trim().to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "message": "Missing 'query' field" }),
            );
        }
    };

    let start = Instant::now();

    match run_search(&question, generator, executor).await {
        Ok(outcome) => {
            tracing::info!(
                total = outcome.total,
                took_ms = start.elapsed().as_millis() as u64,
                "AI search completed"
            );
            (
                StatusCode::OK,
                serde_json::json!({
                    "query_interpreted": outcome.query_interpreted,
                    "total": outcome.total,
                    "results": outcome.results,
                }),
            )
        }
        Err(e) => error_response(e),
    }
}

/// Map `TipsearchError` onto a shaped HTTP response. Client-attributable
/// failures echo their reason; everything else is a generic 500 carrying
/// only the safe portion of the diagnostic.
pub fn error_response(error: TipsearchError) -> (StatusCode, Value) {
    if error.is_client_error() {
        (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "message": error.to_string() }),
        )
    } else {
        tracing::error!(error = %error, "AI search failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "message": format!("Internal Server Error: {}", error) }),
        )
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn aisearch_handler(
    State(state): State<Arc<HttpState>>,
    body: Option<Json<Value>>,
) -> impl IntoResponse {
    // Absent or non-JSON bodies fall through to the missing-field response,
    // matching the envelope behavior callers already rely on.
    let payload = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let (status, body) =
        aisearch_inner(state.generator.as_ref(), state.executor.as_ref(), payload).await;
    (status, Json(body))
}
