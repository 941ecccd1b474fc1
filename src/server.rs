//! HTTP surface for the mechanism search.
//!
//! Plays the role the original page's `?query=` URL parameter played: a
//! search is addressable and shareable as a URL.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/search?query=<q>` | Run the pipeline, return the report as JSON |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_gateway", "message": "manifest request failed: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `ambiguous_group` (409),
//! `bad_gateway` (502). Upstream failures are surfaced to the caller and
//! never conflated with a legitimate empty result, which comes back as a
//! `200` report with both `found` flags false.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::PipelineError;
use crate::models::SearchReport;
use crate::pipeline::MechanismFinder;

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    finder: Arc<MechanismFinder>,
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let finder = Arc::new(MechanismFinder::new(config.clone())?);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/search", get(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { finder });

    println!("wimm server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_gateway"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Map a pipeline failure onto the HTTP error contract.
fn classify_pipeline_error(err: PipelineError) -> AppError {
    match &err {
        PipelineError::Network { .. } | PipelineError::Parse { .. } => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "bad_gateway".to_string(),
            message: err.to_string(),
        },
        PipelineError::AmbiguousGroup { .. } => AppError {
            status: StatusCode::CONFLICT,
            code: "ambiguous_group".to_string(),
            message: err.to_string(),
        },
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    query: Option<String>,
}

/// Handler for `GET /search?query=<q>`.
///
/// An empty query is legal and is searched; a missing parameter is a
/// `400`. Network and parse failures upstream come back as `502`.
async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchReport>, AppError> {
    let query = params
        .query
        .ok_or_else(|| bad_request("query parameter is required"))?;

    let report = state
        .finder
        .search(&query)
        .await
        .map_err(classify_pipeline_error)?;

    Ok(Json(report))
}
