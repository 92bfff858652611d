//! HTTP API server: axum router and request handlers.
//!
//! The server runs on the tokio async runtime while the render thread
//! runs on a plain `std::thread`. Commands go over `std::sync::mpsc`; pattern
//! switches wait for the render thread's answer on a `tokio::sync::oneshot`.
//!
//! ## Rust concepts
//! - `async fn` and `.await` for non-blocking I/O
//! - axum extractors: `State`, `Form`
//! - `Arc` for sharing state across async tasks
//! - `tower-http` middleware for CORS and request tracing

use crate::pattern::PatternInfo;
use crate::render::{EngineStatus, RenderCommand};
use axum::Router;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
///
/// Everything in here is cheap to clone: the sender is a handle and the rest
/// sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Channel to send commands to the render thread
    pub command_tx: Sender<RenderCommand>,
    /// Shared engine status (render thread writes, handlers read)
    pub status: Arc<Mutex<EngineStatus>>,
    /// Registered patterns in display order; fixed at startup
    pub patterns: Arc<Vec<PatternInfo>>,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(get_patterns, get_active_pattern, post_active_pattern, get_status),
    components(schemas(PatternInfo, ActivePattern, ActivePatternRequest, EngineStatus)),
    tags(
        (name = "patterns", description = "Pattern selection endpoints"),
        (name = "system", description = "System status endpoints"),
    ),
    info(
        title = "Strip Patterns API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for choosing the animation on an RGB LED strip"
    )
)]
pub struct ApiDoc;

// ── Request/Response types ───────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivePattern {
    /// Running pattern id, `null` before the first load
    #[schema(example = "rainbow")]
    pub active_pattern: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivePatternRequest {
    /// Pattern id to load. Unknown ids load the default pattern.
    #[schema(example = "rain")]
    pub active_pattern: String,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/api/patterns", get(get_patterns))
        .route("/api/activePattern", get(get_active_pattern).post(post_active_pattern))
        .route("/api/status", get(get_status))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// GET /api/patterns: list patterns in display order
#[utoipa::path(
    get,
    path = "/api/patterns",
    tag = "patterns",
    responses(
        (status = 200, description = "Registered patterns", body = Vec<PatternInfo>)
    )
)]
async fn get_patterns(State(state): State<AppState>) -> Json<Vec<PatternInfo>> {
    Json(state.patterns.as_ref().clone())
}

/// GET /api/activePattern: which pattern is running
#[utoipa::path(
    get,
    path = "/api/activePattern",
    tag = "patterns",
    responses(
        (status = 200, description = "Currently active pattern", body = ActivePattern)
    )
)]
async fn get_active_pattern(State(state): State<AppState>) -> Json<ActivePattern> {
    let active_pattern = state.status.lock().unwrap().active_pattern.clone();
    Json(ActivePattern { active_pattern })
}

/// POST /api/activePattern: switch patterns
///
/// Waits for the render thread to load the pattern and answers with the id
/// that is now active.
#[utoipa::path(
    post,
    path = "/api/activePattern",
    tag = "patterns",
    request_body(
        content = ActivePatternRequest,
        content_type = "application/x-www-form-urlencoded"
    ),
    responses(
        (status = 200, description = "Pattern loaded", body = ActivePattern),
        (status = 500, description = "Render thread is not running")
    )
)]
async fn post_active_pattern(
    State(state): State<AppState>,
    Form(req): Form<ActivePatternRequest>,
) -> Result<Json<ActivePattern>, (StatusCode, String)> {
    let (reply, reply_rx) = oneshot::channel();

    state
        .command_tx
        .send(RenderCommand::Load {
            id: req.active_pattern,
            reply,
        })
        .map_err(|_| render_thread_gone())?;

    let active = reply_rx.await.map_err(|_| render_thread_gone())?;

    Ok(Json(ActivePattern {
        active_pattern: Some(active),
    }))
}

/// GET /api/status: frame counters and active pattern
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "system",
    responses(
        (status = 200, description = "Current engine status", body = EngineStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<EngineStatus> {
    let status = state.status.lock().unwrap().clone();
    Json(status)
}

fn render_thread_gone() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Render thread gone".to_string(),
    )
}

// ── Tests ──────────────────────────────────────────────────────────
