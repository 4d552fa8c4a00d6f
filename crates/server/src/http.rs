//! HTTP Endpoints
//!
//! REST API for live call coaching.

use std::time::Duration;

use axum::{
    extract::{Json, Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use sales_coach_agent::{CallSummary, ChunkOutcome, FollowUpEmail, SessionSnapshot};
use sales_coach_core::{CallType, CoachingSuggestion, FeedbackRating};

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.settings.server;
    let cors_layer = build_cors_layer(&server.cors_origins, server.cors_enabled);
    let timeout = Duration::from_secs(server.timeout_seconds);

    Router::new()
        // Call sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id", delete(end_session))
        .route("/api/sessions/:id/chunks", post(process_chunk))
        .route(
            "/api/sessions/:id/suggestions/:suggestion_id/feedback",
            post(rate_suggestion),
        )
        .route("/api/sessions/:id/summary", post(summarize_session))
        .route("/api/sessions/:id/email", post(follow_up_email))
        // Learning
        .route("/api/improve", post(improve_suggestion))
        .route("/api/learning/patterns", get(list_patterns))
        .route("/api/learning", delete(clear_learning))
        // Diagnostics
        .route("/api/stats", get(stats))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// Build the CORS layer from configured origins
///
/// Disabled CORS or an empty origin list allows any origin.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    if !enabled || origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(origin = %origin, "Invalid CORS origin ignored");
                None
            })
        })
        .collect();

    tracing::info!(origins = parsed.len(), "CORS configured");
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(methods)
        .allow_headers(Any)
}

#[derive(Debug, Default, Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    call_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    session_id: String,
    call_type: CallType,
}

/// POST /api/sessions
async fn create_session(
    State(state): State<AppState>,
    request: Option<Json<CreateSessionRequest>>,
) -> impl IntoResponse {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let call_type = request
        .call_type
        .as_deref()
        .map(CallType::from_tag)
        .unwrap_or_default();
    let session = state.create_session(call_type);

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id().to_string(),
            call_type,
        }),
    )
}

/// GET /api/sessions/:id
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ServerError> {
    let session = state.session(&id)?;
    Ok(Json(session.snapshot().await))
}

#[derive(Debug, Serialize)]
struct EndSessionResponse {
    session: SessionSnapshot,
    summary: CallSummary,
}

/// DELETE /api/sessions/:id
///
/// Ends the call and returns its summary.
async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EndSessionResponse>, ServerError> {
    let session = state.remove_session(&id)?;
    let snapshot = session.end().await;
    let summary = state
        .summarizer
        .summarize(&snapshot.context, &session.suggestions())
        .await;

    Ok(Json(EndSessionResponse {
        session: snapshot,
        summary,
    }))
}

#[derive(Debug, Deserialize)]
struct ChunkRequest {
    text: String,
}

/// POST /api/sessions/:id/chunks
async fn process_chunk(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChunkRequest>,
) -> Result<Json<ChunkOutcome>, ServerError> {
    let session = state.session(&id)?;
    Ok(Json(session.process_chunk(&request.text).await))
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    rating: FeedbackRating,
    #[serde(default)]
    reason: Option<String>,
}

/// POST /api/sessions/:id/suggestions/:suggestion_id/feedback
async fn rate_suggestion(
    State(state): State<AppState>,
    Path((id, suggestion_id)): Path<(String, String)>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<CoachingSuggestion>, ServerError> {
    let session = state.session(&id)?;
    let rated = session
        .rate_suggestion(&suggestion_id, request.rating, request.reason)
        .await?;
    Ok(Json(rated))
}

/// POST /api/sessions/:id/summary
async fn summarize_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CallSummary>, ServerError> {
    let session = state.session(&id)?;
    let context = session.context().await;
    let summary = state
        .summarizer
        .summarize(&context, &session.suggestions())
        .await;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct EmailRequest {
    agent_name: String,
    customer_name: String,
}

/// POST /api/sessions/:id/email
async fn follow_up_email(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<FollowUpEmail>, ServerError> {
    if request.agent_name.trim().is_empty() || request.customer_name.trim().is_empty() {
        return Err(ServerError::InvalidRequest(
            "agent_name and customer_name are required".to_string(),
        ));
    }

    let session = state.session(&id)?;
    let context = session.context().await;
    let summary = state
        .summarizer
        .summarize(&context, &session.suggestions())
        .await;
    let email = state
        .summarizer
        .follow_up_email(&context, &summary, &request.agent_name, &request.customer_name)
        .await;
    Ok(Json(email))
}

#[derive(Debug, Deserialize)]
struct ImproveRequest {
    suggestion_text: String,
    #[serde(default)]
    context: String,
}

/// POST /api/improve
async fn improve_suggestion(
    State(state): State<AppState>,
    Json(request): Json<ImproveRequest>,
) -> Json<serde_json::Value> {
    let improved = state
        .learning
        .improve_suggestion(&request.suggestion_text, &request.context);
    Json(serde_json::json!({
        "suggestion_text": improved,
        "improved": improved != request.suggestion_text,
    }))
}

/// GET /api/learning/patterns
async fn list_patterns(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "patterns": state.learning.patterns(),
        "stats": state.learning.stats(),
    }))
}

/// DELETE /api/learning
async fn clear_learning(State(state): State<AppState>) -> Result<StatusCode, ServerError> {
    state.learning.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/stats
async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "orchestrator": state.orchestrator.stats(),
        "learning": state.learning.stats(),
        "active_sessions": state.sessions.len(),
    }))
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime_secs(),
        "active_sessions": state.sessions.len(),
        "remote_configured": state.remote.is_some(),
    }))
}
