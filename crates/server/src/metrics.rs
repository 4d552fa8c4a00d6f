//! Prometheus metrics

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// Install the global Prometheus recorder
///
/// Returns `None` when a recorder is already installed (tests, embedding).
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_metrics();
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    }
}

fn describe_metrics() {
    metrics::describe_counter!(
        "coach_suggestions_total",
        "Suggestions produced, labelled by source"
    );
    metrics::describe_counter!(
        "coach_suggestion_none_total",
        "Chunks for which no source produced a suggestion"
    );
    metrics::describe_histogram!(
        "coach_suggestion_latency_ms",
        metrics::Unit::Milliseconds,
        "End-to-end suggestion latency"
    );
    metrics::describe_counter!("coach_feedback_total", "Agent ratings, labelled by rating");
    metrics::describe_counter!("coach_insights_total", "Conversation insights extracted");
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            "metrics disabled\n".to_string(),
        ),
    }
}
