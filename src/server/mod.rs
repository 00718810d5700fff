//! HTTP server exposing the metrics endpoint.
//!
//! A single route, `GET /metrics`, renders the text exposition format. The
//! server is brought up before the first fetch completes, so scrapes during
//! warm-up succeed with empty (process-global only) data.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::metrics::Collector;

/// Shared application state, passed to handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    collector: Arc<Collector>,
}

impl AppState {
    pub fn new(collector: Arc<Collector>) -> Self {
        AppState { collector }
    }
}

/// Builds the axum Router with the metrics endpoint.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(app_state)
}

/// Renders the current cache state as Prometheus text exposition.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.collector.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to render metrics",
            )
                .into_response()
        }
    }
}
