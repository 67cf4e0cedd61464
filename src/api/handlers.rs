use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::now_rfc3339;
use crate::schemas::{HealthResponse, RootResponse, RouteNotFound};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        success: true,
        message: "Exam portal API",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.settings().runtime().environment.as_str(),
    })
}

/// Liveness: obtains the pool and round-trips a trivial query.
pub(crate) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.gateway().check_connection().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                success: true,
                message: "Server is running",
                timestamp: now_rfc3339(),
                database: "connected",
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "Health check could not reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    success: false,
                    message: "Service unavailable",
                    timestamp: now_rfc3339(),
                    database: "disconnected",
                }),
            )
        }
    }
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Reports the path as the client sent it, before any nesting stripped it.
pub(crate) async fn not_found(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(RouteNotFound {
            success: false,
            message: "Route not found",
            path: uri.path().to_string(),
        }),
    )
}
