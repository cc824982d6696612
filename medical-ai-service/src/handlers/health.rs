use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

/// Health check endpoint for Docker/K8s liveness probes.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.assistant.engine();
    match engine.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "medical-ai-service",
                "version": env!("CARGO_PKG_VERSION"),
                "engine": engine.name()
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "medical-ai-service",
                "engine": engine.name(),
                "error": e.to_string()
            })),
        ),
    }
}

/// Readiness check endpoint for K8s readiness probes.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.assistant.engine().health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Engine not ready");
        AppError::ServiceUnavailable
    })?;
    Ok(StatusCode::OK)
}
