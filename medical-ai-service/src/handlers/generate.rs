use crate::models::{GenerationResult, Query};
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// Answer a health question.
///
/// Malformed bodies are rejected by the `Json` extractor before the model is
/// involved; everything else goes to the model exactly once.
pub async fn generate(
    State(state): State<AppState>,
    Json(query): Json<Query>,
) -> Result<Json<GenerationResult>, AppError> {
    let result = state.assistant.answer(&query.question).await?;
    Ok(Json(result))
}
