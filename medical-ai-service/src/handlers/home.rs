use crate::models::Banner;
use axum::Json;

pub const BANNER_MESSAGE: &str = "Medical AI API (BioMistral-7B) is running! POST to /generate";

/// Liveness banner. Never touches the engine.
pub async fn home() -> Json<Banner> {
    Json(Banner {
        message: BANNER_MESSAGE.to_string(),
    })
}
