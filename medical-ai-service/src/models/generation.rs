use serde::{Deserialize, Serialize};

/// Body of `POST /generate`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Query {
    pub question: String,
}

/// Body returned by `POST /generate`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerationResult {
    pub response: String,
}

/// Body returned by `GET /`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Banner {
    pub message: String,
}
