#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use medical_ai_service::config::{CorsConfig, MedicalAiConfig};
use medical_ai_service::services::engine::mock::{MockEngine, MockReply};
use medical_ai_service::startup::{build_router, AppState};
use service_core::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub engine: Arc<MockEngine>,
}

impl TestApp {
    pub fn new(reply: MockReply) -> Self {
        Self::with_engine(MockEngine::new(reply))
    }

    pub fn with_engine(engine: MockEngine) -> Self {
        Self::build(engine, &["*"])
    }

    /// App whose CORS policy allows only `origins`.
    pub fn with_cors(origins: &[&str]) -> Self {
        Self::build(MockEngine::new(MockReply::Fixed("unused".to_string())), origins)
    }

    fn build(engine: MockEngine, origins: &[&str]) -> Self {
        let engine = Arc::new(engine);
        let cors = CorsConfig {
            allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
        };
        let router = build_router(AppState::new(engine.clone()), &cors);
        Self { router, engine }
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: &str) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}

pub async fn text_body(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Configuration for a server bound to a random loopback port.
pub fn test_config() -> MedicalAiConfig {
    let vars: HashMap<&str, &str> = HashMap::from([("MODEL_PATH", "unused.gguf")]);
    let common = Config {
        port: 0,
        ..Config::default()
    };
    MedicalAiConfig::from_lookup(common, |key| vars.get(key).map(|v| v.to_string()))
        .expect("Failed to build test config")
}
