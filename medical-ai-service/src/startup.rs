//! Application startup and lifecycle management.
//!
//! The engine is constructed by the caller (the binary loads the model, tests
//! pass a mock) and injected here; nothing in the service reaches for a
//! global model handle.

use crate::config::{CorsConfig, MedicalAiConfig};
use crate::handlers::{generate::generate, health, home::home, metrics::metrics};
use crate::middleware::metrics::metrics_middleware;
use crate::services::metrics::init_metrics;
use crate::services::{CompletionEngine, MedicalAssistant};
use axum::{
    http::{header, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub assistant: MedicalAssistant,
}

impl AppState {
    pub fn new(engine: Arc<dyn CompletionEngine>) -> Self {
        Self {
            assistant: MedicalAssistant::new(engine),
        }
    }
}

/// Build the HTTP router with all routes and middleware.
pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    init_metrics();

    Router::new()
        .route("/", get(home))
        .route("/generate", post(generate))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");

            tracing::info_span!(
                "http_request",
                request_id = %request_id,
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        }))
        // Preflights are answered by the CORS layer, so it sits inside the header layers.
        .layer(cors_layer(cors))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    if cors.is_permissive() {
        tracing::warn!("CORS allows every origin; set CORS_ALLOWED_ORIGINS to restrict it");
        return CorsLayer::permissive();
    }

    let origins = cors
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Bind the listener and assemble the router around `engine`.
    pub async fn build(
        config: MedicalAiConfig,
        engine: Arc<dyn CompletionEngine>,
    ) -> Result<Self, AppError> {
        tracing::info!(engine = %engine.name(), "Using completion engine");

        let router = build_router(AppState::new(engine), &config.cors);

        // Port 0 = random port for testing
        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Medical AI service listening on {}:{}", addr.ip(), port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                e
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
