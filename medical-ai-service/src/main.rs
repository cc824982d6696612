use medical_ai_service::config::{MedicalAiConfig, ModelConfig};
use medical_ai_service::services::CompletionEngine;
use medical_ai_service::startup::Application;
use service_core::observability::init_tracing;
use std::sync::Arc;

#[cfg(feature = "llama")]
async fn load_engine(config: &ModelConfig) -> anyhow::Result<Arc<dyn CompletionEngine>> {
    use medical_ai_service::services::engine::llama::LlamaEngine;

    tracing::info!(
        path = %config.path.display(),
        "Loading model, this may take a while"
    );

    let config = config.clone();
    let engine = tokio::task::spawn_blocking(move || LlamaEngine::load(&config)).await??;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "llama"))]
async fn load_engine(config: &ModelConfig) -> anyhow::Result<Arc<dyn CompletionEngine>> {
    anyhow::bail!(
        "cannot load {}: built without an inference backend, rebuild with `--features llama`",
        config.path.display()
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MedicalAiConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "medical-ai-service",
        &config.observability.log_level,
        config.observability.otlp_endpoint.as_deref(),
    );

    let engine = load_engine(&config.model).await.map_err(|e| {
        tracing::error!("Failed to load model: {:#}", e);
        e
    })?;

    let app = Application::build(config, engine)
        .await
        .map_err(|e| anyhow::anyhow!("Startup error: {}", e))?;

    app.run_until_stopped().await?;

    Ok(())
}
