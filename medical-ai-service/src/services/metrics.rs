//! Prometheus metrics for medical-ai-service.
//!
//! Provides HTTP and generation metrics for observability. Nothing recorded
//! here carries question or answer text.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{Once, OnceLock};

static INIT: Once = Once::new();

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Generation metrics
pub static GENERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GENERATION_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static GENERATED_TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static DISCLAIMER_MISSING_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Initialize all metrics. Later calls are no-ops.
pub fn init_metrics() {
    INIT.call_once(register_metrics);
}

fn register_metrics() {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("Failed to create http_requests_total metric");

    let http_request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
        &["method", "path", "status"],
    )
    .expect("Failed to create http_request_duration_seconds metric");

    let generations = IntCounterVec::new(
        Opts::new("medical_ai_generations_total", "Total generation calls"),
        &["engine", "outcome"],
    )
    .expect("Failed to create medical_ai_generations_total metric");

    // CPU inference on a 7B model takes tens of seconds
    let generation_latency = HistogramVec::new(
        HistogramOpts::new(
            "medical_ai_generation_latency_seconds",
            "Engine generation latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0]),
        &["engine"],
    )
    .expect("Failed to create medical_ai_generation_latency_seconds metric");

    let generated_tokens = IntCounterVec::new(
        Opts::new(
            "medical_ai_generated_tokens_total",
            "Total tokens processed",
        ),
        &["engine", "type"], // type: prompt, completion
    )
    .expect("Failed to create medical_ai_generated_tokens_total metric");

    let disclaimer_missing = IntCounter::new(
        "medical_ai_disclaimer_missing_total",
        "Answers that did not end with the mandated disclaimer",
    )
    .expect("Failed to create medical_ai_disclaimer_missing_total metric");

    registry
        .register(Box::new(http_requests_total.clone()))
        .expect("Failed to register http_requests_total");
    registry
        .register(Box::new(http_request_duration.clone()))
        .expect("Failed to register http_request_duration_seconds");
    registry
        .register(Box::new(generations.clone()))
        .expect("Failed to register medical_ai_generations_total");
    registry
        .register(Box::new(generation_latency.clone()))
        .expect("Failed to register medical_ai_generation_latency_seconds");
    registry
        .register(Box::new(generated_tokens.clone()))
        .expect("Failed to register medical_ai_generated_tokens_total");
    registry
        .register(Box::new(disclaimer_missing.clone()))
        .expect("Failed to register medical_ai_disclaimer_missing_total");

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(http_requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(http_request_duration);
    let _ = GENERATIONS_TOTAL.set(generations);
    let _ = GENERATION_LATENCY_SECONDS.set(generation_latency);
    let _ = GENERATED_TOKENS_TOTAL.set(generated_tokens);
    let _ = DISCLAIMER_MISSING_TOTAL.set(disclaimer_missing);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

// Helper functions for recording metrics

/// Record a completed HTTP request.
pub fn record_http_request(method: &str, path: &str, status: &str, duration_secs: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, path, status]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, path, status])
            .observe(duration_secs);
    }
}

/// Record a finished generation call. `outcome` is a finish reason or error kind.
pub fn record_generation(engine: &str, outcome: &str, duration_secs: f64) {
    if let Some(counter) = GENERATIONS_TOTAL.get() {
        counter.with_label_values(&[engine, outcome]).inc();
    }
    if let Some(histogram) = GENERATION_LATENCY_SECONDS.get() {
        histogram.with_label_values(&[engine]).observe(duration_secs);
    }
}

/// Record token usage.
pub fn record_tokens(engine: &str, prompt_tokens: usize, completion_tokens: usize) {
    if let Some(counter) = GENERATED_TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[engine, "prompt"])
            .inc_by(prompt_tokens as u64);
        counter
            .with_label_values(&[engine, "completion"])
            .inc_by(completion_tokens as u64);
    }
}

/// Record an answer that lacks the disclaimer.
pub fn record_disclaimer_missing() {
    if let Some(counter) = DISCLAIMER_MISSING_TOTAL.get() {
        counter.inc();
    }
}
