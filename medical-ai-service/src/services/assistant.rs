//! Question answering on top of a [`CompletionEngine`].

use crate::models::GenerationResult;
use crate::services::engine::{CompletionEngine, EngineError, SamplingConfig};
use crate::services::metrics;
use crate::services::prompt::{ends_with_disclaimer, render_prompt};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;

/// Turns a user question into a model answer.
///
/// Holds the injected engine handle and the sampling parameters fixed at
/// construction. Cheap to clone; every request is independent.
#[derive(Clone)]
pub struct MedicalAssistant {
    engine: Arc<dyn CompletionEngine>,
    sampling: SamplingConfig,
}

impl MedicalAssistant {
    pub fn new(engine: Arc<dyn CompletionEngine>) -> Self {
        Self::with_sampling(engine, SamplingConfig::default())
    }

    pub fn with_sampling(engine: Arc<dyn CompletionEngine>, sampling: SamplingConfig) -> Self {
        Self { engine, sampling }
    }

    pub fn engine(&self) -> &Arc<dyn CompletionEngine> {
        &self.engine
    }

    /// Answer `question`. Empty questions are still sent to the model.
    ///
    /// Engine failures are returned as internal errors without retry.
    #[tracing::instrument(skip_all, fields(engine = %self.engine.name(), question_len = question.len()))]
    pub async fn answer(&self, question: &str) -> Result<GenerationResult, AppError> {
        let prompt = render_prompt(question);
        let engine = self.engine.name().to_string();
        let started = Instant::now();

        let result = self
            .engine
            .generate(&prompt, &self.sampling)
            .await
            .and_then(|completions| {
                completions
                    .into_iter()
                    .next()
                    .ok_or(EngineError::NoCompletion)
            });
        let elapsed = started.elapsed().as_secs_f64();

        let completion = match result {
            Ok(completion) => completion,
            Err(e) => {
                metrics::record_generation(&engine, e.kind(), elapsed);
                tracing::error!(error = %e, elapsed_secs = elapsed, "Generation failed");
                return Err(AppError::InternalError(anyhow::Error::new(e)));
            }
        };

        metrics::record_generation(&engine, completion.finish_reason.as_str(), elapsed);
        metrics::record_tokens(
            &engine,
            completion.prompt_tokens,
            completion.completion_tokens,
        );

        let response = completion.text.trim().to_string();
        if !ends_with_disclaimer(&response) {
            metrics::record_disclaimer_missing();
            tracing::warn!(
                finish_reason = completion.finish_reason.as_str(),
                "Answer does not end with the disclaimer"
            );
        }

        tracing::info!(
            prompt_tokens = completion.prompt_tokens,
            completion_tokens = completion.completion_tokens,
            finish_reason = completion.finish_reason.as_str(),
            response_len = response.len(),
            elapsed_secs = elapsed,
            "Generated answer"
        );

        Ok(GenerationResult { response })
    }
}
