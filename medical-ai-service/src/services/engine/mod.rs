//! Inference engine abstraction.
//!
//! The request handler only sees [`CompletionEngine`]; the llama.cpp backend
//! and the recording mock used in tests both sit behind it.

#[cfg(feature = "llama")]
pub mod llama;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Model not loaded: {0}")]
    NotLoaded(String),

    #[error("Prompt of {prompt_tokens} tokens does not fit a context window of {context_size}")]
    ContextOverflow {
        prompt_tokens: usize,
        context_size: usize,
    },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Engine returned no completion")]
    NoCompletion,

    #[error("Engine task failed: {0}")]
    Internal(String),
}

impl EngineError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotLoaded(_) => "not_loaded",
            EngineError::ContextOverflow { .. } => "context_overflow",
            EngineError::Inference(_) => "inference",
            EngineError::NoCompletion => "no_completion",
            EngineError::Internal(_) => "internal",
        }
    }
}

/// Decoding parameters sent with every generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub min_p: f32,
    pub repeat_penalty: f32,
    /// Window of recent tokens the repeat penalty looks at.
    pub repeat_last_n: i32,
    pub stop: Vec<String>,
    /// Whether the prompt is prepended to the completion text.
    pub echo: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.65,
            top_p: 0.9,
            top_k: 40,
            min_p: 0.05,
            repeat_penalty: 1.1,
            repeat_last_n: 64,
            stop: vec!["</s>".into(), "[INST]".into(), "[/INST]".into()],
            echo: false,
        }
    }
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// End-of-generation token or stop sequence.
    Stop,
    /// `max_tokens` reached.
    Length,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
        }
    }
}

/// One candidate text produced for a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub finish_reason: FinishReason,
}

/// A loaded text-generation model.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Label used in logs and metrics.
    fn name(&self) -> &str;

    /// Run the model on `prompt`. Blocking work happens off the async runtime.
    async fn generate(
        &self,
        prompt: &str,
        config: &SamplingConfig,
    ) -> Result<Vec<Completion>, EngineError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), EngineError>;
}

/// Cut `text` at the earliest stop sequence, if any occurs.
pub(crate) fn truncate_at_stop(text: &mut String, stop: &[String]) -> bool {
    let earliest = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min();

    match earliest {
        Some(idx) => {
            text.truncate(idx);
            true
        }
        None => false,
    }
}

/// Decode generated bytes, skipping invalid sequences and dropping a
/// trailing incomplete character.
#[cfg_attr(not(feature = "llama"), allow(dead_code))]
pub(crate) fn decode_utf8_ignoring_invalid(mut bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                text.push_str(valid);
                return text;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => bytes = &rest[len..],
                    None => return text,
                }
            }
        }
    }
}
