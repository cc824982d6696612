//! llama.cpp backend.
//!
//! Loads a GGUF model once and runs completions on tokio's blocking pool.
//! A fresh context (and KV cache) is created for every call; one mutex keeps
//! at most one context alive at a time.

use super::{
    decode_utf8_ignoring_invalid, truncate_at_stop, Completion, CompletionEngine, EngineError,
    FinishReason, SamplingConfig,
};
use crate::config::ModelConfig;
use async_trait::async_trait;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::LlamaToken;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Instant;

struct Inner {
    // Field order matters: the model must drop before the backend.
    model: LlamaModel,
    backend: LlamaBackend,
    context_size: u32,
    threads: i32,
    seed: u32,
    model_name: String,
    lock: Mutex<()>,
}

/// Engine backed by a GGUF model loaded through llama.cpp.
#[derive(Clone)]
pub struct LlamaEngine {
    inner: Arc<Inner>,
}

impl LlamaEngine {
    /// Load the model described by `config`. Blocks for the whole load.
    pub fn load(config: &ModelConfig) -> Result<Self, EngineError> {
        let mut backend =
            LlamaBackend::init().map_err(|e| EngineError::NotLoaded(e.to_string()))?;
        backend.void_logs();

        // llama.cpp treats any count above the layer count as "all layers".
        let gpu_layers = u32::try_from(config.gpu_layers).unwrap_or(u32::MAX);
        let model_params = LlamaModelParams::default().with_n_gpu_layers(gpu_layers);

        let model = LlamaModel::load_from_file(&backend, &config.path, &model_params).map_err(
            |e| EngineError::NotLoaded(format!("{}: {}", config.path.display(), e)),
        )?;

        let model_name = config
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "llama".to_string());

        tracing::info!(
            model = %model_name,
            context_size = config.context_size,
            threads = config.threads,
            gpu_layers = config.gpu_layers,
            "Model loaded"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                model,
                backend,
                context_size: config.context_size,
                threads: config.threads,
                seed: config.seed,
                model_name,
                lock: Mutex::new(()),
            }),
        })
    }
}

#[async_trait]
impl CompletionEngine for LlamaEngine {
    fn name(&self) -> &str {
        &self.inner.model_name
    }

    async fn generate(
        &self,
        prompt: &str,
        config: &SamplingConfig,
    ) -> Result<Vec<Completion>, EngineError> {
        let inner = Arc::clone(&self.inner);
        let prompt = prompt.to_string();
        let config = config.clone();

        tokio::task::spawn_blocking(move || {
            let _guard = inner
                .lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            inner.complete(&prompt, &config)
        })
        .await
        .map_err(|e| EngineError::Internal(e.to_string()))?
        .map(|completion| vec![completion])
    }

    async fn health_check(&self) -> Result<(), EngineError> {
        // The model is loaded before the engine exists and is never unloaded.
        Ok(())
    }
}

impl Inner {
    fn complete(&self, prompt: &str, config: &SamplingConfig) -> Result<Completion, EngineError> {
        let started = Instant::now();
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.context_size))
            .with_n_threads(self.threads)
            .with_n_threads_batch(self.threads);
        let mut ctx = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        let context_size = ctx.n_ctx() as usize;
        if tokens.is_empty() || tokens.len() >= context_size {
            return Err(EngineError::ContextOverflow {
                prompt_tokens: tokens.len(),
                context_size,
            });
        }
        let budget = config.max_tokens.min(context_size - tokens.len());

        let mut batch = LlamaBatch::new(ctx.n_batch() as usize, 1);
        evaluate_prompt(&mut ctx, &mut batch, &tokens)?;

        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::penalties(config.repeat_last_n, config.repeat_penalty, 0.0, 0.0),
            LlamaSampler::top_k(config.top_k),
            LlamaSampler::top_p(config.top_p, 1),
            LlamaSampler::min_p(config.min_p, 1),
            LlamaSampler::temp(config.temperature),
            LlamaSampler::dist(self.seed),
        ]);

        let mut bytes = Vec::new();
        let mut text = String::new();
        let mut generated = 0;
        let mut finish_reason = FinishReason::Length;
        let mut position = tokens.len() as i32;

        while generated < budget {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);
            generated += 1;

            if self.model.is_eog_token(token) {
                finish_reason = FinishReason::Stop;
                break;
            }

            let piece = self
                .model
                .token_to_bytes(token, Special::Plaintext)
                .map_err(|e| EngineError::Inference(e.to_string()))?;
            bytes.extend_from_slice(&piece);
            // Tokens can split a UTF-8 sequence; decode the whole buffer each step.
            text = decode_utf8_ignoring_invalid(&bytes);
            if truncate_at_stop(&mut text, &config.stop) {
                finish_reason = FinishReason::Stop;
                break;
            }

            batch.clear();
            batch
                .add(token, position, &[0], true)
                .map_err(|e| EngineError::Inference(e.to_string()))?;
            position += 1;
            ctx.decode(&mut batch)
                .map_err(|e| EngineError::Inference(e.to_string()))?;
        }

        let elapsed = started.elapsed().as_secs_f64();
        tracing::debug!(
            prompt_tokens = tokens.len(),
            completion_tokens = generated,
            finish_reason = finish_reason.as_str(),
            tokens_per_second = generated as f64 / elapsed.max(f64::EPSILON),
            "Completion finished"
        );

        if config.echo {
            text.insert_str(0, prompt);
        }

        Ok(Completion {
            text,
            prompt_tokens: tokens.len(),
            completion_tokens: generated,
            finish_reason,
        })
    }
}

/// Feed the prompt through the model in `n_batch`-sized chunks, requesting
/// logits only for the final token.
fn evaluate_prompt(
    ctx: &mut LlamaContext<'_>,
    batch: &mut LlamaBatch,
    tokens: &[LlamaToken],
) -> Result<(), EngineError> {
    let chunk_size = (ctx.n_batch() as usize).max(1);
    let last = tokens.len() - 1;

    for (chunk_index, chunk) in tokens.chunks(chunk_size).enumerate() {
        batch.clear();
        for (offset, token) in chunk.iter().enumerate() {
            let position = chunk_index * chunk_size + offset;
            batch
                .add(*token, position as i32, &[0], position == last)
                .map_err(|e| EngineError::Inference(e.to_string()))?;
        }
        ctx.decode(batch)
            .map_err(|e| EngineError::Inference(e.to_string()))?;
    }

    Ok(())
}
