//! Mock engine for testing.

use super::{
    truncate_at_stop, Completion, CompletionEngine, EngineError, FinishReason, SamplingConfig,
};
use crate::services::prompt::DISCLAIMER;
use async_trait::async_trait;
use std::sync::Mutex;

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text as the model output. Stop sequences still apply.
    Fixed(String),
    /// Return this text followed by the disclaimer, as a compliant model would.
    Compliant(String),
    /// Return the prompt verbatim.
    EchoPrompt,
    /// Fail every call with an inference error.
    Fail(String),
}

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub config: SamplingConfig,
}

/// Mock engine that records every call it receives.
pub struct MockEngine {
    reply: MockReply,
    loaded: bool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockEngine {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply,
            loaded: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// An engine whose model never finished loading.
    pub fn unloaded() -> Self {
        Self {
            reply: MockReply::Fail("model not loaded".to_string()),
            loaded: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl CompletionEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        config: &SamplingConfig,
    ) -> Result<Vec<Completion>, EngineError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                prompt: prompt.to_string(),
                config: config.clone(),
            });

        if !self.loaded {
            return Err(EngineError::NotLoaded(
                "Mock engine not loaded".to_string(),
            ));
        }

        let mut text = match &self.reply {
            MockReply::Fixed(text) => text.clone(),
            MockReply::Compliant(body) => format!("{}\n\n{}", body, DISCLAIMER),
            MockReply::EchoPrompt => prompt.to_string(),
            MockReply::Fail(reason) => return Err(EngineError::Inference(reason.clone())),
        };

        if !matches!(self.reply, MockReply::EchoPrompt) {
            truncate_at_stop(&mut text, &config.stop);
        }

        Ok(vec![Completion {
            completion_tokens: text.split_whitespace().count(),
            text,
            prompt_tokens: prompt.split_whitespace().count(),
            finish_reason: FinishReason::Stop,
        }])
    }

    async fn health_check(&self) -> Result<(), EngineError> {
        if self.loaded {
            Ok(())
        } else {
            Err(EngineError::NotLoaded(
                "Mock engine not loaded".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_prompt_and_config() {
        let engine = MockEngine::new(MockReply::Fixed("ok".to_string()));
        let config = SamplingConfig::default();

        engine.generate("hello", &config).await.unwrap();

        let calls = engine.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, "hello");
        assert_eq!(calls[0].config, config);
    }

    #[tokio::test]
    async fn fixed_reply_honours_stop_sequences() {
        let engine = MockEngine::new(MockReply::Fixed("Eat greens.</s>[INST] again".to_string()));

        let completions = engine
            .generate("prompt", &SamplingConfig::default())
            .await
            .unwrap();

        assert_eq!(completions[0].text, "Eat greens.");
    }

    #[tokio::test]
    async fn unloaded_engine_fails_health_and_generation() {
        let engine = MockEngine::unloaded();

        assert!(engine.health_check().await.is_err());
        let err = engine
            .generate("prompt", &SamplingConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotLoaded(_)));
        assert_eq!(engine.call_count(), 1);
    }
}
