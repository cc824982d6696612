pub mod assistant;
pub mod engine;
pub mod metrics;
pub mod prompt;

pub use assistant::MedicalAssistant;
pub use engine::{CompletionEngine, EngineError, SamplingConfig};
