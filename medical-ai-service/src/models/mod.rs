pub mod generation;

pub use generation::{Banner, GenerationResult, Query};
