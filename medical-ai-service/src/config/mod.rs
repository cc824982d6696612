use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_MODEL_PATH: &str = "BioMistral-7B.Q4_K_M.gguf";
const DEFAULT_CONTEXT_SIZE: u32 = 4096;
const DEFAULT_THREADS: i32 = 6;
/// `u32::MAX` asks llama.cpp to pick a random seed.
const DEFAULT_SEED: u32 = u32::MAX;

#[derive(Debug, Clone, Deserialize)]
pub struct MedicalAiConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub model: ModelConfig,
    pub cors: CorsConfig,
    pub observability: ObservabilityConfig,
}

/// Engine settings fixed at process start.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// GGUF file to load.
    pub path: PathBuf,
    /// Context window in tokens.
    pub context_size: u32,
    /// CPU threads used for prompt evaluation and generation.
    pub threads: i32,
    /// Layers offloaded to the GPU; negative offloads every layer.
    pub gpu_layers: i32,
    pub seed: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// `["*"]` means any origin.
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn is_permissive(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl MedicalAiConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_prod = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()) == "prod";
        let get = |key: &str, default: Option<&str>| get_var(&lookup, key, default, is_prod);

        let allowed_origins = get("CORS_ALLOWED_ORIGINS", Some("*"))?
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        Ok(MedicalAiConfig {
            common,
            model: ModelConfig {
                path: PathBuf::from(get("MODEL_PATH", Some(DEFAULT_MODEL_PATH))?),
                context_size: parse(
                    "MODEL_CONTEXT_SIZE",
                    &get("MODEL_CONTEXT_SIZE", Some(&DEFAULT_CONTEXT_SIZE.to_string()))?,
                )?,
                threads: parse(
                    "MODEL_THREADS",
                    &get("MODEL_THREADS", Some(&DEFAULT_THREADS.to_string()))?,
                )?,
                gpu_layers: parse("MODEL_GPU_LAYERS", &get("MODEL_GPU_LAYERS", Some("0"))?)?,
                seed: parse(
                    "MODEL_SEED",
                    &get("MODEL_SEED", Some(&DEFAULT_SEED.to_string()))?,
                )?,
            },
            cors: CorsConfig { allowed_origins },
            observability: ObservabilityConfig {
                log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|e| !e.is_empty()),
            },
        })
    }
}

fn get_var<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, value, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<MedicalAiConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MedicalAiConfig::from_lookup(core_config::Config::default(), |key| {
            vars.get(key).cloned()
        })
    }

    #[test]
    fn dev_defaults_match_reference_deployment() {
        let config = load(&[]).unwrap();

        assert_eq!(config.model.path, PathBuf::from("BioMistral-7B.Q4_K_M.gguf"));
        assert_eq!(config.model.context_size, 4096);
        assert_eq!(config.model.threads, 6);
        assert_eq!(config.model.gpu_layers, 0);
        assert_eq!(config.model.seed, u32::MAX);
        assert!(config.cors.is_permissive());
        assert_eq!(config.observability.log_level, "info");
        assert!(config.observability.otlp_endpoint.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("MODEL_PATH", "/models/mistral.gguf"),
            ("MODEL_CONTEXT_SIZE", "2048"),
            ("MODEL_GPU_LAYERS", "-1"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("OTLP_ENDPOINT", "http://tempo:4317"),
        ])
        .unwrap();

        assert_eq!(config.model.path, PathBuf::from("/models/mistral.gguf"));
        assert_eq!(config.model.context_size, 2048);
        assert_eq!(config.model.gpu_layers, -1);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert!(!config.cors.is_permissive());
        assert_eq!(
            config.observability.otlp_endpoint.as_deref(),
            Some("http://tempo:4317")
        );
    }

    #[test]
    fn rejects_non_numeric_threads() {
        let err = load(&[("MODEL_THREADS", "many")]).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert!(err.to_string().contains("MODEL_THREADS"));
    }

    #[test]
    fn production_requires_every_variable() {
        let err = load(&[("ENVIRONMENT", "prod")]).unwrap_err();
        assert!(err.to_string().contains("is required in production"));
    }
}
