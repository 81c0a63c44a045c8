//! Configuration for the orchestration engine.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Main configuration for the engine.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub classifier: ClassifierConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            llm: LlmConfig::from_env()?,
            cache: CacheConfig::from_env()?,
            classifier: ClassifierConfig::from_env()?,
            orchestrator: OrchestratorConfig::from_env()?,
        })
    }
}

/// LLM backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible endpoint.
    pub base_url: String,
    /// API key; optional for unauthenticated local endpoints.
    pub api_key: Option<SecretString>,
    /// Model identifier sent with each request.
    pub model: String,
    /// Per-request timeout. A hung backend surfaces as a typed timeout.
    pub timeout: Duration,
}

impl LlmConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            optional_env("LLM_BASE_URL")?.unwrap_or_else(|| "https://api.openai.com".to_string());
        let api_key = optional_env("LLM_API_KEY")?.map(SecretString::from);
        let model = optional_env("LLM_MODEL")?.unwrap_or_else(|| "gpt-4o-mini".to_string());
        let timeout = duration_env("LLM_TIMEOUT_SECS", Duration::from_secs(10))?;

        Ok(Self {
            base_url,
            api_key,
            model,
            timeout,
        })
    }
}

/// Response cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether the engine consults the cache at all.
    pub enabled: bool,
    /// Time-to-live for cache entries.
    pub ttl: Duration,
    /// Maximum number of cached entries before LRU eviction.
    pub max_entries: usize,
    /// Cosine similarity threshold for the optional semantic lookup.
    /// Only consulted when an embedding backend is configured.
    pub similarity_threshold: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600), // 1 hour
            max_entries: 1000,
            similarity_threshold: 0.90,
        }
    }
}

impl CacheConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let enabled = match optional_env("CACHE_ENABLED")? {
            Some(raw) => parse_bool("CACHE_ENABLED", &raw)?,
            None => defaults.enabled,
        };
        let ttl = duration_env("CACHE_TTL_SECS", defaults.ttl)?;
        let max_entries = match optional_env("CACHE_MAX_ENTRIES")? {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "CACHE_MAX_ENTRIES".to_string(),
                message: format!("must be a positive integer: {e}"),
            })?,
            None => defaults.max_entries,
        };
        let similarity_threshold = match optional_env("CACHE_SIMILARITY_THRESHOLD")? {
            Some(raw) => {
                let value: f32 = raw.parse().map_err(|e| ConfigError::InvalidValue {
                    key: "CACHE_SIMILARITY_THRESHOLD".to_string(),
                    message: format!("must be a number: {e}"),
                })?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::InvalidValue {
                        key: "CACHE_SIMILARITY_THRESHOLD".to_string(),
                        message: "must be between 0.0 and 1.0".to_string(),
                    });
                }
                value
            }
            None => defaults.similarity_threshold,
        };

        Ok(Self {
            enabled,
            ttl,
            max_entries,
            similarity_threshold,
        })
    }
}

/// Route classifier configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Most recent chat history characters passed to the model.
    pub max_history_chars: usize,
    /// Sampling temperature for the classification request.
    pub temperature: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_history_chars: 1000,
            temperature: 0.0,
        }
    }
}

impl ClassifierConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_history_chars = match optional_env("ROUTER_HISTORY_CHARS")? {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "ROUTER_HISTORY_CHARS".to_string(),
                message: format!("must be a non-negative integer: {e}"),
            })?,
            None => defaults.max_history_chars,
        };

        Ok(Self {
            max_history_chars,
            temperature: defaults.temperature,
        })
    }
}

/// Orchestrator fan-out configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on each sub-capability call during fan-out.
    pub subcall_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            subcall_timeout: Duration::from_secs(10),
        }
    }
}

impl OrchestratorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let subcall_timeout = duration_env(
            "ORCHESTRATOR_SUBCALL_TIMEOUT_SECS",
            Self::default().subcall_timeout,
        )?;
        Ok(Self { subcall_timeout })
    }
}

/// Read an optional environment variable, treating empty values as unset.
fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be valid UTF-8".to_string(),
        }),
    }
}

/// Read a duration in whole seconds with a default.
fn duration_env(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    match optional_env(key)? {
        Some(raw) => {
            let secs: u64 = raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("must be a number of seconds: {e}"),
            })?;
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be true or false, got {raw}"),
        }),
    }
}
