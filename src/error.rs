//! Error types for the orchestration engine.

use std::time::Duration;

use crate::capability::Capability;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Configuration-related errors.
///
/// The only fatal class in the system: everything else is recovered locally
/// at the component where it occurs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Capability {capability} has no registered handler")]
    MissingCapability { capability: Capability },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Whether the request that produced this error is worth retrying.
    ///
    /// Auth failures and malformed responses are not: the same request will
    /// fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RequestFailed { .. }
            | LlmError::RateLimited { .. }
            | LlmError::Timeout { .. } => true,
            LlmError::Http(e) => e.is_timeout() || e.is_connect(),
            LlmError::InvalidResponse { .. } | LlmError::AuthFailed { .. } | LlmError::Json(_) => {
                false
            }
        }
    }
}

/// Route classification errors.
///
/// Never escape the classifier: any of these triggers the deterministic
/// keyword fallback, which always produces a decision.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed route decision: {reason}")]
    MalformedDecision { reason: String },

    #[error("Unknown capability label: {label}")]
    UnknownLabel { label: String },
}

/// Capability handler errors.
///
/// Typed failures at the collaborator boundary. Handlers must return one of
/// these instead of panicking; the executor converts them into a user-safe
/// error response.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Capability {capability} search failed: {reason}")]
    Search {
        capability: Capability,
        reason: String,
    },

    #[error("Capability {capability} timed out after {timeout:?}")]
    Timeout {
        capability: Capability,
        timeout: Duration,
    },

    #[error("Capability {capability} returned an empty response")]
    EmptyResponse { capability: Capability },
}

impl CapabilityError {
    /// The capability this failure originated from.
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityError::Search { capability, .. }
            | CapabilityError::Timeout { capability, .. }
            | CapabilityError::EmptyResponse { capability } => *capability,
        }
    }
}

/// Cache backend errors.
///
/// A failing backend never fails the request: the engine proceeds uncached.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {reason}")]
    Backend { reason: String },

    #[error("Embedding backend error: {reason}")]
    Embedding { reason: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
