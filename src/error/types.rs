//! Core error types.

use std::fmt;

use thiserror::Error;

/// Unified error type for registry, resolver, plugin pipeline and arena runs.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Missing or invalid connection setup (credentials, constructors, URLs).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Unknown or misconfigured provider id.
    #[error("Provider error ({provider}): {message}")]
    ProviderError { provider: String, message: String },

    /// Unparseable model reference, or a client without a model factory.
    #[error("Model resolution error: {0}")]
    ModelResolutionError(String),

    /// A plugin hook failed during init or a sequential transform.
    #[error("Plugin '{plugin}' failed in {hook}: {source}")]
    PluginError {
        plugin: String,
        hook: String,
        source: Box<LlmError>,
    },

    /// Aggregate failure of an arena comparison or race.
    #[error("Arena error: {0}")]
    ArenaError(ArenaFailure),

    /// The request was cancelled through its cancellation token.
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// Every credential of a rotation pool is cooling down.
    #[error("No available keys: {0}")]
    NoAvailableKeys(String),

    /// Error reported by a provider API.
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Coarse error category used for presentation and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Resolution,
    Plugin,
    Client,
    Server,
    Network,
    RateLimit,
    Cancelled,
    Aggregate,
    Internal,
}

/// A single failed participant of an arena run.
#[derive(Debug, Clone)]
pub struct ParticipantFailure {
    pub provider_id: String,
    pub model_id: String,
    pub error: LlmError,
}

impl ParticipantFailure {
    pub fn new(
        provider_id: impl Into<String>,
        model_id: impl Into<String>,
        error: LlmError,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            error,
        }
    }
}

impl fmt::Display for ParticipantFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}: {}", self.provider_id, self.model_id, self.error)
    }
}

/// Aggregate arena failure.
///
/// Carries every underlying failure when all participants failed, or exactly
/// the triggering failure when a run stopped on its first error.
#[derive(Debug, Clone)]
pub struct ArenaFailure {
    pub message: String,
    pub failures: Vec<ParticipantFailure>,
}

impl ArenaFailure {
    pub fn new(message: impl Into<String>, failures: Vec<ParticipantFailure>) -> Self {
        Self {
            message: message.into(),
            failures,
        }
    }
}

impl fmt::Display for ArenaFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} failure(s))", self.message, self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}
