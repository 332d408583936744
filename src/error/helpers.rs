//! Constructors and classification helpers for `LlmError`.

use super::types::{ArenaFailure, ErrorCategory, LlmError};

impl LlmError {
    /// Create an API error from a status code and message.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a provider error attributed to `provider`.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Wrap a hook failure with plugin and hook attribution.
    pub fn plugin(plugin: impl Into<String>, hook: impl Into<String>, source: LlmError) -> Self {
        Self::PluginError {
            plugin: plugin.into(),
            hook: hook.into(),
            source: Box::new(source),
        }
    }

    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigurationError(_) | Self::ProviderError { .. } => {
                ErrorCategory::Configuration
            }
            Self::ModelResolutionError(_) => ErrorCategory::Resolution,
            Self::PluginError { .. } | Self::NoAvailableKeys(_) => ErrorCategory::Plugin,
            Self::ArenaError(_) => ErrorCategory::Aggregate,
            Self::Cancelled(_) => ErrorCategory::Cancelled,
            Self::RateLimitError(_) => ErrorCategory::RateLimit,
            Self::ApiError { code, .. } => match *code {
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Client,
            },
            Self::TimeoutError(_) | Self::ConnectionError(_) | Self::StreamError(_) => {
                ErrorCategory::Network
            }
            Self::ParseError(_) | Self::InvalidParameter(_) | Self::UnsupportedOperation(_) => {
                ErrorCategory::Client
            }
            Self::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Whether this error is a transient failure worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitError(_) | Self::TimeoutError(_) | Self::ConnectionError(_) => true,
            Self::ApiError { code, .. } => matches!(*code, 408 | 429 | 500..=599),
            _ => false,
        }
    }

    /// Whether this error represents cancellation, looking through plugin wrappers.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled(_) => true,
            Self::PluginError { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Aggregate failure details when this is an arena error.
    pub fn arena_failure(&self) -> Option<&ArenaFailure> {
        match self {
            Self::ArenaError(failure) => Some(failure),
            _ => None,
        }
    }

    /// Unwrap plugin attribution and return the innermost error.
    pub fn root_cause(&self) -> &LlmError {
        match self {
            Self::PluginError { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
