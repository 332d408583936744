//! Retry plugin
//!
//! Decides whether a failed attempt is worth repeating, waits out the backoff
//! and signals the caller by advancing the context's attempt counter. The
//! re-attempt itself is the executor's loop.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use regex::RegexSet;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::plugin::{ErrorHook, Plugin, PluginContext};

/// Transient failures retried when no patterns are configured.
const DEFAULT_RETRYABLE_PATTERNS: &[&str] = &[
    r"(?i)timed? ?out",
    r"(?i)rate.?limit",
    r"(?i)too many requests",
    r"(?i)temporarily unavailable",
    r"(?i)overloaded",
    r"(?i)connection (reset|refused|closed)",
    r"(?i)econnreset|etimedout|enotfound",
    r"\b(408|429|500|502|503|504)\b",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    /// `initial * (attempt + 1)`
    Linear,
    /// `initial * 2^attempt`
    #[default]
    Exponential,
    /// Always `initial`.
    Fixed,
}

/// Retry plugin configuration
#[derive(Debug, Clone)]
pub struct RetryPluginConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff: BackoffStrategy,
    /// Jitter as a fraction of the nominal delay (0.0 to 1.0).
    pub jitter_factor: f64,
    /// Regexes matched against the error message. Empty means the default set.
    pub retryable_patterns: Vec<String>,
}

impl Default for RetryPluginConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff: BackoffStrategy::Exponential,
            jitter_factor: 0.1,
            retryable_patterns: Vec::new(),
        }
    }
}

impl RetryPluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub const fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn with_retryable_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.retryable_patterns.push(pattern.into());
        self
    }
}

pub struct RetryPlugin {
    config: RetryPluginConfig,
    patterns: RegexSet,
    custom_patterns: bool,
}

impl RetryPlugin {
    pub const NAME: &'static str = "retry";

    /// Fails with `InvalidParameter` when a configured pattern does not compile.
    pub fn new(config: RetryPluginConfig) -> Result<Self, LlmError> {
        let custom_patterns = !config.retryable_patterns.is_empty();
        let patterns = if custom_patterns {
            RegexSet::new(&config.retryable_patterns)
        } else {
            RegexSet::new(DEFAULT_RETRYABLE_PATTERNS)
        }
        .map_err(|e| LlmError::InvalidParameter(format!("Invalid retry pattern: {e}")))?;
        Ok(Self {
            config,
            patterns,
            custom_patterns,
        })
    }

    pub fn config(&self) -> &RetryPluginConfig {
        &self.config
    }

    /// Whether `error` is worth another attempt.
    ///
    /// Configured patterns are the only criterion when present; otherwise the
    /// error's own classification or the default transient set decides.
    pub fn is_retryable(&self, error: &LlmError) -> bool {
        let error = error.root_cause();
        if error.is_cancelled() {
            return false;
        }
        let message = error.to_string();
        if self.custom_patterns {
            return self.patterns.is_match(&message);
        }
        error.is_retryable() || self.patterns.is_match(&message)
    }

    /// Backoff before retry `attempt` (0-based), capped at `max_delay`, without jitter.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_delay.as_millis() as f64;
        let base = match self.config.backoff {
            BackoffStrategy::Linear => initial * f64::from(attempt + 1),
            BackoffStrategy::Exponential => initial * 2f64.powi(attempt.min(62) as i32),
            BackoffStrategy::Fixed => initial,
        };
        let max = self.config.max_delay.as_millis() as f64;
        Duration::from_millis(base.min(max) as u64)
    }

    /// Nominal delay with random jitter applied.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = self.nominal_delay(attempt);
        let range = delay.as_millis() as f64 * self.config.jitter_factor;
        if range <= 0.0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(-range..=range);
        Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
    }
}

#[async_trait]
impl ErrorHook for RetryPlugin {
    async fn on_error(&self, ctx: &PluginContext, error: &LlmError) -> Result<(), LlmError> {
        let attempt = ctx.retry_attempt();
        if ctx.stream_started() {
            debug!(request_id = %ctx.request_id, "Mid-stream failure; not retrying");
            return Ok(());
        }
        if ctx.is_cancelled() || attempt >= self.config.max_retries || !self.is_retryable(error) {
            return Ok(());
        }
        let delay = self.calculate_delay(attempt);
        debug!(
            request_id = %ctx.request_id,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying after backoff"
        );
        tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => {
                warn!(request_id = %ctx.request_id, "Retry abandoned: request cancelled");
                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }
        ctx.increment_retry_attempt();
        Ok(())
    }
}

impl Plugin for RetryPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn error_hook(&self) -> Option<&dyn ErrorHook> {
        Some(self)
    }
}
