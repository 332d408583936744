use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::types::Usage;

/// Timing and token figures for one call. Times are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetrics {
    pub time_to_first_token: Option<u64>,
    pub total_time: u64,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub tokens_per_second: Option<f64>,
}

/// Times a single call.
///
/// Uses the tokio clock so tests can drive it with `tokio::time::pause`.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    started_at: Option<Instant>,
    first_token_at: Option<Instant>,
    usage: Usage,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collector that has already been started.
    pub fn started() -> Self {
        let mut collector = Self::new();
        collector.start();
        collector
    }

    /// Record t0 and forget everything measured before.
    pub fn start(&mut self) {
        self.reset();
        self.started_at = Some(Instant::now());
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Record the first token. Later calls are ignored.
    pub fn record_first_token(&mut self) {
        if self.first_token_at.is_none() {
            self.first_token_at = Some(Instant::now());
        }
    }

    /// Merge reported usage; total is derived when only prompt and completion are given.
    pub fn record_tokens(&mut self, usage: &Usage) {
        if usage.prompt_tokens.is_some() {
            self.usage.prompt_tokens = usage.prompt_tokens;
        }
        if usage.completion_tokens.is_some() {
            self.usage.completion_tokens = usage.completion_tokens;
        }
        self.usage.total_tokens = match (usage.total_tokens, usage.prompt_tokens, usage.completion_tokens) {
            (Some(total), _, _) => Some(total),
            (None, Some(p), Some(c)) => Some(p.saturating_add(c)),
            (None, _, _) => self.usage.total_tokens,
        };
    }

    pub fn get_metrics(&self) -> ModelMetrics {
        let now = Instant::now();
        let total = self
            .started_at
            .map(|t0| now.saturating_duration_since(t0))
            .unwrap_or_default();
        let ttft = match (self.started_at, self.first_token_at) {
            (Some(t0), Some(t1)) => Some(t1.saturating_duration_since(t0).as_millis() as u64),
            _ => None,
        };
        let total_ms = total.as_secs_f64() * 1000.0;
        let tokens_per_second = match self.usage.completion_tokens {
            Some(c) if c > 0 && total_ms > 0.0 => Some(f64::from(c) / total_ms * 1000.0),
            _ => None,
        };
        ModelMetrics {
            time_to_first_token: ttft,
            total_time: total.as_millis() as u64,
            prompt_tokens: self.usage.prompt_tokens,
            completion_tokens: self.usage.completion_tokens,
            total_tokens: self.usage.total_tokens,
            tokens_per_second,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
