//! Per-request plugin context

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::types::CallMethod;

/// Mutable scratchpad for one logical call.
///
/// Exactly one context exists per request (one per arena participant); it is
/// never shared between concurrent requests. Well-known cross-plugin signals
/// have typed fields; `metadata` is for ad hoc data.
#[derive(Debug)]
pub struct PluginContext {
    pub request_id: String,
    pub provider_id: String,
    pub model_id: String,
    pub method: CallMethod,
    /// Credential label chosen by key rotation, for error attribution.
    pub selected_key: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub started_at: Instant,
    pub cancellation: CancellationToken,
    // Advanced by the retry plugin from the (shared-reference) on_error hook.
    retry_attempt: AtomicU32,
    // Set once chunks flow; failures after this point cannot be re-run.
    stream_started: bool,
}

impl PluginContext {
    pub fn new(
        provider_id: impl Into<String>,
        model_id: impl Into<String>,
        method: CallMethod,
    ) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            method,
            selected_key: None,
            metadata: HashMap::new(),
            started_at: Instant::now(),
            cancellation: CancellationToken::new(),
            retry_attempt: AtomicU32::new(0),
            stream_started: false,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Retry attempts signalled so far (0 on the first attempt).
    pub fn retry_attempt(&self) -> u32 {
        self.retry_attempt.load(Ordering::SeqCst)
    }

    /// Signal that the failed attempt should be re-run. Returns the new count.
    pub fn increment_retry_attempt(&self) -> u32 {
        self.retry_attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mark the request as past the point where a failed attempt can be retried.
    pub fn mark_stream_started(&mut self) {
        self.stream_started = true;
    }

    /// Whether the response stream has already been handed to the caller.
    pub fn stream_started(&self) -> bool {
        self.stream_started
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// `provider:model:method`, the key metrics are aggregated under.
    pub fn call_key(&self) -> String {
        format!("{}:{}:{}", self.provider_id, self.model_id, self.method)
    }
}

impl Clone for PluginContext {
    fn clone(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            provider_id: self.provider_id.clone(),
            model_id: self.model_id.clone(),
            method: self.method,
            selected_key: self.selected_key.clone(),
            metadata: self.metadata.clone(),
            started_at: self.started_at,
            cancellation: self.cancellation.clone(),
            retry_attempt: AtomicU32::new(self.retry_attempt()),
            stream_started: self.stream_started,
        }
    }
}
