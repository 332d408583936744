//! Arena data types

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::metrics::ModelMetrics;
use crate::provider::ProviderOptions;
use crate::resolver::parse_model_reference;
use crate::types::GenerateTextResult;
use crate::utils::CancelHandle;

/// One (provider, model) participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider_id: String,
    pub model_id: String,
    /// Overrides the arena's options for this provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ProviderOptions>,
}

impl ModelSpec {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            options: None,
        }
    }

    /// Parse `provider>model` (or `:` / `|`).
    pub fn parse(reference: &str) -> Result<Self, LlmError> {
        let r = parse_model_reference(reference, None)?;
        Ok(Self::new(r.provider_id, r.model_id))
    }

    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// `provider>model`
    pub fn label(&self) -> String {
        format!("{}>{}", self.provider_id, self.model_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Success,
    Failed,
    Cancelled,
}

/// Outcome of one participant. Metrics are present even on failure.
#[derive(Debug, Clone)]
pub struct ModelComparisonResult {
    pub provider_id: String,
    pub model_id: String,
    pub status: ComparisonStatus,
    pub result: Option<GenerateTextResult>,
    pub error: Option<LlmError>,
    pub metrics: ModelMetrics,
}

impl ModelComparisonResult {
    pub fn is_success(&self) -> bool {
        self.status == ComparisonStatus::Success
    }

    pub fn text(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.text.as_str())
    }
}

/// Streamed chunk of one participant: `(model, delta, text so far)`.
pub type ProgressCallback = Arc<dyn Fn(&ModelSpec, &str, &str) + Send + Sync>;

/// Options for `Arena::compare_models` and `Arena::race_models`.
#[derive(Clone)]
pub struct CompareOptions {
    /// Stream each participant (records TTFT); otherwise generate directly.
    pub stream: bool,
    /// Abort every participant on the first failure.
    pub stop_on_error: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// External cancellation; the run uses a child of this token.
    pub cancellation: Option<CancellationToken>,
    pub on_progress: Option<ProgressCallback>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            stream: true,
            stop_on_error: false,
            temperature: None,
            max_tokens: None,
            cancellation: None,
            on_progress: None,
        }
    }
}

impl fmt::Debug for CompareOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompareOptions")
            .field("stream", &self.stream)
            .field("stop_on_error", &self.stop_on_error)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("cancellation", &self.cancellation.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl CompareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Cancel the comparison when `handle` fires.
    pub fn with_cancel_handle(self, handle: &CancelHandle) -> Self {
        self.with_cancellation(handle.token().clone())
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}
