//! Generation results and token usage.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Token usage reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl Usage {
    /// Usage with prompt and completion counts; total is derived.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            total_tokens: Some(prompt_tokens.saturating_add(completion_tokens)),
        }
    }
}

/// Why a generation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other(String),
}

/// Result of a text generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateTextResult {
    pub text: String,
    pub reasoning: Option<String>,
    pub usage: Option<Usage>,
    pub finish_reason: Option<FinishReason>,
    pub provider_id: String,
    pub model_id: String,
    /// Provider-specific response metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GenerateTextResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }
}

/// Result of an object generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateObjectResult {
    pub object: serde_json::Value,
    /// Raw model text the object was parsed from.
    pub text: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<FinishReason>,
    pub provider_id: String,
    pub model_id: String,
}
