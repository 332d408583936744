//! Streaming event types

use serde::{Deserialize, Serialize};

use super::response::{FinishReason, Usage};

/// A single event yielded by a model stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// Incremental text content.
    TextDelta { delta: String },
    /// Incremental reasoning/thinking content.
    ReasoningDelta { delta: String },
    /// Usage snapshot reported mid-stream.
    UsageUpdate { usage: Usage },
    /// Terminal event with final usage when the provider reports it.
    StreamEnd {
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    },
}

impl ChatStreamEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        Self::TextDelta {
            delta: delta.into(),
        }
    }

    /// Whether this event carries generated content (text or reasoning).
    pub fn is_content(&self) -> bool {
        matches!(self, Self::TextDelta { .. } | Self::ReasoningDelta { .. })
    }
}
