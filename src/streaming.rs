//! Core Streaming Types
//!
//! Defines the stream aliases used for streaming responses from models.

use futures::Stream;
use std::pin::Pin;

use crate::error::LlmError;

pub use crate::types::ChatStreamEvent;

/// Chat Stream - Main interface for streaming responses
///
/// This is a pinned, boxed stream that yields `ChatStreamEvent` items.
/// Every `LanguageModel::do_stream` implementation returns this type.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatStreamEvent, LlmError>> + Send>>;

/// Event yielded by `RuntimeExecutor::stream_object`.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectStreamEvent {
    /// Raw JSON text received so far.
    PartialText { delta: String, accumulated: String },
    /// The final object, parsed and validated against the schema.
    Object { value: serde_json::Value },
}

/// Object stream returned by `RuntimeExecutor::stream_object`.
pub type ObjectStream = Pin<Box<dyn Stream<Item = Result<ObjectStreamEvent, LlmError>> + Send>>;
