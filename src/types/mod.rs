//! Shared request/response types.

pub mod chat;
pub mod params;
pub mod response;
pub mod streaming;

pub use chat::{ChatMessage, MessageRole};
pub use params::{CallMethod, CallParams, OutputMode, WireFormat};
pub use response::{FinishReason, GenerateObjectResult, GenerateTextResult, Usage};
pub use streaming::ChatStreamEvent;
