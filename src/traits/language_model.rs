//! Language model handle

use async_trait::async_trait;

use crate::error::LlmError;
use crate::streaming::ChatStream;
use crate::types::{CallParams, GenerateTextResult};

/// A callable model bound to one provider client.
///
/// This is the generation primitive every runtime path ends in. Object mode
/// is layered on top of `do_generate`/`do_stream` by the executor.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn provider_id(&self) -> &str;

    fn model_id(&self) -> &str;

    /// Non-streaming generation.
    async fn do_generate(&self, params: CallParams) -> Result<GenerateTextResult, LlmError>;

    /// Streaming generation.
    async fn do_stream(&self, params: CallParams) -> Result<ChatStream, LlmError>;
}
