//! Provider client contract

use std::sync::Arc;

use super::language_model::LanguageModel;
use crate::error::LlmError;

/// Which model-construction method a client offers.
///
/// Decided once when the client is wrapped into a `ProviderClientInstance`,
/// so resolving a model never inspects the client again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFactory {
    /// `language_model(id)` is implemented.
    LanguageModel,
    /// Only the `chat_model(id)` fallback is implemented.
    Chat,
    /// Neither factory exists; resolution fails.
    Unsupported,
}

/// A realized backend client.
///
/// Implementors override whichever factory they support and report it
/// through `model_factory`.
pub trait ProviderClient: Send + Sync {
    fn provider_id(&self) -> &str;

    fn model_factory(&self) -> ModelFactory;

    fn language_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>, LlmError> {
        Err(LlmError::UnsupportedOperation(format!(
            "{} does not build language models (requested {model_id})",
            self.provider_id()
        )))
    }

    fn chat_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>, LlmError> {
        Err(LlmError::UnsupportedOperation(format!(
            "{} does not build chat models (requested {model_id})",
            self.provider_id()
        )))
    }
}
