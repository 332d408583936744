//! Realized provider client instance

use std::fmt;
use std::sync::Arc;

use crate::error::LlmError;
use crate::traits::{LanguageModel, ModelFactory, ProviderClient};
use crate::types::WireFormat;

/// A client bound to one descriptor + option set.
///
/// Stateless beyond its configuration and safe to share across requests.
#[derive(Clone)]
pub struct ProviderClientInstance {
    provider_id: String,
    wire_format: WireFormat,
    base_url: Option<String>,
    cache_key: String,
    factory: ModelFactory,
    client: Arc<dyn ProviderClient>,
}

impl ProviderClientInstance {
    /// Wrap `client`, capturing its model factory once.
    pub fn new(
        provider_id: impl Into<String>,
        wire_format: WireFormat,
        base_url: Option<String>,
        cache_key: impl Into<String>,
        client: Arc<dyn ProviderClient>,
    ) -> Self {
        let factory = client.model_factory();
        Self {
            provider_id: provider_id.into(),
            wire_format,
            base_url,
            cache_key: cache_key.into(),
            factory,
            client,
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn wire_format(&self) -> WireFormat {
        self.wire_format
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn model_factory(&self) -> ModelFactory {
        self.factory
    }

    pub fn client(&self) -> &Arc<dyn ProviderClient> {
        &self.client
    }

    /// Build a model handle through whichever factory the client offers.
    pub fn model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>, LlmError> {
        match self.factory {
            ModelFactory::LanguageModel => self.client.language_model(model_id),
            ModelFactory::Chat => self.client.chat_model(model_id),
            ModelFactory::Unsupported => Err(LlmError::ModelResolutionError(format!(
                "client for provider '{}' exposes neither language_model nor chat_model; \
                 cannot build model '{model_id}'",
                self.provider_id
            ))),
        }
    }
}

impl fmt::Debug for ProviderClientInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClientInstance")
            .field("provider_id", &self.provider_id)
            .field("wire_format", &self.wire_format)
            .field("base_url", &self.base_url)
            .field("factory", &self.factory)
            .finish()
    }
}
