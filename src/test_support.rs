//! Test support helpers (crate-internal).
//!
//! In-memory provider clients and models. Model behavior is chosen from the
//! model id so tests can script arena participants by name:
//! - ids containing `fail` return an `ApiError(500)`
//! - ids containing `slow` wait 100ms before each chunk
//! - everything else streams `["<id>", " says", " hi"]`

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::provider::{ClientConfig, ProviderBuilder, constructor_fn};
use crate::registry::ProviderRegistry;
use crate::streaming::{ChatStream, ChatStreamEvent};
use crate::traits::{LanguageModel, ModelFactory, ProviderClient};
use crate::types::{CallParams, FinishReason, GenerateTextResult, Usage};

#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Chunks(Vec<String>),
    Fail(LlmError),
}

pub(crate) struct MockModel {
    provider_id: String,
    model_id: String,
    behavior: Behavior,
    delay: Option<Duration>,
    pub(crate) calls: Arc<AtomicUsize>,
}

impl MockModel {
    pub(crate) fn new(provider_id: &str, model_id: &str, behavior: Behavior) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            model_id: model_id.to_string(),
            behavior,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn text(provider_id: &str, model_id: &str, text: &str) -> Self {
        Self::new(provider_id, model_id, Behavior::Chunks(vec![text.to_string()]))
    }

    pub(crate) fn stream(provider_id: &str, model_id: &str, chunks: Vec<&str>) -> Self {
        Self::new(
            provider_id,
            model_id,
            Behavior::Chunks(chunks.into_iter().map(str::to_string).collect()),
        )
    }

    pub(crate) fn failing(provider_id: &str, model_id: &str, error: LlmError) -> Self {
        Self::new(provider_id, model_id, Behavior::Fail(error))
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Behavior derived from the model id.
    pub(crate) fn scripted(provider_id: &str, model_id: &str) -> Self {
        let model = if model_id.contains("fail") {
            Self::failing(provider_id, model_id, LlmError::api_error(500, "mock failure"))
        } else {
            Self::stream(provider_id, model_id, vec![model_id, " says", " hi"])
        };
        if model_id.contains("slow") {
            model.with_delay(Duration::from_millis(100))
        } else {
            model
        }
    }

    fn usage(chunks: &[String]) -> Usage {
        Usage::new(10, chunks.len() as u32)
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn do_generate(&self, _params: CallParams) -> Result<GenerateTextResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        match &self.behavior {
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Chunks(chunks) => {
                let mut result = GenerateTextResult::new(chunks.concat())
                    .with_usage(Self::usage(chunks))
                    .with_finish_reason(FinishReason::Stop);
                result.provider_id = self.provider_id.clone();
                result.model_id = self.model_id.clone();
                Ok(result)
            }
        }
    }

    async fn do_stream(&self, _params: CallParams) -> Result<ChatStream, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks = match &self.behavior {
            Behavior::Fail(e) => {
                if let Some(d) = self.delay {
                    tokio::time::sleep(d).await;
                }
                return Err(e.clone());
            }
            Behavior::Chunks(chunks) => chunks.clone(),
        };
        let delay = self.delay;
        let usage = Self::usage(&chunks);
        let s = async_stream::stream! {
            for chunk in chunks {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                yield Ok(ChatStreamEvent::text(chunk));
            }
            yield Ok(ChatStreamEvent::StreamEnd {
                finish_reason: Some(FinishReason::Stop),
                usage: Some(usage),
            });
        };
        Ok(Box::pin(s))
    }
}

/// Client whose factory kind is fixed at construction.
pub(crate) struct MockClient {
    provider_id: String,
    factory: ModelFactory,
    pub(crate) models_built: Arc<AtomicUsize>,
}

impl MockClient {
    pub(crate) fn new(provider_id: &str) -> Self {
        Self::with_factory(provider_id, ModelFactory::LanguageModel)
    }

    pub(crate) fn with_factory(provider_id: &str, factory: ModelFactory) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            factory,
            models_built: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn build(&self, model_id: &str) -> Arc<dyn LanguageModel> {
        self.models_built.fetch_add(1, Ordering::SeqCst);
        Arc::new(MockModel::scripted(&self.provider_id, model_id))
    }
}

impl ProviderClient for MockClient {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn model_factory(&self) -> ModelFactory {
        self.factory
    }

    fn language_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>, LlmError> {
        Ok(self.build(model_id))
    }

    fn chat_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>, LlmError> {
        Ok(self.build(model_id))
    }
}

/// Builder wired with mock constructors for every built-in provider.
///
/// The `x-mock-factory` header selects the client's factory kind
/// (`chat` or `none`; default is `language_model`).
pub(crate) fn mock_builder(registry: Arc<ProviderRegistry>) -> ProviderBuilder {
    let ctor = constructor_fn(|cfg: &ClientConfig| {
        let factory = match cfg.headers.get("x-mock-factory").map(String::as_str) {
            Some("none") => ModelFactory::Unsupported,
            Some("chat") => ModelFactory::Chat,
            _ => ModelFactory::LanguageModel,
        };
        Ok(Arc::new(MockClient::with_factory(&cfg.provider_id, factory)) as Arc<dyn ProviderClient>)
    });
    ["openai", "anthropic", "gemini", "xai"]
        .into_iter()
        .fold(ProviderBuilder::new(registry), |b, id| {
            b.with_direct_constructor(id, ctor.clone())
        })
        .with_openai_compatible_constructor(ctor)
}
