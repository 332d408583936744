//! Shared fixtures: an in-memory provider whose behavior is scripted by model id.
//!
//! - `fail`: `ApiError(500)`
//! - `slow`: 100ms before every chunk (and before failing)
//! - `flaky`: `ApiError(503)` when the client was built with the key `bad-key`
//! - `broken`: streams the first chunk, then fails with `ApiError(503)`
//! - `json`: streams `{"name": "Ada", "age": 36}` in pieces
//! - otherwise: `"<model> says hi"` in three chunks

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use siumai_arena::prelude::*;
use siumai_arena::provider::constructor_fn;
use siumai_arena::types::FinishReason;

pub struct ScriptedModel {
    provider_id: String,
    model_id: String,
    api_key: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedModel {
    fn chunks(&self) -> Vec<String> {
        if self.model_id.contains("json") {
            vec![
                "{\"name\": ".into(),
                "\"Ada\", ".into(),
                "\"age\": 36}".into(),
            ]
        } else {
            vec![self.model_id.clone(), " says".into(), " hi".into()]
        }
    }

    fn delay(&self) -> Option<Duration> {
        self.model_id
            .contains("slow")
            .then(|| Duration::from_millis(100))
    }

    fn failure(&self) -> Option<LlmError> {
        if self.model_id.contains("fail") {
            return Some(LlmError::api_error(500, format!("{} exploded", self.model_id)));
        }
        if self.model_id.contains("flaky") && self.api_key.as_deref() == Some("bad-key") {
            return Some(LlmError::api_error(503, "service unavailable"));
        }
        None
    }

    fn usage(chunks: &[String]) -> Usage {
        Usage::new(10, chunks.len() as u32)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn do_generate(&self, _params: CallParams) -> Result<GenerateTextResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay() {
            tokio::time::sleep(d).await;
        }
        if let Some(e) = self.failure() {
            return Err(e);
        }
        let chunks = self.chunks();
        let mut result = GenerateTextResult::new(chunks.concat())
            .with_usage(Self::usage(&chunks))
            .with_finish_reason(FinishReason::Stop);
        result.provider_id = self.provider_id.clone();
        result.model_id = self.model_id.clone();
        Ok(result)
    }

    async fn do_stream(&self, _params: CallParams) -> Result<ChatStream, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.failure() {
            if let Some(d) = self.delay() {
                tokio::time::sleep(d).await;
            }
            return Err(e);
        }
        let chunks = self.chunks();
        let usage = Self::usage(&chunks);
        let delay = self.delay();
        let broken = self.model_id.contains("broken");
        Ok(Box::pin(async_stream::stream! {
            for chunk in chunks {
                if broken && chunk.starts_with(' ') {
                    yield Err(LlmError::api_error(503, "upstream connection reset"));
                    return;
                }
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                yield Ok(ChatStreamEvent::TextDelta { delta: chunk });
            }
            yield Ok(ChatStreamEvent::StreamEnd {
                finish_reason: Some(FinishReason::Stop),
                usage: Some(usage),
            });
        }))
    }
}

pub struct ScriptedClient {
    config: ClientConfig,
    calls: Arc<AtomicUsize>,
}

impl ProviderClient for ScriptedClient {
    fn provider_id(&self) -> &str {
        &self.config.provider_id
    }

    fn model_factory(&self) -> ModelFactory {
        ModelFactory::LanguageModel
    }

    fn language_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>, LlmError> {
        Ok(Arc::new(ScriptedModel {
            provider_id: self.config.provider_id.clone(),
            model_id: model_id.to_string(),
            api_key: self
                .config
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string()),
            calls: self.calls.clone(),
        }))
    }
}

/// Registry + builder + resolver wired to scripted clients.
pub struct Harness {
    pub registry: Arc<ProviderRegistry>,
    pub resolver: Arc<ModelResolver>,
    /// Every config a client was constructed from.
    pub configs: Arc<Mutex<Vec<ClientConfig>>>,
    /// Generation calls across all scripted models.
    pub calls: Arc<AtomicUsize>,
}

impl Harness {
    pub fn new() -> Self {
        let registry = Arc::new(ProviderRegistry::with_builtin_providers());
        let configs = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let (seen, counter) = (configs.clone(), calls.clone());
        let ctor = constructor_fn(move |cfg: &ClientConfig| {
            seen.lock().unwrap().push(cfg.clone());
            Ok(Arc::new(ScriptedClient {
                config: cfg.clone(),
                calls: counter.clone(),
            }) as Arc<dyn ProviderClient>)
        });
        let builder = ["openai", "anthropic", "gemini", "xai"]
            .into_iter()
            .fold(ProviderBuilder::new(registry.clone()), |b, id| {
                b.with_direct_constructor(id, ctor.clone())
            })
            .with_openai_compatible_constructor(ctor);

        Self {
            registry,
            resolver: Arc::new(ModelResolver::new(Arc::new(builder))),
            configs,
            calls,
        }
    }

    pub fn constructed(&self) -> usize {
        self.configs.lock().unwrap().len()
    }

    pub fn last_config(&self) -> ClientConfig {
        self.configs.lock().unwrap().last().cloned().unwrap()
    }

    pub fn executor(&self, provider_id: &str) -> RuntimeExecutor {
        RuntimeExecutor::new(provider_id, self.resolver.clone())
            .with_options(ProviderOptions::new().with_api_key("sk-test"))
    }

    /// Arena with a test key for every provider used by the tests.
    pub fn arena(&self) -> Arena {
        ["openai", "anthropic", "gemini", "xai", "deepseek"]
            .into_iter()
            .fold(Arena::new(self.resolver.clone()), |a, p| {
                a.with_provider_options(p, ProviderOptions::new().with_api_key("sk-test"))
            })
    }
}

pub fn user(text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(text)]
}
