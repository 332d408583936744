use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::object::ObjectSchema;
use crate::error::LlmError;
use crate::middleware::LanguageModelMiddleware;
use crate::plugin::{Plugin, PluginContext, PluginEngine, PluginManager};
use crate::provider::ProviderOptions;
use crate::resolver::{ModelResolver, parse_model_reference};
use crate::streaming::{ChatStream, ChatStreamEvent, ObjectStream, ObjectStreamEvent};
use crate::types::{CallMethod, CallParams, GenerateObjectResult, GenerateTextResult};
use crate::utils::cancel::{make_cancellable_stream, run_cancellable};

/// Per-call additions to an executor.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Appended after the executor's own plugins.
    pub plugins: Vec<Arc<dyn Plugin>>,
    /// Appended after the executor's own middleware.
    pub middlewares: Vec<Arc<dyn LanguageModelMiddleware>>,
    /// Cancels the call at its next suspension point.
    pub cancellation: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn LanguageModelMiddleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("middlewares", &self.middlewares.len())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

/// Executes calls against one provider.
#[derive(Clone)]
pub struct RuntimeExecutor {
    provider_id: String,
    options: ProviderOptions,
    resolver: Arc<ModelResolver>,
    plugins: Vec<Arc<dyn Plugin>>,
    middlewares: Vec<Arc<dyn LanguageModelMiddleware>>,
}

impl fmt::Debug for RuntimeExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeExecutor")
            .field("provider_id", &self.provider_id)
            .field("options", &self.options)
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

impl RuntimeExecutor {
    pub fn new(provider_id: impl Into<String>, resolver: Arc<ModelResolver>) -> Self {
        Self {
            provider_id: provider_id.into(),
            options: ProviderOptions::default(),
            resolver,
            plugins: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_plugins(mut self, plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn LanguageModelMiddleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    pub fn resolver(&self) -> &Arc<ModelResolver> {
        &self.resolver
    }

    /// Generate text with `model_id` (bare id or full reference).
    pub async fn generate_text(
        &self,
        model_id: &str,
        params: CallParams,
        call: CallOptions,
    ) -> Result<GenerateTextResult, LlmError> {
        self.run_generate(model_id, params, call, CallMethod::GenerateText)
            .await
    }

    /// Stream text with `model_id`.
    pub async fn stream_text(
        &self,
        model_id: &str,
        params: CallParams,
        call: CallOptions,
    ) -> Result<ChatStream, LlmError> {
        self.run_stream(model_id, params, call, CallMethod::StreamText)
            .await
    }

    /// Generate a JSON value matching `schema`.
    ///
    /// The call goes through the text path with `OutputMode::Object` and a
    /// JSON-only system hint; the text is then parsed and validated.
    pub async fn generate_object(
        &self,
        model_id: &str,
        params: CallParams,
        schema: Value,
        call: CallOptions,
    ) -> Result<GenerateObjectResult, LlmError> {
        let schema = ObjectSchema::compile(schema, object_name(&params))?;
        let params = constrain_params(params, &schema);
        let result = self
            .run_generate(model_id, params, call, CallMethod::GenerateObject)
            .await?;
        let object = schema.parse(&result.text)?;
        Ok(GenerateObjectResult {
            object,
            text: result.text,
            usage: result.usage,
            finish_reason: result.finish_reason,
            provider_id: result.provider_id,
            model_id: result.model_id,
        })
    }

    /// Stream a JSON value matching `schema`: partial text, then the object.
    pub async fn stream_object(
        &self,
        model_id: &str,
        params: CallParams,
        schema: Value,
        call: CallOptions,
    ) -> Result<ObjectStream, LlmError> {
        let schema = ObjectSchema::compile(schema, object_name(&params))?;
        let params = constrain_params(params, &schema);
        let mut inner = self
            .run_stream(model_id, params, call, CallMethod::StreamObject)
            .await?;

        let s = async_stream::stream! {
            let mut accumulated = String::new();
            while let Some(item) = inner.next().await {
                match item {
                    Ok(ChatStreamEvent::TextDelta { delta }) => {
                        accumulated.push_str(&delta);
                        yield Ok(ObjectStreamEvent::PartialText {
                            delta,
                            accumulated: accumulated.clone(),
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
            yield schema.parse(&accumulated).map(|value| ObjectStreamEvent::Object { value });
        };
        Ok(Box::pin(s))
    }

    #[instrument(skip(self, params, call), fields(provider = %self.provider_id))]
    async fn run_generate(
        &self,
        model_id: &str,
        params: CallParams,
        call: CallOptions,
        method: CallMethod,
    ) -> Result<GenerateTextResult, LlmError> {
        let engine = self.engine(&call)?;
        let middlewares = self.merged_middlewares(&call);
        let mut ctx = self.context(model_id, method, &call);
        let params = with_model(params, model_id);

        loop {
            let attempt = ctx.retry_attempt();
            let token = ctx.cancellation.clone();
            let outcome = engine
                .execute_lifecycle(params.clone(), &mut ctx, |p| {
                    self.generate_once(p, &middlewares, token)
                })
                .await;
            match outcome {
                Err(e) if should_retry(&e, &ctx, attempt) => {
                    debug!(attempt = ctx.retry_attempt(), error = %e, "Retrying request");
                }
                other => return other,
            }
        }
    }

    #[instrument(skip(self, params, call), fields(provider = %self.provider_id))]
    async fn run_stream(
        &self,
        model_id: &str,
        params: CallParams,
        call: CallOptions,
        method: CallMethod,
    ) -> Result<ChatStream, LlmError> {
        let engine = self.engine(&call)?;
        let middlewares = self.merged_middlewares(&call);
        let mut ctx = self.context(model_id, method, &call);
        let params = with_model(params, model_id);

        // Only failures before the first chunk are retried.
        loop {
            let attempt = ctx.retry_attempt();
            let token = ctx.cancellation.clone();
            let outcome = engine
                .execute_stream_lifecycle(params.clone(), &mut ctx, |p| {
                    self.stream_once(p, &middlewares, token)
                })
                .await;
            match outcome {
                Err(e) if should_retry(&e, &ctx, attempt) => {
                    debug!(attempt = ctx.retry_attempt(), error = %e, "Retrying stream request");
                }
                other => return other,
            }
        }
    }

    async fn generate_once(
        &self,
        params: CallParams,
        middlewares: &[Arc<dyn LanguageModelMiddleware>],
        token: CancellationToken,
    ) -> Result<GenerateTextResult, LlmError> {
        let reference = reference_of(&params)?;
        let options = self.effective_options(&params);
        let work = async {
            let resolved = self
                .resolver
                .resolve(&reference, Some(&self.provider_id), &options, middlewares)
                .await?;
            let mut result = resolved.model.do_generate(params).await?;
            if result.provider_id.is_empty() {
                result.provider_id = resolved.provider_id;
            }
            if result.model_id.is_empty() {
                result.model_id = resolved.model_id;
            }
            Ok(result)
        };
        run_cancellable(work, &token, &reference).await
    }

    async fn stream_once(
        &self,
        params: CallParams,
        middlewares: &[Arc<dyn LanguageModelMiddleware>],
        token: CancellationToken,
    ) -> Result<ChatStream, LlmError> {
        let reference = reference_of(&params)?;
        let options = self.effective_options(&params);
        let work = async {
            let resolved = self
                .resolver
                .resolve(&reference, Some(&self.provider_id), &options, middlewares)
                .await?;
            resolved.model.do_stream(params).await
        };
        let stream = run_cancellable(work, &token, &reference).await?;
        Ok(make_cancellable_stream(stream, token, reference))
    }

    fn engine(&self, call: &CallOptions) -> Result<PluginEngine, LlmError> {
        let manager = PluginManager::from_plugins(
            self.plugins.iter().chain(call.plugins.iter()).cloned(),
        )?;
        Ok(PluginEngine::new(manager))
    }

    fn merged_middlewares(&self, call: &CallOptions) -> Vec<Arc<dyn LanguageModelMiddleware>> {
        self.middlewares
            .iter()
            .chain(call.middlewares.iter())
            .cloned()
            .collect()
    }

    fn context(&self, model_id: &str, method: CallMethod, call: &CallOptions) -> PluginContext {
        let (provider, model) = match parse_model_reference(model_id, Some(&self.provider_id)) {
            Ok(r) => (r.provider_id, r.model_id),
            Err(_) => (self.provider_id.clone(), model_id.to_string()),
        };
        // Aliases (`google`) are keyed under the canonical id (`gemini`).
        let provider = self
            .resolver
            .builder()
            .registry()
            .canonical_id(&provider)
            .unwrap_or(provider);
        let ctx = PluginContext::new(provider, model, method);
        match &call.cancellation {
            Some(token) => ctx.with_cancellation(token.clone()),
            None => ctx,
        }
    }

    /// Executor options with the call's credential override applied.
    fn effective_options(&self, params: &CallParams) -> ProviderOptions {
        let mut options = self.options.clone();
        if let Some(key) = &params.api_key {
            options.api_key = Some(key.clone());
        }
        options
    }
}

/// Re-run when the attempt failed, nothing was cancelled, and a plugin
/// (the retry plugin) advanced the attempt counter during `on_error`.
fn should_retry(error: &LlmError, ctx: &PluginContext, attempt_before: u32) -> bool {
    !error.is_cancelled() && !ctx.is_cancelled() && ctx.retry_attempt() > attempt_before
}

fn with_model(mut params: CallParams, model_id: &str) -> CallParams {
    if params.model.is_none() {
        params.model = Some(model_id.to_string());
    }
    params
}

fn reference_of(params: &CallParams) -> Result<String, LlmError> {
    params
        .model
        .clone()
        .ok_or_else(|| LlmError::ModelResolutionError("no model specified for call".to_string()))
}

fn object_name(params: &CallParams) -> Option<String> {
    match &params.output {
        crate::types::OutputMode::Object { name, .. } => name.clone(),
        crate::types::OutputMode::Text => None,
    }
}

fn constrain_params(mut params: CallParams, schema: &ObjectSchema) -> CallParams {
    params.output = schema.output_mode();
    schema.constrain(&mut params.messages);
    params
}
