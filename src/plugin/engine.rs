//! Plugin engine
//!
//! Drives a request through the manager's plugins. Sequential hooks fold a
//! value through every plugin and abort on the first failure; parallel hooks
//! are side-effect only and run concurrently, each in its own failure
//! boundary; stream hooks fold each chunk and never fail the stream.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use futures_util::StreamExt;
use tracing::{debug, warn};

use super::context::PluginContext;
use super::hooks::{Plugin, PluginHook};
use super::manager::PluginManager;
use crate::error::LlmError;
use crate::resolver::parse_model_reference;
use crate::streaming::{ChatStream, ChatStreamEvent};
use crate::types::{CallParams, FinishReason, GenerateTextResult, Usage};

/// A value folded through a sequential hook.
pub trait SequentialValue: Sized + Send {
    const HOOK: PluginHook;

    /// Run this value's hook on `plugin`, or hand the value back when the
    /// plugin lacks it.
    fn apply<'a>(
        plugin: &'a dyn Plugin,
        value: Self,
        ctx: &'a mut PluginContext,
    ) -> Result<BoxFuture<'a, Result<Self, LlmError>>, Self>;
}

impl SequentialValue for CallParams {
    const HOOK: PluginHook = PluginHook::TransformParams;

    fn apply<'a>(
        plugin: &'a dyn Plugin,
        value: Self,
        ctx: &'a mut PluginContext,
    ) -> Result<BoxFuture<'a, Result<Self, LlmError>>, Self> {
        match plugin.transform_params_hook() {
            Some(hook) => Ok(hook.transform_params(value, ctx)),
            None => Err(value),
        }
    }
}

impl SequentialValue for GenerateTextResult {
    const HOOK: PluginHook = PluginHook::TransformResult;

    fn apply<'a>(
        plugin: &'a dyn Plugin,
        value: Self,
        ctx: &'a mut PluginContext,
    ) -> Result<BoxFuture<'a, Result<Self, LlmError>>, Self> {
        match plugin.transform_result_hook() {
            Some(hook) => Ok(hook.transform_result(value, ctx)),
            None => Err(value),
        }
    }
}

/// Argument of a parallel (side-effect only) hook.
#[derive(Debug, Clone, Copy)]
pub enum LifecycleEvent<'a> {
    RequestStart(&'a CallParams),
    RequestEnd(&'a GenerateTextResult),
    Error(&'a LlmError),
}

impl LifecycleEvent<'_> {
    pub fn hook(&self) -> PluginHook {
        match self {
            Self::RequestStart(_) => PluginHook::RequestStart,
            Self::RequestEnd(_) => PluginHook::RequestEnd,
            Self::Error(_) => PluginHook::Error,
        }
    }
}

/// Executes plugin hooks for one call.
#[derive(Clone, Default)]
pub struct PluginEngine {
    manager: Arc<PluginManager>,
}

impl PluginEngine {
    pub fn new(manager: PluginManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }

    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    /// Run every `init` hook in order; the first failure aborts.
    pub async fn init_plugins(&self, ctx: &mut PluginContext) -> Result<(), LlmError> {
        for plugin in self.manager.get_all() {
            if let Some(hook) = plugin.init_hook() {
                hook.init(ctx).await.map_err(|e| {
                    LlmError::plugin(plugin.name(), PluginHook::Init.as_str(), e)
                })?;
            }
        }
        Ok(())
    }

    /// Fold `value` through every plugin implementing `V::HOOK`, in order.
    ///
    /// A failing hook aborts the chain; the error names the plugin and hook.
    pub async fn execute_sequential<V: SequentialValue>(
        &self,
        value: V,
        ctx: &mut PluginContext,
    ) -> Result<V, LlmError> {
        let mut value = value;
        for plugin in self.manager.get_all() {
            value = match V::apply(plugin.as_ref(), value, ctx) {
                Ok(fut) => fut
                    .await
                    .map_err(|e| LlmError::plugin(plugin.name(), V::HOOK.as_str(), e))?,
                Err(unchanged) => unchanged,
            };
        }
        Ok(value)
    }

    /// Run the parallel hook for `event` on every plugin implementing it.
    ///
    /// Failures and panics are logged and never reach the caller or siblings.
    pub async fn execute_parallel(&self, event: LifecycleEvent<'_>, ctx: &PluginContext) {
        let plugins = self.manager.get_plugins_with_hook(event.hook());
        let tasks = plugins.iter().filter_map(|plugin| {
            let fut: BoxFuture<'_, Result<(), LlmError>> = match event {
                LifecycleEvent::RequestStart(params) => {
                    plugin.request_start_hook()?.on_request_start(ctx, params)
                }
                LifecycleEvent::RequestEnd(result) => {
                    plugin.request_end_hook()?.on_request_end(ctx, result)
                }
                LifecycleEvent::Error(error) => plugin.error_hook()?.on_error(ctx, error),
            };
            let name = plugin.name();
            Some(async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(
                        plugin = %name,
                        hook = %event.hook(),
                        request_id = %ctx.request_id,
                        error = %e,
                        "Plugin hook failed"
                    ),
                    Err(_) => warn!(
                        plugin = %name,
                        hook = %event.hook(),
                        request_id = %ctx.request_id,
                        "Plugin hook panicked"
                    ),
                }
            })
        });
        join_all(tasks).await;
    }

    /// Fold one stream chunk through every `on_stream` hook.
    ///
    /// A failing hook is skipped: the chunk it received continues down the chain.
    pub fn execute_stream(&self, event: ChatStreamEvent, ctx: &PluginContext) -> ChatStreamEvent {
        let mut event = event;
        for plugin in self.manager.get_plugins_with_hook(PluginHook::Stream) {
            let Some(hook) = plugin.stream_hook() else {
                continue;
            };
            match hook.on_stream(event.clone(), ctx) {
                Ok(next) => event = next,
                Err(e) => warn!(
                    plugin = %plugin.name(),
                    request_id = %ctx.request_id,
                    error = %e,
                    "Stream hook failed; passing chunk through"
                ),
            }
        }
        event
    }

    /// Setup phases shared by both lifecycles: init, transform_params, on_request_start.
    async fn prepare(
        &self,
        params: CallParams,
        ctx: &mut PluginContext,
    ) -> Result<CallParams, LlmError> {
        self.init_plugins(ctx).await?;
        let params = self.execute_sequential(params, ctx).await?;
        if let Some(model) = params.model.as_deref() {
            // A plugin may have redirected the call to another model.
            if let Ok(r) = parse_model_reference(model, Some(&ctx.provider_id)) {
                ctx.provider_id = r.provider_id;
                ctx.model_id = r.model_id;
            }
        }
        self.execute_parallel(LifecycleEvent::RequestStart(&params), ctx)
            .await;
        Ok(params)
    }

    /// Drive a non-streaming call through the full plugin lifecycle.
    ///
    /// Init and `transform_params` failures abort before the request starts.
    /// Failures after `on_request_start` fire `on_error` and are returned
    /// unmodified.
    pub async fn execute_lifecycle<F, Fut>(
        &self,
        params: CallParams,
        ctx: &mut PluginContext,
        executor: F,
    ) -> Result<GenerateTextResult, LlmError>
    where
        F: FnOnce(CallParams) -> Fut,
        Fut: Future<Output = Result<GenerateTextResult, LlmError>>,
    {
        let params = self.prepare(params, ctx).await?;

        let outcome = match executor(params).await {
            Ok(result) => self.execute_sequential(result, ctx).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                self.execute_parallel(LifecycleEvent::RequestEnd(&result), ctx)
                    .await;
                Ok(result)
            }
            Err(error) => {
                debug!(request_id = %ctx.request_id, error = %error, "Request failed");
                self.execute_parallel(LifecycleEvent::Error(&error), ctx)
                    .await;
                Err(error)
            }
        }
    }

    /// Drive a streaming call through the plugin lifecycle.
    ///
    /// Setup runs eagerly. The returned stream applies `on_stream` to every
    /// chunk, fires `on_request_end` with the aggregated result once the inner
    /// stream ends, and `on_error` if it yields an error.
    pub async fn execute_stream_lifecycle<F, Fut>(
        &self,
        params: CallParams,
        ctx: &mut PluginContext,
        executor: F,
    ) -> Result<ChatStream, LlmError>
    where
        F: FnOnce(CallParams) -> Fut,
        Fut: Future<Output = Result<ChatStream, LlmError>>,
    {
        let params = self.prepare(params, ctx).await?;

        let mut inner = match executor(params).await {
            Ok(stream) => stream,
            Err(error) => {
                self.execute_parallel(LifecycleEvent::Error(&error), ctx)
                    .await;
                return Err(error);
            }
        };

        let engine = self.clone();
        let mut ctx = ctx.clone();
        ctx.mark_stream_started();
        let s = async_stream::stream! {
            let mut text = String::new();
            let mut reasoning = String::new();
            let mut usage: Option<Usage> = None;
            let mut finish_reason: Option<FinishReason> = None;
            let mut failed = false;

            while let Some(item) = inner.next().await {
                match item {
                    Ok(event) => {
                        let event = engine.execute_stream(event, &ctx);
                        match &event {
                            ChatStreamEvent::TextDelta { delta } => text.push_str(delta),
                            ChatStreamEvent::ReasoningDelta { delta } => reasoning.push_str(delta),
                            ChatStreamEvent::UsageUpdate { usage: u } => usage = Some(u.clone()),
                            ChatStreamEvent::StreamEnd { finish_reason: f, usage: u } => {
                                if u.is_some() {
                                    usage = u.clone();
                                }
                                finish_reason = f.clone();
                            }
                        }
                        yield Ok(event);
                    }
                    Err(error) => {
                        failed = true;
                        engine
                            .execute_parallel(LifecycleEvent::Error(&error), &ctx)
                            .await;
                        yield Err(error);
                        break;
                    }
                }
            }

            if !failed {
                let result = GenerateTextResult {
                    text,
                    reasoning: (!reasoning.is_empty()).then_some(reasoning),
                    usage,
                    finish_reason,
                    provider_id: ctx.provider_id.clone(),
                    model_id: ctx.model_id.clone(),
                    metadata: Default::default(),
                };
                engine
                    .execute_parallel(LifecycleEvent::RequestEnd(&result), &ctx)
                    .await;
            }
        };
        Ok(Box::pin(s))
    }
}
