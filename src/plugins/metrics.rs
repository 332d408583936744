//! Metrics plugin
//!
//! One collector per `provider:model:method`, restarted by every request that
//! shares the triple. TTFT comes from the first streamed content chunk; the
//! result is reported to the global tracker when the request ends or fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::error::LlmError;
use crate::metrics::{GlobalMetricsTracker, MetricsCollector, ModelMetrics, global_tracker};
use crate::plugin::{
    ErrorHook, Plugin, PluginContext, RequestEndHook, RequestStartHook, StreamHook,
};
use crate::streaming::ChatStreamEvent;
use crate::types::{CallParams, GenerateTextResult};

/// Called with the final metrics of every request.
pub type MetricsCallback = Arc<dyn Fn(&PluginContext, &ModelMetrics) + Send + Sync>;

pub struct MetricsPlugin {
    collectors: Mutex<HashMap<String, MetricsCollector>>,
    tracker: Arc<GlobalMetricsTracker>,
    callback: Option<MetricsCallback>,
}

impl Default for MetricsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsPlugin {
    pub const NAME: &'static str = "metrics";

    /// Reports to the process-wide tracker.
    pub fn new() -> Self {
        Self::with_tracker(global_tracker())
    }

    pub fn with_tracker(tracker: Arc<GlobalMetricsTracker>) -> Self {
        Self {
            collectors: Mutex::new(HashMap::new()),
            tracker,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: MetricsCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn tracker(&self) -> &Arc<GlobalMetricsTracker> {
        &self.tracker
    }

    /// Current metrics of the collector for `call_key`.
    pub fn current(&self, call_key: &str) -> Option<ModelMetrics> {
        let collectors = self.collectors.lock().unwrap_or_else(|e| e.into_inner());
        collectors.get(call_key).map(MetricsCollector::get_metrics)
    }

    fn with_collector<R>(&self, ctx: &PluginContext, f: impl FnOnce(&mut MetricsCollector) -> R) -> R {
        let mut collectors = self.collectors.lock().unwrap_or_else(|e| e.into_inner());
        f(collectors.entry(ctx.call_key()).or_default())
    }

    fn finalize(&self, ctx: &PluginContext, result: Option<&GenerateTextResult>) {
        let metrics = self.with_collector(ctx, |c| {
            if let Some(usage) = result.and_then(|r| r.usage.as_ref()) {
                c.record_tokens(usage);
            }
            c.get_metrics()
        });
        debug!(
            call = %ctx.call_key(),
            total_time = metrics.total_time,
            ttft = ?metrics.time_to_first_token,
            "Request metrics"
        );
        self.tracker
            .record(&ctx.provider_id, &ctx.model_id, metrics.clone());
        if let Some(callback) = &self.callback {
            callback(ctx, &metrics);
        }
    }
}

#[async_trait]
impl RequestStartHook for MetricsPlugin {
    async fn on_request_start(
        &self,
        ctx: &PluginContext,
        _params: &CallParams,
    ) -> Result<(), LlmError> {
        self.with_collector(ctx, MetricsCollector::start);
        Ok(())
    }
}

#[async_trait]
impl RequestEndHook for MetricsPlugin {
    async fn on_request_end(
        &self,
        ctx: &PluginContext,
        result: &GenerateTextResult,
    ) -> Result<(), LlmError> {
        self.finalize(ctx, Some(result));
        Ok(())
    }
}

#[async_trait]
impl ErrorHook for MetricsPlugin {
    async fn on_error(&self, ctx: &PluginContext, _error: &LlmError) -> Result<(), LlmError> {
        self.finalize(ctx, None);
        Ok(())
    }
}

impl StreamHook for MetricsPlugin {
    fn on_stream(
        &self,
        event: ChatStreamEvent,
        ctx: &PluginContext,
    ) -> Result<ChatStreamEvent, LlmError> {
        self.with_collector(ctx, |c| match &event {
            e if e.is_content() => c.record_first_token(),
            ChatStreamEvent::UsageUpdate { usage } => c.record_tokens(usage),
            ChatStreamEvent::StreamEnd {
                usage: Some(usage), ..
            } => c.record_tokens(usage),
            _ => {}
        });
        Ok(event)
    }
}

impl Plugin for MetricsPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn request_start_hook(&self) -> Option<&dyn RequestStartHook> {
        Some(self)
    }

    fn request_end_hook(&self) -> Option<&dyn RequestEndHook> {
        Some(self)
    }

    fn error_hook(&self) -> Option<&dyn ErrorHook> {
        Some(self)
    }

    fn stream_hook(&self) -> Option<&dyn StreamHook> {
        Some(self)
    }
}
