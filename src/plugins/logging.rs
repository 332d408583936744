//! Logging plugin
//!
//! Emits request lifecycle events through `tracing`. Events below the
//! configured level are dropped; credentials are redacted and long text is
//! truncated before anything is logged.

use async_trait::async_trait;
use tracing::{Level, debug, error, info, trace};

use crate::error::LlmError;
use crate::plugin::{
    ErrorHook, Plugin, PluginContext, PluginEnforce, RequestEndHook, RequestStartHook, StreamHook,
};
use crate::streaming::ChatStreamEvent;
use crate::types::{CallParams, GenerateTextResult};
use crate::utils::redact::{REDACTED, redact_headers, truncate_text};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Most verbose level emitted.
    pub level: Level,
    /// Log message contents (truncated) at debug level.
    pub log_messages: bool,
    /// Log each stream chunk at trace level.
    pub log_stream_chunks: bool,
    /// Longest text logged before truncation.
    pub max_text_length: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_messages: false,
            log_stream_chunks: false,
            max_text_length: 200,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_messages(mut self, enabled: bool) -> Self {
        self.log_messages = enabled;
        self
    }

    pub fn with_stream_chunks(mut self, enabled: bool) -> Self {
        self.log_stream_chunks = enabled;
        self
    }

    pub fn with_max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingPlugin {
    config: LoggingConfig,
}

impl LoggingPlugin {
    pub const NAME: &'static str = "logging";

    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// `Level` orders TRACE as greatest, so "enabled" means at most as verbose.
    fn enabled(&self, level: Level) -> bool {
        level <= self.config.level
    }

    fn truncate(&self, text: &str) -> String {
        truncate_text(text, self.config.max_text_length)
    }

    /// Params rendered for logs: messages truncated, credentials hidden.
    fn describe_params(&self, params: &CallParams) -> String {
        let messages: Vec<String> = params
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), self.truncate(&m.content)))
            .collect();
        format!(
            "model={:?} temperature={:?} max_tokens={:?} api_key={} headers={:?} messages={:?}",
            params.model,
            params.temperature,
            params.max_tokens,
            if params.api_key.is_some() { REDACTED } else { "none" },
            redact_headers(&params.headers),
            messages,
        )
    }
}

#[async_trait]
impl RequestStartHook for LoggingPlugin {
    async fn on_request_start(
        &self,
        ctx: &PluginContext,
        params: &CallParams,
    ) -> Result<(), LlmError> {
        if self.enabled(Level::INFO) {
            info!(
                request_id = %ctx.request_id,
                provider = %ctx.provider_id,
                model = %ctx.model_id,
                method = %ctx.method,
                attempt = ctx.retry_attempt(),
                "Request started"
            );
        }
        if self.config.log_messages && self.enabled(Level::DEBUG) {
            debug!(
                request_id = %ctx.request_id,
                params = %self.describe_params(params),
                "Request params"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl RequestEndHook for LoggingPlugin {
    async fn on_request_end(
        &self,
        ctx: &PluginContext,
        result: &GenerateTextResult,
    ) -> Result<(), LlmError> {
        if self.enabled(Level::INFO) {
            let elapsed_ms = ctx.started_at.elapsed().as_millis() as u64;
            info!(
                request_id = %ctx.request_id,
                provider = %ctx.provider_id,
                model = %ctx.model_id,
                elapsed_ms,
                usage = ?result.usage,
                "Request completed"
            );
        }
        if self.config.log_messages && self.enabled(Level::DEBUG) {
            debug!(
                request_id = %ctx.request_id,
                text = %self.truncate(&result.text),
                "Response text"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ErrorHook for LoggingPlugin {
    async fn on_error(&self, ctx: &PluginContext, error: &LlmError) -> Result<(), LlmError> {
        if self.enabled(Level::ERROR) {
            error!(
                request_id = %ctx.request_id,
                provider = %ctx.provider_id,
                model = %ctx.model_id,
                key = ?ctx.selected_key,
                error = %self.truncate(&error.to_string()),
                "Request failed"
            );
        }
        Ok(())
    }
}

impl StreamHook for LoggingPlugin {
    fn on_stream(
        &self,
        event: ChatStreamEvent,
        ctx: &PluginContext,
    ) -> Result<ChatStreamEvent, LlmError> {
        if self.config.log_stream_chunks && self.enabled(Level::TRACE) {
            if let ChatStreamEvent::TextDelta { delta } = &event {
                trace!(
                    request_id = %ctx.request_id,
                    delta = %self.truncate(delta),
                    "Stream chunk"
                );
            }
        }
        Ok(event)
    }
}

impl Plugin for LoggingPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enforce(&self) -> Option<PluginEnforce> {
        Some(PluginEnforce::Post)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CallMethod, ChatMessage};
    use tracing_test::traced_test;

    fn ctx() -> PluginContext {
        PluginContext::new("openai", "gpt-4o", CallMethod::GenerateText)
    }

    #[test]
    fn params_are_redacted_and_truncated() {
        let plugin = LoggingPlugin::new(LoggingConfig::new().with_max_text_length(5));
        let params = CallParams::new(vec![ChatMessage::user("abcdefghij")])
            .with_api_key("sk-very-secret")
            .with_header("Authorization", "Bearer sk-very-secret");
        let text = plugin.describe_params(&params);
        assert!(!text.contains("sk-very-secret"));
        assert!(text.contains(REDACTED));
        assert!(text.contains("abcde"));
        assert!(!text.contains("abcdefghij"));
    }

    #[test]
    fn level_filter() {
        let plugin = LoggingPlugin::new(LoggingConfig::new().with_level(Level::WARN));
        assert!(plugin.enabled(Level::ERROR));
        assert!(plugin.enabled(Level::WARN));
        assert!(!plugin.enabled(Level::INFO));
    }

    #[tokio::test]
    #[traced_test]
    async fn logs_lifecycle_events() {
        let plugin = LoggingPlugin::default();
        let ctx = ctx();
        plugin
            .on_request_start(&ctx, &CallParams::default())
            .await
            .unwrap();
        plugin
            .on_error(&ctx, &LlmError::api_error(503, "unavailable"))
            .await
            .unwrap();
        assert!(logs_contain("Request started"));
        assert!(logs_contain("Request failed"));
    }
}
