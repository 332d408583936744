use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::types::{CompareOptions, ComparisonStatus, ModelComparisonResult, ModelSpec};
use crate::error::{ArenaFailure, LlmError, ParticipantFailure};
use crate::metrics::{GlobalMetricsTracker, MetricsCollector};
use crate::middleware::LanguageModelMiddleware;
use crate::plugin::Plugin;
use crate::provider::ProviderOptions;
use crate::resolver::ModelResolver;
use crate::runtime::{CallOptions, RuntimeExecutor};
use crate::streaming::ChatStreamEvent;
use crate::types::{CallParams, ChatMessage, GenerateTextResult};
use crate::utils::cancel::cancelled_error;

/// Fans one conversation out to several models.
///
/// Every participant gets its own `RuntimeExecutor`; all participants of a
/// run share one cancellation token.
#[derive(Clone)]
pub struct Arena {
    resolver: Arc<ModelResolver>,
    provider_options: HashMap<String, ProviderOptions>,
    plugins: Vec<Arc<dyn Plugin>>,
    middlewares: Vec<Arc<dyn LanguageModelMiddleware>>,
    tracker: Option<Arc<GlobalMetricsTracker>>,
}

impl Arena {
    pub fn new(resolver: Arc<ModelResolver>) -> Self {
        Self {
            resolver,
            provider_options: HashMap::new(),
            plugins: Vec::new(),
            middlewares: Vec::new(),
            tracker: None,
        }
    }

    /// Connection options for every participant of `provider_id`.
    pub fn with_provider_options(
        mut self,
        provider_id: impl Into<String>,
        options: ProviderOptions,
    ) -> Self {
        self.provider_options.insert(provider_id.into(), options);
        self
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn LanguageModelMiddleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Record every participant's metrics into `tracker`.
    pub fn with_tracker(mut self, tracker: Arc<GlobalMetricsTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    fn executor_for(&self, spec: &ModelSpec) -> RuntimeExecutor {
        let options = spec
            .options
            .clone()
            .or_else(|| self.provider_options.get(&spec.provider_id).cloned())
            .unwrap_or_default();
        let executor = RuntimeExecutor::new(spec.provider_id.clone(), self.resolver.clone())
            .with_options(options)
            .with_plugins(self.plugins.iter().cloned());
        self.middlewares
            .iter()
            .cloned()
            .fold(executor, RuntimeExecutor::with_middleware)
    }

    /// Run every model concurrently and collect one result per model, in input order.
    ///
    /// Fails only when every participant failed, or with exactly the first
    /// failure when `stop_on_error` is set.
    pub async fn compare_models(
        &self,
        models: &[ModelSpec],
        messages: Vec<ChatMessage>,
        options: CompareOptions,
    ) -> Result<Vec<ModelComparisonResult>, LlmError> {
        if models.is_empty() {
            return Err(LlmError::InvalidParameter(
                "compare_models needs at least one model".to_string(),
            ));
        }
        let run = run_token(&options);
        let mut pending: FuturesUnordered<_> = models
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let token = run.child_token();
                let messages = &messages;
                let options = &options;
                async move { (i, self.run_pair(spec, messages, options, token).await) }
            })
            .collect();

        let mut results: Vec<Option<ModelComparisonResult>> = models.iter().map(|_| None).collect();
        while let Some((i, outcome)) = pending.next().await {
            if options.stop_on_error && outcome.status == ComparisonStatus::Failed {
                run.cancel();
                let failure = participant_failure(&outcome);
                error!(model = %models[i].label(), error = %failure.error, "Comparison stopped on error");
                return Err(LlmError::ArenaError(ArenaFailure::new(
                    format!("comparison stopped: {} failed", models[i].label()),
                    vec![failure],
                )));
            }
            results[i] = Some(outcome);
        }
        drop(pending);

        let results: Vec<ModelComparisonResult> = results.into_iter().flatten().collect();
        if results.iter().all(|r| r.status == ComparisonStatus::Failed) {
            let failures: Vec<ParticipantFailure> =
                results.iter().map(participant_failure).collect();
            for f in &failures {
                error!(
                    provider = %f.provider_id,
                    model = %f.model_id,
                    category = ?f.error.category(),
                    error = %f.error,
                    "Arena participant failed"
                );
            }
            return Err(LlmError::ArenaError(ArenaFailure::new(
                format!("all {} models failed", failures.len()),
                failures,
            )));
        }
        info!(
            models = results.len(),
            succeeded = results.iter().filter(|r| r.is_success()).count(),
            "Comparison finished"
        );
        Ok(results)
    }

    /// Return the first result to settle if it succeeded; otherwise wait for
    /// every participant and return the first success in input order.
    ///
    /// When the first settled result wins, the remaining participants are cancelled.
    pub async fn race_models(
        &self,
        models: &[ModelSpec],
        messages: Vec<ChatMessage>,
        options: CompareOptions,
    ) -> Result<ModelComparisonResult, LlmError> {
        if models.is_empty() {
            return Err(LlmError::InvalidParameter(
                "race_models needs at least one model".to_string(),
            ));
        }
        let run = run_token(&options);
        let mut pending: FuturesUnordered<_> = models
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let token = run.child_token();
                let messages = &messages;
                let options = &options;
                async move { (i, self.run_pair(spec, messages, options, token).await) }
            })
            .collect();

        let mut settled: Vec<Option<ModelComparisonResult>> = models.iter().map(|_| None).collect();
        let mut first = true;
        while let Some((i, outcome)) = pending.next().await {
            if first && outcome.is_success() {
                debug!(winner = %models[i].label(), "Race won by first settled model");
                run.cancel();
                return Ok(outcome);
            }
            first = false;
            settled[i] = Some(outcome);
        }

        let settled: Vec<ModelComparisonResult> = settled.into_iter().flatten().collect();
        if let Some(winner) = settled.iter().find(|r| r.is_success()) {
            debug!(winner = %format!("{}>{}", winner.provider_id, winner.model_id), "Race fell back to best available");
            return Ok(winner.clone());
        }
        let failures: Vec<ParticipantFailure> = settled.iter().map(participant_failure).collect();
        Err(LlmError::ArenaError(ArenaFailure::new(
            format!("no model succeeded in race of {}", models.len()),
            failures,
        )))
    }

    async fn run_pair(
        &self,
        spec: &ModelSpec,
        messages: &[ChatMessage],
        options: &CompareOptions,
        token: CancellationToken,
    ) -> ModelComparisonResult {
        let mut collector = MetricsCollector::started();
        let executor = self.executor_for(spec);
        let mut params = CallParams::new(messages.to_vec());
        params.temperature = options.temperature;
        params.max_tokens = options.max_tokens;
        let call = CallOptions::new().with_cancellation(token.clone());

        let outcome = if options.stream {
            self.stream_pair(&executor, spec, params, call, options, &mut collector, &token)
                .await
        } else {
            executor.generate_text(&spec.label(), params, call).await
        };

        if let Ok(result) = &outcome {
            if let Some(usage) = &result.usage {
                collector.record_tokens(usage);
            }
        }
        let metrics = collector.get_metrics();
        if let Some(tracker) = &self.tracker {
            tracker.record(&spec.provider_id, &spec.model_id, metrics.clone());
        }

        match outcome {
            Ok(result) => ModelComparisonResult {
                provider_id: spec.provider_id.clone(),
                model_id: spec.model_id.clone(),
                status: ComparisonStatus::Success,
                result: Some(result),
                error: None,
                metrics,
            },
            Err(e) => {
                let status = if e.is_cancelled() || token.is_cancelled() {
                    ComparisonStatus::Cancelled
                } else {
                    ComparisonStatus::Failed
                };
                debug!(model = %spec.label(), ?status, error = %e, "Arena participant did not succeed");
                ModelComparisonResult {
                    provider_id: spec.provider_id.clone(),
                    model_id: spec.model_id.clone(),
                    status,
                    result: None,
                    error: Some(e),
                    metrics,
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn stream_pair(
        &self,
        executor: &RuntimeExecutor,
        spec: &ModelSpec,
        params: CallParams,
        call: CallOptions,
        options: &CompareOptions,
        collector: &mut MetricsCollector,
        token: &CancellationToken,
    ) -> Result<GenerateTextResult, LlmError> {
        let mut stream = executor.stream_text(&spec.label(), params, call).await?;
        let mut result = GenerateTextResult::new(String::new());
        let mut reasoning = String::new();
        loop {
            if token.is_cancelled() {
                return Err(cancelled_error(&spec.label()));
            }
            let Some(item) = stream.next().await else {
                break;
            };
            match item? {
                ChatStreamEvent::TextDelta { delta } => {
                    collector.record_first_token();
                    result.text.push_str(&delta);
                    if let Some(cb) = &options.on_progress {
                        cb(spec, &delta, &result.text);
                    }
                }
                ChatStreamEvent::ReasoningDelta { delta } => {
                    collector.record_first_token();
                    reasoning.push_str(&delta);
                }
                ChatStreamEvent::UsageUpdate { usage } => result.usage = Some(usage),
                ChatStreamEvent::StreamEnd {
                    finish_reason,
                    usage,
                } => {
                    result.finish_reason = finish_reason;
                    if usage.is_some() {
                        result.usage = usage;
                    }
                }
            }
        }
        result.reasoning = (!reasoning.is_empty()).then_some(reasoning);
        result.provider_id = spec.provider_id.clone();
        result.model_id = spec.model_id.clone();
        Ok(result)
    }
}

fn run_token(options: &CompareOptions) -> CancellationToken {
    options
        .cancellation
        .as_ref()
        .map(CancellationToken::child_token)
        .unwrap_or_default()
}

fn participant_failure(result: &ModelComparisonResult) -> ParticipantFailure {
    ParticipantFailure::new(
        result.provider_id.clone(),
        result.model_id.clone(),
        result
            .error
            .clone()
            .unwrap_or_else(|| LlmError::InternalError("participant failed without error".into())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProviderRegistry;
    use crate::test_support::mock_builder;
    use std::sync::Mutex;

    fn arena() -> Arena {
        let registry = Arc::new(ProviderRegistry::with_builtin_providers());
        let resolver = Arc::new(ModelResolver::new(Arc::new(mock_builder(registry))));
        ["openai", "anthropic", "xai"]
            .into_iter()
            .fold(Arena::new(resolver), |a, p| {
                a.with_provider_options(p, ProviderOptions::new().with_api_key("sk-test"))
            })
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::user("hi")]
    }

    #[tokio::test]
    async fn results_keep_input_order_with_metrics() {
        let models = [
            ModelSpec::new("openai", "gpt-slow"),
            ModelSpec::new("anthropic", "claude-3-haiku"),
        ];
        let results = arena()
            .compare_models(&models, messages(), CompareOptions::new())
            .await
            .unwrap();
        assert_eq!(results[0].model_id, "gpt-slow");
        assert_eq!(results[1].text(), Some("claude-3-haiku says hi"));
        assert!(results[1].metrics.time_to_first_token.is_some());
        assert_eq!(results[1].metrics.total_tokens, Some(13));
    }

    #[tokio::test]
    async fn progress_callback_sees_accumulated_text() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = CompareOptions::new().with_progress(Arc::new(move |spec, _delta, text| {
            sink.lock().unwrap().push(format!("{}:{text}", spec.model_id));
        }));
        arena()
            .compare_models(&[ModelSpec::new("openai", "m")], messages(), options)
            .await
            .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["m:m", "m:m says", "m:m says hi"]
        );
    }

    #[tokio::test]
    async fn external_cancellation_marks_results_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let results = arena()
            .compare_models(
                &[ModelSpec::new("openai", "a"), ModelSpec::new("xai", "b")],
                messages(),
                CompareOptions::new().with_cancellation(token),
            )
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.status == ComparisonStatus::Cancelled));
    }

    #[tokio::test]
    async fn non_streaming_generates_directly() {
        let results = arena()
            .compare_models(
                &[ModelSpec::new("openai", "plain")],
                messages(),
                CompareOptions::new().with_stream(false),
            )
            .await
            .unwrap();
        assert_eq!(results[0].text(), Some("plain says hi"));
        assert!(results[0].metrics.time_to_first_token.is_none());
    }

    #[tokio::test]
    async fn empty_model_list_is_rejected() {
        let err = arena()
            .compare_models(&[], messages(), CompareOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidParameter(_)));
    }
}
