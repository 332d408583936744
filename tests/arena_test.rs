mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use siumai_arena::plugin::{RequestEndHook, RequestStartHook};
use siumai_arena::prelude::*;
use support::{Harness, user};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn specs(refs: &[&str]) -> Vec<ModelSpec> {
    refs.iter().map(|r| ModelSpec::parse(r).unwrap()).collect()
}

#[tokio::test]
async fn partial_failure_keeps_every_result_in_order() {
    let h = Harness::new();
    let models = specs(&["openai>gpt-4o", "anthropic>claude-fail", "gemini>gemini-2.0-flash"]);

    let results = h
        .arena()
        .compare_models(&models, user("hello"), CompareOptions::new())
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ComparisonStatus::Success,
            ComparisonStatus::Failed,
            ComparisonStatus::Success
        ]
    );
    assert_eq!(results[0].text(), Some("gpt-4o says hi"));
    assert_eq!(results[1].model_id, "claude-fail");
    assert!(matches!(
        results[1].error,
        Some(LlmError::ApiError { code: 500, .. })
    ));
    assert!(results[2].metrics.time_to_first_token.is_some());
}

#[tokio::test]
async fn all_failed_is_an_aggregate_error() {
    let h = Harness::new();
    let models = specs(&["openai>a-fail", "anthropic>b-fail", "xai>c-fail"]);

    let err = h
        .arena()
        .compare_models(&models, user("hello"), CompareOptions::new())
        .await
        .unwrap_err();

    let failure = err.arena_failure().expect("aggregate failure");
    assert_eq!(failure.failures.len(), 3);
    let ids: Vec<_> = failure.failures.iter().map(|f| f.model_id.as_str()).collect();
    assert_eq!(ids, vec!["a-fail", "b-fail", "c-fail"]);
    assert!(err.to_string().contains("b-fail"));
}

/// Records each participant's cancellation token and completed requests.
#[derive(Default)]
struct Observer {
    tokens: Mutex<Vec<(String, CancellationToken)>>,
    finished: Mutex<Vec<String>>,
}

#[async_trait]
impl RequestStartHook for Observer {
    async fn on_request_start(&self, ctx: &PluginContext, _params: &CallParams) -> Result<(), LlmError> {
        self.tokens
            .lock()
            .unwrap()
            .push((ctx.model_id.clone(), ctx.cancellation.clone()));
        Ok(())
    }
}

#[async_trait]
impl RequestEndHook for Observer {
    async fn on_request_end(
        &self,
        ctx: &PluginContext,
        _result: &GenerateTextResult,
    ) -> Result<(), LlmError> {
        self.finished.lock().unwrap().push(ctx.model_id.clone());
        Ok(())
    }
}

impl Plugin for Observer {
    fn name(&self) -> &str {
        "observer"
    }
    fn request_start_hook(&self) -> Option<&dyn RequestStartHook> {
        Some(self)
    }
    fn request_end_hook(&self) -> Option<&dyn RequestEndHook> {
        Some(self)
    }
}

#[tokio::test(start_paused = true)]
async fn stop_on_error_reports_only_the_first_failure() {
    let h = Harness::new();
    let observer = Arc::new(Observer::default());
    let arena = h.arena().with_plugin(observer.clone());
    // Siblings are listed first so both are in flight when the failure lands.
    let models = specs(&[
        "openai>gpt-slow",
        "gemini>gemini-slow",
        "anthropic>claude-fail",
    ]);
    let started = Instant::now();

    let err = arena
        .compare_models(
            &models,
            user("hello"),
            CompareOptions::new().with_stop_on_error(true),
        )
        .await
        .unwrap_err();

    let failure = err.arena_failure().unwrap();
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.failures[0].model_id, "claude-fail");
    assert!(started.elapsed() < Duration::from_millis(100));

    // Every in-flight sibling observed the shared signal.
    let tokens = observer.tokens.lock().unwrap().clone();
    for sibling in ["gpt-slow", "gemini-slow"] {
        let (_, token) = tokens
            .iter()
            .find(|(model, _)| model == sibling)
            .expect("sibling started");
        assert!(token.is_cancelled(), "{sibling} was not cancelled");
    }

    // Nothing finishes after the abort.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(observer.finished.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_streaming_compare_uses_generate() {
    let h = Harness::new();
    let models = specs(&["openai>gpt-4o", "deepseek>deepseek-chat"]);
    let results = h
        .arena()
        .compare_models(&models, user("hello"), CompareOptions::new().with_stream(false))
        .await
        .unwrap();
    assert!(results.iter().all(ModelComparisonResult::is_success));
    assert_eq!(results[1].text(), Some("deepseek-chat says hi"));
    assert_eq!(results[1].metrics.total_tokens, Some(13));
}

#[tokio::test]
async fn progress_callback_sees_every_delta() {
    let h = Harness::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = CompareOptions::new().with_progress(Arc::new(move |spec, delta, acc| {
        sink.lock()
            .unwrap()
            .push((spec.label(), delta.to_string(), acc.to_string()));
    }));

    h.arena()
        .compare_models(&specs(&["openai>gpt-4o"]), user("hello"), options)
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2].0, "openai>gpt-4o");
    assert_eq!(seen[2].2, "gpt-4o says hi");
}

#[tokio::test]
async fn empty_model_list_is_rejected() {
    let h = Harness::new();
    let err = h
        .arena()
        .compare_models(&[], user("hello"), CompareOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::InvalidParameter(_)));
}

#[tokio::test(start_paused = true)]
async fn external_cancellation_marks_participants_cancelled() {
    let h = Harness::new();
    let handle = CancelHandle::new();
    let trigger = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let results = h
        .arena()
        .compare_models(
            &specs(&["openai>gpt-4o", "anthropic>claude-slow"]),
            user("hello"),
            CompareOptions::new().with_cancel_handle(&handle),
        )
        .await
        .unwrap();

    assert_eq!(results[0].status, ComparisonStatus::Success);
    assert_eq!(results[1].status, ComparisonStatus::Cancelled);
    assert!(handle.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn race_returns_first_settled_success() {
    let h = Harness::new();
    let started = Instant::now();
    let winner = h
        .arena()
        .race_models(
            &specs(&["anthropic>claude-slow", "openai>gpt-4o"]),
            user("hello"),
            CompareOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(winner.model_id, "gpt-4o");
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn race_falls_back_when_the_fastest_fails() {
    let h = Harness::new();
    let winner = h
        .arena()
        .race_models(
            &specs(&["openai>gpt-fail", "anthropic>claude-slow"]),
            user("hello"),
            CompareOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(winner.provider_id, "anthropic");
    assert_eq!(winner.text(), Some("claude-slow says hi"));
}

#[tokio::test]
async fn race_with_no_success_aggregates_failures() {
    let h = Harness::new();
    let err = h
        .arena()
        .race_models(
            &specs(&["openai>x-fail", "xai>y-fail"]),
            user("hello"),
            CompareOptions::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.arena_failure().unwrap().failures.len(), 2);
}

#[tokio::test]
async fn tracker_receives_one_sample_per_participant() {
    let h = Harness::new();
    let tracker = Arc::new(GlobalMetricsTracker::new());
    let arena = h.arena().with_tracker(tracker.clone());

    arena
        .compare_models(
            &specs(&["openai>gpt-4o", "anthropic>claude-fail"]),
            user("hello"),
            CompareOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(tracker.history("openai", "gpt-4o").len(), 1);
    assert_eq!(tracker.history("anthropic", "claude-fail").len(), 1);
    assert_eq!(tracker.summary().len(), 2);
}
