mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use siumai_arena::prelude::*;
use support::{Harness, user};
use tokio_util::sync::CancellationToken;

fn person_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "age": { "type": "integer" }
        },
        "required": ["name", "age"]
    })
}

#[tokio::test]
async fn generate_text_fills_provider_and_model() {
    let h = Harness::new();
    let result = tokio_test::assert_ok!(
        h.executor("anthropic")
            .generate_text("claude-3-haiku", CallParams::new(user("hi")), CallOptions::new())
            .await
    );
    assert_eq!(result.text, "claude-3-haiku says hi");
    assert_eq!(result.provider_id, "anthropic");
    assert_eq!(result.usage, Some(Usage::new(10, 3)));
    assert_eq!(h.last_config().wire_format, WireFormat::Anthropic);
}

#[tokio::test]
async fn full_reference_overrides_executor_provider() {
    let h = Harness::new();
    let result = h
        .executor("openai")
        .generate_text("xai>grok-3", CallParams::new(user("hi")), CallOptions::new())
        .await
        .unwrap();
    assert_eq!(result.provider_id, "xai");
    assert_eq!(result.model_id, "grok-3");
}

#[tokio::test]
async fn stream_text_yields_chunks_then_end() {
    let h = Harness::new();
    let events: Vec<_> = h
        .executor("openai")
        .stream_text("gpt-4o", CallParams::new(user("hi")), CallOptions::new())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 4);
    assert_eq!(events[0].as_ref().unwrap(), &ChatStreamEvent::text("gpt-4o"));
    assert!(matches!(
        events[3].as_ref().unwrap(),
        ChatStreamEvent::StreamEnd { usage: Some(_), .. }
    ));
}

#[tokio::test]
async fn generate_object_parses_and_validates() {
    let h = Harness::new();
    let result = h
        .executor("openai")
        .generate_object("gpt-json", CallParams::new(user("who?")), person_schema(), CallOptions::new())
        .await
        .unwrap();
    assert_eq!(result.object, json!({ "name": "Ada", "age": 36 }));
    assert_eq!(result.model_id, "gpt-json");
}

#[tokio::test]
async fn generate_object_rejects_schema_mismatch() {
    let h = Harness::new();
    let schema = json!({
        "type": "object",
        "properties": { "email": { "type": "string" } },
        "required": ["email"]
    });
    let err = h
        .executor("openai")
        .generate_object("gpt-json", CallParams::new(user("who?")), schema, CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::ParseError(_)));
}

#[tokio::test]
async fn stream_object_reports_partials_then_object() {
    let h = Harness::new();
    let events: Vec<_> = h
        .executor("openai")
        .stream_object("gpt-json", CallParams::new(user("who?")), person_schema(), CallOptions::new())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 4);
    match events[1].as_ref().unwrap() {
        ObjectStreamEvent::PartialText { delta, accumulated } => {
            assert_eq!(delta, "\"Ada\", ");
            assert_eq!(accumulated, "{\"name\": \"Ada\", ");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    match events[3].as_ref().unwrap() {
        ObjectStreamEvent::Object { value } => assert_eq!(value["name"], "Ada"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn retry_with_key_rotation_recovers_from_bad_key() {
    let h = Harness::new();
    let rotation = Arc::new(KeyRotationPlugin::new(KeyRotationConfig::new([
        "bad-key", "good-key",
    ])));
    let retry = RetryPlugin::new(
        RetryPluginConfig::new()
            .with_initial_delay(Duration::from_millis(5))
            .with_jitter_factor(0.0),
    )
    .unwrap();
    let executor = h
        .executor("openai")
        .with_plugin(Arc::new(retry))
        .with_plugin(rotation.clone());

    let result = executor
        .generate_text("gpt-flaky", CallParams::new(user("hi")), CallOptions::new())
        .await
        .unwrap();

    assert_eq!(result.text, "gpt-flaky says hi");
    assert_eq!(h.calls.load(Ordering::SeqCst), 2);
    let stats = rotation.key_stats();
    assert_eq!((stats[0].uses, stats[0].errors), (1, 1));
    assert_eq!((stats[1].uses, stats[1].errors), (1, 0));
}

#[tokio::test]
async fn without_retry_the_failure_surfaces() {
    let h = Harness::new();
    let executor = h.executor("openai").with_plugin(Arc::new(KeyRotationPlugin::new(
        KeyRotationConfig::new(["bad-key"]),
    )));
    let err = executor
        .generate_text("gpt-flaky", CallParams::new(user("hi")), CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::ApiError { code: 503, .. }));
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retry_gives_up_after_max_retries() {
    let h = Harness::new();
    let retry = RetryPlugin::new(
        RetryPluginConfig::new()
            .with_max_retries(2)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter_factor(0.0),
    )
    .unwrap();
    let err = h
        .executor("openai")
        .with_plugin(Arc::new(retry))
        .generate_text("gpt-fail", CallParams::new(user("hi")), CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::ApiError { code: 500, .. }));
    assert_eq!(h.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn metrics_plugin_records_stream_timings() {
    let h = Harness::new();
    let tracker = Arc::new(GlobalMetricsTracker::new());
    let executor = h
        .executor("openai")
        .with_plugin(Arc::new(MetricsPlugin::with_tracker(tracker.clone())));

    let stream = executor
        .stream_text("gpt-4o", CallParams::new(user("hi")), CallOptions::new())
        .await
        .unwrap();
    let _: Vec<_> = stream.collect().await;

    let history = tracker.history("openai", "gpt-4o");
    assert_eq!(history.len(), 1);
    assert!(history[0].time_to_first_token.is_some());
    assert_eq!(history[0].total_tokens, Some(13));
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_token_aborts_the_call() {
    let h = Harness::new();
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = h
        .executor("openai")
        .generate_text(
            "gpt-slow",
            CallParams::new(user("hi")),
            CallOptions::new().with_cancellation(token),
        )
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_stream_ends_with_cancelled() {
    let h = Harness::new();
    let token = CancellationToken::new();
    let mut stream = h
        .executor("openai")
        .stream_text(
            "gpt-slow",
            CallParams::new(user("hi")),
            CallOptions::new().with_cancellation(token.clone()),
        )
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, ChatStreamEvent::text("gpt-slow"));
    token.cancel();
    let next = stream.next().await.unwrap();
    assert!(next.unwrap_err().is_cancelled());
    assert!(stream.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn mid_stream_failure_surfaces_without_backoff() {
    let h = Harness::new();
    let retry = RetryPlugin::new(RetryPluginConfig::new()).unwrap();
    let mut stream = h
        .executor("openai")
        .with_plugin(Arc::new(retry))
        .stream_text("gpt-broken", CallParams::new(user("hi")), CallOptions::new())
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, ChatStreamEvent::text("gpt-broken"));

    let started = tokio::time::Instant::now();
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, LlmError::ApiError { code: 503, .. }));
    assert!(started.elapsed() < Duration::from_millis(100));
    assert!(stream.next().await.is_none());
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn provider_alias_is_tracked_under_canonical_id() {
    let h = Harness::new();
    let tracker = Arc::new(GlobalMetricsTracker::new());
    let executor = h
        .executor("google")
        .with_plugin(Arc::new(MetricsPlugin::with_tracker(tracker.clone())));

    executor
        .generate_text("gemini-2.0-flash", CallParams::new(user("hi")), CallOptions::new())
        .await
        .unwrap();
    executor
        .generate_text("gemini>gemini-2.0-flash", CallParams::new(user("hi")), CallOptions::new())
        .await
        .unwrap();

    assert_eq!(tracker.history("gemini", "gemini-2.0-flash").len(), 2);
    assert!(tracker.history("google", "gemini-2.0-flash").is_empty());
}
