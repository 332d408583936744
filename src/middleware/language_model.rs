//! Language-model-level middleware
//!
//! Hooks run around the generation primitive of a single model handle:
//! parameter rewriting before the call, result post-processing after it, and
//! per-event stream interception.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::LlmError;
use crate::streaming::{ChatStream, ChatStreamEvent};
use crate::traits::LanguageModel;
use crate::types::{CallParams, GenerateTextResult};

/// Model-level middleware.
pub trait LanguageModelMiddleware: Send + Sync {
    /// Transform call parameters before they reach the wrapped model.
    fn transform_params(&self, params: CallParams) -> CallParams {
        params
    }

    /// Post-process a non-stream result.
    fn post_generate(
        &self,
        _params: &CallParams,
        result: GenerateTextResult,
    ) -> Result<GenerateTextResult, LlmError> {
        Ok(result)
    }

    /// Intercept a single stream event. May return zero or more events.
    fn on_stream_event(
        &self,
        _params: &CallParams,
        event: ChatStreamEvent,
    ) -> Result<Vec<ChatStreamEvent>, LlmError> {
        Ok(vec![event])
    }

    /// Around-style override. Returning `Some` replaces the default wrapper
    /// (which applies the three hooks above).
    fn wrap_model(&self, _model: Arc<dyn LanguageModel>) -> Option<Arc<dyn LanguageModel>> {
        None
    }
}

/// Fold `middlewares` over `model`; each entry wraps the previous result.
pub fn wrap_language_model(
    model: Arc<dyn LanguageModel>,
    middlewares: &[Arc<dyn LanguageModelMiddleware>],
) -> Arc<dyn LanguageModel> {
    middlewares.iter().fold(model, |inner, mw| {
        mw.wrap_model(inner.clone()).unwrap_or_else(|| {
            Arc::new(MiddlewareModel {
                inner,
                middleware: mw.clone(),
            })
        })
    })
}

/// A model handle with one middleware applied.
pub struct MiddlewareModel {
    inner: Arc<dyn LanguageModel>,
    middleware: Arc<dyn LanguageModelMiddleware>,
}

impl MiddlewareModel {
    pub fn new(
        inner: Arc<dyn LanguageModel>,
        middleware: Arc<dyn LanguageModelMiddleware>,
    ) -> Self {
        Self { inner, middleware }
    }
}

#[async_trait]
impl LanguageModel for MiddlewareModel {
    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn do_generate(&self, params: CallParams) -> Result<GenerateTextResult, LlmError> {
        let params = self.middleware.transform_params(params);
        let result = self.inner.do_generate(params.clone()).await?;
        self.middleware.post_generate(&params, result)
    }

    async fn do_stream(&self, params: CallParams) -> Result<ChatStream, LlmError> {
        let params = self.middleware.transform_params(params);
        let mut inner = self.inner.do_stream(params.clone()).await?;
        let middleware = self.middleware.clone();
        let s = async_stream::stream! {
            while let Some(item) = inner.next().await {
                match item {
                    Ok(event) => match middleware.on_stream_event(&params, event) {
                        Ok(events) => {
                            for e in events {
                                yield Ok(e);
                            }
                        }
                        Err(e) => {
                            yield Err(e);
                            break;
                        }
                    },
                    Err(e) => {
                        yield Err(e);
                    }
                }
            }
        };
        Ok(Box::pin(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockModel;
    use crate::types::ChatMessage;

    struct AppendSuffix(&'static str);
    impl LanguageModelMiddleware for AppendSuffix {
        fn post_generate(
            &self,
            _params: &CallParams,
            mut result: GenerateTextResult,
        ) -> Result<GenerateTextResult, LlmError> {
            result.text.push_str(self.0);
            Ok(result)
        }

        fn on_stream_event(
            &self,
            _params: &CallParams,
            event: ChatStreamEvent,
        ) -> Result<Vec<ChatStreamEvent>, LlmError> {
            match event {
                ChatStreamEvent::TextDelta { delta } => {
                    Ok(vec![ChatStreamEvent::text(format!("{delta}{}", self.0))])
                }
                other => Ok(vec![other]),
            }
        }
    }

    #[tokio::test]
    async fn fold_applies_in_registration_order() {
        let base: Arc<dyn LanguageModel> = Arc::new(MockModel::text("p", "m", "x"));
        let mws: Vec<Arc<dyn LanguageModelMiddleware>> =
            vec![Arc::new(AppendSuffix("-a")), Arc::new(AppendSuffix("-b"))];
        let wrapped = wrap_language_model(base, &mws);

        let out = wrapped
            .do_generate(CallParams::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        // Inner layer (-a) post-processes first, then the outer (-b).
        assert_eq!(out.text, "x-a-b");
        assert_eq!(wrapped.provider_id(), "p");
        assert_eq!(wrapped.model_id(), "m");
    }

    #[tokio::test]
    async fn stream_events_pass_through_each_layer() {
        let base: Arc<dyn LanguageModel> =
            Arc::new(MockModel::stream("p", "m", vec!["x", "y"]));
        let mws: Vec<Arc<dyn LanguageModelMiddleware>> = vec![Arc::new(AppendSuffix("!"))];
        let wrapped = wrap_language_model(base, &mws);

        let events: Vec<_> = wrapped
            .do_stream(CallParams::default())
            .await
            .unwrap()
            .collect()
            .await;
        let texts: Vec<String> = events
            .into_iter()
            .filter_map(|e| match e.unwrap() {
                ChatStreamEvent::TextDelta { delta } => Some(delta),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["x!".to_string(), "y!".to_string()]);
    }
}
