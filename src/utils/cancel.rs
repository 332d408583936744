//! Cancellation utilities
//!
//! Provides first-class cancellation handles for streams and long-running operations.
//! Every arena participant observes one shared `CancellationToken`; these helpers make
//! a stream or future stop at its next suspension point once that token fires.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::streaming::ChatStream;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a new, independent cancel handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Request cancellation. Any wrapped streams/futures observing this handle
    /// will stop as soon as possible. Dropping the cancelled stream closes the
    /// underlying connection so providers stop generating tokens.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Token observed by wrapped streams and futures.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Error yielded when `token` fires while `label` is in flight.
pub fn cancelled_error(label: &str) -> LlmError {
    LlmError::Cancelled(format!("{label} aborted"))
}

/// Make a ChatStream stop at its next read once `token` is cancelled.
///
/// The wrapped stream yields a single `LlmError::Cancelled` and ends.
pub fn make_cancellable_stream(
    stream: ChatStream,
    token: CancellationToken,
    label: String,
) -> ChatStream {
    let mut inner = stream;
    let s = async_stream::stream! {
        use futures::StreamExt;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    yield Err(cancelled_error(&label));
                    break;
                }
                item = inner.next() => {
                    let Some(item) = item else { break };
                    yield item;
                }
            }
        }
    };
    Box::pin(s)
}

/// Await `future`, or fail with `LlmError::Cancelled` once `token` fires.
pub async fn run_cancellable<F, T>(
    future: F,
    token: &CancellationToken,
    label: &str,
) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    if token.is_cancelled() {
        return Err(cancelled_error(label));
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(cancelled_error(label)),
        res = future => res,
    }
}
