//! Built-in plugins
//!
//! - `RetryPlugin`: backoff and retry signalling on transient failures
//! - `KeyRotationPlugin`: credential pool with per-key health tracking
//! - `MetricsPlugin`: TTFT / latency / throughput per call
//! - `LoggingPlugin`: redacted, level-filtered request logs

pub mod key_rotation;
pub mod logging;
pub mod metrics;
pub mod retry;

pub use key_rotation::{KeyRotationConfig, KeyRotationPlugin, KeySelectionStrategy, KeyStats};
pub use logging::{LoggingConfig, LoggingPlugin};
pub use metrics::{MetricsCallback, MetricsPlugin};
pub use retry::{BackoffStrategy, RetryPlugin, RetryPluginConfig};
