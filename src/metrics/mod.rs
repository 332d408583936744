//! Call metrics
//!
//! `MetricsCollector` times one call (TTFT, total time, token throughput);
//! `GlobalMetricsTracker` keeps per `provider>model` history and averages.

mod collector;
mod tracker;

pub use collector::{MetricsCollector, ModelMetrics};
pub use tracker::{AverageMetrics, ClearScope, GlobalMetricsTracker, global_tracker};
