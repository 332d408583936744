use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::collector::ModelMetrics;

/// Averages over the recorded samples of one `provider>model` pair.
///
/// TTFT and throughput are averaged only over samples that define them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageMetrics {
    pub samples: usize,
    pub avg_total_time: f64,
    pub avg_time_to_first_token: Option<f64>,
    pub avg_tokens_per_second: Option<f64>,
    pub total_tokens: u64,
}

/// What `GlobalMetricsTracker::clear` removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    All,
    Provider(String),
    Model { provider_id: String, model_id: String },
}

type PairKey = (String, String);

/// Per `provider>model` metrics history.
#[derive(Debug)]
pub struct GlobalMetricsTracker {
    history: RwLock<BTreeMap<PairKey, VecDeque<ModelMetrics>>>,
    max_samples: usize,
}

impl Default for GlobalMetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalMetricsTracker {
    pub const DEFAULT_MAX_SAMPLES: usize = 1000;

    pub fn new() -> Self {
        Self::with_max_samples(Self::DEFAULT_MAX_SAMPLES)
    }

    /// Keep at most `max_samples` per pair, dropping the oldest.
    pub fn with_max_samples(max_samples: usize) -> Self {
        Self {
            history: RwLock::new(BTreeMap::new()),
            max_samples: max_samples.max(1),
        }
    }

    pub fn record(&self, provider_id: &str, model_id: &str, metrics: ModelMetrics) {
        debug!(provider_id, model_id, total_time = metrics.total_time, "Recording metrics");
        let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
        let samples = history
            .entry((provider_id.to_string(), model_id.to_string()))
            .or_default();
        samples.push_back(metrics);
        while samples.len() > self.max_samples {
            samples.pop_front();
        }
    }

    pub fn history(&self, provider_id: &str, model_id: &str) -> Vec<ModelMetrics> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        history
            .get(&(provider_id.to_string(), model_id.to_string()))
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn average(&self, provider_id: &str, model_id: &str) -> Option<AverageMetrics> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        history
            .get(&(provider_id.to_string(), model_id.to_string()))
            .and_then(|s| average_of(s.iter()))
    }

    /// Averages for every tracked pair, keyed `provider>model`.
    pub fn summary(&self) -> BTreeMap<String, AverageMetrics> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        history
            .iter()
            .filter_map(|((p, m), samples)| {
                average_of(samples.iter()).map(|avg| (format!("{p}>{m}"), avg))
            })
            .collect()
    }

    pub fn clear(&self, scope: ClearScope) {
        let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
        match scope {
            ClearScope::All => history.clear(),
            ClearScope::Provider(provider_id) => history.retain(|(p, _), _| *p != provider_id),
            ClearScope::Model {
                provider_id,
                model_id,
            } => {
                history.remove(&(provider_id, model_id));
            }
        }
    }
}

fn average_of<'a>(samples: impl Iterator<Item = &'a ModelMetrics>) -> Option<AverageMetrics> {
    let samples: Vec<&ModelMetrics> = samples.collect();
    if samples.is_empty() {
        return None;
    }
    let mean = |values: Vec<f64>| {
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    };
    Some(AverageMetrics {
        samples: samples.len(),
        avg_total_time: samples.iter().map(|m| m.total_time as f64).sum::<f64>()
            / samples.len() as f64,
        avg_time_to_first_token: mean(
            samples
                .iter()
                .filter_map(|m| m.time_to_first_token.map(|t| t as f64))
                .collect(),
        ),
        avg_tokens_per_second: mean(samples.iter().filter_map(|m| m.tokens_per_second).collect()),
        total_tokens: samples
            .iter()
            .filter_map(|m| m.total_tokens.map(u64::from))
            .sum(),
    })
}

static GLOBAL_TRACKER: OnceLock<Arc<GlobalMetricsTracker>> = OnceLock::new();

/// Process-wide tracker used by the metrics plugin unless one is injected.
pub fn global_tracker() -> Arc<GlobalMetricsTracker> {
    GLOBAL_TRACKER
        .get_or_init(|| Arc::new(GlobalMetricsTracker::new()))
        .clone()
}
