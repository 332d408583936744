//! Key rotation plugin
//!
//! Spreads requests over a pool of credentials. Per-key counters live on the
//! plugin instance and are shared by every request using it; selection and
//! counting happen under one lock so concurrent requests never double-count.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::plugin::{ErrorHook, Plugin, PluginContext, PluginEnforce, TransformParamsHook};
use crate::types::CallParams;
use crate::utils::redact::mask_secret;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySelectionStrategy {
    #[default]
    RoundRobin,
    LeastUsed,
    LeastErrorRate,
}

#[derive(Clone)]
pub struct KeyRotationConfig {
    pub keys: Vec<SecretString>,
    pub strategy: KeySelectionStrategy,
    /// Error rate above which a key is put in cooldown.
    pub max_error_rate: f64,
    /// Uses before the error rate is considered.
    pub min_uses: u64,
    pub cooldown: Duration,
}

impl std::fmt::Debug for KeyRotationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRotationConfig")
            .field("keys", &self.keys.len())
            .field("strategy", &self.strategy)
            .field("max_error_rate", &self.max_error_rate)
            .field("min_uses", &self.min_uses)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

impl KeyRotationConfig {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|k| SecretString::from(k.into()))
                .collect(),
            strategy: KeySelectionStrategy::RoundRobin,
            max_error_rate: 0.5,
            min_uses: 5,
            cooldown: Duration::from_secs(60),
        }
    }

    pub fn with_strategy(mut self, strategy: KeySelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_error_rate(mut self, rate: f64) -> Self {
        self.max_error_rate = rate;
        self
    }

    pub fn with_min_uses(mut self, min_uses: u64) -> Self {
        self.min_uses = min_uses;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Snapshot of one key's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyStats {
    /// Masked key, safe to log.
    pub label: String,
    pub uses: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub in_cooldown: bool,
}

struct KeyState {
    key: SecretString,
    label: String,
    uses: u64,
    errors: u64,
    cooldown_until: Option<Instant>,
}

impl KeyState {
    fn error_rate(&self) -> f64 {
        if self.uses == 0 {
            0.0
        } else {
            self.errors as f64 / self.uses as f64
        }
    }
}

struct Pool {
    keys: Vec<KeyState>,
    cursor: usize,
}

impl Pool {
    /// Lift expired cooldowns (zeroing the key's counters) and list usable keys.
    fn available(&mut self, now: Instant) -> Vec<usize> {
        for state in &mut self.keys {
            if state.cooldown_until.is_some_and(|until| now >= until) {
                debug!(key = %state.label, "Key cooldown expired");
                state.cooldown_until = None;
                state.uses = 0;
                state.errors = 0;
            }
        }
        (0..self.keys.len())
            .filter(|&i| self.keys[i].cooldown_until.is_none())
            .collect()
    }

    fn select(&mut self, strategy: KeySelectionStrategy, available: &[usize]) -> Option<usize> {
        let picked = match strategy {
            KeySelectionStrategy::RoundRobin => {
                let n = self.keys.len();
                (0..n)
                    .map(|offset| (self.cursor + offset) % n)
                    .find(|i| available.contains(i))
            }
            KeySelectionStrategy::LeastUsed => available
                .iter()
                .copied()
                .min_by_key(|&i| self.keys[i].uses),
            KeySelectionStrategy::LeastErrorRate => available.iter().copied().min_by(|&a, &b| {
                self.keys[a]
                    .error_rate()
                    .total_cmp(&self.keys[b].error_rate())
                    .then(self.keys[a].uses.cmp(&self.keys[b].uses))
            }),
        }?;
        self.cursor = picked + 1;
        Some(picked)
    }
}

pub struct KeyRotationPlugin {
    config: KeyRotationConfig,
    pool: Mutex<Pool>,
}

impl KeyRotationPlugin {
    pub const NAME: &'static str = "key-rotation";

    pub fn new(config: KeyRotationConfig) -> Self {
        let keys = config
            .keys
            .iter()
            .enumerate()
            .map(|(i, key)| KeyState {
                key: key.clone(),
                label: format!("#{i} {}", mask_secret(key.expose_secret())),
                uses: 0,
                errors: 0,
                cooldown_until: None,
            })
            .collect();
        Self {
            config,
            pool: Mutex::new(Pool { keys, cursor: 0 }),
        }
    }

    /// Pick the next key and count one use of it. Returns `(label, key)`.
    pub fn next_key(&self) -> Result<(String, SecretString), LlmError> {
        let mut pool = self
            .pool
            .lock()
            .map_err(|e| LlmError::InternalError(format!("Key pool lock poisoned: {e}")))?;
        let available = pool.available(Instant::now());
        let idx = pool
            .select(self.config.strategy, &available)
            .ok_or_else(|| {
                LlmError::NoAvailableKeys(format!(
                    "all {} keys are in cooldown or none are configured",
                    pool.keys.len()
                ))
            })?;
        let state = &mut pool.keys[idx];
        state.uses += 1;
        Ok((state.label.clone(), state.key.clone()))
    }

    /// Count an error against the key with `label`, starting its cooldown when
    /// the error rate ceiling is exceeded.
    pub fn report_error(&self, label: &str) {
        let mut pool = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        let Some(state) = pool.keys.iter_mut().find(|k| k.label == label) else {
            return;
        };
        state.errors += 1;
        if state.cooldown_until.is_none()
            && state.uses >= self.config.min_uses
            && state.error_rate() > self.config.max_error_rate
        {
            warn!(
                key = %state.label,
                error_rate = state.error_rate(),
                cooldown_secs = self.config.cooldown.as_secs(),
                "Key error rate exceeded, cooling down"
            );
            state.cooldown_until = Some(Instant::now() + self.config.cooldown);
        }
    }

    pub fn key_stats(&self) -> Vec<KeyStats> {
        let pool = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        pool.keys
            .iter()
            .map(|k| KeyStats {
                label: k.label.clone(),
                uses: k.uses,
                errors: k.errors,
                error_rate: k.error_rate(),
                in_cooldown: k.cooldown_until.is_some_and(|until| now < until),
            })
            .collect()
    }
}

#[async_trait]
impl TransformParamsHook for KeyRotationPlugin {
    async fn transform_params(
        &self,
        mut params: CallParams,
        ctx: &mut PluginContext,
    ) -> Result<CallParams, LlmError> {
        let (label, key) = self.next_key()?;
        debug!(request_id = %ctx.request_id, key = %label, "Selected API key");
        params.api_key = Some(key);
        ctx.selected_key = Some(label);
        Ok(params)
    }
}

#[async_trait]
impl ErrorHook for KeyRotationPlugin {
    async fn on_error(&self, ctx: &PluginContext, error: &LlmError) -> Result<(), LlmError> {
        // An aborted request says nothing about the key's health.
        if error.root_cause().is_cancelled() {
            return Ok(());
        }
        if let Some(label) = &ctx.selected_key {
            self.report_error(label);
        }
        Ok(())
    }
}

impl Plugin for KeyRotationPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enforce(&self) -> Option<PluginEnforce> {
        Some(PluginEnforce::Pre)
    }

    fn transform_params_hook(&self) -> Option<&dyn TransformParamsHook> {
        Some(self)
    }

    fn error_hook(&self) -> Option<&dyn ErrorHook> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallMethod;

    const KEYS: [&str; 3] = ["sk-key-zero-0000", "sk-key-one-11111", "sk-key-two-22222"];

    async fn select(plugin: &KeyRotationPlugin) -> Result<String, LlmError> {
        let mut ctx = PluginContext::new("openai", "gpt-4o", CallMethod::GenerateText);
        let params = plugin.transform_params(CallParams::default(), &mut ctx).await?;
        Ok(params.api_key.unwrap().expose_secret().to_string())
    }

    #[tokio::test]
    async fn round_robin_cycles_in_order() {
        let plugin = KeyRotationPlugin::new(KeyRotationConfig::new(KEYS));
        let mut picked = Vec::new();
        for _ in 0..6 {
            picked.push(select(&plugin).await.unwrap());
        }
        assert_eq!(
            picked,
            vec![KEYS[0], KEYS[1], KEYS[2], KEYS[0], KEYS[1], KEYS[2]]
        );
    }

    #[tokio::test]
    async fn least_used_prefers_idle_keys() {
        let plugin = KeyRotationPlugin::new(
            KeyRotationConfig::new(KEYS).with_strategy(KeySelectionStrategy::LeastUsed),
        );
        plugin.next_key().unwrap();
        plugin.next_key().unwrap();
        assert_eq!(select(&plugin).await.unwrap(), KEYS[2]);
        let uses: Vec<u64> = plugin.key_stats().iter().map(|s| s.uses).collect();
        assert_eq!(uses, vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn least_error_rate_avoids_failing_key() {
        let plugin = KeyRotationPlugin::new(
            KeyRotationConfig::new(KEYS)
                .with_strategy(KeySelectionStrategy::LeastErrorRate)
                .with_min_uses(100),
        );
        let (label, _) = plugin.next_key().unwrap();
        plugin.report_error(&label);
        assert_ne!(select(&plugin).await.unwrap(), KEYS[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_key_cools_down_and_resets() {
        let plugin = KeyRotationPlugin::new(
            KeyRotationConfig::new([KEYS[0]])
                .with_min_uses(2)
                .with_max_error_rate(0.5)
                .with_cooldown(Duration::from_secs(30)),
        );
        for _ in 0..2 {
            let (label, _) = plugin.next_key().unwrap();
            plugin.report_error(&label);
        }
        assert!(plugin.key_stats()[0].in_cooldown);
        assert!(matches!(
            plugin.next_key().unwrap_err(),
            LlmError::NoAvailableKeys(_)
        ));

        tokio::time::advance(Duration::from_secs(31)).await;
        plugin.next_key().unwrap();
        let stats = &plugin.key_stats()[0];
        assert!(!stats.in_cooldown);
        assert_eq!((stats.uses, stats.errors), (1, 0));
    }

    #[tokio::test]
    async fn stamps_selected_key_label_without_secret() {
        let plugin = KeyRotationPlugin::new(KeyRotationConfig::new(KEYS));
        let mut ctx = PluginContext::new("openai", "gpt-4o", CallMethod::GenerateText);
        plugin
            .transform_params(CallParams::default(), &mut ctx)
            .await
            .unwrap();
        let label = ctx.selected_key.unwrap();
        assert!(label.starts_with("#0 "));
        assert!(!label.contains(KEYS[0]));
    }

    #[test]
    fn empty_pool_has_no_keys() {
        let plugin = KeyRotationPlugin::new(KeyRotationConfig::new(Vec::<String>::new()));
        assert!(matches!(
            plugin.next_key().unwrap_err(),
            LlmError::NoAvailableKeys(_)
        ));
    }
}
