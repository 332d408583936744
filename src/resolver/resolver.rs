use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

use super::reference::{detect_wire_format, parse_model_reference};
use crate::error::LlmError;
use crate::middleware::{LanguageModelMiddleware, wrap_language_model};
use crate::provider::{ProviderBuilder, ProviderOptions};
use crate::traits::LanguageModel;
use crate::types::WireFormat;

/// A concrete, callable model handle.
#[derive(Clone)]
pub struct ResolvedModel {
    /// Canonical provider id (aliases already resolved).
    pub provider_id: String,
    pub model_id: String,
    pub wire_format: WireFormat,
    pub model: Arc<dyn LanguageModel>,
}

impl fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("provider_id", &self.provider_id)
            .field("model_id", &self.model_id)
            .field("wire_format", &self.wire_format)
            .finish()
    }
}

/// Resolver cache settings.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Maximum cached handles (LRU eviction beyond this).
    pub max_cache_entries: usize,
    /// Optional time-to-live for cached handles.
    pub ttl: Option<Duration>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_cache_entries: 100,
            ttl: None,
        }
    }
}

impl ResolverOptions {
    pub fn with_max_cache_entries(mut self, entries: usize) -> Self {
        self.max_cache_entries = entries;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

struct CacheEntry {
    resolved: ResolvedModel,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.created_at.elapsed() > ttl)
    }
}

/// Resolves model references to model handles.
pub struct ModelResolver {
    builder: Arc<ProviderBuilder>,
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Option<Duration>,
}

impl ModelResolver {
    pub fn new(builder: Arc<ProviderBuilder>) -> Self {
        Self::with_options(builder, ResolverOptions::default())
    }

    pub fn with_options(builder: Arc<ProviderBuilder>, options: ResolverOptions) -> Self {
        let capacity = NonZeroUsize::new(options.max_cache_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            builder,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl: options.ttl,
        }
    }

    pub fn builder(&self) -> &Arc<ProviderBuilder> {
        &self.builder
    }

    /// Resolve `reference` to a model handle.
    ///
    /// Results are cached by (reference, fallback, options, registry
    /// generation) only when `middlewares` is empty; middleware instances are
    /// not stable cache keys.
    pub async fn resolve(
        &self,
        reference: &str,
        fallback_provider: Option<&str>,
        options: &ProviderOptions,
        middlewares: &[Arc<dyn LanguageModelMiddleware>],
    ) -> Result<ResolvedModel, LlmError> {
        let cache_key = middlewares.is_empty().then(|| {
            format!(
                "{reference}|{}|{}|{}",
                fallback_provider.unwrap_or_default(),
                options.cache_key(),
                self.builder.registry().generation()
            )
        });

        if let Some(key) = &cache_key {
            if let Some(hit) = self.cache_get(key)? {
                debug!(reference, "Resolved model cache hit");
                return Ok(hit);
            }
        }

        let parsed = parse_model_reference(reference, fallback_provider)?;
        let wire_format = detect_wire_format(&parsed.model_id, options.wire_format);

        let mut effective = options.clone();
        effective.wire_format = Some(wire_format);
        let instance = self
            .builder
            .create_instance(&parsed.provider_id, &effective)
            .await?;
        let model = instance.model(&parsed.model_id)?;
        let model = wrap_language_model(model, middlewares);

        let resolved = ResolvedModel {
            provider_id: instance.provider_id().to_string(),
            model_id: parsed.model_id,
            wire_format,
            model,
        };

        if let Some(key) = cache_key {
            self.cache
                .lock()
                .map_err(|e| LlmError::InternalError(format!("Resolver cache lock poisoned: {e}")))?
                .put(
                    key,
                    CacheEntry {
                        resolved: resolved.clone(),
                        created_at: Instant::now(),
                    },
                );
        }
        Ok(resolved)
    }

    fn cache_get(&self, key: &str) -> Result<Option<ResolvedModel>, LlmError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| LlmError::InternalError(format!("Resolver cache lock poisoned: {e}")))?;
        let expired = match cache.get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => return Ok(Some(entry.resolved.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(key);
        }
        Ok(None)
    }

    /// Number of cached handles.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Drop every cached handle.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}
