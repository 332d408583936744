//! Provider Registry
//!
//! A configuration-driven registry holding the static catalog of provider
//! descriptors (with an alias index) and the cache of realized client
//! instances. Both are only appended to or looked up by immutable key while
//! requests run; explicit clear/evict operations exist for tests and
//! reconfiguration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::error::LlmError;
use crate::provider::catalog::builtin_providers;
use crate::provider::{ModelInfo, ProviderClientInstance, ProviderDescriptor};

#[derive(Default)]
struct Catalog {
    by_id: HashMap<String, Arc<ProviderDescriptor>>,
    alias_index: HashMap<String, String>,
}

/// Provider catalog plus client-instance cache.
#[derive(Default)]
pub struct ProviderRegistry {
    catalog: RwLock<Catalog>,
    instances: RwLock<HashMap<String, Arc<ProviderClientInstance>>>,
    // Bumped whenever cached instances are dropped.
    generation: AtomicU64,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in provider catalog.
    pub fn with_builtin_providers() -> Self {
        let registry = Self::new();
        for descriptor in builtin_providers() {
            // Built-in ids are non-empty.
            let _ = registry.register(descriptor);
        }
        registry
    }

    /// Register a descriptor.
    ///
    /// Re-registering an id replaces the descriptor and evicts every cached
    /// instance built from the old one.
    pub fn register(&self, descriptor: ProviderDescriptor) -> Result<(), LlmError> {
        if descriptor.id.trim().is_empty() {
            return Err(LlmError::ConfigurationError(
                "provider descriptor id must not be empty".to_string(),
            ));
        }
        let id = descriptor.id.clone();
        let replaced = {
            let mut catalog = self
                .catalog
                .write()
                .map_err(|e| LlmError::InternalError(format!("Registry lock poisoned: {e}")))?;
            let previous = catalog.by_id.insert(id.clone(), Arc::new(descriptor.clone()));
            if let Some(old) = &previous {
                for alias in &old.aliases {
                    catalog.alias_index.remove(alias);
                }
            }
            for alias in &descriptor.aliases {
                match catalog.alias_index.insert(alias.clone(), id.clone()) {
                    Some(existing) if existing != id => {
                        warn!(alias = %alias, from = %existing, to = %id, "Provider alias reassigned");
                    }
                    _ => {}
                }
            }
            previous.is_some()
        };
        if replaced {
            let evicted = self.evict_instance(&id);
            debug!(provider = %id, evicted, "Provider descriptor replaced");
        }
        Ok(())
    }

    /// Register descriptors from JSON (a single object or an array).
    pub fn register_from_json(&self, json: &str) -> Result<usize, LlmError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| LlmError::ParseError(format!("Invalid provider JSON: {e}")))?;
        let descriptors: Vec<ProviderDescriptor> = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value),
            other => serde_json::from_value(other).map(|d| vec![d]),
        }
        .map_err(|e| LlmError::ParseError(format!("Invalid provider descriptor: {e}")))?;
        let count = descriptors.len();
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(count)
    }

    /// Map an id or alias to the canonical provider id.
    pub fn canonical_id(&self, id_or_alias: &str) -> Option<String> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        if catalog.by_id.contains_key(id_or_alias) {
            return Some(id_or_alias.to_string());
        }
        catalog.alias_index.get(id_or_alias).cloned()
    }

    /// Look up a descriptor by id or alias.
    pub fn get(&self, id_or_alias: &str) -> Option<Arc<ProviderDescriptor>> {
        let canonical = self.canonical_id(id_or_alias)?;
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        catalog.by_id.get(&canonical).cloned()
    }

    pub fn contains(&self, id_or_alias: &str) -> bool {
        self.canonical_id(id_or_alias).is_some()
    }

    /// Whether two ids/aliases name the same provider.
    pub fn is_same_provider(&self, a: &str, b: &str) -> bool {
        match (self.canonical_id(a), self.canonical_id(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Registered provider ids, sorted.
    pub fn list(&self) -> Vec<String> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = catalog.by_id.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Static model catalog of a provider (empty when none is declared).
    pub fn models(&self, id_or_alias: &str) -> Vec<ModelInfo> {
        self.get(id_or_alias)
            .map(|d| d.models.clone())
            .unwrap_or_default()
    }

    /// Instance cache key for a canonical provider id and serialized options.
    pub fn instance_key(provider_id: &str, options_key: &str) -> String {
        format!("{provider_id}::{options_key}")
    }

    /// Cache `instance` under `key`, returning whichever instance ends up cached.
    ///
    /// When another request cached an instance for the same key first, that
    /// instance wins and is returned.
    pub fn cache_instance(
        &self,
        key: impl Into<String>,
        instance: Arc<ProviderClientInstance>,
    ) -> Result<Arc<ProviderClientInstance>, LlmError> {
        let mut instances = self
            .instances
            .write()
            .map_err(|e| LlmError::InternalError(format!("Instance cache lock poisoned: {e}")))?;
        Ok(instances.entry(key.into()).or_insert(instance).clone())
    }

    pub fn get_cached_instance(&self, key: &str) -> Option<Arc<ProviderClientInstance>> {
        let instances = self.instances.read().unwrap_or_else(PoisonError::into_inner);
        instances.get(key).cloned()
    }

    /// Drop every cached instance of a provider. Returns how many were removed.
    pub fn evict_instance(&self, id_or_alias: &str) -> usize {
        let provider = self
            .canonical_id(id_or_alias)
            .unwrap_or_else(|| id_or_alias.to_string());
        let prefix = format!("{provider}::");
        let mut instances = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        let before = instances.len();
        instances.retain(|key, _| !key.starts_with(&prefix));
        self.generation.fetch_add(1, Ordering::SeqCst);
        before - instances.len()
    }

    pub fn clear_instances(&self) {
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Changes every time cached instances are evicted or a descriptor is
    /// replaced. Caches derived from instances key on it.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn instance_count(&self) -> usize {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

static GLOBAL: OnceLock<Arc<ProviderRegistry>> = OnceLock::new();

/// Process-wide registry seeded with the built-in catalog.
///
/// Prefer injecting an explicit `Arc<ProviderRegistry>` in tests.
pub fn global_registry() -> Arc<ProviderRegistry> {
    GLOBAL
        .get_or_init(|| Arc::new(ProviderRegistry::with_builtin_providers()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockClient;
    use crate::types::WireFormat;

    fn instance(provider: &str) -> Arc<ProviderClientInstance> {
        Arc::new(ProviderClientInstance::new(
            provider,
            WireFormat::OpenAi,
            None,
            "k",
            Arc::new(MockClient::new(provider)),
        ))
    }

    #[test]
    fn aliases_resolve_to_canonical_id() {
        let registry = ProviderRegistry::with_builtin_providers();
        assert_eq!(registry.canonical_id("google").as_deref(), Some("gemini"));
        assert_eq!(registry.get("google").map(|d| d.id.clone()).as_deref(), Some("gemini"));
        assert!(registry.is_same_provider("google", "gemini"));
        assert!(!registry.is_same_provider("openai", "gemini"));
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn rejects_empty_id() {
        let registry = ProviderRegistry::new();
        let err = registry
            .register(ProviderDescriptor::direct(" ", "blank"))
            .unwrap_err();
        assert!(matches!(err, LlmError::ConfigurationError(_)));
    }

    #[test]
    fn cache_instance_keeps_first_writer() {
        let registry = ProviderRegistry::new();
        let first = instance("openai");
        let second = instance("openai");
        let key = ProviderRegistry::instance_key("openai", "{}");
        let cached = registry.cache_instance(key.clone(), first.clone()).unwrap();
        assert!(Arc::ptr_eq(&cached, &first));
        let cached = registry.cache_instance(key.clone(), second).unwrap();
        assert!(Arc::ptr_eq(&cached, &first));
        assert_eq!(registry.instance_count(), 1);
        assert!(registry.get_cached_instance(&key).is_some());
    }

    #[test]
    fn reregister_evicts_instances() {
        let registry = ProviderRegistry::with_builtin_providers();
        registry
            .cache_instance(ProviderRegistry::instance_key("groq", "a"), instance("groq"))
            .unwrap();
        registry
            .cache_instance(ProviderRegistry::instance_key("openai", "a"), instance("openai"))
            .unwrap();
        registry
            .register(ProviderDescriptor::openai_compatible(
                "groq",
                "Groq",
                "https://proxy.example/v1",
            ))
            .unwrap();
        assert_eq!(registry.instance_count(), 1);
        registry.clear_instances();
        assert_eq!(registry.instance_count(), 0);
    }

    #[test]
    fn registers_from_json_array() {
        let registry = ProviderRegistry::new();
        let n = registry
            .register_from_json(
                r#"[
                    {"id": "acme", "name": "Acme", "kind": "openai_compatible",
                     "base_url": "https://acme.example/v1", "aliases": ["acme-ai"],
                     "models": [{"id": "acme-1"}]},
                    {"id": "local", "name": "Local", "kind": "openai_compatible",
                     "base_url": "http://localhost:8080/v1", "requires_api_key": false}
                ]"#,
            )
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(registry.list(), vec!["acme".to_string(), "local".to_string()]);
        assert_eq!(registry.models("acme-ai")[0].id, "acme-1");
        assert!(registry.register_from_json("not json").is_err());
    }
}
