//! Provider Builder
//!
//! Turns a descriptor + connection options into a realized client instance,
//! reusing the registry's cached instance when the serialized options match.
//! Vendor clients are produced by injected constructors: one per natively
//! supported provider, plus one generic OpenAI-compatible constructor for the
//! long tail.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;

use super::descriptor::{ConstructionKind, ProviderDescriptor};
use super::instance::ProviderClientInstance;
use super::options::ProviderOptions;
use crate::error::LlmError;
use crate::registry::ProviderRegistry;
use crate::traits::ProviderClient;
use crate::types::WireFormat;

/// Fully resolved settings handed to a client constructor.
#[derive(Clone)]
pub struct ClientConfig {
    pub provider_id: String,
    pub kind: ConstructionKind,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    /// Descriptor defaults merged with option headers (options win).
    pub headers: BTreeMap<String, String>,
    pub wire_format: WireFormat,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("provider_id", &self.provider_id)
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field(
                "headers",
                &crate::utils::redact::redact_headers(&self.headers),
            )
            .field("wire_format", &self.wire_format)
            .finish()
    }
}

/// Builds a vendor client from a `ClientConfig`.
#[async_trait]
pub trait ClientConstructor: Send + Sync {
    async fn construct(&self, config: &ClientConfig) -> Result<Arc<dyn ProviderClient>, LlmError>;
}

struct FnConstructor<F>(F);

#[async_trait]
impl<F> ClientConstructor for FnConstructor<F>
where
    F: Fn(&ClientConfig) -> Result<Arc<dyn ProviderClient>, LlmError> + Send + Sync,
{
    async fn construct(&self, config: &ClientConfig) -> Result<Arc<dyn ProviderClient>, LlmError> {
        (self.0)(config)
    }
}

/// Adapt a synchronous closure into a `ClientConstructor`.
pub fn constructor_fn<F>(f: F) -> Arc<dyn ClientConstructor>
where
    F: Fn(&ClientConfig) -> Result<Arc<dyn ProviderClient>, LlmError> + Send + Sync + 'static,
{
    Arc::new(FnConstructor(f))
}

/// Factory for provider client instances.
pub struct ProviderBuilder {
    registry: Arc<ProviderRegistry>,
    direct: HashMap<String, Arc<dyn ClientConstructor>>,
    openai_compatible: Option<Arc<dyn ClientConstructor>>,
    // Per-key build locks so concurrent misses construct a client once.
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProviderBuilder {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            direct: HashMap::new(),
            openai_compatible: None,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Register the constructor for a natively supported provider.
    ///
    /// Also takes precedence over the generic constructor for an
    /// OpenAI-compatible provider with the same id.
    pub fn with_direct_constructor(
        mut self,
        provider_id: impl Into<String>,
        constructor: Arc<dyn ClientConstructor>,
    ) -> Self {
        self.direct.insert(provider_id.into(), constructor);
        self
    }

    /// Register the generic OpenAI-compatible constructor.
    pub fn with_openai_compatible_constructor(
        mut self,
        constructor: Arc<dyn ClientConstructor>,
    ) -> Self {
        self.openai_compatible = Some(constructor);
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Return the cached instance for (provider, options) or build a new one.
    pub async fn create_instance(
        &self,
        provider_id: &str,
        options: &ProviderOptions,
    ) -> Result<Arc<ProviderClientInstance>, LlmError> {
        let descriptor = self.registry.get(provider_id).ok_or_else(|| {
            LlmError::provider(provider_id, format!("Unknown provider id '{provider_id}'"))
        })?;
        let key = ProviderRegistry::instance_key(&descriptor.id, &options.cache_key());

        if let Some(instance) = self.registry.get_cached_instance(&key) {
            debug!(provider = %descriptor.id, "Provider instance cache hit");
            return Ok(instance);
        }

        let build_lock = {
            let mut map = self
                .in_flight
                .lock()
                .map_err(|e| LlmError::InternalError(format!("In-flight lock poisoned: {e}")))?;
            Arc::clone(
                map.entry(key.clone())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        let _guard = build_lock.lock().await;

        if let Some(instance) = self.registry.get_cached_instance(&key) {
            return Ok(instance);
        }

        let result = self.build(&descriptor, options, key.clone()).await;
        if let Ok(mut map) = self.in_flight.lock() {
            map.remove(&key);
        }
        result
    }

    async fn build(
        &self,
        descriptor: &ProviderDescriptor,
        options: &ProviderOptions,
        key: String,
    ) -> Result<Arc<ProviderClientInstance>, LlmError> {
        let config = self.client_config(descriptor, options)?;
        let constructor = self.constructor_for(descriptor)?;
        let client = constructor.construct(&config).await?;

        debug!(
            provider = %descriptor.id,
            wire_format = %config.wire_format,
            base_url = ?config.base_url,
            "Built provider client instance"
        );
        let instance = Arc::new(ProviderClientInstance::new(
            descriptor.id.clone(),
            config.wire_format,
            config.base_url,
            key.clone(),
            client,
        ));
        self.registry.cache_instance(key, instance)
    }

    fn client_config(
        &self,
        descriptor: &ProviderDescriptor,
        options: &ProviderOptions,
    ) -> Result<ClientConfig, LlmError> {
        let api_key = match &options.api_key {
            Some(key) => Some(key.clone()),
            None => std::env::var(descriptor.api_key_env_var())
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
        };
        if api_key.is_none() && descriptor.requires_api_key {
            return Err(LlmError::ConfigurationError(format!(
                "Missing API key for provider '{}' (pass one in options or set {})",
                descriptor.id,
                descriptor.api_key_env_var()
            )));
        }

        let wire_format = options.wire_format.unwrap_or_default();
        let base_url = options
            .base_url
            .clone()
            .or_else(|| descriptor.base_url_for(wire_format).map(str::to_string));

        let mut headers = descriptor.default_headers.clone();
        headers.extend(options.headers.clone());

        Ok(ClientConfig {
            provider_id: descriptor.id.clone(),
            kind: descriptor.kind,
            api_key,
            base_url,
            headers,
            wire_format,
        })
    }

    fn constructor_for(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<Arc<dyn ClientConstructor>, LlmError> {
        if let Some(c) = self.direct.get(&descriptor.id) {
            return Ok(c.clone());
        }
        match descriptor.kind {
            ConstructionKind::Direct => Err(LlmError::ConfigurationError(format!(
                "No client constructor registered for provider '{}'",
                descriptor.id
            ))),
            ConstructionKind::OpenAiCompatible => {
                self.openai_compatible.clone().ok_or_else(|| {
                    LlmError::ConfigurationError(format!(
                        "No OpenAI-compatible constructor registered (needed by '{}')",
                        descriptor.id
                    ))
                })
            }
        }
    }
}
