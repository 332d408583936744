//! Per-connection provider options

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::WireFormat;

/// Connection options for one provider.
///
/// Two option sets that serialize to the same cache key share one client
/// instance in the registry.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderOptions {
    /// Credential; never serialized.
    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_secret"
    )]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Explicit wire-format preference; overrides name-based detection.
    #[serde(default)]
    pub wire_format: Option<WireFormat>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

#[derive(Serialize)]
struct CacheKeyParts<'a> {
    key: Option<String>,
    base_url: Option<&'a str>,
    headers: &'a BTreeMap<String, String>,
    wire_format: Option<WireFormat>,
}

impl ProviderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_wire_format(mut self, wire_format: WireFormat) -> Self {
        self.wire_format = Some(wire_format);
        self
    }

    /// Deterministic serialization used as the instance/resolver cache key.
    ///
    /// The credential contributes only a fingerprint.
    pub fn cache_key(&self) -> String {
        let parts = CacheKeyParts {
            key: self.api_key.as_ref().map(|k| fingerprint(k.expose_secret())),
            base_url: self.base_url.as_deref(),
            headers: &self.headers,
            wire_format: self.wire_format,
        };
        // Serializing plain strings and maps cannot fail.
        serde_json::to_string(&parts).unwrap_or_default()
    }
}

/// Short stable fingerprint of a secret, safe to log and to use in keys.
pub fn fingerprint(secret: &str) -> String {
    let mut hasher = DefaultHasher::new();
    secret.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

impl fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderOptions")
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
