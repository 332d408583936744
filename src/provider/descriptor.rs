//! Provider descriptor

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::traits::ProviderCapabilities;
use crate::types::WireFormat;

/// How a client for this provider is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionKind {
    /// A dedicated constructor registered for this provider id.
    Direct,
    /// The shared OpenAI-compatible constructor, parameterized by base URL and headers.
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
}

/// Entry of a provider's static model catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// Immutable description of one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub name: String,
    pub kind: ConstructionKind,
    /// Default (OpenAI wire format) endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Endpoint speaking the Anthropic wire format, when the vendor offers one.
    #[serde(default)]
    pub anthropic_base_url: Option<String>,
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub capabilities: ProviderCapabilities,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Environment variable holding the credential (default `<ID>_API_KEY`).
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_requires_api_key")]
    pub requires_api_key: bool,
}

fn default_requires_api_key() -> bool {
    true
}

impl ProviderDescriptor {
    fn base(id: impl Into<String>, name: impl Into<String>, kind: ConstructionKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            base_url: None,
            anthropic_base_url: None,
            default_headers: BTreeMap::new(),
            capabilities: ProviderCapabilities::text(),
            models: Vec::new(),
            aliases: Vec::new(),
            api_key_env: None,
            requires_api_key: true,
        }
    }

    /// Natively supported vendor with its own constructor.
    pub fn direct(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::base(id, name, ConstructionKind::Direct)
    }

    /// OpenAI-compatible vendor reachable at `base_url`.
    pub fn openai_compatible(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut d = Self::base(id, name, ConstructionKind::OpenAiCompatible);
        d.base_url = Some(base_url.into());
        d
    }

    /// User-hosted OpenAI-compatible endpoint; no credential required.
    pub fn custom(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut d = Self::openai_compatible(id, name, base_url);
        d.requires_api_key = false;
        d
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_anthropic_base_url(mut self, url: impl Into<String>) -> Self {
        self.anthropic_base_url = Some(url.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.models.push(ModelInfo::new(model_id));
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    pub fn with_requires_api_key(mut self, required: bool) -> Self {
        self.requires_api_key = required;
        self
    }

    /// Environment variable consulted when no credential is passed explicitly.
    pub fn api_key_env_var(&self) -> String {
        self.api_key_env
            .clone()
            .unwrap_or_else(|| format!("{}_API_KEY", self.id.to_uppercase().replace('-', "_")))
    }

    /// Base URL to use for `wire_format`.
    ///
    /// The Anthropic endpoint is only chosen when the descriptor declares one.
    pub fn base_url_for(&self, wire_format: WireFormat) -> Option<&str> {
        match (wire_format, self.anthropic_base_url.as_deref()) {
            (WireFormat::Anthropic, Some(url)) => Some(url),
            _ => self.base_url.as_deref(),
        }
    }

    /// Whether the vendor exposes a second, Anthropic-format endpoint.
    pub fn has_dual_endpoints(&self) -> bool {
        self.anthropic_base_url.is_some()
    }
}
