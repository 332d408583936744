//! Call parameters passed through the plugin pipeline to a language model.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::chat::ChatMessage;

/// Request/response shape a backend expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// OpenAI chat-completions style (default).
    #[default]
    OpenAi,
    /// Anthropic messages style.
    Anthropic,
}

impl WireFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime entry point a request went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMethod {
    GenerateText,
    StreamText,
    GenerateObject,
    StreamObject,
}

impl CallMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateText => "generate_text",
            Self::StreamText => "stream_text",
            Self::GenerateObject => "generate_object",
            Self::StreamObject => "stream_object",
        }
    }

    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::StreamText | Self::StreamObject)
    }
}

impl fmt::Display for CallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output constraint for a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OutputMode {
    #[default]
    Text,
    /// JSON output constrained by a JSON schema.
    Object {
        schema: serde_json::Value,
        name: Option<String>,
    },
}

/// Parameters of one generation call.
///
/// Plugins may rewrite any field in `transform_params`, including `model`
/// (which changes the model that gets resolved) and `api_key` (which selects
/// the credential the provider client is built with).
#[derive(Clone, Default)]
pub struct CallParams {
    /// Model id (or full `provider>model` reference) to resolve.
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop_sequences: Vec<String>,
    /// Extra request headers forwarded to the model.
    pub headers: BTreeMap<String, String>,
    /// Credential override used when building the provider client.
    pub api_key: Option<SecretString>,
    pub output: OutputMode,
    /// Provider-specific passthrough options.
    pub provider_options: HashMap<String, serde_json::Value>,
}

impl CallParams {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }
}

impl fmt::Debug for CallParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallParams")
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("top_p", &self.top_p)
            .field("stop_sequences", &self.stop_sequences)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("output", &self.output)
            .finish()
    }
}
