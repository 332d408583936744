//! Provider capability flags

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Capabilities a provider declares in its descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCapabilities {
    pub chat: bool,
    pub streaming: bool,
    pub tools: bool,
    pub vision: bool,
    pub reasoning: bool,
    /// Native JSON-schema constrained output.
    pub structured_output: bool,
    pub embedding: bool,
    pub custom_features: HashMap<String, bool>,
}

impl ProviderCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chat + streaming, the baseline every text backend offers.
    pub fn text() -> Self {
        Self::new().with_chat().with_streaming()
    }

    pub fn with_chat(mut self) -> Self {
        self.chat = true;
        self
    }
    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }
    pub fn with_tools(mut self) -> Self {
        self.tools = true;
        self
    }
    pub fn with_vision(mut self) -> Self {
        self.vision = true;
        self
    }
    pub fn with_reasoning(mut self) -> Self {
        self.reasoning = true;
        self
    }
    pub fn with_structured_output(mut self) -> Self {
        self.structured_output = true;
        self
    }
    pub fn with_embedding(mut self) -> Self {
        self.embedding = true;
        self
    }

    pub fn with_custom_feature(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.custom_features.insert(name.into(), enabled);
        self
    }

    /// Check a capability by name, including custom features.
    pub fn supports(&self, capability: &str) -> bool {
        match capability {
            "chat" => self.chat,
            "streaming" => self.streaming,
            "tools" => self.tools,
            "vision" => self.vision,
            "reasoning" => self.reasoning,
            "structured_output" => self.structured_output,
            "embedding" => self.embedding,
            other => self.custom_features.get(other).copied().unwrap_or(false),
        }
    }
}
