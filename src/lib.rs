//! # Siumai Arena - Provider-Agnostic LLM Runtime
//!
//! Siumai Arena resolves model references to backend clients, runs every call
//! through an ordered plugin pipeline, and fans one conversation out to several
//! models at once for side-by-side comparison.
//!
#![deny(unsafe_code)]

//! ## Features
//!
//! - **Registry & Builder**: provider descriptors, aliases, and cached client
//!   instances keyed by serialized options
//! - **Model Resolver**: `provider>model`, `provider:model`, `provider|model` or a
//!   bare id with a fallback provider; OpenAI vs Anthropic wire format detection
//! - **Plugins**: ordered lifecycle hooks (retry, key rotation, metrics, logging)
//! - **Arena**: concurrent comparison, races, and a pausable task controller
//!
//! Vendor HTTP clients are not part of this crate. They are plugged in as
//! `ClientConstructor`s on the `ProviderBuilder`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use siumai_arena::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ProviderRegistry::with_builtin_providers());
//! let builder = ProviderBuilder::new(registry)
//!     .with_openai_compatible_constructor(my_openai_compatible_constructor());
//! let resolver = Arc::new(ModelResolver::new(Arc::new(builder)));
//!
//! let arena = Arena::new(resolver)
//!     .with_provider_options("deepseek", ProviderOptions::new().with_api_key(key));
//! let results = arena
//!     .compare_models(
//!         &[ModelSpec::parse("deepseek>deepseek-chat")?, ModelSpec::parse("groq>llama-3.3-70b")?],
//!         vec![ChatMessage::user("Explain ownership in one sentence")],
//!         CompareOptions::new(),
//!     )
//!     .await?;
//! ```

pub mod arena;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod plugin;
pub mod plugins;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod streaming;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use error::LlmError;

/// Commonly used types.
pub mod prelude {
    pub use crate::arena::{
        Arena, ArenaController, CompareOptions, ComparisonStatus, ModelComparisonResult,
        ModelSpec, TaskStatus,
    };
    pub use crate::error::{ArenaFailure, ErrorCategory, LlmError, ParticipantFailure};
    pub use crate::metrics::{GlobalMetricsTracker, MetricsCollector, ModelMetrics};
    pub use crate::middleware::{DefaultSettingsMiddleware, LanguageModelMiddleware};
    pub use crate::plugin::{Plugin, PluginContext, PluginEnforce, PluginEngine, PluginManager};
    pub use crate::plugins::{
        KeyRotationConfig, KeyRotationPlugin, LoggingConfig, LoggingPlugin, MetricsPlugin,
        RetryPlugin, RetryPluginConfig,
    };
    pub use crate::provider::{ClientConfig, ProviderBuilder, ProviderDescriptor, ProviderOptions};
    pub use crate::registry::ProviderRegistry;
    pub use crate::resolver::{ModelResolver, ResolvedModel};
    pub use crate::runtime::{CallOptions, RuntimeExecutor};
    pub use crate::streaming::{ChatStream, ObjectStream, ObjectStreamEvent};
    pub use crate::traits::{LanguageModel, ModelFactory, ProviderClient};
    pub use crate::types::{
        CallParams, ChatMessage, ChatStreamEvent, GenerateObjectResult, GenerateTextResult,
        MessageRole, Usage, WireFormat,
    };
    pub use crate::utils::CancelHandle;
}
