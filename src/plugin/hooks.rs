//! Plugin contract and per-hook capability traits
//!
//! A plugin exposes each hook it implements through an `*_hook()` accessor
//! returning `Some(self)`. The engine only dispatches hooks a plugin opted
//! into, so presence is checked by the type system rather than at runtime.

use std::fmt;

use async_trait::async_trait;

use super::context::PluginContext;
use crate::error::LlmError;
use crate::streaming::ChatStreamEvent;
use crate::types::{CallParams, GenerateTextResult};

/// Ordering tier of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginEnforce {
    /// Runs before every unordered plugin.
    Pre,
    /// Runs after every unordered plugin.
    Post,
}

/// Lifecycle hook names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginHook {
    Init,
    TransformParams,
    TransformResult,
    RequestStart,
    RequestEnd,
    Error,
    Stream,
}

impl PluginHook {
    pub const ALL: [PluginHook; 7] = [
        Self::Init,
        Self::TransformParams,
        Self::TransformResult,
        Self::RequestStart,
        Self::RequestEnd,
        Self::Error,
        Self::Stream,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::TransformParams => "transform_params",
            Self::TransformResult => "transform_result",
            Self::RequestStart => "on_request_start",
            Self::RequestEnd => "on_request_end",
            Self::Error => "on_error",
            Self::Stream => "on_stream",
        }
    }
}

impl fmt::Display for PluginHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait InitHook: Send + Sync {
    async fn init(&self, ctx: &mut PluginContext) -> Result<(), LlmError>;
}

#[async_trait]
pub trait TransformParamsHook: Send + Sync {
    async fn transform_params(
        &self,
        params: CallParams,
        ctx: &mut PluginContext,
    ) -> Result<CallParams, LlmError>;
}

#[async_trait]
pub trait TransformResultHook: Send + Sync {
    async fn transform_result(
        &self,
        result: GenerateTextResult,
        ctx: &mut PluginContext,
    ) -> Result<GenerateTextResult, LlmError>;
}

#[async_trait]
pub trait RequestStartHook: Send + Sync {
    async fn on_request_start(
        &self,
        ctx: &PluginContext,
        params: &CallParams,
    ) -> Result<(), LlmError>;
}

#[async_trait]
pub trait RequestEndHook: Send + Sync {
    async fn on_request_end(
        &self,
        ctx: &PluginContext,
        result: &GenerateTextResult,
    ) -> Result<(), LlmError>;
}

#[async_trait]
pub trait ErrorHook: Send + Sync {
    async fn on_error(&self, ctx: &PluginContext, error: &LlmError) -> Result<(), LlmError>;
}

/// Per-chunk stream transform. Synchronous: it runs inline for every chunk.
pub trait StreamHook: Send + Sync {
    fn on_stream(
        &self,
        event: ChatStreamEvent,
        ctx: &PluginContext,
    ) -> Result<ChatStreamEvent, LlmError>;
}

/// A named plugin with optional lifecycle hooks.
///
/// Plugins may keep instance-scoped state (shared by every request that uses
/// the instance); per-request state belongs in the `PluginContext`.
pub trait Plugin: Send + Sync {
    /// Unique name within a manager.
    fn name(&self) -> &str;

    fn enforce(&self) -> Option<PluginEnforce> {
        None
    }

    fn init_hook(&self) -> Option<&dyn InitHook> {
        None
    }
    fn transform_params_hook(&self) -> Option<&dyn TransformParamsHook> {
        None
    }
    fn transform_result_hook(&self) -> Option<&dyn TransformResultHook> {
        None
    }
    fn request_start_hook(&self) -> Option<&dyn RequestStartHook> {
        None
    }
    fn request_end_hook(&self) -> Option<&dyn RequestEndHook> {
        None
    }
    fn error_hook(&self) -> Option<&dyn ErrorHook> {
        None
    }
    fn stream_hook(&self) -> Option<&dyn StreamHook> {
        None
    }
}

/// Whether `plugin` implements `hook`.
pub fn has_hook(plugin: &dyn Plugin, hook: PluginHook) -> bool {
    match hook {
        PluginHook::Init => plugin.init_hook().is_some(),
        PluginHook::TransformParams => plugin.transform_params_hook().is_some(),
        PluginHook::TransformResult => plugin.transform_result_hook().is_some(),
        PluginHook::RequestStart => plugin.request_start_hook().is_some(),
        PluginHook::RequestEnd => plugin.request_end_hook().is_some(),
        PluginHook::Error => plugin.error_hook().is_some(),
        PluginHook::Stream => plugin.stream_hook().is_some(),
    }
}
