//! Plugin system
//!
//! Plugins are named units of cross-cutting behavior with optional lifecycle
//! hooks. The `PluginManager` owns an ordered set (`pre` → unordered → `post`);
//! the `PluginEngine` drives one request through it:
//!
//! 1. `init` (sequential, aborts on failure)
//! 2. `transform_params` (sequential fold)
//! 3. `on_request_start` (parallel, failures logged)
//! 4. the generation call
//! 5. success: `transform_result` (sequential) then `on_request_end` (parallel);
//!    failure: `on_error` (parallel), then the error is returned unmodified
//!
//! Streaming calls additionally run `on_stream` for every chunk.

pub mod context;
pub mod engine;
pub mod hooks;
pub mod manager;

pub use context::PluginContext;
pub use engine::{LifecycleEvent, PluginEngine, SequentialValue};
pub use hooks::{
    ErrorHook, InitHook, Plugin, PluginEnforce, PluginHook, RequestEndHook, RequestStartHook,
    StreamHook, TransformParamsHook, TransformResultHook, has_hook,
};
pub use manager::PluginManager;
