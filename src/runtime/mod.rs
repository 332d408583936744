//! Runtime Executor
//!
//! Single entry point for one backend call. Every call gets a fresh plugin
//! engine built from the executor's plugins followed by the call's own, runs
//! the plugin lifecycle, and resolves the model only after `transform_params`
//! so plugins can redirect the call.

mod executor;
pub mod object;

pub use executor::{CallOptions, RuntimeExecutor};
pub use object::ObjectSchema;
