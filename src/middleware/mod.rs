//! Language-model middleware
//!
//! Middleware wraps a resolved model handle. A list is applied by folding:
//! each middleware wraps the result of the previous one, so the last entry is
//! the outermost layer.

pub mod defaults;
pub mod language_model;

pub use defaults::DefaultSettingsMiddleware;
pub use language_model::{LanguageModelMiddleware, MiddlewareModel, wrap_language_model};
